// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HiveSync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Device-side collaborators: link state, update mechanism, restart and clock
//!
//! The traits are what the sync core talks to. The structs in this module are
//! the host implementations used by the `hivesync` binary.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 2021-01-01T00:00:00Z. Anything earlier means the clock was never set.
pub const MIN_VALID_EPOCH: i64 = 1_609_459_200;

/// Exit code the host restarter uses so a supervisor can relaunch the new image
pub const RESTART_EXIT_CODE: i32 = 3;

const TIME_SYNC_POLL: Duration = Duration::from_millis(100);

pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Link state toggled by whoever owns the network connection
#[derive(Debug, Default)]
pub struct LinkState {
    connected: AtomicBool,
}

impl LinkState {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

impl Connectivity for LinkState {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// The device's firmware update mechanism
pub trait UpdateSink: Send {
    /// Prepare to receive an image of exactly `size` bytes
    fn begin(&mut self, size: u64) -> Result<()>;

    /// Write a chunk, returning how many bytes were accepted. Fewer than
    /// `chunk.len()` means the sink will take no more data.
    fn write(&mut self, chunk: &[u8]) -> Result<usize>;

    /// Validate and commit the written image
    fn finalize(&mut self) -> Result<()>;

    /// Discard a partially written image
    fn abort(&mut self);

    /// True once a committed image is ready to boot
    fn is_finished(&self) -> bool;
}

pub trait Restarter: Send {
    fn restart(&mut self);
}

#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds since boot
    fn uptime_ms(&self) -> u64;

    /// Wait up to `timeout` for wall-clock time to become valid and return it
    /// as epoch seconds, or `None` if it never did
    async fn wall_clock(&self, timeout: Duration) -> Option<i64>;
}

/// Stages the image in `<dir>/firmware.bin.part` and renames it to
/// `<dir>/firmware.bin` on finalize
#[derive(Debug)]
pub struct FileUpdateSink {
    dir: PathBuf,
    file: Option<File>,
    expected: u64,
    written: u64,
    finished: bool,
}

impl FileUpdateSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
            expected: 0,
            written: 0,
            finished: false,
        }
    }

    pub fn staging_path(&self) -> PathBuf {
        self.dir.join("firmware.bin.part")
    }

    pub fn image_path(&self) -> PathBuf {
        self.dir.join("firmware.bin")
    }

    fn remove_staging(path: &Path) {
        if path.exists()
            && let Err(e) = std::fs::remove_file(path)
        {
            warn!("Failed to remove {}: {e}", path.display());
        }
    }
}

impl UpdateSink for FileUpdateSink {
    fn begin(&mut self, size: u64) -> Result<()> {
        if size == 0 {
            return Err(SyncError::UpdateBegin("image size is zero".to_string()));
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| SyncError::UpdateBegin(format!("Failed to create {}: {e}", self.dir.display())))?;
        let file = File::create(self.staging_path())
            .map_err(|e| SyncError::UpdateBegin(format!("Failed to create staging file: {e}")))?;

        self.file = Some(file);
        self.expected = size;
        self.written = 0;
        self.finished = false;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<usize> {
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };
        let remaining = usize::try_from(self.expected - self.written).unwrap_or(usize::MAX);
        let take = chunk.len().min(remaining);
        let accepted = chunk.get(..take).unwrap_or_default();
        file.write_all(accepted)?;
        self.written += accepted.len() as u64;
        Ok(accepted.len())
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Err(SyncError::FinalizeFailed("update was not started".to_string()));
        };
        if self.written != self.expected {
            drop(file);
            Self::remove_staging(&self.staging_path());
            return Err(SyncError::FinalizeFailed(format!(
                "image incomplete: {} of {} bytes",
                self.written, self.expected
            )));
        }

        file.flush()?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(self.staging_path(), self.image_path())
            .map_err(|e| SyncError::FinalizeFailed(format!("Failed to commit image: {e}")))?;

        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.file = None;
        Self::remove_staging(&self.staging_path());
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Exits the process so the supervisor boots the freshly written image
#[derive(Debug, Default)]
pub struct ExitRestarter;

impl Restarter for ExitRestarter {
    fn restart(&mut self) {
        info!("Update OK, restarting");
        std::process::exit(RESTART_EXIT_CODE);
    }
}

/// Uptime from process start, wall clock from the system
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn uptime_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    async fn wall_clock(&self, timeout: Duration) -> Option<i64> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = chrono::Utc::now().timestamp();
            if now > MIN_VALID_EPOCH {
                return Some(now);
            }
            if Instant::now() >= deadline {
                warn!("Time sync failed or timed out");
                return None;
            }
            tokio::time::sleep(TIME_SYNC_POLL).await;
        }
    }
}
