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

//! Streams a firmware image from a URL into the device update mechanism
//!
//! There is no resume and no retry. Whatever goes wrong, the next attempt
//! starts from scratch with a fresh call.

use crate::device::{Restarter, UpdateSink};
use crate::error::{Result, SyncError};
use crate::transport::{HttpRequest, HttpTransport};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOutcome {
    /// Image committed and restart requested. On a real device the restart
    /// does not return.
    Restarting { bytes: u64 },
}

/// Download `url` into `sink`, restarting the device once the image is
/// written in full, finalized and reported complete.
///
/// `progress` is called with `(bytes_written, total_bytes)` after every
/// chunk the transport delivers.
///
/// `timeout` applies to the response head and to each chunk separately, so a
/// slow but steady download of any size completes. A stall longer than
/// `timeout` ends the download.
///
/// When fewer bytes arrive than `Content-Length` declared, the sink is
/// aborted and `finalize` is never called: the partial image is discarded
/// rather than handed to validation.
pub async fn stream_firmware(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
    sink: &mut dyn UpdateSink,
    restarter: &mut dyn Restarter,
    progress: &mut (dyn FnMut(u64, u64) + Send),
) -> Result<FlashOutcome> {
    let request = HttpRequest::get(url).timeout(timeout);
    let mut response = transport.open_stream(request).await?;
    debug!("OTA GET code: {}", response.status);

    if response.status != 200 {
        error!("OTA HTTP error: {}", response.status);
        return Err(SyncError::status(response.status, "Firmware download"));
    }

    let total = match response.content_length {
        Some(len) if len > 0 => len,
        other => {
            error!("Missing or invalid Content-Length");
            return Err(SyncError::StreamLengthInvalid(other));
        }
    };

    info!("Starting update: size={total} bytes");
    sink.begin(total)?;

    let mut written: u64 = 0;
    loop {
        let chunk = match tokio::time::timeout(timeout, response.body.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                warn!("Download interrupted: {e}");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                warn!("No data for {timeout:?}, stopping download");
                break;
            }
        };

        let accepted = match sink.write(&chunk) {
            Ok(n) => n,
            Err(e) => {
                warn!("Update write failed: {e}");
                break;
            }
        };
        written += accepted as u64;
        progress(written, total);

        if accepted < chunk.len() {
            warn!("Update accepted {accepted} of {} bytes, stopping", chunk.len());
            break;
        }
    }
    debug!("Update wrote {written} bytes");

    if written != total {
        error!("Write incomplete: expected {total} but wrote {written}");
        sink.abort();
        return Err(SyncError::StreamWriteIncomplete {
            expected: total,
            written,
        });
    }

    if let Err(e) = sink.finalize() {
        error!("Update finalize error: {e}");
        return Err(match e {
            e @ SyncError::FinalizeFailed(_) => e,
            other => SyncError::FinalizeFailed(other.to_string()),
        });
    }

    if !sink.is_finished() {
        error!("Update not finished");
        return Err(SyncError::FinalizeFailed(
            "update mechanism did not report completion".to_string(),
        ));
    }

    info!("Update OK, rebooting");
    restarter.restart();
    Ok(FlashOutcome::Restarting { bytes: written })
}

/// Progress callback that logs whole-percent steps
pub fn log_progress() -> impl FnMut(u64, u64) + Send {
    let mut last_pct = None;
    move |done, total| {
        if total == 0 {
            return;
        }
        let pct = done.saturating_mul(100) / total;
        if last_pct != Some(pct) {
            last_pct = Some(pct);
            info!("Updating: {pct}%");
        }
    }
}
