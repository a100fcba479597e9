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

//! Configuration module for the sync core
//!
//! Release coordinates default to build-time constants so a firmware image
//! knows where its own updates live. A JSON file may override them on hosts.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Firmware version baked into this build
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const GITHUB_OWNER: &str = match option_env!("HIVESYNC_GITHUB_OWNER") {
    Some(owner) => owner,
    None => "",
};

pub const GITHUB_REPO: &str = match option_env!("HIVESYNC_GITHUB_REPO") {
    Some(repo) => repo,
    None => "",
};

pub const FIRMWARE_ASSET: &str = match option_env!("HIVESYNC_FIRMWARE_ASSET") {
    Some(asset) => asset,
    None => "firmware.bin",
};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_BEEP_BASE_URL: &str = "https://api.beep.nl";

fn default_owner() -> String {
    GITHUB_OWNER.to_string()
}

fn default_repo() -> String {
    GITHUB_REPO.to_string()
}

fn default_asset() -> String {
    FIRMWARE_ASSET.to_string()
}

fn default_current_version() -> String {
    FIRMWARE_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

/// Where firmware releases are published
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseRepo {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    /// File name of the firmware binary attached to each release
    #[serde(default = "default_asset")]
    pub asset: String,

    /// Custom API base URL for testing (overrides default GitHub API)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

impl ReleaseRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            asset: default_asset(),
            api_base_url: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }

    pub fn latest_release_url(&self) -> String {
        let base = self.api_base_url.as_deref().unwrap_or(DEFAULT_GITHUB_API);
        format!(
            "{}/repos/{}/{}/releases/latest",
            base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Conventional GitHub download location for a release asset
    pub fn download_url(&self, tag: &str, asset: &str) -> String {
        format!(
            "https://github.com/{}/{}/releases/download/{tag}/{asset}",
            self.owner, self.repo
        )
    }
}

impl Default for ReleaseRepo {
    fn default() -> Self {
        Self::new(GITHUB_OWNER, GITHUB_REPO)
    }
}

/// Whether a failed update check may be repeated within the same boot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckPolicy {
    /// Mark the boot as checked before the first request. A transient
    /// failure waits for the next boot.
    #[default]
    OncePerBoot,
    /// Keep checking on every poll until one check reaches a conclusion
    UntilSuccess,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    /// Release metadata and cloud API calls
    pub api_ms: u64,
    /// Firmware download: waiting for the response, then for each chunk.
    /// There is no limit on the download as a whole.
    pub firmware_ms: u64,
    /// Waiting for wall-clock time before an upload
    pub time_sync_ms: u64,
}

impl Timeouts {
    pub fn api(&self) -> Duration {
        Duration::from_millis(self.api_ms)
    }

    pub fn firmware(&self) -> Duration {
        Duration::from_millis(self.firmware_ms)
    }

    pub fn time_sync(&self) -> Duration {
        Duration::from_millis(self.time_sync_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            api_ms: 15_000,
            firmware_ms: 30_000,
            time_sync_ms: 7_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub release: ReleaseRepo,

    /// Version the running firmware reports and compares against
    #[serde(default = "default_current_version")]
    pub current_version: String,

    #[serde(default)]
    pub check_policy: CheckPolicy,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Drop the cached token and log in again once when the API answers 401
    #[serde(default = "default_true")]
    pub reauth_on_rejection: bool,

    /// Credentials file with the `beep_*` keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Directory the host update sink stages images in
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            release: ReleaseRepo::default(),
            current_version: default_current_version(),
            check_policy: CheckPolicy::default(),
            timeouts: Timeouts::default(),
            reauth_on_rejection: true,
            credentials_path: None,
            data_dir: default_data_dir(),
        }
    }
}

impl SyncConfig {
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("config.json"))
    }
}

/// Load config from `path`, writing the defaults there if it does not exist
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SyncError::ConfigMissing(format!("Failed to parse config: {e}")))
    } else {
        // Create with defaults
        let config = SyncConfig::default();
        save_config(path, &config)?;
        Ok(config)
    }
}

pub fn save_config(path: &Path, config: &SyncConfig) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(config)?;

    // Atomic write
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}
