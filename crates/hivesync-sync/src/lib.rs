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

//! HiveSync - remote-sync core of the hive monitor
//!
//! Two independent paths share one HTTP transport and one connectivity
//! signal: a once-per-boot firmware update from GitHub Releases, and an
//! authenticated BEEP session used to upload sensor readings and report the
//! running firmware version.

pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod extract;
pub mod firmware;
pub mod metadata;
pub mod release;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod updater;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::{CheckPolicy, ReleaseRepo, SyncConfig};
pub use error::{ErrorKind, Result, SyncError};
pub use session::{CloudSession, SessionOptions};
pub use telemetry::Reading;
pub use updater::{CheckOutcome, UpdateOrchestrator};
pub use version::{Version, compare_versions, is_newer};
