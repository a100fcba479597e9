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

//! One-shot firmware update check, driven by the connectivity signal
//!
//! Call [`UpdateOrchestrator::poll`] from the main loop. Nothing happens
//! while the link is down. The first poll with a live link runs the check;
//! failures are logged and never returned, and under the default
//! [`CheckPolicy::OncePerBoot`] nothing is retried until the next boot.

use crate::config::{CheckPolicy, ReleaseRepo, SyncConfig, Timeouts};
use crate::device::{Connectivity, Restarter, UpdateSink};
use crate::firmware::{FlashOutcome, log_progress, stream_firmware};
use crate::release::{fetch_latest_release, find_asset_url, latest_tag};
use crate::transport::{HttpTransport, preview};
use crate::version::compare_versions;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a call to [`UpdateOrchestrator::poll`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Link down, nothing attempted
    Offline,
    /// This boot was already checked
    AlreadyChecked,
    /// No release owner/repo compiled in or configured
    NotConfigured,
    UpToDate { latest: String },
    /// New image committed, device restarting
    Restarting { version: String },
    /// Metadata could not be fetched or understood (see logs)
    Failed,
    /// A newer image was found but applying it failed (see logs)
    FlashFailed { version: String },
}

impl CheckOutcome {
    /// Whether the check reached a conclusion worth remembering for the boot
    fn is_conclusive(&self) -> bool {
        !matches!(self, Self::Offline | Self::AlreadyChecked | Self::Failed)
    }
}

pub struct UpdateOrchestrator {
    repo: ReleaseRepo,
    current_version: String,
    policy: CheckPolicy,
    timeouts: Timeouts,
    transport: Arc<dyn HttpTransport>,
    connectivity: Arc<dyn Connectivity>,
    sink: Box<dyn UpdateSink>,
    restarter: Box<dyn Restarter>,
    checked: bool,
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("repo", &self.repo)
            .field("current_version", &self.current_version)
            .field("policy", &self.policy)
            .field("checked", &self.checked)
            .finish_non_exhaustive()
    }
}

impl UpdateOrchestrator {
    pub fn new(
        config: &SyncConfig,
        transport: Arc<dyn HttpTransport>,
        connectivity: Arc<dyn Connectivity>,
        sink: Box<dyn UpdateSink>,
        restarter: Box<dyn Restarter>,
    ) -> Self {
        Self {
            repo: config.release.clone(),
            current_version: config.current_version.clone(),
            policy: config.check_policy,
            timeouts: config.timeouts,
            transport,
            connectivity,
            sink,
            restarter,
            checked: false,
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// True once this boot's check has run
    pub fn check_completed(&self) -> bool {
        self.checked
    }

    pub async fn poll(&mut self) -> CheckOutcome {
        if self.checked {
            return CheckOutcome::AlreadyChecked;
        }
        if !self.connectivity.is_connected() {
            return CheckOutcome::Offline;
        }

        if self.policy == CheckPolicy::OncePerBoot {
            self.checked = true;
        }

        let outcome = self.check_and_update().await;

        if outcome.is_conclusive() {
            self.checked = true;
        }
        outcome
    }

    async fn check_and_update(&mut self) -> CheckOutcome {
        if !self.repo.is_configured() {
            info!("Release owner/repo not configured; skipping update check");
            return CheckOutcome::NotConfigured;
        }

        info!("Current version: {}", self.current_version);
        debug!("API URL: {}", self.repo.latest_release_url());

        let metadata =
            match fetch_latest_release(&*self.transport, &self.repo, self.timeouts.api()).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Latest release check failed: {e}");
                    return CheckOutcome::Failed;
                }
            };

        let Some(latest) = latest_tag(&metadata) else {
            warn!(
                "Release metadata missing tag_name; body preview: {}",
                preview(&metadata)
            );
            return CheckOutcome::Failed;
        };

        let cmp = compare_versions(&self.current_version, &latest);
        debug!(
            "Compare: current={} latest={latest} -> {cmp:?}",
            self.current_version
        );
        if cmp != Ordering::Less {
            info!("Already on latest version: {}", self.current_version);
            return CheckOutcome::UpToDate { latest };
        }

        let Some(url) = find_asset_url(&metadata, &self.repo.asset, &self.repo) else {
            warn!("Could not determine asset URL from release metadata");
            return CheckOutcome::Failed;
        };

        info!(
            "New version available: {latest} (current: {}), asset URL: {url}",
            self.current_version
        );

        let mut progress = log_progress();
        match stream_firmware(
            &*self.transport,
            &url,
            self.timeouts.firmware(),
            self.sink.as_mut(),
            self.restarter.as_mut(),
            &mut progress,
        )
        .await
        {
            Ok(FlashOutcome::Restarting { bytes }) => {
                info!("Applied {latest} ({bytes} bytes)");
                CheckOutcome::Restarting { version: latest }
            }
            Err(e) => {
                error!("Firmware update to {latest} failed: {e}");
                CheckOutcome::FlashFailed { version: latest }
            }
        }
    }
}
