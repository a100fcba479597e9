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

//! HiveSync - host entry point
//!
//! Runs the sync core on a development host or gateway: firmware images are
//! staged in the data directory and the process exits with code 3 so the
//! service manager can start the new image.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hivesync_sync::config::{FIRMWARE_VERSION, load_config};
use hivesync_sync::credentials::JsonFileCredentialStore;
use hivesync_sync::device::{Clock, ExitRestarter, FileUpdateSink, LinkState, SystemClock};
use hivesync_sync::metadata::update_firmware_version;
use hivesync_sync::telemetry::upload_readings;
use hivesync_sync::transport::{HttpTransport, ReqwestTransport};
use hivesync_sync::{CloudSession, Reading, SessionOptions, SyncConfig, UpdateOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "hivesync")]
#[command(about = "Firmware update and BEEP telemetry sync for the hive monitor", long_about = None)]
struct Cli {
    /// Path to the sync config (created with defaults if it doesn't exist)
    #[arg(short, long, default_value = "/data/hivesync.json")]
    config: PathBuf,

    /// Treat the network link as down
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check GitHub Releases once and apply a newer image
    CheckUpdate,
    /// Upload sensor readings to BEEP
    Upload {
        /// Reading as key=value, repeatable
        #[arg(short, long = "reading", required = true)]
        readings: Vec<Reading>,
    },
    /// Report the running firmware version on the BEEP device record
    ReportVersion,
    /// Update check, version report, then upload of any given readings
    Run {
        #[arg(short, long = "reading")]
        readings: Vec<Reading>,
    },
    /// Print the running firmware version
    Version,
}

impl Command {
    /// Everything except `version` reads (and may create) the config file
    fn needs_config(&self) -> bool {
        !matches!(self, Self::Version)
    }
}

struct Runtime {
    config: SyncConfig,
    transport: Arc<dyn HttpTransport>,
    link: Arc<LinkState>,
    clock: SystemClock,
}

impl Runtime {
    fn orchestrator(&self) -> UpdateOrchestrator {
        UpdateOrchestrator::new(
            &self.config,
            self.transport.clone(),
            self.link.clone(),
            Box::new(FileUpdateSink::new(&self.config.data_dir)),
            Box::new(ExitRestarter),
        )
    }

    fn session(&self) -> CloudSession {
        CloudSession::new(
            Arc::new(JsonFileCredentialStore::new(self.config.credentials_path())),
            self.transport.clone(),
            self.link.clone(),
            SessionOptions::from(&self.config),
        )
    }

    async fn upload(&self, session: &mut CloudSession, readings: &[Reading]) -> Result<()> {
        let sampled_at = self.clock.uptime_ms();
        upload_readings(
            session,
            &self.clock,
            readings,
            sampled_at,
            self.config.timeouts.time_sync(),
        )
        .await
        .context("Sensor upload failed")
    }

    async fn report_version(&self, session: &mut CloudSession) -> Result<()> {
        let field = update_firmware_version(session, &self.config.current_version)
            .await
            .context("Firmware version report failed")?;
        info!("Reported firmware {} as '{field}'", self.config.current_version);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hivesync_sync=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if !cli.command.needs_config() {
        println!("{FIRMWARE_VERSION}");
        return Ok(());
    }

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    info!(
        "Starting HiveSync {} (policy={:?})",
        config.current_version, config.check_policy
    );

    let runtime = Runtime {
        transport: Arc::new(ReqwestTransport::new()?),
        link: Arc::new(LinkState::new(!cli.offline)),
        clock: SystemClock::new(),
        config,
    };

    match cli.command {
        Command::CheckUpdate => {
            let outcome = runtime.orchestrator().poll().await;
            info!("Update check: {outcome:?}");
        }
        Command::Upload { readings } => {
            let mut session = runtime.session();
            runtime.upload(&mut session, &readings).await?;
        }
        Command::ReportVersion => {
            let mut session = runtime.session();
            runtime.report_version(&mut session).await?;
        }
        Command::Run { readings } => {
            let outcome = runtime.orchestrator().poll().await;
            info!("Update check: {outcome:?}");

            let mut session = runtime.session();
            if !session.is_configured() {
                warn!("BEEP not configured; skipping cloud sync");
                return Ok(());
            }
            if let Err(e) = runtime.report_version(&mut session).await {
                error!("{e:#}");
            }
            if !readings.is_empty()
                && let Err(e) = runtime.upload(&mut session, &readings).await
            {
                error!("{e:#}");
            }
        }
        Command::Version => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_skips_config() {
        let cli = Cli::try_parse_from(["hivesync", "--config", "/nonexistent/hivesync.json", "version"])
            .unwrap();
        assert!(!cli.command.needs_config());
    }

    #[test]
    fn test_sync_commands_need_config() {
        for args in [
            vec!["hivesync", "check-update"],
            vec!["hivesync", "report-version"],
            vec!["hivesync", "run"],
            vec!["hivesync", "upload", "--reading", "t_i=21.5"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert!(cli.command.needs_config());
        }
    }

    #[test]
    fn test_upload_parses_readings() {
        let cli = Cli::try_parse_from(["hivesync", "upload", "-r", "t_i=21.5", "-r", "bv=3.9"])
            .unwrap();
        let Command::Upload { readings } = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(readings, vec![Reading::new("t_i", 21.5), Reading::new("bv", 3.9)]);
    }
}
