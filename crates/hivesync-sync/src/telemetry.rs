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

//! Sensor reading upload to BEEP
//!
//! Readings are sampled against device uptime; the upload converts the
//! sample time to epoch seconds using the wall clock at upload time.

use crate::device::Clock;
use crate::error::{Result, SyncError};
use crate::session::CloudSession;
use crate::transport::Method;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One measured value, e.g. `t_i` (inside temperature) or `bv` (battery volts)
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub key: String,
    pub value: f64,
}

impl Reading {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Parse `key=value` as given on the command line
impl std::str::FromStr for Reading {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| SyncError::Validation(format!("expected key=value, got '{s}'")))?;
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|e| SyncError::Validation(format!("bad value for '{key}': {e}")))?;
        Ok(Self::new(key.trim(), value))
    }
}

pub fn validate_readings(readings: &[Reading]) -> Result<()> {
    if readings.is_empty() {
        return Err(SyncError::Validation("no readings to upload".to_string()));
    }
    for reading in readings {
        if reading.key.is_empty() {
            return Err(SyncError::Validation("reading with empty key".to_string()));
        }
        if !reading.value.is_finite() {
            return Err(SyncError::Validation(format!(
                "reading '{}' is not a finite number",
                reading.key
            )));
        }
    }
    Ok(())
}

/// Epoch seconds at which a reading taken at `sample_ms` uptime was
/// measured. Without a wall clock the answer is 0.
pub fn reading_epoch(device_now_ms: u64, sample_ms: u64, wall_clock: Option<i64>) -> i64 {
    let Some(now) = wall_clock else {
        return 0;
    };
    let elapsed_s = i64::try_from(device_now_ms.saturating_sub(sample_ms) / 1000).unwrap_or(i64::MAX);
    now.saturating_sub(elapsed_s).max(0)
}

/// `{"key":..,"time":..,<k1>:<v1>,...}` with two decimals per value, in
/// reading order
pub fn build_payload(device_key: &str, epoch: i64, readings: &[Reading]) -> Result<String> {
    let mut payload = format!(
        "{{\"key\":{},\"time\":{epoch}",
        serde_json::to_string(device_key)?
    );
    for reading in readings {
        let key = serde_json::to_string(&reading.key)?;
        payload.push_str(&format!(",{key}:{:.2}", reading.value));
    }
    payload.push('}');
    Ok(payload)
}

/// Post `readings`, sampled at `sample_ms` device uptime, to `/api/sensors`.
///
/// Nothing is sent unless every reading is valid. A failed upload is not
/// queued; the caller decides whether to try again.
pub async fn upload_readings(
    session: &mut CloudSession,
    clock: &dyn Clock,
    readings: &[Reading],
    sample_ms: u64,
    time_sync_timeout: Duration,
) -> Result<()> {
    validate_readings(readings)?;

    let config = session.ready_config()?;
    session.ensure_logged_in().await?;

    let wall_clock = clock.wall_clock(time_sync_timeout).await;
    if wall_clock.is_none() {
        warn!("No wall clock; uploading with time 0");
    }
    let epoch = reading_epoch(clock.uptime_ms(), sample_ms, wall_clock);

    let payload = build_payload(&config.device_key, epoch, readings)?;
    debug!("Sensors payload: {payload}");

    let response = session
        .authenticated_request(Method::Post, "/api/sensors", Some(payload))
        .await?;
    if !response.is_success() {
        warn!(
            "Sensors upload failed: {} {}",
            response.status,
            response.body_preview()
        );
        return Err(SyncError::status(response.status, "Sensors upload"));
    }

    info!("Uploaded {} readings (time={epoch})", readings.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialStore;
    use crate::device::LinkState;
    use crate::error::ErrorKind;
    use crate::session::SessionOptions;
    use crate::testing::{FixedClock, MockTransport};
    use crate::transport::HttpResponse;
    use std::sync::Arc;

    const SYNC: Duration = Duration::from_secs(7);

    fn session(connected: bool) -> (CloudSession, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let session = CloudSession::new(
            Arc::new(StaticCredentialStore::new("bee@example.com", "pw", "hive-01")),
            transport.clone(),
            Arc::new(LinkState::new(connected)),
            SessionOptions::default(),
        );
        (session, transport)
    }

    #[test]
    fn test_reading_epoch() {
        assert_eq!(reading_epoch(10_000, 8_000, Some(1_700_000_000)), 1_699_999_998);
        // sub-second elapsed time is truncated
        assert_eq!(reading_epoch(10_999, 10_000, Some(1_700_000_000)), 1_700_000_000);
        // sample newer than "now" counts as zero elapsed
        assert_eq!(reading_epoch(5_000, 8_000, Some(1_700_000_000)), 1_700_000_000);
        assert_eq!(reading_epoch(10_000, 8_000, None), 0);
        assert_eq!(reading_epoch(10_000_000, 0, Some(5)), 0);
    }

    #[test]
    fn test_payload_format() {
        let readings = vec![
            Reading::new("t_i", 34.5),
            Reading::new("h", 61.0),
            Reading::new("bv", 3.876),
        ];
        let payload = build_payload("hive-01", 1_700_000_000, &readings).unwrap();
        assert_eq!(
            payload,
            r#"{"key":"hive-01","time":1700000000,"t_i":34.50,"h":61.00,"bv":3.88}"#
        );
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["bv"], serde_json::json!(3.88));
    }

    #[test]
    fn test_payload_escapes_keys() {
        let payload = build_payload("a\"b", 0, &[Reading::new("x\\y", -1.0)]).unwrap();
        assert_eq!(payload, r#"{"key":"a\"b","time":0,"x\\y":-1.00}"#);
    }

    #[test]
    fn test_parse_reading() {
        let reading: Reading = "t_i=21.25".parse().unwrap();
        assert_eq!(reading, Reading::new("t_i", 21.25));
        assert!("t_i".parse::<Reading>().is_err());
        assert!("t_i=warm".parse::<Reading>().is_err());
    }

    #[tokio::test]
    async fn test_invalid_batches_never_touch_network() {
        let batches = [
            vec![],
            vec![Reading::new("", 1.0)],
            vec![Reading::new("t", f64::NAN)],
            vec![Reading::new("t", 1.0), Reading::new("h", f64::INFINITY)],
        ];
        for readings in batches {
            let (mut session, transport) = session(true);
            let clock = FixedClock::new(10_000, Some(1_700_000_000));

            let err = upload_readings(&mut session, &clock, &readings, 8_000, SYNC)
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(transport.request_count(), 0);
            assert_eq!(clock.sync_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_offline_upload_fails() {
        let (mut session, transport) = session(false);
        let clock = FixedClock::new(10_000, Some(1_700_000_000));

        let err = upload_readings(&mut session, &clock, &[Reading::new("t", 1.0)], 0, SYNC)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ConnectivityUnavailable));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_posts_timestamped_batch() {
        let (mut session, transport) = session(true);
        transport.push_response(HttpResponse::new(200, r#"{"api_token":"tok"}"#));
        transport.push_response(HttpResponse::new(201, ""));
        let clock = FixedClock::new(10_000, Some(1_700_000_000));

        upload_readings(
            &mut session,
            &clock,
            &[Reading::new("t_i", 34.5), Reading::new("w_v", 12.0)],
            8_000,
            SYNC,
        )
        .await
        .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let upload = &requests[1];
        assert_eq!(upload.method, Method::Post);
        assert_eq!(upload.url, "https://api.beep.nl/api/sensors");
        assert_eq!(upload.header_value("Authorization"), Some("Bearer tok"));
        assert_eq!(
            upload.body.as_deref(),
            Some(r#"{"key":"hive-01","time":1699999998,"t_i":34.50,"w_v":12.00}"#)
        );
    }

    #[tokio::test]
    async fn test_rejected_upload_returns_status() {
        let (mut session, transport) = session(true);
        transport.push_response(HttpResponse::new(200, r#"{"api_token":"tok"}"#));
        transport.push_response(HttpResponse::new(422, r#"{"errors":{}}"#));
        let clock = FixedClock::new(0, None);

        let err = upload_readings(&mut session, &clock, &[Reading::new("t", 1.0)], 0, SYNC)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Status { status: 422, .. }));
        let body = transport.requests()[1].body.clone().unwrap();
        assert!(body.contains(r#""time":0"#));
    }

    #[tokio::test]
    async fn test_login_failure_stops_upload() {
        let (mut session, transport) = session(true);
        transport.push_response(HttpResponse::new(401, "bad credentials"));
        let clock = FixedClock::new(0, Some(1_700_000_000));

        let err = upload_readings(&mut session, &clock, &[Reading::new("t", 1.0)], 0, SYNC)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthFailed);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(clock.sync_calls(), 0);
    }
}
