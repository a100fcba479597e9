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

//! Reports the running firmware version on the device's BEEP record

use crate::error::{Result, SyncError};
use crate::session::CloudSession;
use crate::transport::Method;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Field names the API has used for the firmware version, tried in order
pub const FIRMWARE_FIELDS: [&str; 3] = ["firmware_version", "fw_version", "firmware"];

/// Max distance in bytes between a device's `"key"` and its `"id"` when the
/// device list has to be scanned as text
pub const ID_PROXIMITY_WINDOW: usize = 200;

/// Cloud id of the device whose `key` equals `device_key` in a
/// `/api/devices` response
pub fn find_device_id(body: &str, device_key: &str) -> Option<u64> {
    match serde_json::from_str::<Value>(body) {
        Ok(doc) => find_in_tree(&doc, device_key),
        Err(e) => {
            warn!("Device list is not valid JSON ({e}), scanning text");
            scan_for_id(body, device_key)
        }
    }
}

fn find_in_tree(doc: &Value, device_key: &str) -> Option<u64> {
    let devices = doc
        .as_array()
        .or_else(|| doc.get("data").and_then(Value::as_array))
        .or_else(|| doc.get("devices").and_then(Value::as_array))?;

    let device = devices
        .iter()
        .find(|d| d.get("key").and_then(Value::as_str) == Some(device_key))?;

    match device.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Nearest `"id":` within [`ID_PROXIMITY_WINDOW`] bytes either side of the
/// `"key":"<device_key>"` literal
fn scan_for_id(body: &str, device_key: &str) -> Option<u64> {
    let needle = format!("\"key\":\"{device_key}\"");
    let key_pos = body.find(&needle)?;
    let key_end = key_pos + needle.len();

    let (pos, _) = body
        .match_indices("\"id\":")
        .map(|(p, m)| {
            let distance = if p < key_pos {
                key_pos - (p + m.len())
            } else {
                p.saturating_sub(key_end)
            };
            (p + m.len(), distance)
        })
        .filter(|&(_, distance)| distance <= ID_PROXIMITY_WINDOW)
        .min_by_key(|&(_, distance)| distance)?;

    let rest = body.get(pos..)?.trim_start();
    let rest = rest.strip_prefix('"').unwrap_or(rest);
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest.get(..digits)?.parse().ok()
}

/// Set the reported firmware version of this device to `version`.
///
/// Returns the field name the API accepted. When every candidate field is
/// rejected the error carries the status of the last attempt.
pub async fn update_firmware_version(
    session: &mut CloudSession,
    version: &str,
) -> Result<&'static str> {
    let config = session.ready_config()?;

    let response = session
        .authenticated_request(Method::Get, "/api/devices", None)
        .await?;
    if !response.is_success() {
        warn!("Device list failed: {}", response.status);
        return Err(SyncError::status(response.status, "Device list"));
    }

    let id = find_device_id(&response.body, &config.device_key).ok_or_else(|| {
        SyncError::FieldMissing(format!("id for device key {}", config.device_key))
    })?;
    debug!("Device id for key {}: {id}", config.device_key);

    let path = format!("/api/devices/{id}");
    let mut last_status = 0;
    for field in FIRMWARE_FIELDS {
        let payload = json!({ field: version }).to_string();
        let response = session
            .authenticated_request(Method::Patch, &path, Some(payload))
            .await?;
        if response.is_success() {
            info!("Device {id} firmware set to {version} via '{field}'");
            return Ok(field);
        }
        debug!("PATCH '{field}' rejected with {}", response.status);
        last_status = response.status;
    }

    Err(SyncError::status(last_status, "Device firmware update"))
}
