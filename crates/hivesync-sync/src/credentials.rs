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

//! Stored BEEP account credentials

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;

/// Read cap for the credentials file, as on the device's flash filesystem
const MAX_CREDENTIALS_BYTES: u64 = 4096;

/// Raw fields as stored; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default)]
    pub beep_email: Option<String>,
    #[serde(default)]
    pub beep_password: Option<String>,
    #[serde(default)]
    pub beep_device_key: Option<String>,
    #[serde(default)]
    pub beep_base_url: Option<String>,
}

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<StoredCredentials>;
}

/// `config.json` on the data partition. Unrelated keys in the same file are
/// ignored.
#[derive(Debug, Clone)]
pub struct JsonFileCredentialStore {
    path: PathBuf,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for JsonFileCredentialStore {
    fn load(&self) -> Result<StoredCredentials> {
        if !self.path.exists() {
            return Err(SyncError::ConfigMissing(format!(
                "{} not found",
                self.path.display()
            )));
        }

        let mut content = String::new();
        std::fs::File::open(&self.path)?
            .take(MAX_CREDENTIALS_BYTES)
            .read_to_string(&mut content)?;

        serde_json::from_str(&content).map_err(|e| {
            SyncError::ConfigMissing(format!("Failed to parse {}: {e}", self.path.display()))
        })
    }
}

/// Credentials fixed at construction, for tests and provisioning tools
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: StoredCredentials,
}

impl StaticCredentialStore {
    pub fn new(email: &str, password: &str, device_key: &str) -> Self {
        Self {
            credentials: StoredCredentials {
                beep_email: Some(email.to_string()),
                beep_password: Some(password.to_string()),
                beep_device_key: Some(device_key.to_string()),
                beep_base_url: None,
            },
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.credentials.beep_base_url = Some(base_url.into());
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn load(&self) -> Result<StoredCredentials> {
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"ds18b20_pin":4,"beep_email":"a@b.c","beep_password":"pw","beep_device_key":"dk"}"#,
        )
        .unwrap();

        let creds = JsonFileCredentialStore::new(&path).load().unwrap();
        assert_eq!(creds.beep_email.as_deref(), Some("a@b.c"));
        assert_eq!(creds.beep_password.as_deref(), Some("pw"));
        assert_eq!(creds.beep_device_key.as_deref(), Some("dk"));
        assert!(creds.beep_base_url.is_none());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileCredentialStore::new(dir.path().join("config.json"));
        assert!(matches!(
            store.load().unwrap_err(),
            SyncError::ConfigMissing(_)
        ));
    }

    #[test]
    fn test_oversized_file_is_truncated_and_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let padding = "x".repeat(5000);
        std::fs::write(
            &path,
            format!(r#"{{"notes":"{padding}","beep_email":"a@b.c"}}"#),
        )
        .unwrap();

        assert!(matches!(
            JsonFileCredentialStore::new(&path).load().unwrap_err(),
            SyncError::ConfigMissing(_)
        ));
    }

    #[test]
    fn test_static_store() {
        let creds = StaticCredentialStore::new("a@b.c", "pw", "dk")
            .with_base_url("http://localhost")
            .load()
            .unwrap();
        assert_eq!(creds.beep_base_url.as_deref(), Some("http://localhost"));
    }
}
