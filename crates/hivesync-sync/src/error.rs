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

//! Error types for the sync core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network not connected")]
    ConnectivityUnavailable,

    #[error("config missing: {0}")]
    ConfigMissing(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{context} failed with HTTP {status}")]
    Status { status: u16, context: String },

    #[error("field missing from response: {0}")]
    FieldMissing(String),

    #[error("invalid content length: {0:?}")]
    StreamLengthInvalid(Option<u64>),

    #[error("write incomplete: expected {expected} bytes, wrote {written}")]
    StreamWriteIncomplete { expected: u64, written: u64 },

    #[error("update finalize failed: {0}")]
    FinalizeFailed(String),

    #[error("update begin failed: {0}")]
    UpdateBegin(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fieldless view of [`SyncError`] for callers that branch on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectivityUnavailable,
    ConfigMissing,
    AuthFailed,
    Transport,
    Status,
    FieldMissing,
    StreamLengthInvalid,
    StreamWriteIncomplete,
    FinalizeFailed,
    UpdateBegin,
    Validation,
    Io,
    Json,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectivityUnavailable => ErrorKind::ConnectivityUnavailable,
            Self::ConfigMissing(_) => ErrorKind::ConfigMissing,
            Self::AuthFailed(_) => ErrorKind::AuthFailed,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Status { .. } => ErrorKind::Status,
            Self::FieldMissing(_) => ErrorKind::FieldMissing,
            Self::StreamLengthInvalid(_) => ErrorKind::StreamLengthInvalid,
            Self::StreamWriteIncomplete { .. } => ErrorKind::StreamWriteIncomplete,
            Self::FinalizeFailed(_) => ErrorKind::FinalizeFailed,
            Self::UpdateBegin(_) => ErrorKind::UpdateBegin,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
        }
    }

    pub(crate) fn status(status: u16, context: impl Into<String>) -> Self {
        Self::Status {
            status,
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            SyncError::status(401, "Upload").kind(),
            ErrorKind::Status
        );
        assert_eq!(
            SyncError::StreamWriteIncomplete {
                expected: 10,
                written: 4
            }
            .kind(),
            ErrorKind::StreamWriteIncomplete
        );
        assert_eq!(
            SyncError::ConnectivityUnavailable.kind(),
            ErrorKind::ConnectivityUnavailable
        );
    }

    #[test]
    fn test_status_message() {
        let err = SyncError::status(503, "Login");
        assert_eq!(err.to_string(), "Login failed with HTTP 503");
    }
}
