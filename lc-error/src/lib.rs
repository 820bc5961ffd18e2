//! Unified error handling for laptopctl
//!
//! This crate provides the single error type used across the library and the
//! command-line front-end, plus the serializable [`ErrorKind`] that control
//! results carry back to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias using LaptopctlError
pub type Result<T> = std::result::Result<T, LaptopctlError>;

/// Caller-facing classification of a failed control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unsupported,
    InvalidValue,
    PermissionDenied,
    ExternalToolMissing,
    NotApplied,
    TransientReadError,
    Busy,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ExternalToolMissing => "external_tool_missing",
            ErrorKind::NotApplied => "not_applied",
            ErrorKind::TransientReadError => "transient_read_error",
            ErrorKind::Busy => "busy",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for all laptopctl operations
#[derive(thiserror::Error, Debug)]
pub enum LaptopctlError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse {
        path: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Control Errors
    // ============================================================================
    #[error("Not supported on this machine: {0}")]
    Unsupported(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Fan speed {requested}% is below the safety floor of {floor}%")]
    BelowSafetyFloor {
        requested: u8,
        floor: u8,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Escalation tool not found on PATH: {0}")]
    ExternalToolMissing(String),

    #[error("Write was not applied: expected {expected}, read back {observed}")]
    NotApplied {
        expected: String,
        observed: String,
    },

    #[error("Transient read failure on {path}: {reason}")]
    TransientRead {
        path: PathBuf,
        reason: String,
    },

    #[error("A {0} write is already in progress")]
    Busy(String),

    #[error("Operation cancelled; hardware state unknown")]
    Cancelled,

    #[error("Failed to execute privileged command: {0}")]
    PrivilegeEscalation(String),
}

impl LaptopctlError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config field error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid value error from a string
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Create a transient read error for a sysfs attribute
    pub fn transient_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::TransientRead {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-applied error from the expected and observed values
    pub fn not_applied(expected: impl fmt::Display, observed: impl fmt::Display) -> Self {
        Self::NotApplied {
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }

    /// Classify this error for a control result.
    ///
    /// Read failures during a control operation are transient: the attribute
    /// existed at probe time, so the caller may retry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::InvalidValue(_) | Self::BelowSafetyFloor { .. } => ErrorKind::InvalidValue,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::ExternalToolMissing(_) => ErrorKind::ExternalToolMissing,
            Self::NotApplied { .. } => ErrorKind::NotApplied,
            Self::TransientRead { .. } | Self::FileRead { .. } | Self::Parse { .. } => {
                ErrorKind::TransientReadError
            }
            Self::Busy(_) => ErrorKind::Busy,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_)
            | Self::FileWrite { .. }
            | Self::Config(_)
            | Self::JsonParse(_)
            | Self::InvalidConfig { .. }
            | Self::PrivilegeEscalation(_) => ErrorKind::Unknown,
        }
    }
}
