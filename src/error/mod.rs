//! Error module for hookrelay
//!
//! This module defines the error codes and the error type shared by the store
//! engines, the chat transport, the ingress listener and the bootstrap code.

use thiserror::Error;
use std::fmt;

/// Error code of a relay failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration errors (0x0001-0x0100)
    ConfigInvalid = 0x0001,
    UnknownEngine = 0x0002,

    // Storage errors (0x0101-0x0200)
    StoreUnavailable = 0x0101,
    StoreReadFailed = 0x0102,
    StoreWriteFailed = 0x0103,
    MalformedId = 0x0104,

    // Transport errors (0x0201-0x0300)
    InvalidCredential = 0x0201,
    TransportFailed = 0x0202,
    SendFailed = 0x0203,
    ApiRejected = 0x0204,

    // System errors (0x0301-0x0400)
    BindFailed = 0x0301,
    InternalServerError = 0x0302,
}

impl ErrorCode {
    /// Get the error code as a u16
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the error code category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            0x0001..=0x0100 => ErrorCategory::Config,
            0x0101..=0x0200 => ErrorCategory::Storage,
            0x0201..=0x0300 => ErrorCategory::Transport,
            0x0301..=0x0400 => ErrorCategory::System,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Get a human-readable description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "Invalid configuration",
            Self::UnknownEngine => "Unknown store engine",
            Self::StoreUnavailable => "Store engine is unreachable",
            Self::StoreReadFailed => "Failed to read from store",
            Self::StoreWriteFailed => "Failed to write to store",
            Self::MalformedId => "Identity cannot be stored",
            Self::InvalidCredential => "Bot credential was rejected",
            Self::TransportFailed => "Chat transport request failed",
            Self::SendFailed => "Failed to send message",
            Self::ApiRejected => "Chat API rejected the request",
            Self::BindFailed => "Failed to bind HTTP listener",
            Self::InternalServerError => "Unexpected server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::UnknownEngine => "UNKNOWN_ENGINE",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::StoreReadFailed => "STORE_READ_FAILED",
            Self::StoreWriteFailed => "STORE_WRITE_FAILED",
            Self::MalformedId => "MALFORMED_ID",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::TransportFailed => "TRANSPORT_FAILED",
            Self::SendFailed => "SEND_FAILED",
            Self::ApiRejected => "API_REJECTED",
            Self::BindFailed => "BIND_FAILED",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        };
        write!(f, "{} (0x{:04X})", name, self.as_u16())
    }
}

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Config,
    Storage,
    Transport,
    System,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "Config"),
            Self::Storage => write!(f, "Storage"),
            Self::Transport => write!(f, "Transport"),
            Self::System => write!(f, "System"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Main error type for hookrelay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{code}: {message}")]
    Standard {
        code: ErrorCode,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl RelayError {
    /// Create a new standard error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Standard {
            code,
            message: message.into(),
        }
    }

    /// Get the error code if this is a standard error
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Standard { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Standard { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias for hookrelay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_code_ranges() {
        assert_eq!(ErrorCode::UnknownEngine.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::StoreReadFailed.category(), ErrorCategory::Storage);
        assert_eq!(ErrorCode::MalformedId.category(), ErrorCategory::Storage);
        assert_eq!(ErrorCode::SendFailed.category(), ErrorCategory::Transport);
        assert_eq!(ErrorCode::InternalServerError.category(), ErrorCategory::System);
    }

    #[test]
    fn standard_error_displays_code_and_message() {
        let err = RelayError::new(ErrorCode::StoreWriteFailed, "disk full");
        assert_eq!(err.to_string(), "STORE_WRITE_FAILED (0x0103): disk full");
        assert_eq!(err.code(), Some(ErrorCode::StoreWriteFailed));
        assert_eq!(err.message(), "disk full");
        assert_eq!(err.code().map(|c| c.description()), Some("Failed to write to store"));
    }
}
