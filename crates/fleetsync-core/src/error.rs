use thiserror::Error;

/// Vendor result code for rejected credentials.
pub const AUTH_INVALID_CODE: i64 = 1000;

/// Vendor result code for per-account request throttling.
pub const RATE_LIMITED_CODE: i64 = 1101;

/// Validation errors for configuration values handed to the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("integration id cannot be empty")]
    EmptyIntegrationId,
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("password cannot be empty")]
    EmptyPassword,

    #[error("look_back_window_hours must be within 1..=24, got {value}")]
    LookBackOutOfRange { value: i64 },
    #[error("gmt_offset must be within -12..=12, got {value}")]
    GmtOffsetOutOfRange { value: i64 },

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("retry attempts must be greater than zero")]
    ZeroRetryAttempts,
}

/// Failures surfaced by the vendor client.
///
/// Only [`VendorError::RateLimited`] is retryable; every other variant aborts
/// the poll cycle as soon as it is observed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VendorError {
    #[error("invalid credentials ({code}): {message}")]
    AuthInvalid { code: i64, message: String },

    #[error("rate limited ({code}): {message}")]
    RateLimited { code: i64, message: String },

    #[error("vendor error ({code}): {message}")]
    General { code: i64, message: String },

    #[error("transport failure{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },

    #[error("malformed vendor envelope: {0}")]
    Envelope(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" (status {status})"))
        .unwrap_or_default()
}

impl VendorError {
    pub fn auth_invalid(code: i64, message: impl Into<String>) -> Self {
        Self::AuthInvalid {
            code,
            message: message.into(),
        }
    }

    pub fn rate_limited(code: i64, message: impl Into<String>) -> Self {
        Self::RateLimited {
            code,
            message: message.into(),
        }
    }

    pub fn general(code: i64, message: impl Into<String>) -> Self {
        Self::General {
            code,
            message: message.into(),
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Vendor result code or HTTP status carried by the error, when there is one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::AuthInvalid { code, .. }
            | Self::RateLimited { code, .. }
            | Self::General { code, .. } => Some(*code),
            Self::Transport { status, .. } => status.map(i64::from),
            Self::Envelope(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::AuthInvalid { message, .. }
            | Self::RateLimited { message, .. }
            | Self::General { message, .. }
            | Self::Transport { message, .. } => message,
            Self::Envelope(message) => message,
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// A raw record that does not match the configured field schema.
///
/// This is a caller bug (schema and field-selection string out of step), not
/// bad data, so it is never skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record has {actual} fields but schema '{schema}' expects {expected}")]
    Arity {
        schema: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Device-state and checkpoint store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Downstream sink failures.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport failure: {0}")]
    Transport(String),

    #[error("sink rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("sink returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Top-level error for a poll cycle. The checkpoint is never advanced when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
