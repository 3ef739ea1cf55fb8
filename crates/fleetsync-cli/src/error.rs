use fleetsync_core::{PollError, StoreError, ValidationError, VendorError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("telemetry setup failed: {0}")]
    Telemetry(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Telemetry(_) => 2,
            Self::Poll(error) => poll_exit_code(error),
            Self::Store(_) => 6,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

const fn poll_exit_code(error: &PollError) -> u8 {
    match error {
        PollError::Validation(_) => 2,
        PollError::Vendor(VendorError::AuthInvalid { .. }) => 3,
        PollError::Vendor(_) | PollError::Decode(_) => 4,
        PollError::Sink(_) => 5,
        PollError::Store(_) => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_core::{DecodeError, SinkError};

    #[test]
    fn exit_codes_follow_error_category() {
        let cases: Vec<(CliError, u8)> = vec![
            (ValidationError::EmptyUsername.into(), 2),
            (
                PollError::from(VendorError::auth_invalid(1000, "Invalid user")).into(),
                3,
            ),
            (
                PollError::from(VendorError::rate_limited(1101, "Too many requests")).into(),
                4,
            ),
            (
                PollError::from(DecodeError::Arity {
                    schema: "basic",
                    expected: 9,
                    actual: 15,
                })
                .into(),
                4,
            ),
            (
                PollError::from(SinkError::Transport(String::from("refused"))).into(),
                5,
            ),
            (StoreError::Backend(String::from("locked")).into(), 6),
            (std::io::Error::other("broken pipe").into(), 10),
        ];

        for (error, expected) in cases {
            assert_eq!(error.exit_code(), expected, "{error}");
        }
    }
}
