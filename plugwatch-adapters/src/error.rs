//! Error types for device fetches.

use thiserror::Error;

/// Errors that can occur while fetching a device's status.
///
/// Every variant is treated the same by the collection engine: the device's
/// observations are skipped for the round and collection carries on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or HTTP-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The deadline elapsed before the response was fully received.
    #[error("request timed out")]
    Timeout,

    /// The body is not valid JSON or does not match the status shape.
    #[error("failed to decode status: {0}")]
    Decode(String),
}

impl FetchError {
    /// Short, stable name of the error class for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Timeout => "timeout",
            FetchError::Decode(_) => "decode",
        }
    }
}

#[cfg(feature = "shelly")]
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
