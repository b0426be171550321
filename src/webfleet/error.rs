use thiserror::Error;

/// Failure modes when talking to the Webfleet extern endpoint.
///
/// The monitor loop treats [`ApiError::Transport`] as retry-next-poll and
/// surfaces [`ApiError::Remote`] payloads in the alert record instead of
/// propagating them.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport error (connection refused, DNS failure, timeout, ...)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with an error envelope (`errorCode` / `errorMsg`).
    #[error("Webfleet error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Response body was not the JSON we expected.
    #[error("Failed to decode response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Returns `true` if this is a transient error the next poll cycle may
    /// not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
