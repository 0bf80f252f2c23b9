use thiserror::Error;

/// Failure surface of the remote CBT API.
///
/// Session loading treats any of these as fatal; everything else surfaces
/// them as non-blocking notices.
#[derive(Debug, Error)]
pub(crate) enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}: {detail}")]
    Status { endpoint: &'static str, status: u16, detail: String },
    #[error("{endpoint} returned an unrecognized payload: {reason}")]
    Payload { endpoint: &'static str, reason: String },
}

impl BackendError {
    pub(crate) fn transport(endpoint: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { endpoint, source }
    }

    pub(crate) fn payload(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::Payload { endpoint, reason: reason.into() }
    }
}
