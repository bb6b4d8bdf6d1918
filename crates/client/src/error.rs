use marginalia_core::error::CoreError;

/// Errors from the annotation store client.
///
/// None of these are retried; a failed call means that one mutation did
/// not apply.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No bearer token was available. Raised before any request is built.
    #[error("No bearer token available for the annotation API")]
    MissingCredential,

    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-2xx status.
    #[error("Annotation API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or the status line when there is none.
        message: String,
    },

    /// The payload was rejected locally before sending.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
