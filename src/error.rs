// Error kinds shared by the stores, the vendor client and the model adapter.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required credential is absent from the environment.
    #[error("{0} is not set in the environment")]
    ConfigurationMissing(&'static str),

    /// The vendor API answered with a non-success status.
    #[error("vendor request failed ({status}): {body}")]
    VendorRequestFailed { status: u16, body: String },

    /// The model API answered with a non-success status. Absorbed by the
    /// retry adapter; only its text survives inside `ModelUnavailable`.
    #[error("model request failed ({status}): {body}")]
    ModelRequestFailed { status: u16, body: String },

    /// Every model attempt came back empty or failed in transport.
    #[error("model generation failed (no text): {0}")]
    ModelUnavailable(String),

    #[error("player '{0}' not found")]
    RecordNotFound(String),

    /// Catalog, meta snapshot or player cards have not been loaded yet.
    #[error("{0}")]
    MissingData(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn missing_data(msg: impl Into<String>) -> Self {
        Error::MissingData(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Whether the failure came from an outbound call (vendor or model).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::VendorRequestFailed { .. }
                | Error::ModelRequestFailed { .. }
                | Error::ModelUnavailable(_)
                | Error::Http(_)
        )
    }
}
