//! Error types for NodeScope

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// NodeScope error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Malformed frame buffer
    #[error("Frame format error: {0}")]
    Format(#[from] crate::protocol::FormatError),

    /// Discovery request failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Discovery HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] Box<ureq::Error>),

    /// JSON decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    /// Connection-level failure outside the WebSocket protocol itself
    #[error("Transport error: {0}")]
    Transport(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Error::Http(Box::new(e))
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}
