use lectern::v1::ValidationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by session and catalog operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A section or subsection reference that does not exist in the document.
    /// This is a bug in the caller, not bad user input.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a document could not be loaded.
///
/// Cloneable so a single failed fetch can be reported to every caller that
/// was waiting on it. None of these are permanent: the registry forgets the
/// attempt and the next `load` tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    #[error("Failed to fetch {id}: {message}")]
    Fetch { id: String, message: String },

    #[error("Failed to parse {id}: {message}")]
    Parse { id: String, message: String },

    #[error("Document {id} is malformed: {source}")]
    Invalid {
        id: String,
        source: ValidationError,
    },

    #[error("Load of {0} was abandoned before it completed")]
    Abandoned(String),
}

/// A session token that could not be decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Token is not valid UTF-8 after percent-decoding: {0}")]
    Percent(#[from] std::str::Utf8Error),

    #[error("Token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by a [`DocumentSource`](crate::source::DocumentSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("Invalid location: {0}")]
    Location(String),

    #[error("No asset at {0}")]
    NotFound(String),
}
