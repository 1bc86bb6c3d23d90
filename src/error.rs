use thiserror::Error;

use crate::types::LogOptions;

/// Convenience result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Error type returned by the import pipeline and its collaborators.
///
/// The fetch variants (`Network`, `HttpStatus`, `EmptyBody`, `StreamRead`) carry user-facing
/// messages meant to be rendered through [`crate::ingestion::Logger::exception`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// An input is neither a local file nor a URL descriptor.
    #[error("invalid input type: {message}")]
    InvalidInputType { message: String },

    /// The request could not be completed (DNS, connection refused, TLS, blocked, ...).
    #[error(
        "Failed to fetch data from URL: This may be due to a network issue or the server blocking \
         [cross-origin requests (CORS)](https://developer.mozilla.org/en-US/docs/Web/HTTP/Guides/CORS). \
         Check that the URL is valid and configured to allow access from this site."
    )]
    Network {
        #[source]
        source: reqwest::Error,
    },

    /// A response was received but its status indicates failure.
    #[error(
        "Failed to fetch data from URL: {reason}. Please check if the URL is accessible and the server is responding correctly."
    )]
    HttpStatus { status: u16, reason: String },

    /// The response has no body to read.
    #[error(
        "Failed to fetch data from URL: Server response has no body content. This may indicate a server \
         configuration issue or the resource may be empty."
    )]
    EmptyBody,

    /// Reading the response body failed part-way.
    #[error("Failed to fetch data from URL: Error while reading data.")]
    StreamRead,

    /// A `data:` URL is malformed or its base64 payload does not decode.
    #[error("Failed to fetch data from URL: Invalid data URL ({message}).")]
    DataUrl { message: String },

    /// Underlying I/O error (e.g. local file not found).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON request or descriptor does not have the expected shape.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The query engine rejected or failed a statement.
    #[error("query failed: {message}")]
    Query { message: String },

    /// The database handle failed to register or release a file buffer.
    #[error("database error: {message}")]
    Database { message: String },

    /// Caller-constructed error carrying its own log rendering options.
    #[error("{message}")]
    Loggable { message: String, options: LogOptions },
}

/// Coarse classification of an [`ImportError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInputType,
    NetworkFailure,
    HttpStatusFailure,
    EmptyBodyFailure,
    StreamReadFailure,
    Io,
    Decode,
    Query,
    Database,
    Loggable,
}

impl ImportError {
    /// Build a loggable error with explicit rendering options.
    pub fn loggable(message: impl Into<String>, options: LogOptions) -> Self {
        Self::Loggable {
            message: message.into(),
            options,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInputType { .. } => ErrorKind::InvalidInputType,
            Self::Network { .. } | Self::DataUrl { .. } => ErrorKind::NetworkFailure,
            Self::HttpStatus { .. } => ErrorKind::HttpStatusFailure,
            Self::EmptyBody => ErrorKind::EmptyBodyFailure,
            Self::StreamRead => ErrorKind::StreamReadFailure,
            Self::Io(_) => ErrorKind::Io,
            Self::SchemaMismatch { .. } => ErrorKind::Decode,
            Self::Query { .. } => ErrorKind::Query,
            Self::Database { .. } => ErrorKind::Database,
            Self::Loggable { .. } => ErrorKind::Loggable,
        }
    }

    /// Structured log rendering options, for errors that carry them.
    ///
    /// Network failures render as markdown because their message embeds a link.
    pub fn log_options(&self) -> Option<LogOptions> {
        match self {
            Self::Network { .. } => Some(LogOptions::markdown()),
            Self::Loggable { options, .. } => Some(options.clone()),
            _ => None,
        }
    }
}
