use std::path::PathBuf;

use http::StatusCode;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Possible errors when talking to the Etsy API through `etsy_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A positional argument declared as `array(...)` was given an empty
    /// sequence. Nothing was sent.
    #[error("Positional argument '{0}' must not be an empty array")]
    EmptyPositionalArray(String),

    /// A positional argument appearing in the URI template was not supplied
    #[error("Missing positional argument '{0}'")]
    MissingPositional(String),

    /// A positional value would form the path segment `.` or `..`, which
    /// URL resolution removes
    #[error("Positional argument '{0}' must not be '.' or '..'")]
    DotSegment(String),

    /// The caller supplied an argument the method does not declare
    #[error("Method '{method}' has no parameter named '{param}'")]
    UnknownParameter {
        /// Name of the method being called
        method: String,
        /// The offending argument name
        param: String,
    },

    /// A file argument was given to a method whose request carries no body
    #[error("Argument '{0}' is a file, but {1} requests cannot carry a body")]
    UnexpectedFile(String, http::Method),

    /// The requested method is not part of the loaded method table
    #[error("Unknown API method: {0}")]
    UnknownMethod(String),

    /// Network error raised by `reqwest` while talking to the API
    #[error("Network error while trying to reach the API: {0}")]
    NetworkRequest(#[source] reqwest::Error),

    /// The API answered with a non-success status code
    #[error("API responded with status {0}: {1}")]
    RejectedStatusCode(StatusCode, String),

    /// An injected transport or OAuth collaborator failed
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The request was cancelled before a response arrived
    #[error("Request was cancelled before completion")]
    Cancelled,

    /// The request scheduler is no longer running
    #[error("Request scheduler has shut down")]
    SchedulerClosed,

    /// The response body is not a JSON object with a `results` key
    #[error("Could not decode response from Etsy as JSON: {reason}")]
    Decode {
        /// Description of the decoding failure
        reason: String,
        /// The raw body, lossily converted to text
        body: String,
    },

    /// Cannot build the underlying HTTP client
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The given header could not be parsed
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// A URL could not be parsed or joined to the base URL
    #[error("Cannot parse '{0}' as an URL: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    /// No API key was configured, neither inline nor through a key file
    #[error("No API key given. Set `api_key` or `api_key_file`.")]
    MissingApiKey,

    /// Reading or writing a local file (key file, method cache) failed
    #[error("Failed to access path: `{}`, reason: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration file: {0}")]
    Config(#[from] toml::de::Error),
}

impl ErrorKind {
    /// Whether the error was raised while validating call arguments.
    ///
    /// Validation errors are always raised before any request is queued.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyPositionalArray(_)
                | Self::MissingPositional(_)
                | Self::DotSegment(_)
                | Self::UnknownParameter { .. }
                | Self::UnexpectedFile(..)
        )
    }

    /// Whether the error came from the transport layer
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NetworkRequest(_)
                | Self::RejectedStatusCode(..)
                | Self::Transport(_)
                | Self::Cancelled
                | Self::SchedulerClosed
        )
    }

    /// Whether the response arrived but could not be decoded
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// The name of the argument that failed validation, if any
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::EmptyPositionalArray(name)
            | Self::MissingPositional(name)
            | Self::DotSegment(name)
            | Self::UnexpectedFile(name, _)
            | Self::UnknownParameter { param: name, .. } => Some(name),
            _ => None,
        }
    }

    pub(crate) fn decode(reason: impl ToString, body: &[u8]) -> Self {
        Self::Decode {
            reason: reason.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
