use http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ErrorKind, Result};

/// The undecoded answer of a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code of the response
    pub status: StatusCode,
    /// Raw response body
    pub body: Vec<u8>,
}

/// The JSON envelope every Etsy API response is wrapped in.
/// Only `results` is of interest to callers.
#[derive(Debug, Deserialize)]
struct Envelope {
    results: Value,
}

impl RawResponse {
    /// Create a new response from a status code and body
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a `200 OK` response carrying a JSON body
    #[must_use]
    pub fn json(body: &Value) -> Self {
        Self::new(StatusCode::OK, body.to_string())
    }

    /// Extract the `results` payload from the response envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RejectedStatusCode`] for non-success status codes
    /// and [`ErrorKind::Decode`] if the body is not a JSON object with a
    /// `results` key.
    pub fn into_results(self) -> Result<Value> {
        if !self.status.is_success() {
            return Err(ErrorKind::RejectedStatusCode(
                self.status,
                String::from_utf8_lossy(&self.body).into_owned(),
            ));
        }
        serde_json::from_slice::<Envelope>(&self.body)
            .map(|envelope| envelope.results)
            .map_err(|e| ErrorKind::decode(e, &self.body))
    }

    /// Extract the `results` payload and deserialize it into `T`
    ///
    /// # Errors
    ///
    /// Same as [`RawResponse::into_results`], plus [`ErrorKind::Decode`] if
    /// the payload does not match `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        let results = self.into_results()?;
        serde_json::from_value(results.clone())
            .map_err(|e| ErrorKind::decode(e, results.to_string().as_bytes()))
    }
}
