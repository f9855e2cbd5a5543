//! Minimal `multipart/form-data` encoding for request bodies.
//!
//! The encoded body is handed to the transport (or an OAuth collaborator) as
//! raw bytes together with its content type, so signing code sees exactly
//! what goes over the wire.
use std::collections::BTreeMap;

use crate::method::{Arg, FileArg};

const BOUNDARY_PREFIX: &str = "----------EtsyFormBoundary";

/// A single part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Part {
    /// A `(name, value)` form field
    Text { name: String, value: String },
    /// A `(name, filename, bytes)` file upload
    File { name: String, file: FileArg },
}

impl Part {
    fn contains(&self, needle: &[u8]) -> bool {
        let haystack = match self {
            Self::Text { value, .. } => value.as_bytes(),
            Self::File { file, .. } => &file.contents,
        };
        haystack.windows(needle.len()).any(|w| w == needle)
    }
}

/// An ordered set of multipart parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Form {
    parts: Vec<Part>,
}

impl Form {
    /// One text part per plain value, one file part per file value
    pub(crate) fn from_params(params: BTreeMap<String, Arg>) -> Self {
        let parts = params
            .into_iter()
            .map(|(name, value)| match value {
                Arg::File(file) => Part::File { name, file },
                value => Part::Text {
                    name,
                    value: value.to_string(),
                },
            })
            .collect();
        Self { parts }
    }

    /// A boundary that does not occur in any part
    fn boundary(&self) -> String {
        let mut counter = 0u32;
        loop {
            let candidate = format!("{BOUNDARY_PREFIX}{counter:08x}");
            if !self.parts.iter().any(|p| p.contains(candidate.as_bytes())) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Encode the form, returning its content type and body
    pub(crate) fn encode(&self) -> (String, Vec<u8>) {
        let boundary = self.boundary();
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File { name, file } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(&file.filename)
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&file.contents);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}

/// Percent-encode `"`, CR and LF in a quoted header parameter (RFC 7578)
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
