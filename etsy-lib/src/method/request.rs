use std::collections::BTreeMap;

use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::Method;
use url::Url;

use super::Arg;
use crate::multipart::Form;
use crate::transport::PendingRequest;
use crate::{ErrorKind, Result};

/// A compiled API call: verb, substituted path and the typed parameter set.
///
/// This is what a [`CompiledMethod`](crate::CompiledMethod) produces. It is
/// independent of the base URL and of the transport and is turned into a
/// [`PendingRequest`] right before it is queued.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb
    pub http_method: Method,
    /// Path relative to the API base URL, positionals already substituted
    pub path: String,
    /// Query or form parameters, absent parameters omitted
    pub params: BTreeMap<String, Arg>,
}

impl ApiRequest {
    /// Whether parameters go into a request body rather than the query string
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.http_method != Method::GET
    }

    /// Build the concrete request against `base_url`.
    ///
    /// `GET` parameters are URL-encoded into the query string. All other verbs
    /// send a `multipart/form-data` body with one part per parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidUrl`] if the path does not form a valid URL
    /// with the base.
    pub fn into_pending(self, base_url: &Url) -> Result<PendingRequest> {
        let raw = format!("{}{}", base_url.as_str().trim_end_matches('/'), self.path);
        let mut url = Url::parse(&raw).map_err(|e| ErrorKind::InvalidUrl(raw, e))?;
        let mut headers = HeaderMap::new();

        let body = if self.has_body() {
            let form = Form::from_params(self.params);
            let (content_type, body) = form.encode();
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
            Some(body)
        } else {
            if !self.params.is_empty() {
                let mut query = url.query_pairs_mut();
                for (name, value) in &self.params {
                    query.append_pair(name, &value.to_string());
                }
            }
            None
        };

        Ok(PendingRequest {
            url,
            http_method: self.http_method,
            headers,
            body,
        })
    }
}
