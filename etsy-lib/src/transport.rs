//! The network side of the client.
//!
//! A [`Transport`] performs the actual I/O for a fully built
//! [`PendingRequest`]. The default is [`ReqwestTransport`]. OAuth signing is
//! plugged in through the [`OAuthClient`] collaborator, which receives the
//! request as `(url, method, content_type, body)`.
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use http::Method;
use url::Url;

use crate::{ErrorKind, RawResponse, Result};

/// A fully prepared unit of network work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Absolute URL, including the query string for `GET` requests
    pub url: Url,
    /// HTTP verb
    pub http_method: Method,
    /// Extra request headers, e.g. the multipart content type
    pub headers: HeaderMap,
    /// Encoded request body
    pub body: Option<Vec<u8>>,
}

impl PendingRequest {
    /// The `Content-Type` header, if the request has one
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Performs network I/O for the scheduler.
///
/// Implementations own timeouts and retries; the scheduler never retries.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send `request` and return the raw response
    async fn execute(&self, request: PendingRequest) -> Result<RawResponse>;
}

/// Default [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given user agent and optional timeout
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the user agent is not a valid header value or the
    /// `reqwest` client cannot be created.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers);
        let client = (match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::BuildRequestClient)?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: PendingRequest) -> Result<RawResponse> {
        let PendingRequest {
            url,
            http_method,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(http_method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(ErrorKind::NetworkRequest)?;
        let status = response.status();
        let body = response.bytes().await.map_err(ErrorKind::NetworkRequest)?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}

/// OAuth collaborator that signs and sends requests on behalf of the client.
///
/// Used for methods with `private` visibility. The client hands over the
/// complete request and expects the raw response back.
#[async_trait]
pub trait OAuthClient: Send + Sync + Debug {
    /// Sign and perform a request
    async fn do_oauth_request(
        &self,
        url: &Url,
        http_method: &Method,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<RawResponse>;
}

/// Adapts an [`OAuthClient`] to the [`Transport`] interface
#[derive(Debug, Clone)]
pub struct OAuthTransport {
    oauth: Arc<dyn OAuthClient>,
}

impl OAuthTransport {
    /// Send all requests through `oauth`
    #[must_use]
    pub fn new(oauth: Arc<dyn OAuthClient>) -> Self {
        Self { oauth }
    }
}

#[async_trait]
impl Transport for OAuthTransport {
    async fn execute(&self, request: PendingRequest) -> Result<RawResponse> {
        self.oauth
            .do_oauth_request(
                &request.url,
                &request.http_method,
                request.content_type(),
                request.body.as_deref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeOAuth {
        seen: Mutex<Vec<(String, Method, Option<String>, Option<Vec<u8>>)>>,
    }

    #[async_trait]
    impl OAuthClient for FakeOAuth {
        async fn do_oauth_request(
            &self,
            url: &Url,
            http_method: &Method,
            content_type: Option<&str>,
            body: Option<&[u8]>,
        ) -> Result<RawResponse> {
            self.seen.lock().unwrap().push((
                url.to_string(),
                http_method.clone(),
                content_type.map(String::from),
                body.map(<[u8]>::to_vec),
            ));
            Ok(RawResponse::new(StatusCode::CREATED, "{\"results\": []}"))
        }
    }

    #[tokio::test]
    async fn test_oauth_transport_forwards_request() {
        let oauth = Arc::new(FakeOAuth::default());
        let transport = OAuthTransport::new(oauth.clone());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data; boundary=x"));

        let response = transport
            .execute(PendingRequest {
                url: Url::parse("https://openapi.etsy.com/v2/listings").unwrap(),
                http_method: Method::POST,
                headers,
                body: Some(b"--x--\r\n".to_vec()),
            })
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        let seen = oauth.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (
                "https://openapi.etsy.com/v2/listings".to_string(),
                Method::POST,
                Some("multipart/form-data; boundary=x".to_string()),
                Some(b"--x--\r\n".to_vec()),
            )
        );
    }

    #[test]
    fn test_invalid_user_agent() {
        let err = ReqwestTransport::new("bad\nagent", None).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidHeader(_)));
    }
}
