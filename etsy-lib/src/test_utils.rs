use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Method};
use serde_json::{Value, json};
use tokio::time::Instant;
use url::Url;

use crate::ratelimit::{RateLimitConfig, Scheduler};
use crate::transport::{PendingRequest, Transport};
use crate::{ErrorKind, RawResponse, Result};

/// The method specification used throughout the tests
pub(crate) fn test_method_spec() -> Value {
    json!({
        "name": "testMethod",
        "uri": "/test/:ps_arr_str",
        "http_method": "GET",
        "params": {
            "ps_arr_str": "array(string)",
            "kw_string": "string",
            "kw_int": "int",
            "kw_float": "float",
            "kw_array_int": "array(int)",
            "kw_enum": "enum(foo, bar, baz)",
            "kw_unknown": "unknown type",
        },
        "type": "echo",
        "description": "test method"
    })
}

/// A `POST` method with a file parameter
pub(crate) fn upload_method_spec() -> Value {
    json!({
        "name": "uploadListingImage",
        "uri": "/listings/:listing_id/images",
        "http_method": "POST",
        "visibility": "private",
        "params": {
            "listing_id": "int",
            "image": "imagefile",
            "rank": "int",
        },
        "defaults": {"rank": 1},
        "type": "ListingImage",
        "description": "Upload a new listing image"
    })
}

/// The service root response listing all test methods
pub(crate) fn method_table_json() -> Value {
    json!({
        "count": 2,
        "results": [test_method_spec(), upload_method_spec()],
        "type": "ApiMethod"
    })
}

/// A `GET` request against `path`
pub(crate) fn get_request(path: &str) -> PendingRequest {
    PendingRequest {
        url: Url::parse("https://openapi.etsy.com")
            .unwrap()
            .join(path)
            .unwrap(),
        http_method: Method::GET,
        headers: HeaderMap::new(),
        body: None,
    }
}

/// A scheduler without noticeable rate limiting
pub(crate) fn scheduler_for(transport: &RecordingTransport) -> Scheduler {
    Scheduler::new(
        Arc::new(transport.clone()),
        RateLimitConfig {
            max_clients: 100,
            period: Duration::from_millis(1),
        },
    )
}

#[derive(Debug, Default)]
struct Recorded {
    requests: Vec<PendingRequest>,
    dispatch_times: Vec<Instant>,
    completed: usize,
}

/// A transport that records every request instead of touching the network.
///
/// Requests to a path ending in `/` get the method table, every other
/// request gets an echo of its URL and verb wrapped in `results`.
#[derive(Debug, Clone)]
pub(crate) struct RecordingTransport {
    recorded: Arc<Mutex<Recorded>>,
    method_table: Value,
    delay: Duration,
    fail: bool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::with_method_table(method_table_json())
    }

    pub(crate) fn with_method_table(method_table: Value) -> Self {
        Self {
            recorded: Arc::default(),
            method_table,
            delay: Duration::ZERO,
            fail: false,
        }
    }

    /// Take `delay` to answer each request
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every request with a transport error
    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn requests(&self) -> Vec<PendingRequest> {
        self.recorded.lock().unwrap().requests.clone()
    }

    pub(crate) fn dispatch_times(&self) -> Vec<Instant> {
        self.recorded.lock().unwrap().dispatch_times.clone()
    }

    pub(crate) fn completed(&self) -> usize {
        self.recorded.lock().unwrap().completed
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: PendingRequest) -> Result<RawResponse> {
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.requests.push(request.clone());
            recorded.dispatch_times.push(Instant::now());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.recorded.lock().unwrap().completed += 1;

        if self.fail {
            return Err(ErrorKind::Transport("connection refused".to_string()));
        }
        if request.url.path().ends_with('/') {
            return Ok(RawResponse::json(&self.method_table));
        }
        Ok(RawResponse::json(&json!({
            "count": 1,
            "results": [{
                "url": request.url.as_str(),
                "http_method": request.http_method.as_str(),
                "content_type": request.content_type(),
            }]
        })))
    }
}
