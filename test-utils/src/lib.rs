//! `test-utils` is used for testing `etsy-lib`.
//! This crate does not depend on `etsy-lib`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status to
/// any request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::any()).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock Etsy API serving the given method table at `/v2/`.
///
/// Returns the server; the API base URL is `{server.uri()}/v2`.
/// The table must be requested exactly `$fetches` times, once if omitted.
#[macro_export]
macro_rules! mock_api_server {
    ($table:expr) => {
        $crate::mock_api_server!($table, 1)
    };
    ($table:expr, $fetches:expr) => {{
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v2/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json($table))
            .expect($fetches)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Mount a JSON response for `$method $path` on a mock server
#[macro_export]
macro_rules! mount_method {
    ($server:expr, $method:expr, $path:expr, $body:expr) => {
        wiremock::Mock::given(wiremock::matchers::method($method))
            .and(wiremock::matchers::path($path))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json($body))
            .mount(&$server)
            .await
    };
}

/// The API base URL of a server created by [`mock_api_server`]
#[macro_export]
macro_rules! api_url {
    ($server:expr) => {
        url::Url::parse(&format!("{}/v2", $server.uri())).expect("Expected valid mock server URL")
    };
}

/// Get the path to the `fixtures` directory.
#[macro_export]
macro_rules! fixtures_path {
    () => {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("fixtures")
    };
}

/// Loads a fixture from the `fixtures` directory
#[macro_export]
macro_rules! load_fixture {
    ($filename:expr) => {{
        let path = $crate::fixtures_path!().join($filename);
        std::fs::read_to_string(path).unwrap()
    }};
}

/// Loads a JSON fixture from the `fixtures` directory
#[macro_export]
macro_rules! load_json_fixture {
    ($filename:expr) => {{
        let contents = $crate::load_fixture!($filename);
        serde_json::from_str::<serde_json::Value>(&contents).unwrap()
    }};
}
