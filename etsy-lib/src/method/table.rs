use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use http::Method;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ApiRequest, Arg, MethodSpec};
use crate::ratelimit::Scheduler;
use crate::{ErrorKind, Result};

/// All methods of an API version, keyed by method name.
///
/// Built once when a [`Client`](crate::Client) is created and never mutated
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Arc<MethodSpec>>,
}

impl MethodTable {
    /// Build a table from a list of specifications.
    /// A later specification replaces an earlier one with the same name.
    #[must_use]
    pub fn new(specs: impl IntoIterator<Item = MethodSpec>) -> Self {
        let methods = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), Arc::new(spec)))
            .collect();
        Self { methods }
    }

    /// Parse the `results` payload of the service root
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Decode`] if `results` is not a list of method
    /// specifications.
    pub fn from_results(results: serde_json::Value) -> Result<Self> {
        let specs: Vec<MethodSpec> = serde_json::from_value(results.clone())
            .map_err(|e| ErrorKind::decode(e, results.to_string().as_bytes()))?;
        Ok(Self::new(specs))
    }

    /// Fetch the table from the service root, `GET /?api_key=<key>`.
    ///
    /// The request goes through `scheduler` like every other call.
    ///
    /// # Errors
    ///
    /// Fails if the request fails, the server rejects it, or the response
    /// does not decode into a list of method specifications.
    pub async fn fetch(scheduler: &Scheduler, base_url: &Url, api_key: &SecretString) -> Result<Self> {
        let request = ApiRequest {
            http_method: Method::GET,
            path: "/".to_string(),
            params: [(
                "api_key".to_string(),
                Arg::Str(api_key.expose_secret().to_string()),
            )]
            .into(),
        }
        .into_pending(base_url)?;

        let results = scheduler.submit(request).await?.into_results()?;
        Self::from_results(results)
    }

    /// Load a table previously written with [`MethodTable::store`]
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if the file cannot be read and
    /// [`ErrorKind::Decode`] if it does not contain a method table.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| ErrorKind::Io(path.to_path_buf(), e))?;
        let specs: Vec<MethodSpec> =
            serde_json::from_slice(&contents).map_err(|e| ErrorKind::decode(e, &contents))?;
        Ok(Self::new(specs))
    }

    /// Write the table to `path` as a JSON list of specifications
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if the file cannot be written.
    pub async fn store(&self, path: &Path) -> Result<()> {
        let mut specs: Vec<&MethodSpec> = self.methods.values().map(AsRef::as_ref).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        let json = serde_json::to_vec_pretty(&specs)
            .map_err(|e| ErrorKind::Io(path.to_path_buf(), e.into()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ErrorKind::Io(path.to_path_buf(), e))
    }

    /// Look up a method specification
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<MethodSpec>> {
        self.methods.get(name)
    }

    /// Whether a method with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// All method names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table holds no methods
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
