//! Entry point for talking to the API.
//!
//! This module defines [`Client`] and [`ClientBuilder`]. A `ClientBuilder`
//! collects the configuration, fetches the method table and starts the
//! request scheduler. The resulting `Client` hands out [`ApiMethod`]s, one
//! per entry of the method table, which validate arguments and submit calls.
#![allow(clippy::module_name_repetitions)]
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use typed_builder::TypedBuilder;
use url::Url;

use crate::config::expand_path;
use crate::method::{ApiRequest, Args, CompiledMethod, MethodSpec, MethodTable};
use crate::ratelimit::{RateLimitConfig, ResponseHandle, Scheduler, SchedulerSnapshot};
use crate::transport::{OAuthClient, OAuthTransport, ReqwestTransport, Transport};
use crate::{Environment, ErrorKind, RawResponse, Result};

/// Default timeout in seconds before a request is deemed as failed, 20.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
/// Default user agent, `etsy-lib/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("etsy-lib/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// API key sent as `api_key` with every request.
    ///
    /// Takes precedence over [`ClientBuilder::api_key_file`].
    api_key: Option<SecretString>,

    /// File holding the API key. Surrounding whitespace is stripped.
    api_key_file: Option<PathBuf>,

    /// Environment providing the default base URL.
    environment: Environment,

    /// Base URL of the API, overriding [`ClientBuilder::environment`].
    base_url: Option<Url>,

    /// Rate limit applied to every request, including the method table
    /// fetch.
    rate_limit: RateLimitConfig,

    /// OAuth collaborator. When set, all requests are signed and sent
    /// through it instead of the built-in HTTP client.
    oauth_client: Option<Arc<dyn OAuthClient>>,

    /// Custom transport, replacing both the HTTP client and
    /// [`ClientBuilder::oauth_client`].
    transport: Option<Arc<dyn Transport>>,

    /// Runtime the request scheduler runs on.
    ///
    /// Defaults to the runtime [`ClientBuilder::client`] is awaited on.
    runtime: Option<Handle>,

    /// Timeout of a single request. Defaults to 20 seconds.
    timeout: Option<Duration>,

    /// User agent of the built-in HTTP client.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Cache file for the method table.
    ///
    /// If the file exists, the table is read from it and nothing is fetched.
    /// Otherwise the table is fetched and written to the file.
    method_cache: Option<PathBuf>,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// This fetches the method table (or reads it from the method cache)
    /// through the request scheduler, so it takes at least one round trip.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - No API key is configured or the key file cannot be read.
    /// - The base URL is invalid.
    /// - The user agent is invalid or the HTTP client cannot be created.
    /// - The method table cannot be fetched or decoded.
    pub async fn client(self) -> Result<Client> {
        let api_key = self.resolve_api_key().await?;
        let base_url = match self.base_url {
            Some(url) => url,
            None => {
                let raw = self.environment.api_url();
                Url::parse(raw).map_err(|e| ErrorKind::InvalidUrl(raw.to_string(), e))?
            }
        };

        let uses_oauth = self.oauth_client.is_some();
        let transport: Arc<dyn Transport> = match (self.transport, self.oauth_client) {
            (Some(transport), _) => transport,
            (None, Some(oauth)) => Arc::new(OAuthTransport::new(oauth)),
            (None, None) => Arc::new(ReqwestTransport::new(
                &self.user_agent,
                Some(
                    self.timeout
                        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
                ),
            )?),
        };

        let scheduler = match &self.runtime {
            Some(runtime) => Scheduler::with_runtime(transport, self.rate_limit, runtime),
            None => Scheduler::new(transport, self.rate_limit),
        };

        log::info!("Creating Etsy API, base url: {base_url}");
        let (methods, source) = match self.method_cache.map(expand_path) {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                let methods = MethodTable::load(&path).await?;
                (methods, path.display().to_string())
            }
            Some(path) => {
                let methods = MethodTable::fetch(&scheduler, &base_url, &api_key).await?;
                if let Err(e) = methods.store(&path).await {
                    log::warn!("Cannot write method cache: {e}");
                }
                (methods, base_url.to_string())
            }
            None => {
                let methods = MethodTable::fetch(&scheduler, &base_url, &api_key).await?;
                (methods, base_url.to_string())
            }
        };
        log::info!("Loaded {} API methods from {source}", methods.len());

        Ok(Client {
            api_key,
            base_url,
            methods: Arc::new(methods),
            compiled: Arc::new(DashMap::new()),
            scheduler,
            uses_oauth,
        })
    }

    async fn resolve_api_key(&self) -> Result<SecretString> {
        if let Some(api_key) = &self.api_key {
            return Ok(api_key.clone());
        }
        let Some(path) = self.api_key_file.clone().map(expand_path) else {
            return Err(ErrorKind::MissingApiKey);
        };
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ErrorKind::Io(path, e))?;
        match contents.trim() {
            "" => Err(ErrorKind::MissingApiKey),
            key => Ok(SecretString::from(key)),
        }
    }
}

/// Handles calls against the Etsy API.
///
/// Cheap to clone; clones share the method table, the compiled methods and
/// the request scheduler.
#[derive(Debug, Clone)]
pub struct Client {
    api_key: SecretString,
    base_url: Url,
    methods: Arc<MethodTable>,
    /// Compiled methods, created on first access
    compiled: Arc<DashMap<String, Arc<CompiledMethod>>>,
    scheduler: Scheduler,
    uses_oauth: bool,
}

impl Client {
    /// Look up a method by name.
    ///
    /// The method is compiled on first access. Later lookups of the same
    /// name return the same compiled method.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnknownMethod`] if the method table has no
    /// method called `name`.
    pub fn method(&self, name: &str) -> Result<ApiMethod<'_>> {
        Ok(ApiMethod {
            client: self,
            compiled: self.compiled(name)?,
        })
    }

    /// Call a method and wait for its `results`.
    ///
    /// # Errors
    ///
    /// Fails if the method is unknown, the arguments are invalid, the
    /// request fails, or the response cannot be decoded.
    pub async fn call(&self, name: &str, args: Args) -> Result<Value> {
        self.method(name)?.call(args).await
    }

    /// The method table loaded at construction
    #[must_use]
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Base URL all method paths are appended to
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The scheduler all requests go through
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current state of the request scheduler
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.scheduler.snapshot()
    }

    fn compiled(&self, name: &str) -> Result<Arc<CompiledMethod>> {
        if let Some(compiled) = self.compiled.get(name) {
            return Ok(Arc::clone(&compiled));
        }

        let spec = self
            .methods
            .get(name)
            .ok_or_else(|| ErrorKind::UnknownMethod(name.to_string()))?;
        let compiled = Arc::new(CompiledMethod::compile(Arc::clone(spec)));

        match self.compiled.entry(name.to_string()) {
            // Another caller compiled it first
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => Ok(Arc::clone(&entry.insert(compiled))),
        }
    }
}

/// A callable API method bound to a [`Client`]
#[derive(Debug, Clone)]
pub struct ApiMethod<'a> {
    client: &'a Client,
    compiled: Arc<CompiledMethod>,
}

impl ApiMethod<'_> {
    /// Method name
    #[must_use]
    pub fn name(&self) -> &str {
        self.compiled.name()
    }

    /// The description from the method table, verbatim
    #[must_use]
    pub fn description(&self) -> &str {
        self.compiled.description()
    }

    /// The specification this method was compiled from
    #[must_use]
    pub fn spec(&self) -> &MethodSpec {
        self.compiled.spec()
    }

    /// The compiled method, shared with every other lookup of this name
    #[must_use]
    pub const fn compiled(&self) -> &Arc<CompiledMethod> {
        &self.compiled
    }

    /// Validate `args` and build the request without sending it
    ///
    /// # Errors
    ///
    /// Returns a validation error if `args` do not fit the method.
    pub fn prepare(&self, args: Args) -> Result<ApiRequest> {
        self.compiled.prepare(args, &self.client.api_key)
    }

    /// Validate `args` and queue the request.
    ///
    /// Validation happens before this returns, so invalid arguments never
    /// reach the network. The returned [`MethodCall`] resolves to the
    /// `results` of the response.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `args` do not fit the method.
    pub fn submit(&self, args: Args) -> Result<MethodCall> {
        let request = self.prepare(args)?;
        if self.spec().is_private() && !self.client.uses_oauth {
            log::warn!(
                "Method {} is private but no OAuth client is configured",
                self.name()
            );
        }
        log::debug!("Submitting {} {}", request.http_method, request.path);
        let pending = request.into_pending(&self.client.base_url)?;
        Ok(MethodCall {
            handle: self.client.scheduler.submit(pending),
        })
    }

    /// Call the method and wait for its `results`
    ///
    /// # Errors
    ///
    /// Fails on invalid arguments, transport failures and undecodable
    /// responses.
    pub async fn call(&self, args: Args) -> Result<Value> {
        self.submit(args)?.await
    }

    /// Call the method and deserialize its `results` into `T`
    ///
    /// # Errors
    ///
    /// Same as [`ApiMethod::call`].
    pub async fn call_as<T: DeserializeOwned>(&self, args: Args) -> Result<T> {
        self.submit(args)?.handle.await?.into_typed()
    }
}

/// Pending result of an [`ApiMethod::submit`].
///
/// Resolves to the `results` value of the response. Dropping it cancels the
/// call.
#[derive(Debug)]
#[must_use = "dropping a MethodCall cancels the request"]
pub struct MethodCall {
    handle: ResponseHandle,
}

impl MethodCall {
    /// Cancel the call
    pub fn cancel(self) {
        self.handle.cancel();
    }
}

impl Future for MethodCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|response| response.and_then(RawResponse::into_results))
    }
}
