//! `etsy_lib` is an async client for the Etsy API v2.
//!
//! The client has no hard-coded endpoints. On construction it downloads the
//! method table from the service root and exposes every entry as a callable
//! method, validated against the parameters the table declares. All requests
//! go through a rate-limited FIFO scheduler.
//!
//! ```no_run
//! use etsy_lib::{Args, Association, Bounds, ClientBuilder, Environment, Result};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder()
//!       .api_key(SecretString::from("your-api-key"))
//!       .environment(Environment::Production)
//!       .build()
//!       .client()
//!       .await?;
//!
//!   let listings = client
//!       .call(
//!           "getListing",
//!           Args::new()
//!               .arg("listing_id", vec![101, 102])
//!               .include(Association::new("Images").bounds(Bounds::new(1))),
//!       )
//!       .await?;
//!   println!("{listings}");
//!   Ok(())
//! }
//! ```
//!
//! Methods can also be looked up once and submitted without waiting, which
//! lets the scheduler keep several requests in flight:
//!
//! ```no_run
//! # use etsy_lib::{Args, Client, Result};
//! # async fn run(client: Client) -> Result<()> {
//! let get_shop = client.method("getShop")?;
//! println!("{}", get_shop.description());
//!
//! let calls = ["shop_a", "shop_b"]
//!     .into_iter()
//!     .map(|shop| get_shop.submit(Args::new().arg("shop_id", shop)))
//!     .collect::<Result<Vec<_>>>()?;
//! for shop in futures::future::try_join_all(calls).await? {
//!     println!("{shop}");
//! }
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

mod association;
mod client;
mod config;
mod multipart;
mod transport;
mod types;

pub mod method;
pub mod ratelimit;
#[cfg(test)]
pub(crate) mod test_utils;

pub use association::{Association, Bounds};
pub use client::{
    ApiMethod, Client, ClientBuilder, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, MethodCall,
};
pub use config::{Config, Environment};
pub use method::{
    ApiRequest, Arg, Args, CompiledMethod, FileArg, Include, MethodSpec, MethodTable, ParamType,
};
pub use transport::{OAuthClient, OAuthTransport, PendingRequest, ReqwestTransport, Transport};
pub use types::*;
