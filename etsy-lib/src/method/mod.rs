//! Turning method table entries into callable request builders.
//!
//! - [`MethodSpec`]: one entry of the method table
//! - [`MethodTable`]: all entries, fetched once per client
//! - [`CompiledMethod`]: validates [`Args`] and builds an [`ApiRequest`]

mod args;
mod compiled;
mod request;
mod spec;
mod table;

pub use args::{Arg, Args, FileArg, Include};
pub use compiled::{CompiledMethod, UriTemplate};
pub use request::ApiRequest;
pub use spec::{MethodSpec, ParamType};
pub use table::MethodTable;
