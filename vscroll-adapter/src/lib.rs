//! The command surface of the `vscroll` engine.
//!
//! `vscroll` runs cycles and reports state through reactive values. This crate wraps a
//! [`vscroll::Workflow`] in an [`Adapter`] that UI bindings can expose directly:
//!
//! - one accessor per property (`bof`, `eof`, `is_loading`, `first_visible`, ...)
//! - one method per command (`append`, `insert`, `remove`, `fix`, ...), each returning a
//!   [`MethodPromise`] that resolves once the engine has settled
//! - `relax()` to wait for the engine to go idle within the current reload generation
//!
//! [`ADAPTER_PROPERTIES`] lists the properties as static data.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod adapter;
mod promise;
mod props;

#[cfg(test)]
mod tests;

pub use adapter::Adapter;
pub use promise::{AdapterMethodResult, MethodPromise};
pub use props::{ADAPTER_PROPERTIES, AdapterProperty, PropertyKind, adapter_property};

/// Version of this crate, as reported by [`Adapter::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
