//! A headless virtual scroll engine.
//!
//! For the command surface with per-call completion results, see the `vscroll-adapter` crate.
//!
//! The engine keeps a contiguous window of materialized items over a large or unbounded
//! dataset, fetches more as the viewport moves, releases what scrolled far away, and keeps
//! the scroll position stable while content changes around the item at the top of the
//! viewport.
//!
//! It is UI-agnostic and single-threaded. The host provides:
//! - a [`Datasource`] that answers `(index, count)` requests
//! - [`Routines`] for scroll position, viewport size, padding elements and item measurement
//! - a clock: every entry point takes `now_ms`, and [`Workflow::tick`] fires timers
//!
//! Observable values ([`Reactive`]) report bof/eof, busy state, the visible items and the
//! number of completed cycles.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod buffer;
mod cache;
mod command;
mod error;
mod host;
mod item;
mod process;
mod reactive;
mod registry;
mod settings;
mod state;
pub mod transducer;
mod types;
mod viewport;
mod workflow;

#[cfg(test)]
mod tests;

pub use buffer::{Buffer, Patch, Splice, UpdateOutcome};
pub use cache::{Cache, CacheEntry, SizeStrategy, SubsetItem};
pub use command::{
    Command, FixOptions, InsertPosition, ItemMutator, ItemPredicate, ItemUpdater, RemoveTarget,
    ResetOptions,
};
pub use error::{ArgumentError, DatasourceError, Error, ErrorRecord};
pub use host::{Datasource, FetchRequest, FetchResponse, RenderResponse, Routines};
pub use item::Item;
pub use process::{Process, ProcessStatus};
pub use reactive::{Reactive, ReactiveOptions, Subscription};
pub use registry::Registry;
pub use settings::{Settings, SettingsError};
pub use state::{
    ClipModel, CycleModel, FetchModel, InnerLoopModel, RenderModel, ScrollAnchor, ScrollEvent,
    ScrollState, State,
};
pub use types::{BufferInfo, CycleId, Direction, Index, ItemId, ReloadId, Ticket, VisibleItem};
pub use workflow::Workflow;
