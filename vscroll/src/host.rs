//! Interfaces the host implements: the datasource and the geometry/element routines.
//!
//! Both are called synchronously from inside the workflow. Anything asynchronous answers
//! `Pending` and later reports back through [`crate::Workflow::complete_fetch`] or
//! [`crate::Workflow::complete_render`] with the same [`Ticket`].

use crate::{DatasourceError, Direction, Index, Item, ItemId, Ticket};

/// One fetch request. `count` is always at least 1; `index` may be negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: Ticket,
    pub index: Index,
    pub count: usize,
}

#[derive(Debug)]
pub enum FetchResponse<D> {
    Ready(Result<Vec<D>, DatasourceError>),
    /// The answer arrives later through `Workflow::complete_fetch`.
    Pending,
}

/// The data source of the list.
pub trait Datasource<D> {
    fn get(&mut self, request: FetchRequest) -> FetchResponse<D>;

    /// Called when an outstanding request is abandoned. Its answer will be ignored.
    fn cancel(&mut self, _ticket: Ticket) {}
}

impl<D, F> Datasource<D> for F
where
    F: FnMut(Index, usize) -> Result<Vec<D>, DatasourceError>,
{
    fn get(&mut self, request: FetchRequest) -> FetchResponse<D> {
        FetchResponse::Ready(self(request.index, request.count))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderResponse {
    Ready,
    /// The host finishes later and calls `Workflow::complete_render`.
    Pending,
}

/// Geometry and element access provided by the host UI.
pub trait Routines<D> {
    fn scroll_position(&self) -> u64;

    fn set_scroll_position(&mut self, position: u64);

    fn viewport_size(&self) -> u32;

    /// Sets the size of the backward or forward padding element.
    fn set_padding_size(&mut self, direction: Direction, size: u64);

    /// Measures the element of a materialized item. `None` if it cannot be found.
    fn item_size(&self, id: ItemId) -> Option<u32>;

    /// Makes the elements of `items` present in the viewport.
    fn render(&mut self, ticket: Ticket, items: &[&Item<D>]) -> RenderResponse;

    /// Hides and releases the elements of removed or clipped items.
    fn detach(&mut self, ids: &[ItemId]);

    /// Called when a pending render is abandoned.
    fn cancel(&mut self, _ticket: Ticket) {}
}
