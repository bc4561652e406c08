//! Viewport geometry.
//!
//! The scrollable content is `[backward padding][materialized items][forward padding]`. Both
//! paddings stand in for items that are not materialized and are sized from the cache: known
//! sizes where an index was rendered before, the default size elsewhere. Positions are
//! measured from the top of the content, so a scroll position and an item position compare
//! directly.

use crate::{Buffer, Index, ScrollAnchor};

/// Index span of the scrollable content for the current buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Geometry {
    /// First index of the content (the absolute minimum when known).
    pub lower: Index,
    /// Last index of the content (the absolute maximum when known).
    pub upper: Index,
    pub first: Index,
    pub last: Index,
}

impl Geometry {
    pub fn of<D: Clone>(buffer: &Buffer<D>) -> Self {
        let first = buffer.first_index().unwrap_or_else(|| buffer.start_index());
        let last = buffer.last_index().unwrap_or(first - 1);
        let cache = buffer.cache();
        let lower = buffer
            .abs_min_index()
            .unwrap_or_else(|| cache.min_index().map_or(first, |min| min.min(first)));
        let upper = buffer
            .abs_max_index()
            .unwrap_or_else(|| cache.max_index().map_or(last, |max| max.max(last)));
        Self {
            lower,
            upper,
            first,
            last,
        }
    }

    pub fn backward_padding<D: Clone>(&self, buffer: &Buffer<D>) -> u64 {
        buffer.cache().virtual_size(self.lower, self.first - 1)
    }

    pub fn forward_padding<D: Clone>(&self, buffer: &Buffer<D>) -> u64 {
        buffer.cache().virtual_size(self.last + 1, self.upper)
    }

    pub fn total<D: Clone>(&self, buffer: &Buffer<D>) -> u64 {
        buffer.cache().virtual_size(self.lower, self.upper)
    }

    /// Position of the start of `index`. Negative before the content.
    pub fn position<D: Clone>(&self, buffer: &Buffer<D>, index: Index) -> i64 {
        let cache = buffer.cache();
        if index >= self.lower {
            cache.virtual_size(self.lower, index - 1) as i64
        } else {
            -(cache.virtual_size(index, self.lower - 1) as i64)
        }
    }

    pub fn index_at<D: Clone>(&self, buffer: &Buffer<D>, position: i64) -> Index {
        buffer.cache().index_at(self.lower, position)
    }
}

/// Pins the viewport to the item under its top edge.
pub(crate) fn capture_anchor<D: Clone>(buffer: &Buffer<D>, scroll_position: u64) -> ScrollAnchor {
    if buffer.is_empty() {
        return ScrollAnchor {
            id: None,
            index: buffer.start_index(),
            offset: 0,
        };
    }
    let geometry = Geometry::of(buffer);
    let position = scroll_position as i64;
    let mut index = geometry.index_at(buffer, position);
    if let Some(max) = buffer.abs_max_index() {
        index = index.min(max);
    }
    if let Some(min) = buffer.abs_min_index() {
        index = index.max(min);
    }
    let offset = position - geometry.position(buffer, index);
    let id = buffer.get(index).map(|item| item.id());
    ScrollAnchor { id, index, offset }
}

/// The scroll position that keeps `anchor` where it was, given the current content.
pub(crate) fn anchored_position<D: Clone>(
    buffer: &Buffer<D>,
    anchor: &ScrollAnchor,
    viewport: u32,
) -> u64 {
    let geometry = Geometry::of(buffer);
    let index = anchor
        .id
        .and_then(|id| buffer.position_of_id(id))
        .and_then(|pos| buffer.items().get(pos))
        .map_or(anchor.index, |item| item.index());
    let position = geometry.position(buffer, index) + anchor.offset;
    let max = geometry.total(buffer).saturating_sub(viewport as u64);
    (position.max(0) as u64).min(max)
}

/// `[from, to)` of the area that must be materialized around the viewport.
pub(crate) fn padded_window(scroll_position: i64, viewport: u32, padding: f64) -> (i64, i64) {
    let viewport = viewport as i64;
    let pad = (viewport as f64 * padding).round() as i64;
    (scroll_position - pad, scroll_position + viewport + pad)
}
