use super::Workflow;
use crate::transducer::{Payload, Signal};
use crate::viewport::{Geometry, anchored_position, padded_window};
use crate::{Direction, Error, Process, ProcessStatus, Routines};

impl<D: Clone + 'static, R: Routines<D>> Workflow<D, R> {
    fn total_size(&self) -> u64 {
        Geometry::of(&self.buffer).total(&self.buffer)
    }

    /// Hands the new items to the host. `None` while the host renders asynchronously.
    pub(super) fn render_process(&mut self) -> Option<Signal<D>> {
        if self.state.render.size_before.is_none() {
            self.state.render.size_before = Some(self.total_size());
        }
        if self.state.fetch.ids.is_empty() {
            return Some(Signal::next(Process::Render));
        }
        let ticket = self.next_ticket();
        self.state.render.ticket = Some(ticket);
        let items: Vec<_> = self
            .state
            .fetch
            .ids
            .iter()
            .filter_map(|&id| self.buffer.position_of_id(id))
            .filter_map(|pos| self.buffer.items().get(pos))
            .collect();
        vdebug!(count = items.len(), ?ticket, "render");
        match self.routines.render(ticket, &items) {
            crate::RenderResponse::Ready => Some(self.finish_render()),
            crate::RenderResponse::Pending => None,
        }
    }

    /// Measures the rendered items and feeds their sizes into the cache.
    pub(super) fn finish_render(&mut self) -> Signal<D> {
        self.state.render.ticket = None;
        let ids = self.state.fetch.ids.clone();
        for id in ids {
            let Some(pos) = self.buffer.position_of_id(id) else {
                continue;
            };
            let Some(size) = self.routines.item_size(id) else {
                let index = self.buffer.items()[pos].index();
                return Signal::error(Process::Render, Error::ElementNotFound { id, index });
            };
            let item = &mut self.buffer.items_mut()[pos];
            item.set_size(size);
            item.invisible = false;
            item.to_insert = false;
            self.buffer.cache_item(pos);
        }
        self.state.render.size_after = self.total_size();
        vtrace!(
            size_before = ?self.state.render.size_before,
            size_after = self.state.render.size_after,
            default_size = ?self.buffer.default_size(),
            "render done"
        );
        Signal::next(Process::Render)
    }

    /// Counts the items that lie entirely outside the padded viewport.
    ///
    /// After a fetch only the side opposite to the fetch direction is clipped, and items
    /// fetched in this iteration are never counted. A user clip counts the sides it forces.
    pub(super) fn pre_clip_process(&mut self) -> Signal<D> {
        let clip = &self.state.clip;
        let forced = clip.force_forward || clip.force_backward;
        let skip = (self.settings.infinite || self.state.fetch.simulate) && !forced;
        if !skip && !self.buffer.is_empty() {
            let (backward, forward) = self.count_outside();
            let (clip_backward, clip_forward) = if forced {
                (clip.force_backward, clip.force_forward)
            } else {
                match self.state.fetch.direction {
                    Some(Direction::Forward) => (true, false),
                    Some(Direction::Backward) => (false, true),
                    None => (true, true),
                }
            };
            let clip = &mut self.state.clip;
            clip.backward = if clip_backward { backward } else { 0 };
            clip.forward = if clip_forward { forward } else { 0 };
        }
        let clip = &self.state.clip;
        vtrace!(
            backward = clip.backward,
            forward = clip.forward,
            removed = clip.removed.len(),
            skip,
            "preClip"
        );
        Signal::new(
            Process::PreClip,
            ProcessStatus::Next,
            Payload::Proceed {
                render: false,
                clip: clip.is_due(),
            },
        )
    }

    /// Leading and trailing items outside the padded viewport; at least one item survives.
    /// A run stops at the first item fetched in this iteration.
    fn count_outside(&self) -> (usize, usize) {
        let buffer = &self.buffer;
        let viewport = self.routines.viewport_size();
        let top = anchored_position(buffer, &self.state.scroll.anchor, viewport) as i64;
        let (from, to) = padded_window(top, viewport, self.settings.padding);
        let geometry = Geometry::of(buffer);
        let fetched = &self.state.fetch.ids;

        let mut spans = Vec::with_capacity(buffer.len());
        let mut start = geometry.position(buffer, geometry.first);
        for item in buffer.items() {
            let size = buffer.size_by_index(item.index()).unwrap_or(0) as i64;
            spans.push((start, start + size, fetched.contains(&item.id())));
            start += size;
        }
        let backward = spans
            .iter()
            .take_while(|(_, end, fresh)| !fresh && *end <= from)
            .count();
        let forward = spans
            .iter()
            .rev()
            .take_while(|(start, _, fresh)| !fresh && *start >= to)
            .count();
        let len = buffer.len();
        let backward = backward.min(len.saturating_sub(1));
        let forward = forward.min(len - backward - 1);
        (backward, forward)
    }

    /// Drops the counted items from the window and releases their elements.
    pub(super) fn clip_process(&mut self) -> Signal<D> {
        let (backward, forward) = (self.state.clip.backward, self.state.clip.forward);
        let clipped = self.buffer.clip(backward, forward);
        let mut ids = std::mem::take(&mut self.state.clip.removed);
        ids.extend(clipped.iter().map(|i| i.id()));
        vdebug!(backward, forward, released = ids.len(), "clip");
        if !ids.is_empty() {
            self.routines.detach(&ids);
        }
        Signal::next(Process::Clip)
    }

    /// Sizes the paddings and restores the scroll position from the anchor.
    pub(super) fn adjust_process(&mut self) -> Signal<D> {
        let geometry = Geometry::of(&self.buffer);
        let backward = geometry.backward_padding(&self.buffer);
        let forward = geometry.forward_padding(&self.buffer);
        if backward != self.paddings.0 {
            self.routines.set_padding_size(Direction::Backward, backward);
        }
        if forward != self.paddings.1 {
            self.routines.set_padding_size(Direction::Forward, forward);
        }
        self.paddings = (backward, forward);

        let viewport = self.routines.viewport_size();
        let target = anchored_position(&self.buffer, &self.state.scroll.anchor, viewport);
        let current = self.routines.scroll_position();
        if target != current {
            self.routines.set_scroll_position(target);
            self.state.scroll.synthetic = Some(target);
        }
        self.update_visible(&geometry, target, viewport);
        vtrace!(backward, forward, position = target, previous = current, "adjust");
        Signal::next(Process::Adjust)
    }

    fn update_visible(&mut self, geometry: &Geometry, position: u64, viewport: u32) {
        let buffer = &self.buffer;
        let (Some(first), Some(last)) = (buffer.first_index(), buffer.last_index()) else {
            self.first_visible.set(None);
            self.last_visible.set(None);
            return;
        };
        let top = position as i64;
        let bottom = top + (viewport as i64 - 1).max(0);
        let at = |p: i64| geometry.index_at(buffer, p).clamp(first, last);
        let first_visible = buffer.get(at(top)).map(|i| i.visible());
        let last_visible = buffer.get(at(bottom)).map(|i| i.visible());
        self.first_visible.set(first_visible);
        self.last_visible.set(last_visible);
    }
}
