use super::Workflow;
use crate::transducer::{Payload, Signal};
use crate::viewport::{Geometry, padded_window};
use crate::{Direction, FetchRequest, FetchResponse, Index, Process, ProcessStatus, Routines};

/// `[first, last]` clamped into the optional absolute bounds.
fn clamp_range(first: Index, last: Index, min: Option<Index>, max: Option<Index>) -> (Index, Index) {
    let first = min.map_or(first, |min| first.max(min));
    let last = max.map_or(last, |max| last.min(max));
    (first, last)
}

impl<D: Clone + 'static, R: Routines<D>> Workflow<D, R> {
    /// Computes the index range that must be fetched to fill the padded viewport.
    pub(super) fn pre_fetch_process(&mut self) -> Signal<D> {
        let buffer = &self.buffer;
        if buffer.is_dataset_empty() {
            vtrace!("preFetch: empty dataset");
            return Signal::done(Process::PreFetch);
        }
        let (abs_min, abs_max) = (buffer.abs_min_index(), buffer.abs_max_index());
        let pack = self.settings.buffer_size as Index;
        let fetch = &mut self.state.fetch;

        if buffer.default_size().is_none() {
            if !buffer.is_empty() {
                return Signal::done(Process::PreFetch);
            }
            let start = buffer.start_index();
            let forward = clamp_range(start, start + pack - 1, abs_min, abs_max);
            let backward = clamp_range(start - pack, start - 1, abs_min, abs_max);
            let (first, last, direction) = if forward.0 <= forward.1 {
                (forward.0, forward.1, Direction::Forward)
            } else if backward.0 <= backward.1 {
                (backward.0, backward.1, Direction::Backward)
            } else {
                return Signal::done(Process::PreFetch);
            };
            fetch.first = Some(first);
            fetch.last = Some(last);
            fetch.direction = Some(direction);
            vtrace!(first, last, ?direction, "preFetch: no size estimate, initial pack");
            return Signal::next(Process::PreFetch);
        }

        let viewport = self.routines.viewport_size();
        let geometry = Geometry::of(buffer);
        let anchor = self.state.scroll.anchor;
        let anchor_index = anchor
            .id
            .and_then(|id| buffer.position_of_id(id))
            .and_then(|pos| buffer.items().get(pos))
            .map_or(anchor.index, |item| item.index());
        let top = geometry.position(buffer, anchor_index) + anchor.offset;
        let (from, to) = padded_window(top, viewport, self.settings.padding);
        let first = geometry.index_at(buffer, from);
        let last = geometry.index_at(buffer, (to - 1).max(from));
        let (first, last) = clamp_range(first, last, abs_min, abs_max);
        if first > last {
            return Signal::done(Process::PreFetch);
        }

        let (mut need_first, mut need_last, direction) =
            match (buffer.first_index(), buffer.last_index()) {
                (Some(bf), Some(bl)) if last >= bf - 1 && first <= bl + 1 => {
                    match (first < bf, last > bl) {
                        (false, false) => {
                            vtrace!(first, last, "preFetch: window is materialized");
                            return Signal::done(Process::PreFetch);
                        }
                        (true, false) => (first, bf - 1, Direction::Backward),
                        (false, true) => (bl + 1, last, Direction::Forward),
                        (true, true) => {
                            fetch.other_side_pending = true;
                            match self.state.scroll.direction() {
                                Some(Direction::Backward) => (first, bf - 1, Direction::Backward),
                                _ => (bl + 1, last, Direction::Forward),
                            }
                        }
                    }
                }
                (bf, _) => {
                    // Empty or disjoint window: fetch forward from the anchor, then fill the
                    // part above it in the next iteration.
                    fetch.replace_all = bf.is_some();
                    if anchor_index > last {
                        (first, last, Direction::Backward)
                    } else {
                        let from_index = anchor_index.max(first);
                        fetch.other_side_pending = first < from_index;
                        (from_index, last, Direction::Forward)
                    }
                }
            };

        let count = need_last - need_first + 1;
        if count < pack {
            match direction {
                Direction::Forward => need_last = need_first + pack - 1,
                Direction::Backward => need_first = need_last - pack + 1,
            }
        }
        let (need_first, need_last) = clamp_range(need_first, need_last, abs_min, abs_max);
        if need_first > need_last {
            return Signal::done(Process::PreFetch);
        }
        fetch.first = Some(need_first);
        fetch.last = Some(need_last);
        fetch.direction = Some(direction);
        vtrace!(
            first = need_first,
            last = need_last,
            ?direction,
            replace_all = fetch.replace_all,
            other_side_pending = fetch.other_side_pending,
            "preFetch"
        );
        Signal::next(Process::PreFetch)
    }

    /// Requests the range from the datasource. `None` while the answer is pending.
    pub(super) fn fetch_process(&mut self) -> Option<Signal<D>> {
        let Some(index) = self.state.fetch.first else {
            return Some(Signal::done(Process::Fetch));
        };
        let count = self.state.fetch.count_requested().max(1);
        let ticket = self.next_ticket();
        self.state.fetch.ticket = Some(ticket);
        self.state.fetch.count += 1;
        vdebug!(index, count, ?ticket, "fetch");
        match self.datasource.get(FetchRequest {
            ticket,
            index,
            count,
        }) {
            FetchResponse::Ready(result) => {
                self.state.fetch.ticket = None;
                Some(match result {
                    Ok(data) => Signal::new(Process::Fetch, ProcessStatus::Next, Payload::Fetched(data)),
                    Err(error) => Signal::error(Process::Fetch, error.into()),
                })
            }
            FetchResponse::Pending => None,
        }
    }

    /// Places fetched data into the buffer.
    ///
    /// A forward answer starts at the requested index; a backward one ends at the last
    /// requested index. A short answer marks the end of the dataset on that side.
    pub(super) fn post_fetch_process(&mut self, payload: Payload<D>) -> Signal<D> {
        let mut data = match payload {
            Payload::Fetched(data) => data,
            _ => Vec::new(),
        };
        let (Some(first), Some(last)) = (self.state.fetch.first, self.state.fetch.last) else {
            return Signal::done(Process::PostFetch);
        };
        let requested = self.state.fetch.count_requested();
        if data.len() > requested {
            vwarn!(
                requested,
                received = data.len(),
                "postFetch: datasource returned too many items"
            );
            data.truncate(requested);
        }
        let n = data.len() as Index;
        let direction = self.state.fetch.direction.unwrap_or(Direction::Forward);
        let start = match direction {
            Direction::Forward => first,
            Direction::Backward => last - n + 1,
        };
        if (n as usize) < requested {
            match direction {
                Direction::Forward => self.buffer.set_abs_max_index(Some(first + n - 1)),
                Direction::Backward => self.buffer.set_abs_min_index(Some(start)),
            }
            vdebug!(requested, received = n, ?direction, "postFetch: dataset edge reached");
        }
        if n == 0 {
            if self.buffer.is_empty() {
                self.state.fetch.other_side_pending = true;
            }
            return Signal::done(Process::PostFetch);
        }

        if self.state.fetch.replace_all {
            let dropped = self.buffer.take_all();
            self.state.clip.removed.extend(dropped.iter().map(|i| i.id()));
            self.buffer.set_start_index(start);
        }
        let items = self.buffer.make_items(start, data);
        let ids: Vec<_> = items.iter().map(|i| i.id()).collect();
        if !self.buffer.set_items(items) {
            vwarn!(start, count = n, "postFetch: batch rejected");
            return Signal::done(Process::PostFetch);
        }
        self.state.fetch.ids = ids;
        self.state.fetch.has_new_items = true;
        Signal::next(Process::PostFetch)
    }
}
