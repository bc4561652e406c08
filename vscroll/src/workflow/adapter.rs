use super::Workflow;
use crate::command::{FixOptions, InsertPosition, RemoveTarget, ResetOptions};
use crate::transducer::{Payload, Signal};
use crate::viewport::{Geometry, capture_anchor};
use crate::{
    Command, Direction, Error, Index, ItemId, Patch, Process, ProcessStatus, Routines,
    ScrollAnchor, Splice,
};

fn proceed<D>(process: Process, render: bool, clip: bool) -> Signal<D> {
    Signal::new(
        process,
        ProcessStatus::Next,
        Payload::Proceed { render, clip },
    )
}

impl<D: Clone + 'static, R: Routines<D>> Workflow<D, R> {
    /// Entry point of every command.
    pub(super) fn adapter_process(&mut self, process: Process, payload: Payload<D>) -> Signal<D> {
        let Payload::Command(command) = payload else {
            vwarn!(%process, "adapter process started without a command");
            return Signal::done(process);
        };
        vdebug!(%process, ?command, "command");
        match command {
            Command::Reset(options) => self.reset_process(options),
            Command::Reload { start_index } => self.reload_process(start_index),
            command => {
                self.begin_command(process);
                match command {
                    Command::Append { items, eof } => self.append_process(items, eof),
                    Command::Prepend { items, bof } => self.prepend_process(items, bof),
                    Command::Check => self.check_process(),
                    Command::Remove { target, increase } => self.remove_process(target, increase),
                    Command::Clip {
                        forward_only,
                        backward_only,
                    } => {
                        self.state.clip.force_forward = !backward_only;
                        self.state.clip.force_backward = !forward_only;
                        Signal::next(Process::UserClip)
                    }
                    Command::Insert {
                        items,
                        position,
                        decrease,
                    } => self.insert_process(items, position, decrease),
                    Command::Replace {
                        items,
                        mut predicate,
                        fix_right,
                    } => {
                        let mut items = Some(items);
                        self.update_process(
                            Process::Replace,
                            move |item| {
                                if !predicate(item) {
                                    return Patch::Keep;
                                }
                                match items.take() {
                                    Some(data) => {
                                        Patch::Splice(data.into_iter().map(Splice::Insert).collect())
                                    }
                                    None => Patch::Remove,
                                }
                            },
                            fix_right,
                        )
                    }
                    Command::Update { updater, fix_right } => {
                        self.update_process(Process::Update, updater, fix_right)
                    }
                    Command::Fix(options) => self.fix_process(options),
                    Command::Reset(_) | Command::Reload { .. } => Signal::done(process),
                }
            }
        }
    }

    /// Starts a cycle for a command that changes the buffer synchronously.
    fn begin_command(&mut self, process: Process) {
        self.state.start_cycle(process);
        self.state.start_inner_loop();
        let position = self.routines.scroll_position();
        self.state.scroll.anchor = capture_anchor(&self.buffer, position);
        self.state.fetch.simulate = true;
    }

    fn reset_process(&mut self, options: ResetOptions<D>) -> Signal<D> {
        let finalize = self.is_busy();
        let ResetOptions {
            datasource,
            settings,
        } = options;
        let datasource_swap = datasource.is_some();
        if let Some(datasource) = datasource {
            if finalize {
                if let Some(ticket) = self.state.fetch.ticket.take() {
                    self.datasource.cancel(ticket);
                }
            }
            self.datasource = datasource;
        }
        if let Some(settings) = settings {
            self.buffer.apply_settings(&settings);
            self.settings = settings;
        }
        self.reset_buffer(true, Some(self.settings.start_index));
        Signal::new(
            Process::Reset,
            ProcessStatus::Next,
            Payload::Interrupt {
                finalize,
                datasource_swap,
            },
        )
    }

    fn reload_process(&mut self, start_index: Option<Index>) -> Signal<D> {
        let finalize = self.is_busy();
        let start = start_index.unwrap_or(self.settings.start_index);
        self.reset_buffer(!self.settings.cache_on_reload, Some(start));
        Signal::new(
            Process::Reload,
            ProcessStatus::Next,
            Payload::Interrupt {
                finalize,
                datasource_swap: false,
            },
        )
    }

    /// Empties the buffer and starts a new reload generation.
    fn reset_buffer(&mut self, force: bool, start_index: Option<Index>) {
        let released: Vec<ItemId> = self
            .buffer
            .reset(force, start_index)
            .iter()
            .map(|i| i.id())
            .collect();
        if !released.is_empty() {
            self.routines.detach(&released);
        }
        self.reload_counter += 1;
        self.state.scroll.anchor = ScrollAnchor {
            id: None,
            index: self.buffer.start_index(),
            offset: 0,
        };
        self.state.scroll.pending = false;
        self.first_visible.set(None);
        self.last_visible.set(None);
        if self.paddings != (0, 0) {
            self.routines.set_padding_size(Direction::Backward, 0);
            self.routines.set_padding_size(Direction::Forward, 0);
            self.paddings = (0, 0);
        }
        vdebug!(reload_id = %self.reload_id(), force, "buffer reset");
    }

    fn append_process(&mut self, items: Vec<D>, eof: bool) -> Signal<D> {
        let buffer = &mut self.buffer;
        if eof && !buffer.eof().get() && buffer.abs_max_index().is_some() {
            let at = buffer.index_to_append(true);
            buffer.insert_virtual(items, at, false);
            return proceed(Process::Append, false, false);
        }
        let ids = match buffer.last_index() {
            Some(last) => buffer.insert_items(items, last, 1, false),
            None => {
                let at = buffer.index_to_append(false);
                self.materialize(items, at, false)
            }
        };
        self.render_new(Process::Append, ids)
    }

    fn prepend_process(&mut self, items: Vec<D>, bof: bool) -> Signal<D> {
        let buffer = &mut self.buffer;
        if bof && !buffer.bof().get() {
            if let Some(min) = buffer.abs_min_index() {
                buffer.insert_virtual(items, min, true);
                return proceed(Process::Prepend, false, false);
            }
        }
        let ids = match buffer.first_index() {
            Some(first) => buffer.insert_items(items, first, 0, true),
            None => {
                let at = buffer.min_index();
                self.materialize(items, at, true)
            }
        };
        self.render_new(Process::Prepend, ids)
    }

    /// Inserts `data` into an empty window at `at` and materializes it.
    fn materialize(&mut self, data: Vec<D>, at: Index, fix_right: bool) -> Vec<ItemId> {
        let n = data.len() as Index;
        self.buffer.insert_virtual(data.clone(), at, fix_right);
        let first = if fix_right { at - n } else { at };
        let mut items = self.buffer.make_items(first, data);
        for item in &mut items {
            item.to_insert = true;
        }
        let ids = items.iter().map(|i| i.id()).collect();
        self.buffer.set_start_index(first);
        if self.buffer.set_items(items) {
            ids
        } else {
            Vec::new()
        }
    }

    fn render_new(&mut self, process: Process, ids: Vec<ItemId>) -> Signal<D> {
        let render = !ids.is_empty();
        self.state.fetch.ids = ids;
        proceed(process, render, false)
    }

    /// Re-measures every materialized item and re-renders the ones whose size changed.
    fn check_process(&mut self) -> Signal<D> {
        let geometry = Geometry::of(&self.buffer);
        self.state.render.size_before = Some(geometry.total(&self.buffer));
        let mut changed = Vec::new();
        for pos in 0..self.buffer.len() {
            let item = &self.buffer.items()[pos];
            let (id, index) = (item.id(), item.index());
            let Some(size) = self.routines.item_size(id) else {
                return Signal::error(Process::Check, Error::ElementNotFound { id, index });
            };
            if item.size() != Some(size) {
                self.buffer.items_mut()[pos].set_size(size);
                self.buffer.cache_item(pos);
                changed.push(id);
            }
        }
        let geometry = Geometry::of(&self.buffer);
        self.state.render.size_after = geometry.total(&self.buffer);
        self.state.fetch.check = !changed.is_empty();
        vdebug!(changed = changed.len(), "check");
        self.render_new(Process::Check, changed)
    }

    fn remove_process(&mut self, target: RemoveTarget<D>, increase: bool) -> Signal<D> {
        let buffer = &self.buffer;
        let indexes: Vec<Index> = match target {
            RemoveTarget::Predicate(mut predicate) => buffer
                .items()
                .iter()
                .filter(|item| predicate(*item))
                .map(|item| item.index())
                .collect(),
            RemoveTarget::Indexes(indexes) => {
                let (min, max) = (buffer.abs_min_index(), buffer.abs_max_index());
                indexes
                    .into_iter()
                    .filter(|&i| min.is_none_or(|min| i >= min) && max.is_none_or(|max| i <= max))
                    .collect()
            }
        };
        if indexes.is_empty() {
            vdebug!("remove: nothing matched");
            return Signal::done(Process::Remove);
        }
        let removed = self.buffer.remove_items(&indexes, increase, false);
        self.state.clip.removed.extend(removed.iter().map(|i| i.id()));
        self.state.fetch.do_remove = true;
        vdebug!(
            count = indexes.len(),
            materialized = removed.len(),
            increase,
            "remove"
        );
        proceed(Process::Remove, false, !removed.is_empty())
    }

    fn insert_process(
        &mut self,
        items: Vec<D>,
        position: InsertPosition<D>,
        decrease: bool,
    ) -> Signal<D> {
        let found = |buffer: &crate::Buffer<D>, mut predicate: crate::ItemPredicate<D>| {
            buffer
                .items()
                .iter()
                .find(|item| predicate(*item))
                .map(|item| item.index())
        };
        let (index, addition) = match position {
            InsertPosition::Before(predicate) => (found(&self.buffer, predicate), 0),
            InsertPosition::After(predicate) => (found(&self.buffer, predicate), 1),
            InsertPosition::BeforeIndex(index) => (Some(index), 0),
            InsertPosition::AfterIndex(index) => (Some(index), 1),
        };
        let Some(index) = index else {
            vdebug!("insert: no item matched");
            return Signal::done(Process::Insert);
        };

        let buffer = &mut self.buffer;
        let in_window = buffer.get(index).is_some();
        if in_window {
            let ids = buffer.insert_items(items, index, addition, decrease);
            return self.render_new(Process::Insert, ids);
        }
        let at = index + addition;
        let above = buffer.abs_min_index().is_some_and(|min| at < min);
        let below = buffer.abs_max_index().is_some_and(|max| at > max + 1);
        if above || below {
            vwarn!(index, addition, "insert: index is out of the dataset bounds");
            return Signal::done(Process::Insert);
        }
        buffer.insert_virtual(items, at, decrease);
        proceed(Process::Insert, false, false)
    }

    fn update_process(
        &mut self,
        process: Process,
        updater: impl FnMut(&crate::Item<D>) -> Patch<D>,
        fix_right: bool,
    ) -> Signal<D> {
        let outcome = self.buffer.update_items(updater, fix_right);
        let removed: Vec<ItemId> = outcome.removed.iter().map(|i| i.id()).collect();
        let clip = !removed.is_empty();
        self.state.fetch.do_remove = clip;
        self.state.clip.removed.extend(removed);
        let render = !outcome.inserted.is_empty();
        self.state.fetch.ids = outcome.inserted;
        proceed(process, render, clip)
    }

    /// Applies the synchronous fixes, then runs a regular inner loop.
    fn fix_process(&mut self, options: FixOptions<D>) -> Signal<D> {
        let FixOptions {
            scroll_position,
            min_index,
            max_index,
            updater,
            scroll_to_item,
        } = options;
        if let Some(mut updater) = updater {
            for item in self.buffer.items_mut() {
                updater(item);
            }
        }
        if min_index.is_some() || max_index.is_some() {
            self.fix_bounds(min_index, max_index);
        }
        if let Some(mut predicate) = scroll_to_item {
            let index = self
                .buffer
                .items()
                .iter()
                .find(|item| predicate(*item))
                .map(|item| item.index());
            if let Some(index) = index {
                let geometry = Geometry::of(&self.buffer);
                let position = geometry.position(&self.buffer, index).max(0) as u64;
                self.scroll_to(position);
            }
        }
        if let Some(position) = scroll_position {
            self.scroll_to(position);
        }
        Signal::next(Process::Fix)
    }

    fn fix_bounds(&mut self, min_index: Option<Index>, max_index: Option<Index>) {
        if let Some(min) = min_index {
            self.buffer.set_abs_min_index(Some(min));
        }
        if let Some(max) = max_index {
            self.buffer.set_abs_max_index(Some(max));
        }
        let items = self.buffer.items();
        let backward = min_index.map_or(0, |min| items.iter().take_while(|i| i.index() < min).count());
        let forward = max_index.map_or(0, |max| {
            items.iter().rev().take_while(|i| i.index() > max).count()
        });
        if backward + forward == 0 {
            return;
        }
        let released: Vec<ItemId> = self
            .buffer
            .clip(backward, forward)
            .iter()
            .map(|i| i.id())
            .collect();
        vdebug!(?min_index, ?max_index, released = released.len(), "fix: bounds");
        self.routines.detach(&released);
    }

    /// Writes a scroll position clamped to the scrollable size.
    fn scroll_to(&mut self, position: u64) {
        let geometry = Geometry::of(&self.buffer);
        let max = geometry
            .total(&self.buffer)
            .saturating_sub(self.routines.viewport_size() as u64);
        let position = position.min(max);
        self.routines.set_scroll_position(position);
        self.state.scroll.synthetic = Some(position);
    }
}
