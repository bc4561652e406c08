use crate::transducer::{self, Instruction, Payload, Signal};
use crate::*;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        let span = end_exclusive - start;
        start + (self.next_u64() % span)
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        self.gen_range_u64(start as u64, end_exclusive as u64) as usize
    }

    fn gen_range_u32(&mut self, start: u32, end_exclusive: u32) -> u32 {
        self.gen_range_u64(start as u64, end_exclusive as u64) as u32
    }

    fn gen_bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Host UI stand-in: every rendered item measures `size` unless a size was set explicitly.
#[derive(Debug, Default)]
struct Host {
    position: u64,
    viewport: u32,
    size: u32,
    sizes: HashMap<ItemId, u32>,
    paddings: (u64, u64),
    rendered: Vec<ItemId>,
    detached: Vec<ItemId>,
    render_tickets: Vec<Ticket>,
    cancelled: Vec<Ticket>,
    pending_render: bool,
    broken: bool,
}

impl Host {
    fn new(viewport: u32, size: u32) -> Self {
        Self {
            viewport,
            size,
            ..Self::default()
        }
    }
}

impl Routines<i64> for Host {
    fn scroll_position(&self) -> u64 {
        self.position
    }

    fn set_scroll_position(&mut self, position: u64) {
        self.position = position;
    }

    fn viewport_size(&self) -> u32 {
        self.viewport
    }

    fn set_padding_size(&mut self, direction: Direction, size: u64) {
        match direction {
            Direction::Backward => self.paddings.0 = size,
            Direction::Forward => self.paddings.1 = size,
        }
    }

    fn item_size(&self, id: ItemId) -> Option<u32> {
        self.sizes.get(&id).copied()
    }

    fn render(&mut self, ticket: Ticket, items: &[&Item<i64>]) -> RenderResponse {
        for item in items {
            if !self.broken {
                self.sizes.entry(item.id()).or_insert(self.size);
            }
            self.rendered.push(item.id());
        }
        self.render_tickets.push(ticket);
        if self.pending_render {
            RenderResponse::Pending
        } else {
            RenderResponse::Ready
        }
    }

    fn detach(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.sizes.remove(id);
        }
        self.detached.extend_from_slice(ids);
    }

    fn cancel(&mut self, ticket: Ticket) {
        self.cancelled.push(ticket);
    }
}

/// The dataset `[min, max]` where each item's data is its original index.
fn dataset(min: Index, max: Index) -> impl FnMut(Index, usize) -> Result<Vec<i64>, DatasourceError> {
    move |index, count| {
        Ok((index..index + count as Index)
            .filter(|i| (min..=max).contains(i))
            .collect())
    }
}

#[derive(Debug, Default)]
struct SourceLog {
    requests: Vec<FetchRequest>,
    cancelled: Vec<Ticket>,
}

/// A datasource that always answers later.
struct PendingSource {
    log: Rc<RefCell<SourceLog>>,
}

impl Datasource<i64> for PendingSource {
    fn get(&mut self, request: FetchRequest) -> FetchResponse<i64> {
        self.log.borrow_mut().requests.push(request);
        FetchResponse::Pending
    }

    fn cancel(&mut self, ticket: Ticket) {
        self.log.borrow_mut().cancelled.push(ticket);
    }
}

fn settled(settings: Settings) -> Workflow<i64, Host> {
    let mut workflow = Workflow::new(settings, dataset(1, 100), Host::new(100, 20)).unwrap();
    workflow.init(0);
    assert!(!workflow.is_busy());
    workflow
}

fn pending(settings: Settings) -> (Workflow<i64, Host>, Rc<RefCell<SourceLog>>) {
    let log = Rc::new(RefCell::new(SourceLog::default()));
    let source = PendingSource {
        log: Rc::clone(&log),
    };
    let workflow = Workflow::new(settings, source, Host::new(100, 20)).unwrap();
    (workflow, log)
}

fn sized_item(id: ItemId, index: Index, size: u32) -> Item<i64> {
    let mut item = Item::new(id, index, index);
    item.set_size(size);
    item
}

fn filled_buffer(settings: &Settings, first: Index, count: usize, size: u32) -> Buffer<i64> {
    let mut buffer = Buffer::new(settings);
    let data: Vec<i64> = (first..first + count as Index).collect();
    let items = buffer.make_items(first, data);
    assert!(buffer.set_items(items));
    for pos in 0..buffer.len() {
        buffer.items_mut()[pos].set_size(size);
        buffer.cache_item(pos);
    }
    buffer
}

fn indexes_and_data(buffer: &Buffer<i64>) -> Vec<(Index, i64)> {
    buffer.items().iter().map(|i| (i.index(), *i.data())).collect()
}

fn assert_aligned(buffer: &Buffer<i64>) {
    let items = buffer.items();
    for w in items.windows(2) {
        assert_eq!(w[1].index(), w[0].index() + 1, "window is not contiguous");
    }
    if let (Some(first), Some(min)) = (buffer.first_index(), buffer.abs_min_index()) {
        assert!(first >= min, "first {first} below abs min {min}");
    }
    if let (Some(last), Some(max)) = (buffer.last_index(), buffer.abs_max_index()) {
        assert!(last <= max, "last {last} above abs max {max}");
    }
    for item in items {
        if let Some(size) = item.size() {
            let entry = buffer.cache().get(item.index());
            assert_eq!(
                entry.and_then(|e| e.size()),
                Some(size),
                "cache out of sync at {}",
                item.index()
            );
        }
    }
}

#[test]
fn reactive_nested_set_stops_stale_emission() {
    let value = Reactive::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let inner = value.clone();
    let _a = value.on(move |v| {
        if *v == 1 {
            inner.set(2);
        }
    });
    let log = Rc::clone(&seen);
    let _b = value.on(move |v| log.borrow_mut().push(*v));

    value.set(1);
    assert_eq!(value.get(), 2);
    assert_eq!(*seen.borrow(), vec![2]);
}

#[test]
fn reactive_once_and_unsubscribe() {
    let value = Reactive::new(0);
    let calls = Rc::new(Cell::new(0));

    let c = Rc::clone(&calls);
    let _once = value.once(move |_| c.set(c.get() + 1));
    value.set(1);
    value.set(2);
    assert_eq!(calls.get(), 1);

    let c = Rc::clone(&calls);
    let sub = value.on(move |_| c.set(c.get() + 10));
    value.set(3);
    assert_eq!(calls.get(), 11);
    sub.unsubscribe();
    value.set(4);
    assert_eq!(calls.get(), 11);
    assert_eq!(value.subscriber_count(), 0);

    // Equal values do not emit by default.
    let c = Rc::clone(&calls);
    let _sub = value.on(move |_| c.set(c.get() + 100));
    value.set(4);
    assert_eq!(calls.get(), 11);
}

#[test]
fn reactive_emit_on_subscribe() {
    let value = Reactive::with_options(
        7,
        ReactiveOptions {
            emit_on_subscribe: true,
            emit_equal: true,
        },
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let _sub = value.on(move |v| log.borrow_mut().push(*v));
    value.set(7);
    assert_eq!(*seen.borrow(), vec![7, 7]);

    value.dispose();
    value.set(8);
    assert_eq!(*seen.borrow(), vec![7, 7]);
}

#[test]
fn cache_remove_closes_gap_on_either_side() {
    let sizes = [10, 20, 30, 40, 50];
    let build = || {
        let mut cache: Cache<i64> = Cache::new(None, SizeStrategy::Average, false);
        for (i, &size) in sizes.iter().enumerate() {
            cache.add(&sized_item(i as ItemId, i as Index + 1, size));
        }
        cache
    };
    let snapshot = |cache: &Cache<i64>| -> Vec<(Index, Option<u32>)> {
        cache.iter().map(|e| (e.index(), e.size())).collect()
    };

    let mut left = build();
    left.remove_items(&[3], false);
    assert_eq!(
        snapshot(&left),
        vec![(1, Some(10)), (2, Some(20)), (3, Some(40)), (4, Some(50))]
    );

    let mut right = build();
    right.remove_items(&[3], true);
    assert_eq!(
        snapshot(&right),
        vec![(2, Some(10)), (3, Some(20)), (4, Some(40)), (5, Some(50))]
    );
    // (10 + 20 + 40 + 50) / 4 = 30
    assert_eq!(right.default_size(), Some(30));
}

#[test]
fn cache_average_rounds() {
    let mut cache: Cache<i64> = Cache::new(None, SizeStrategy::Average, false);
    assert_eq!(cache.default_size(), None);
    cache.add(&sized_item(0, 1, 10));
    cache.add(&sized_item(1, 2, 15));
    assert_eq!(cache.default_size(), Some(13));

    // Updating a size replaces its contribution.
    cache.add(&sized_item(1, 2, 30));
    assert_eq!(cache.default_size(), Some(20));
}

#[test]
fn cache_frequent_keeps_previous_mode_on_ties() {
    let mut cache: Cache<i64> = Cache::new(None, SizeStrategy::Frequent, false);
    cache.add(&sized_item(0, 1, 10));
    assert_eq!(cache.default_size(), Some(10));
    cache.add(&sized_item(1, 2, 20));
    assert_eq!(cache.default_size(), Some(10));
    cache.add(&sized_item(2, 3, 20));
    assert_eq!(cache.default_size(), Some(20));
    cache.add(&sized_item(3, 4, 10));
    assert_eq!(cache.default_size(), Some(20));
}

#[test]
fn cache_constant_prefers_item_size() {
    let mut first_seen: Cache<i64> = Cache::new(None, SizeStrategy::Constant, false);
    first_seen.add(&sized_item(0, 1, 12));
    first_seen.add(&sized_item(1, 2, 40));
    assert_eq!(first_seen.default_size(), Some(12));

    let mut configured: Cache<i64> = Cache::new(Some(15), SizeStrategy::Constant, false);
    assert_eq!(configured.default_size(), Some(15));
    configured.add(&sized_item(0, 1, 40));
    assert_eq!(configured.default_size(), Some(15));
}

#[test]
fn cache_virtual_size_and_index_at() {
    let mut cache: Cache<i64> = Cache::new(None, SizeStrategy::Average, false);
    for i in 0..3 {
        cache.add(&sized_item(i as ItemId, i + 1, 10));
    }
    cache.add(&sized_item(3, 4, 30));
    // Default size: (10 * 3 + 30) / 4 = 15.
    assert_eq!(cache.default_size(), Some(15));
    assert_eq!(cache.virtual_size(1, 4), 60);
    assert_eq!(cache.virtual_size(1, 6), 90);
    assert_eq!(cache.virtual_size(3, 2), 0);

    assert_eq!(cache.index_at(1, 0), 1);
    assert_eq!(cache.index_at(1, 25), 3);
    assert_eq!(cache.index_at(1, 59), 4);
    assert_eq!(cache.index_at(1, 60), 5);
    assert_eq!(cache.index_at(1, 75), 6);
    assert_eq!(cache.index_at(1, -1), 0);
    assert_eq!(cache.index_at(1, -16), -1);
}

#[test]
fn buffer_update_items_renumbers_from_fixed_side() {
    let settings = Settings::default();

    let mut left = filled_buffer(&settings, 1, 3, 20);
    let outcome = left.update_items(
        |item| {
            if item.index() != 2 {
                Patch::Keep
            } else {
                Patch::Remove
            }
        },
        false,
    );
    assert_eq!(outcome.removed.len(), 1);
    assert_eq!(indexes_and_data(&left), vec![(1, 1), (2, 3)]);
    assert_aligned(&left);

    let mut right = filled_buffer(&settings, 1, 3, 20);
    right.update_items(
        |item| {
            if item.index() != 2 {
                Patch::Keep
            } else {
                Patch::Remove
            }
        },
        true,
    );
    assert_eq!(indexes_and_data(&right), vec![(2, 1), (3, 3)]);
    assert_aligned(&right);
}

#[test]
fn buffer_update_items_splice_inserts_new_items() {
    let settings = Settings::default().with_bounds(1, 10);
    let mut buffer = filled_buffer(&settings, 1, 3, 20);
    let outcome = buffer.update_items(
        |item| match item.index() {
            2 => Patch::Splice(vec![Splice::Insert(20), Splice::Keep, Splice::Insert(21)]),
            _ => Patch::Keep,
        },
        false,
    );
    assert!(outcome.removed.is_empty());
    assert_eq!(outcome.inserted.len(), 2);
    assert_eq!(
        indexes_and_data(&buffer),
        vec![(1, 1), (2, 20), (3, 2), (4, 21), (5, 3)]
    );
    assert_eq!(buffer.abs_max_index(), Some(12));
    assert!(buffer.get(2).unwrap().is_to_insert());
    assert!(!buffer.get(3).unwrap().is_to_insert());
    assert_aligned(&buffer);
}

#[test]
fn buffer_insert_then_remove_round_trips() {
    let settings = Settings::default().with_bounds(1, 100);
    let mut buffer = filled_buffer(&settings, 1, 10, 20);

    let ids = buffer.insert_items(vec![100, 101, 102], 4, 1, false);
    assert_eq!(ids.len(), 3);
    assert_eq!(buffer.abs_max_index(), Some(103));
    assert_eq!(buffer.get(5).map(|i| *i.data()), Some(100));
    assert_eq!(buffer.get(8).map(|i| *i.data()), Some(5));
    assert_aligned(&buffer);

    let removed = buffer.remove_items(&[5, 6, 7], false, false);
    assert_eq!(removed.len(), 3);
    assert_eq!(buffer.abs_max_index(), Some(100));
    for i in 1..=10 {
        assert_eq!(buffer.get(i).map(|item| *item.data()), Some(i));
        assert_eq!(buffer.cache().get(i).and_then(|e| e.size()), Some(20));
    }
}

#[test]
fn buffer_insert_fix_right_moves_lower_side() {
    let settings = Settings::default().with_bounds(1, 100);
    let mut buffer = filled_buffer(&settings, 1, 5, 20);
    buffer.insert_items(vec![50, 51], 3, 0, true);
    assert_eq!(
        indexes_and_data(&buffer),
        vec![(-1, 1), (0, 2), (1, 50), (2, 51), (3, 3), (4, 4), (5, 5)]
    );
    assert_eq!(buffer.abs_min_index(), Some(-1));
    assert!(buffer.bof().get());
    assert_aligned(&buffer);
}

#[test]
fn buffer_set_items_rejects_detached_batches() {
    let settings = Settings::default();
    let mut buffer = filled_buffer(&settings, 1, 3, 20);
    let far = buffer.make_items(10, vec![10, 11]);
    assert!(!buffer.set_items(far));
    assert_eq!(buffer.len(), 3);

    let before = buffer.make_items(-1, vec![-1, 0]);
    assert!(buffer.set_items(before));
    assert_eq!(buffer.first_index(), Some(-1));
}

#[test]
fn buffer_append_and_prepend_indexes() {
    let settings = Settings::default().with_bounds(1, 100);
    let mut buffer: Buffer<i64> = Buffer::new(&settings);
    assert_eq!(buffer.index_to_append(false), 1);
    assert_eq!(buffer.index_to_prepend(false), 1);

    let items = buffer.make_items(1, vec![1, 2, 3]);
    assert!(buffer.set_items(items));
    assert_eq!(buffer.index_to_append(false), 4);
    assert_eq!(buffer.index_to_prepend(false), 0);
    assert_eq!(buffer.index_to_append(true), 101);
    assert_eq!(buffer.index_to_prepend(true), 0);
    assert!(buffer.bof().get());
    assert!(!buffer.eof().get());
}

#[test]
fn buffer_reset_is_idempotent() {
    let settings = Settings::default().with_bounds(1, 50);
    let mut buffer = filled_buffer(&settings, 1, 5, 20);
    buffer.set_abs_max_index(Some(5));

    let released = buffer.reset(false, None);
    assert_eq!(released.len(), 5);
    assert_eq!(buffer.cache().len(), 5);
    assert_eq!(buffer.abs_max_index(), Some(50));

    buffer.reset(true, Some(7));
    let info = buffer.info();
    buffer.reset(true, Some(7));
    assert_eq!(buffer.info(), info);
    assert!(buffer.is_empty());
    assert!(buffer.cache().is_empty());
    assert_eq!(buffer.start_index(), 7);
}

#[test]
fn buffer_random_edits_keep_window_and_cache_aligned() {
    let mut rng = Lcg::new(0x5eed);
    let settings = Settings::default().with_bounds(1, 1000);
    let mut buffer = filled_buffer(&settings, 400, 20, 20);

    for step in 0..300 {
        let fix_right = rng.gen_bool();
        match rng.gen_range_u32(0, 4) {
            0 => {
                if let (Some(first), Some(last)) = (buffer.first_index(), buffer.last_index()) {
                    let from = first + rng.gen_range_u64(0, (last - first + 1) as u64) as Index;
                    let n = rng.gen_range_usize(1, 4);
                    let data = vec![step as i64; n];
                    let addition = rng.gen_range_u64(0, 2) as Index;
                    buffer.insert_items(data, from, addition, fix_right);
                }
            }
            1 => {
                let (Some(min), Some(max)) = (buffer.abs_min_index(), buffer.abs_max_index())
                else {
                    continue;
                };
                if max - min < 50 {
                    continue;
                }
                let count = rng.gen_range_usize(1, 4);
                let indexes: Vec<Index> = (0..count)
                    .map(|_| min + rng.gen_range_u64(0, (max - min + 1) as u64) as Index)
                    .collect();
                buffer.remove_items(&indexes, fix_right, false);
            }
            2 => {
                let (Some(first), Some(min), Some(max)) = (
                    buffer.first_index(),
                    buffer.abs_min_index(),
                    buffer.abs_max_index(),
                ) else {
                    continue;
                };
                let index = if rng.gen_bool() && min < first { min } else { max + 1 };
                buffer.insert_virtual(vec![-1; rng.gen_range_usize(1, 3)], index, fix_right);
            }
            _ => {
                let mut choices = Lcg::new(rng.next_u64());
                buffer.update_items(
                    |item| match choices.gen_range_u32(0, 8) {
                        0 => Patch::Remove,
                        1 => Patch::Splice(vec![Splice::Keep, Splice::Insert(*item.data())]),
                        2 => Patch::Splice(vec![Splice::Insert(0)]),
                        _ => Patch::Keep,
                    },
                    fix_right,
                );
            }
        }

        if buffer.is_empty() {
            let start = buffer.abs_min_index().unwrap_or(1);
            let items = buffer.make_items(start, (0..5).collect());
            assert!(buffer.set_items(items));
        }
        for pos in 0..buffer.len() {
            if buffer.items()[pos].size().is_none() {
                let size = rng.gen_range_u32(10, 50);
                buffer.items_mut()[pos].set_size(size);
                buffer.cache_item(pos);
            }
        }
        assert_aligned(&buffer);
    }
}

#[test]
fn transducer_routes_inner_loop() {
    let run_of = |instruction: Instruction<i64>| match instruction {
        Instruction::Run { process, .. } => Some(process),
        _ => None,
    };
    assert_eq!(
        run_of(transducer::next(Signal::next(Process::Init))),
        Some(Process::Start)
    );
    assert_eq!(
        run_of(transducer::next(Signal::next(Process::PreFetch))),
        Some(Process::Fetch)
    );
    assert_eq!(
        run_of(transducer::next(Signal::done(Process::PreFetch))),
        Some(Process::Adjust)
    );
    assert_eq!(
        run_of(transducer::next(Signal::next(Process::Render))),
        Some(Process::PreClip)
    );
    assert_eq!(
        run_of(transducer::next(Signal::next(Process::End))),
        Some(Process::Start)
    );
    assert_eq!(
        run_of(transducer::next(Signal::next(Process::Scroll))),
        Some(Process::Init)
    );
    assert!(matches!(
        transducer::next(Signal::<i64>::done(Process::End)),
        Instruction::Done
    ));
}

#[test]
fn transducer_routes_commands() {
    let proceed = |render, clip| {
        Signal::<i64>::new(
            Process::Replace,
            ProcessStatus::Next,
            Payload::Proceed { render, clip },
        )
    };
    assert!(matches!(
        transducer::next(proceed(true, true)),
        Instruction::Run {
            process: Process::Render,
            ..
        }
    ));
    assert!(matches!(
        transducer::next(proceed(false, true)),
        Instruction::Run {
            process: Process::Clip,
            ..
        }
    ));
    assert!(matches!(
        transducer::next(proceed(false, false)),
        Instruction::Run {
            process: Process::Adjust,
            ..
        }
    ));
    assert!(matches!(
        transducer::next(Signal::<i64>::next(Process::Fix)),
        Instruction::Run {
            process: Process::Start,
            ..
        }
    ));
    assert!(matches!(
        transducer::next(Signal::<i64>::done(Process::Insert)),
        Instruction::Run {
            process: Process::End,
            ..
        }
    ));
    assert!(matches!(
        transducer::next(Signal::<i64>::new(
            Process::Reload,
            ProcessStatus::Next,
            Payload::Interrupt {
                finalize: true,
                datasource_swap: false
            }
        )),
        Instruction::Interrupt {
            process: Process::Reload,
            finalize: true,
            datasource_swap: false
        }
    ));
}

#[test]
fn transducer_errors_end_only_inner_processes() {
    let error = Error::Datasource(DatasourceError::new("boom"));
    assert!(matches!(
        transducer::next(Signal::<i64>::error(Process::Fetch, error.clone())),
        Instruction::Fail { end: true, .. }
    ));
    assert!(matches!(
        transducer::next(Signal::<i64>::error(Process::Check, error)),
        Instruction::Fail { end: false, .. }
    ));
}

#[test]
fn settings_validation() {
    assert_eq!(Settings::default().validate(), Ok(()));
    assert_eq!(
        Settings::default().with_buffer_size(0).validate(),
        Err(SettingsError::BufferSize)
    );
    assert_eq!(
        Settings::default().with_padding(0.0).validate(),
        Err(SettingsError::Padding)
    );
    assert_eq!(
        Settings::default().with_item_size(Some(0)).validate(),
        Err(SettingsError::ItemSize)
    );
    assert_eq!(
        Settings::default().with_bounds(5, 1).validate(),
        Err(SettingsError::Bounds { min: 5, max: 1 })
    );
    let invalid = Settings::default().with_buffer_size(0);
    assert!(Workflow::new(invalid, dataset(1, 10), Host::new(100, 20)).is_err());
}

#[test]
fn init_fills_viewport_and_finds_bof() {
    let workflow = settled(Settings::default());
    let buffer = workflow.buffer();
    assert_eq!(buffer.first_index(), Some(1));
    assert_eq!(buffer.last_index(), Some(10));
    assert_eq!(buffer.abs_min_index(), Some(1));
    assert_eq!(buffer.abs_max_index(), None);
    assert!(workflow.bof().get());
    assert!(!workflow.eof().get());
    assert_eq!(buffer.default_size(), Some(20));
    assert_eq!(workflow.cycles_done().get(), 1);
    assert_eq!(workflow.first_visible().get().map(|v| v.index), Some(1));
    assert_eq!(workflow.last_visible().get().map(|v| v.index), Some(5));
    assert_eq!(workflow.routines().position, 0);
    assert_eq!(workflow.routines().paddings, (0, 0));
    assert_eq!(workflow.routines().rendered.len(), 10);
    assert!(workflow.errors().is_empty());
    assert!(workflow.initialized().get());
}

#[test]
fn init_delay_waits_for_tick() {
    let mut workflow = Workflow::new(
        Settings::default().with_init_delay_ms(50),
        dataset(1, 100),
        Host::new(100, 20),
    )
    .unwrap();
    workflow.init(0);
    assert!(!workflow.initialized().get());
    workflow.tick(20);
    assert!(workflow.buffer().is_empty());
    workflow.tick(50);
    assert!(workflow.initialized().get());
    assert_eq!(workflow.buffer().len(), 10);
}

#[test]
fn scroll_fetches_forward_and_clips_behind() {
    let mut workflow = settled(Settings::default());
    workflow.routines_mut().position = 100;
    workflow.on_scroll(100);

    let buffer = workflow.buffer();
    // Items 11..=15 arrive forward; only the side behind the fetch is clipped.
    assert_eq!(buffer.first_index(), Some(3));
    assert_eq!(buffer.last_index(), Some(15));
    assert_eq!(workflow.routines().paddings, (40, 0));
    assert_eq!(workflow.routines().detached.len(), 2);
    assert_eq!(workflow.routines().position, 100);
    assert_eq!(workflow.first_visible().get().map(|v| v.index), Some(6));
    assert_eq!(workflow.last_visible().get().map(|v| v.index), Some(10));
    assert_eq!(workflow.cycles_done().get(), 2);
    assert_eq!(workflow.state().scroll.direction(), Some(Direction::Forward));
}

#[test]
fn fetched_items_survive_the_cycle_that_fetched_them() {
    let requests = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&requests);
    let mut source = dataset(1, 100);
    let source = move |index: Index, count: usize| {
        log.borrow_mut().push((index, count));
        source(index, count)
    };
    let mut workflow = Workflow::new(Settings::default(), source, Host::new(100, 20)).unwrap();

    let mut marks = (0, 0);
    let mut step = |workflow: &Workflow<i64, Host>| {
        let host = workflow.routines();
        let rendered = &host.rendered[marks.0..];
        let detached = &host.detached[marks.1..];
        assert!(
            rendered.iter().all(|id| !detached.contains(id)),
            "rendered {rendered:?}, detached {detached:?}"
        );
        marks = (host.rendered.len(), host.detached.len());
    };

    workflow.init(0);
    step(&workflow);
    assert!(workflow.routines().detached.is_empty());
    for k in 1..=8u64 {
        workflow.routines_mut().position = 20 * k;
        workflow.on_scroll(100 * k);
        assert!(!workflow.is_busy());
        step(&workflow);
    }

    assert_eq!(*requests.borrow(), vec![(1, 5), (6, 5), (-4, 5), (11, 5), (16, 5)]);
    let buffer = workflow.buffer();
    assert_eq!(buffer.first_index(), Some(6));
    assert_eq!(buffer.last_index(), Some(20));
    assert_eq!(workflow.routines().detached, vec![0, 1, 2, 3, 4]);
    assert_eq!(workflow.routines().paddings, (100, 0));
    assert_eq!(workflow.routines().position, 160);
}

#[test]
fn infinite_mode_never_clips_on_scroll() {
    let mut workflow = settled(Settings::default().with_infinite(true));
    workflow.routines_mut().position = 100;
    workflow.on_scroll(100);
    assert_eq!(workflow.buffer().first_index(), Some(1));
    assert_eq!(workflow.buffer().last_index(), Some(15));
    assert!(workflow.routines().detached.is_empty());
}

#[test]
fn scroll_events_are_throttled() {
    let mut workflow = settled(Settings::default());
    workflow.routines_mut().position = 20;
    workflow.on_scroll(100);
    assert_eq!(workflow.cycles_done().get(), 2);

    workflow.routines_mut().position = 40;
    workflow.on_scroll(110);
    assert_eq!(workflow.cycles_done().get(), 2);
    assert_eq!(workflow.state().scroll.timer_due, Some(140));

    workflow.tick(120);
    assert_eq!(workflow.cycles_done().get(), 2);
    workflow.tick(140);
    assert_eq!(workflow.cycles_done().get(), 3);
    assert_eq!(workflow.state().scroll.timer_due, None);
}

#[test]
fn prepend_keeps_anchor_and_ignores_synthetic_scroll() {
    let mut workflow = settled(Settings::default());
    workflow
        .command(Command::Prepend {
            items: vec![-10, -20],
            bof: false,
        })
        .unwrap();

    let buffer = workflow.buffer();
    assert_eq!(buffer.first_index(), Some(-1));
    assert_eq!(buffer.get(-1).map(|i| *i.data()), Some(-10));
    assert_eq!(buffer.get(1).map(|i| *i.data()), Some(1));
    assert_eq!(buffer.abs_min_index(), Some(-1));
    assert!(workflow.bof().get());
    assert_eq!(workflow.routines().position, 40);
    assert_eq!(workflow.state().scroll.synthetic, Some(40));
    assert_eq!(workflow.first_visible().get().map(|v| v.index), Some(1));
    assert_eq!(workflow.cycles_done().get(), 2);

    workflow.on_scroll(200);
    assert_eq!(workflow.cycles_done().get(), 2);
    assert_eq!(workflow.state().scroll.synthetic, None);
}

#[test]
fn virtual_prepend_with_bof_moves_bound_only() {
    let mut workflow = settled(Settings::default());
    workflow.routines_mut().position = 100;
    workflow.on_scroll(100);
    assert!(!workflow.bof().get());

    let rendered = workflow.routines().rendered.len();
    workflow
        .command(Command::Prepend {
            items: vec![-1, -2, -3],
            bof: true,
        })
        .unwrap();
    assert_eq!(workflow.buffer().abs_min_index(), Some(-2));
    assert_eq!(workflow.buffer().first_index(), Some(3));
    assert_eq!(workflow.routines().rendered.len(), rendered);
}

#[test]
fn append_remove_insert_renumber_the_window() {
    let mut workflow = settled(Settings::default());

    workflow
        .command(Command::Append {
            items: vec![1000, 1001],
            eof: false,
        })
        .unwrap();
    assert_eq!(workflow.buffer().last_index(), Some(12));
    assert_eq!(workflow.buffer().get(11).map(|i| *i.data()), Some(1000));
    assert_eq!(workflow.routines().rendered.len(), 12);
    assert!(!workflow.is_busy());

    workflow
        .command(Command::Remove {
            target: RemoveTarget::Indexes(vec![2, 3]),
            increase: false,
        })
        .unwrap();
    assert_eq!(workflow.buffer().last_index(), Some(10));
    assert_eq!(workflow.buffer().get(2).map(|i| *i.data()), Some(4));
    assert_eq!(workflow.routines().detached.len(), 2);

    workflow
        .command(Command::Insert {
            items: vec![500],
            position: InsertPosition::AfterIndex(1),
            decrease: false,
        })
        .unwrap();
    assert_eq!(workflow.buffer().get(2).map(|i| *i.data()), Some(500));
    assert_eq!(workflow.buffer().get(3).map(|i| *i.data()), Some(4));
    assert_eq!(workflow.buffer().last_index(), Some(11));
    assert!(workflow.errors().is_empty());
}

#[test]
fn remove_by_predicate_with_increase_keeps_high_indexes() {
    let mut workflow = settled(Settings::default());
    workflow
        .command(Command::Remove {
            target: RemoveTarget::Predicate(Box::new(|item: &Item<i64>| *item.data() % 2 == 0)),
            increase: true,
        })
        .unwrap();
    let buffer = workflow.buffer();
    assert_eq!(buffer.abs_min_index(), Some(6));
    assert_eq!(buffer.first_index(), Some(6));
    assert_eq!(buffer.get(6).map(|i| *i.data()), Some(1));
    assert_eq!(buffer.get(7).map(|i| *i.data()), Some(3));
    assert!(workflow.bof().get());
    // Five removed, then the refill fetches 11..=15 and keeps them.
    assert_eq!(workflow.routines().detached.len(), 5);
    assert_eq!(buffer.last_index(), Some(15));
}

#[test]
fn replace_and_update_go_through_one_pass() {
    let mut workflow = settled(Settings::default());
    workflow
        .command(Command::Replace {
            items: vec![30, 31],
            predicate: Box::new(|item: &Item<i64>| item.index() == 3),
            fix_right: false,
        })
        .unwrap();
    assert_eq!(workflow.buffer().get(3).map(|i| *i.data()), Some(30));
    assert_eq!(workflow.buffer().get(4).map(|i| *i.data()), Some(31));
    assert_eq!(workflow.buffer().get(5).map(|i| *i.data()), Some(4));
    assert_eq!(workflow.routines().detached.len(), 1);

    workflow
        .command(Command::Update {
            updater: Box::new(|item: &Item<i64>| {
                if *item.data() == 31 {
                    Patch::Remove
                } else {
                    Patch::Keep
                }
            }),
            fix_right: false,
        })
        .unwrap();
    assert_eq!(workflow.buffer().get(4).map(|i| *i.data()), Some(4));
    assert_eq!(workflow.routines().detached.len(), 2);
    assert!(workflow.errors().is_empty());
}

#[test]
fn check_remeasures_changed_items() {
    let mut workflow = settled(Settings::default());
    let id = workflow.buffer().get(3).unwrap().id();
    workflow.routines_mut().sizes.insert(id, 40);
    workflow.command(Command::Check).unwrap();

    assert_eq!(workflow.buffer().get(3).and_then(|i| i.size()), Some(40));
    // (9 * 20 + 40) / 10
    assert_eq!(workflow.buffer().default_size(), Some(22));
    assert_eq!(workflow.cycles_done().get(), 2);
    assert!(!workflow.is_busy());
}

#[test]
fn user_clip_ignores_infinite() {
    let mut workflow = settled(Settings::default().with_infinite(true));
    workflow.routines_mut().position = 100;
    workflow.on_scroll(100);
    assert_eq!(workflow.buffer().first_index(), Some(1));

    workflow
        .command(Command::Clip {
            forward_only: false,
            backward_only: true,
        })
        .unwrap();
    assert_eq!(workflow.buffer().first_index(), Some(3));
    assert_eq!(workflow.buffer().last_index(), Some(15));
}

#[test]
fn fix_bounds_and_scroll_position() {
    let mut workflow = settled(Settings::default());
    workflow
        .command(Command::Fix(FixOptions {
            max_index: Some(8),
            ..FixOptions::default()
        }))
        .unwrap();
    assert_eq!(workflow.buffer().last_index(), Some(8));
    assert!(workflow.eof().get());
    assert_eq!(workflow.routines().detached.len(), 2);

    workflow
        .command(Command::Fix(FixOptions {
            scroll_position: Some(500),
            ..FixOptions::default()
        }))
        .unwrap();
    // Clamped to total (8 * 20) minus the viewport.
    assert_eq!(workflow.routines().position, 60);
    assert_eq!(workflow.first_visible().get().map(|v| v.index), Some(4));

    workflow
        .command(Command::Fix(FixOptions {
            updater: Some(Box::new(|item: &mut Item<i64>| *item.data_mut() *= 10)),
            ..FixOptions::default()
        }))
        .unwrap();
    assert_eq!(workflow.buffer().get(2).map(|i| *i.data()), Some(20));
}

#[test]
fn reload_with_cache_positions_at_start_index() {
    let mut workflow = settled(Settings::default().with_cache_on_reload(true));
    workflow
        .command(Command::Reload {
            start_index: Some(50),
        })
        .unwrap();

    assert_eq!(workflow.reload_id().counter, 1);
    assert_eq!(workflow.buffer().get(50).map(|i| *i.data()), Some(50));
    assert_eq!(workflow.buffer().first_index(), Some(45));
    assert_eq!(workflow.buffer().last_index(), Some(57));
    assert_eq!(workflow.routines().position, 980);
    assert_eq!(workflow.cycles_done().get(), 2);
    assert_eq!(workflow.interruptions(), 0);
}

#[test]
fn reset_interrupts_pending_fetch_and_ignores_stale_answer() {
    let (mut workflow, log) = pending(Settings::default());
    workflow.init(0);
    assert!(workflow.is_busy());
    assert_eq!(log.borrow().requests.len(), 1);
    let first = log.borrow().requests[0];
    assert_eq!((first.index, first.count), (1, 5));

    workflow.command(Command::Reset(ResetOptions::default())).unwrap();
    assert_eq!(workflow.interruptions(), 1);
    assert_eq!(log.borrow().cancelled, vec![first.ticket]);
    assert_eq!(log.borrow().requests.len(), 2);
    assert_eq!(workflow.state().cycle.initiator, Process::Reset);
    assert_eq!(workflow.state().cycle.interrupter, Some(Process::Reset));
    assert_eq!(workflow.reload_id().counter, 1);
    let second = log.borrow().requests[1];
    assert!(second.ticket.call > first.ticket.call);

    workflow.complete_fetch(first.ticket, Ok(vec![1, 2, 3, 4, 5]));
    assert!(workflow.buffer().is_empty());

    workflow.complete_fetch(second.ticket, Ok(vec![1, 2, 3, 4, 5]));
    assert_eq!(workflow.buffer().len(), 5);
    assert_eq!(log.borrow().requests.len(), 3);
    assert!(workflow.is_busy());
    assert_eq!(workflow.state().cycle.interrupter, Some(Process::Reset));

    let third = log.borrow().requests[2];
    assert_eq!((third.index, third.count), (6, 5));
    workflow.complete_fetch(third.ticket, Ok(vec![6, 7, 8, 9, 10]));
    let fourth = log.borrow().requests[3];
    assert_eq!((fourth.index, fourth.count), (-4, 5));
    workflow.complete_fetch(fourth.ticket, Ok(Vec::new()));
    assert!(!workflow.is_busy());
    assert_eq!(workflow.buffer().len(), 10);
    assert_eq!(workflow.state().cycle.interrupter, None);
    assert_eq!(workflow.interruptions(), 1);
}

#[test]
fn pending_render_completes_later() {
    let mut workflow = Workflow::new(Settings::default(), dataset(1, 100), {
        let mut host = Host::new(100, 20);
        host.pending_render = true;
        host
    })
    .unwrap();
    workflow.init(0);
    assert!(workflow.is_busy());
    assert_eq!(workflow.buffer().len(), 5);
    assert!(workflow.buffer().items().iter().all(|i| i.is_invisible()));

    let stale = Ticket { call: 99, seq: 1 };
    workflow.complete_render(stale);
    assert!(workflow.buffer().items().iter().all(|i| i.size().is_none()));

    let ticket = *workflow.routines().render_tickets.last().unwrap();
    workflow.routines_mut().pending_render = false;
    workflow.complete_render(ticket);
    assert!(!workflow.is_busy());
    assert_eq!(workflow.buffer().len(), 10);
    assert_eq!(workflow.buffer().get(1).and_then(|i| i.size()), Some(20));
}

#[test]
fn commands_wait_for_the_running_cycle() {
    let (mut workflow, log) = pending(Settings::default());
    workflow.init(0);
    workflow.command(Command::Check).unwrap();
    assert_eq!(workflow.pending_commands(), 1);

    let ticket = log.borrow().requests[0].ticket;
    workflow.complete_fetch(ticket, Ok(Vec::new()));
    let backward = log.borrow().requests[1];
    assert_eq!((backward.index, backward.count), (-4, 5));

    workflow.complete_fetch(backward.ticket, Ok(Vec::new()));
    assert!(!workflow.is_busy());
    assert_eq!(workflow.pending_commands(), 0);
    assert!(workflow.buffer().is_dataset_empty());
    assert!(workflow.bof().get() && workflow.eof().get());
    assert_eq!(workflow.cycles_done().get(), 2);
    assert_eq!(log.borrow().requests.len(), 2);
}

#[test]
fn invalid_command_is_logged_and_rejected() {
    let mut workflow = settled(Settings::default());
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    workflow.set_on_error(Some(move |_: &ErrorRecord| counter.set(counter.get() + 1)));

    let result = workflow.command(Command::Append {
        items: Vec::new(),
        eof: false,
    });
    assert_eq!(
        result,
        Err(Error::Argument(ArgumentError::NoItems {
            process: Process::Append
        }))
    );
    assert_eq!(workflow.errors().len(), 1);
    assert_eq!(workflow.errors()[0].process, Process::Append);
    assert_eq!(seen.get(), 1);
    assert_eq!(workflow.cycles_done().get(), 1);

    let result = workflow.command(Command::Fix(FixOptions::default()));
    assert_eq!(result, Err(Error::Argument(ArgumentError::NothingToFix)));
    assert_eq!(seen.get(), 2);
}

#[test]
fn datasource_error_ends_the_cycle() {
    let failing = |_: Index, _: usize| -> Result<Vec<i64>, DatasourceError> {
        Err(DatasourceError::new("offline"))
    };
    let mut workflow = Workflow::new(Settings::default(), failing, Host::new(100, 20)).unwrap();
    workflow.init(5);
    assert!(!workflow.is_busy());
    assert!(workflow.buffer().is_empty());
    assert_eq!(workflow.errors().len(), 1);
    let record = &workflow.errors()[0];
    assert_eq!(record.process, Process::Fetch);
    assert_eq!(record.time_ms, 5);
    assert_eq!(
        record.error,
        Error::Datasource(DatasourceError::new("offline"))
    );
    assert_eq!(workflow.cycles_done().get(), 1);
}

#[test]
fn missing_element_fails_render() {
    let mut host = Host::new(100, 20);
    host.broken = true;
    let mut workflow = Workflow::new(Settings::default(), dataset(1, 100), host).unwrap();
    workflow.init(0);
    assert!(!workflow.is_busy());
    assert_eq!(workflow.errors().len(), 1);
    assert_eq!(workflow.errors()[0].process, Process::Render);
    assert!(matches!(
        workflow.errors()[0].error,
        Error::ElementNotFound { index: 1, .. }
    ));
}

#[test]
fn dispose_releases_items_and_ignores_later_calls() {
    let mut workflow = settled(Settings::default());
    let busy = workflow.busy().clone();
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    let _sub = busy.on(move |_| c.set(c.get() + 1));

    workflow.dispose();
    assert!(workflow.is_disposed());
    assert!(workflow.buffer().is_empty());
    assert_eq!(workflow.routines().detached.len(), 10);
    assert_eq!(busy.subscriber_count(), 0);
    assert_eq!(workflow.command(Command::Check), Err(Error::Disposed));

    workflow.on_scroll(10);
    workflow.tick(10);
    assert_eq!(calls.get(), 0);
    assert_eq!(workflow.cycles_done().get(), 1);
}

#[test]
fn ids_are_scoped_to_instances() {
    let a = settled(Settings::default());
    let b = settled(Settings::default());
    assert_ne!(a.instance(), b.instance());
    assert!(Registry::instance_count() >= 2);
    assert_eq!(a.reload_id().to_string(), format!("{}-0", a.instance()));
    assert_eq!(a.cycle_id().instance, a.instance());
}
