use crate::{Direction, Index, ItemId, Process, Reactive, Ticket};

/// Counters and flags of the current cycle. Persists across cycles.
#[derive(Debug)]
pub struct CycleModel {
    /// Number of cycles started so far.
    pub count: u64,
    pub initiator: Process,
    pub inner_loop: InnerLoopModel,
    /// `true` from the first process of a cycle until it is done.
    pub busy: Reactive<bool>,
    /// The reset/reload that aborted the previous cycle and started this one. Cleared when
    /// this cycle is done.
    pub interrupter: Option<Process>,
}

impl CycleModel {
    fn new() -> Self {
        Self {
            count: 0,
            initiator: Process::Init,
            inner_loop: InnerLoopModel::new(),
            busy: Reactive::new(false),
            interrupter: None,
        }
    }

    pub(crate) fn begin(&mut self, initiator: Process) {
        self.count += 1;
        self.initiator = initiator;
        self.inner_loop.count = 0;
        self.busy.set(true);
    }
}

#[derive(Debug)]
pub struct InnerLoopModel {
    /// Iterations of the current cycle.
    pub count: u64,
    /// Iterations across all cycles, used for cycle ids.
    pub total: u64,
    /// `true` while an iteration is between `start` and `end`.
    pub busy: Reactive<bool>,
}

impl InnerLoopModel {
    fn new() -> Self {
        Self {
            count: 0,
            total: 0,
            busy: Reactive::new(false),
        }
    }
}

/// Fetch bookkeeping for one inner-loop iteration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchModel {
    /// First requested index.
    pub first: Option<Index>,
    /// Last requested index.
    pub last: Option<Index>,
    pub direction: Option<Direction>,
    /// Items are produced by a command, not by the datasource.
    pub simulate: bool,
    /// Items waiting to be rendered.
    pub ids: Vec<ItemId>,
    pub has_new_items: bool,
    /// The other side of the window still needs a fetch.
    pub other_side_pending: bool,
    /// The fetched range is disjoint from the window, which is dropped.
    pub replace_all: bool,
    /// A command removed items.
    pub do_remove: bool,
    /// A `check` command found changed sizes.
    pub check: bool,
    pub ticket: Option<Ticket>,
    /// Fetches made in the current cycle.
    pub count: u64,
}

impl FetchModel {
    pub fn count_requested(&self) -> usize {
        match (self.first, self.last) {
            (Some(first), Some(last)) if last >= first => (last - first + 1) as usize,
            _ => 0,
        }
    }

    fn reset(&mut self) {
        let count = self.count;
        *self = Self::default();
        self.count = count;
    }
}

/// Items to drop from the window in the current iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipModel {
    pub force_forward: bool,
    pub force_backward: bool,
    /// Items already taken out of the buffer, waiting to be detached.
    pub removed: Vec<ItemId>,
    pub backward: usize,
    pub forward: usize,
}

impl ClipModel {
    pub fn is_due(&self) -> bool {
        self.backward > 0 || self.forward > 0 || !self.removed.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderModel {
    /// Scrollable size before the iteration changed anything.
    pub size_before: Option<u64>,
    pub size_after: u64,
    pub ticket: Option<Ticket>,
}

impl RenderModel {
    pub fn size_changed(&self) -> bool {
        self.size_before.is_some_and(|before| before != self.size_after)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollEvent {
    pub position: u64,
    pub direction: Direction,
    pub time_ms: u64,
}

/// The item the viewport is pinned to while the content around it changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollAnchor {
    pub id: Option<ItemId>,
    pub index: Index,
    /// Distance from the start of the item to the top of the viewport.
    pub offset: i64,
}

/// Scroll bookkeeping. Persists across cycles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub previous: Option<ScrollEvent>,
    pub current: Option<ScrollEvent>,
    /// Position written by the engine whose scroll event must be ignored.
    pub synthetic: Option<u64>,
    /// Due time of the throttle timer.
    pub timer_due: Option<u64>,
    pub last_handled_ms: Option<u64>,
    /// A scroll event arrived while a cycle was running.
    pub pending: bool,
    pub anchor: ScrollAnchor,
}

impl ScrollState {
    pub(crate) fn record(&mut self, position: u64, time_ms: u64) {
        let direction = match self.current {
            Some(prev) if position < prev.position => Direction::Backward,
            _ => Direction::Forward,
        };
        self.previous = self.current;
        self.current = Some(ScrollEvent {
            position,
            direction,
            time_ms,
        });
    }

    pub fn direction(&self) -> Option<Direction> {
        self.current.map(|e| e.direction)
    }
}

/// All per-instance state the processes read and write.
#[derive(Debug)]
pub struct State {
    pub cycle: CycleModel,
    pub fetch: FetchModel,
    pub clip: ClipModel,
    pub render: RenderModel,
    pub scroll: ScrollState,
}

impl State {
    pub(crate) fn new() -> Self {
        Self {
            cycle: CycleModel::new(),
            fetch: FetchModel::default(),
            clip: ClipModel::default(),
            render: RenderModel::default(),
            scroll: ScrollState::default(),
        }
    }

    /// Clears the per-iteration models.
    pub(crate) fn start_inner_loop(&mut self) {
        self.fetch.reset();
        self.clip = ClipModel::default();
        self.render = RenderModel::default();
        self.cycle.inner_loop.count += 1;
        self.cycle.inner_loop.total += 1;
        self.cycle.inner_loop.busy.set(true);
    }

    /// Clears the per-cycle models at the start of a cycle.
    pub(crate) fn start_cycle(&mut self, initiator: Process) {
        self.cycle.begin(initiator);
        self.fetch = FetchModel::default();
        self.clip = ClipModel::default();
        self.render = RenderModel::default();
    }

    pub(crate) fn dispose(&mut self) {
        self.cycle.busy.dispose();
        self.cycle.inner_loop.busy.dispose();
        self.scroll.timer_due = None;
    }
}
