use std::collections::VecDeque;

use crate::transducer::{self, Instruction, Payload, Signal};
use crate::{
    Buffer, Command, CycleId, Datasource, DatasourceError, Error, ErrorRecord, Process,
    ProcessStatus, Reactive, ReloadId, Registry, Routines, Settings, SettingsError, State, Ticket,
    VisibleItem,
};

mod adapter;
mod cycle;
mod fetch;
mod render;

type ErrorCallback = Box<dyn FnMut(&ErrorRecord)>;

/// The engine: owns the buffer, the per-cycle state and the host interfaces, and drives
/// processes through the transducer until each cycle is done.
///
/// This type is host-driven:
/// - call `init(now_ms)` once the viewport exists
/// - forward scroll events to `on_scroll(now_ms)`
/// - call `tick(now_ms)` on a timer so throttled scrolls and delayed init can fire
/// - answer pending fetches/renders through `complete_fetch` / `complete_render`
///
/// At most one cycle runs at a time. Commands that arrive meanwhile are queued, except
/// `reset`/`reload`, which interrupt the running cycle.
pub struct Workflow<D, R> {
    settings: Settings,
    datasource: Box<dyn Datasource<D>>,
    routines: R,
    buffer: Buffer<D>,
    state: State,

    instance: u32,
    reload_counter: u32,
    call: u64,
    seq: u64,
    now_ms: u64,
    init_at: Option<u64>,
    disposed: bool,
    paddings: (u64, u64),

    initialized: Reactive<bool>,
    cycles_done: Reactive<u64>,
    first_visible: Reactive<Option<VisibleItem>>,
    last_visible: Reactive<Option<VisibleItem>>,
    interruptions: u64,
    errors: Vec<ErrorRecord>,
    on_error: Option<ErrorCallback>,
    deferred: VecDeque<Command<D>>,
}

impl<D: Clone + 'static, R: Routines<D>> Workflow<D, R> {
    /// Creates a workflow. Fails if `settings` do not validate.
    pub fn new(
        settings: Settings,
        datasource: impl Datasource<D> + 'static,
        routines: R,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let instance = Registry::next_instance();
        vdebug!(
            instance,
            start_index = settings.start_index,
            buffer_size = settings.buffer_size,
            "Workflow::new"
        );
        Ok(Self {
            buffer: Buffer::new(&settings),
            settings,
            datasource: Box::new(datasource),
            routines,
            state: State::new(),
            instance,
            reload_counter: 0,
            call: 0,
            seq: 0,
            now_ms: 0,
            init_at: None,
            disposed: false,
            paddings: (0, 0),
            initialized: Reactive::new(false),
            cycles_done: Reactive::new(0),
            first_visible: Reactive::new(None),
            last_visible: Reactive::new(None),
            interruptions: 0,
            errors: Vec::new(),
            on_error: None,
            deferred: VecDeque::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn buffer(&self) -> &Buffer<D> {
        &self.buffer
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn routines(&self) -> &R {
        &self.routines
    }

    pub fn routines_mut(&mut self) -> &mut R {
        &mut self.routines
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    pub fn reload_id(&self) -> ReloadId {
        ReloadId {
            instance: self.instance,
            counter: self.reload_counter,
        }
    }

    pub fn cycle_id(&self) -> CycleId {
        CycleId {
            instance: self.instance,
            cycle: self.state.cycle.count,
            inner_loop: self.state.cycle.inner_loop.count,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.cycle.busy.get()
    }

    /// `true` while a cycle is running.
    pub fn busy(&self) -> &Reactive<bool> {
        &self.state.cycle.busy
    }

    /// `true` while an inner-loop iteration is running.
    pub fn loop_busy(&self) -> &Reactive<bool> {
        &self.state.cycle.inner_loop.busy
    }

    pub fn initialized(&self) -> &Reactive<bool> {
        &self.initialized
    }

    /// Number of completed cycles.
    pub fn cycles_done(&self) -> &Reactive<u64> {
        &self.cycles_done
    }

    pub fn first_visible(&self) -> &Reactive<Option<VisibleItem>> {
        &self.first_visible
    }

    pub fn last_visible(&self) -> &Reactive<Option<VisibleItem>> {
        &self.last_visible
    }

    pub fn bof(&self) -> &Reactive<bool> {
        self.buffer.bof()
    }

    pub fn eof(&self) -> &Reactive<bool> {
        self.buffer.eof()
    }

    pub fn interruptions(&self) -> u64 {
        self.interruptions
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Commands waiting for the running cycle to finish.
    pub fn pending_commands(&self) -> usize {
        self.deferred.len()
    }

    pub fn set_on_error(&mut self, on_error: Option<impl FnMut(&ErrorRecord) + 'static>) {
        self.on_error = on_error.map(|f| Box::new(f) as ErrorCallback);
    }

    /// Starts the first cycle, or schedules it when `init_delay_ms` is set.
    pub fn init(&mut self, now_ms: u64) {
        if self.disposed || self.initialized.get() || self.init_at.is_some() {
            return;
        }
        self.now_ms = now_ms;
        if self.settings.init_delay_ms > 0 {
            self.init_at = Some(now_ms + self.settings.init_delay_ms);
            vtrace!(due = now_ms + self.settings.init_delay_ms, "init scheduled");
            return;
        }
        self.start_init();
    }

    fn start_init(&mut self) {
        self.init_at = None;
        self.initialized.set(true);
        self.dispatch(Signal::new(
            Process::Init,
            ProcessStatus::Start,
            Payload::Initiator(Process::Init),
        ));
    }

    /// Fires due timers: the delayed init and the scroll throttle.
    pub fn tick(&mut self, now_ms: u64) {
        if self.disposed {
            return;
        }
        self.now_ms = now_ms;
        if let Some(due) = self.init_at {
            if now_ms >= due {
                self.start_init();
            }
            return;
        }
        if let Some(due) = self.state.scroll.timer_due {
            if now_ms >= due {
                self.state.scroll.timer_due = None;
                if self.is_busy() {
                    self.state.scroll.pending = true;
                } else {
                    self.handle_scroll();
                }
            }
        }
    }

    /// Call this when the host reports a scroll event.
    ///
    /// Events caused by the engine's own scroll position writes are ignored. Events closer
    /// than `throttle_ms` to the last handled one are coalesced into one timer.
    pub fn on_scroll(&mut self, now_ms: u64) {
        if self.disposed || !self.initialized.get() {
            return;
        }
        self.now_ms = now_ms;
        let position = self.routines.scroll_position();
        if let Some(expected) = self.state.scroll.synthetic.take() {
            if expected == position {
                vtrace!(position, "synthetic scroll ignored");
                return;
            }
        }
        self.state.scroll.record(position, now_ms);
        if self.is_busy() {
            self.state.scroll.pending = true;
            return;
        }
        if let Some(last) = self.state.scroll.last_handled_ms {
            let throttle = self.settings.throttle_ms;
            if now_ms.saturating_sub(last) < throttle {
                self.state.scroll.timer_due = Some(last + throttle);
                return;
            }
        }
        self.handle_scroll();
    }

    fn handle_scroll(&mut self) {
        self.state.scroll.last_handled_ms = Some(self.now_ms);
        self.state.scroll.timer_due = None;
        self.dispatch(Signal::new(
            Process::Scroll,
            ProcessStatus::Start,
            Payload::Empty,
        ));
    }

    /// Validates and runs a command, or queues it behind the running cycle.
    ///
    /// A validation failure is recorded in the error log and returned; nothing else changes.
    pub fn command(&mut self, command: Command<D>) -> Result<(), Error> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if let Err(error) = command.validate() {
            self.record_error(command.process(), error.clone());
            return Err(error);
        }
        let ready = self.initialized.get() && self.init_at.is_none();
        if !ready || (self.is_busy() && !command.interrupts()) {
            vtrace!(?command, "command deferred");
            self.deferred.push_back(command);
            return Ok(());
        }
        self.start_command(command);
        Ok(())
    }

    fn start_command(&mut self, command: Command<D>) {
        let process = command.process();
        self.dispatch(Signal::new(
            process,
            ProcessStatus::Start,
            Payload::Command(command),
        ));
    }

    /// Resolves a fetch that answered `Pending`. Stale tickets are ignored.
    pub fn complete_fetch(&mut self, ticket: Ticket, result: Result<Vec<D>, DatasourceError>) {
        if self.disposed || ticket.call != self.call || self.state.fetch.ticket != Some(ticket) {
            vwarn!(?ticket, call = self.call, "stale fetch completion ignored");
            return;
        }
        self.state.fetch.ticket = None;
        let signal = match result {
            Ok(data) => Signal::new(Process::Fetch, ProcessStatus::Next, Payload::Fetched(data)),
            Err(error) => Signal::error(Process::Fetch, error.into()),
        };
        self.dispatch(signal);
    }

    /// Resolves a render that answered `Pending`. Stale tickets are ignored.
    pub fn complete_render(&mut self, ticket: Ticket) {
        if self.disposed || ticket.call != self.call || self.state.render.ticket != Some(ticket) {
            vwarn!(?ticket, call = self.call, "stale render completion ignored");
            return;
        }
        let signal = self.finish_render();
        self.dispatch(signal);
    }

    /// Cancels timers and outstanding work, releases every item and disposes the reactive
    /// values. The workflow ignores all later calls.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cancel_outstanding(true);
        self.disposed = true;
        self.init_at = None;
        self.deferred.clear();
        let released: Vec<_> = self.buffer.dispose().iter().map(|i| i.id()).collect();
        if !released.is_empty() {
            self.routines.detach(&released);
        }
        self.state.dispose();
        self.initialized.dispose();
        self.cycles_done.dispose();
        self.first_visible.dispose();
        self.last_visible.dispose();
        vdebug!(instance = self.instance, "Workflow::dispose");
    }

    fn next_ticket(&mut self) -> Ticket {
        self.seq += 1;
        Ticket {
            call: self.call,
            seq: self.seq,
        }
    }

    /// Bumps the call generation and cancels the outstanding fetch/render tickets.
    fn cancel_outstanding(&mut self, cancel_fetch: bool) {
        self.call += 1;
        if let Some(ticket) = self.state.fetch.ticket.take() {
            if cancel_fetch {
                self.datasource.cancel(ticket);
            }
        }
        if let Some(ticket) = self.state.render.ticket.take() {
            self.routines.cancel(ticket);
        }
    }

    /// Feeds signals through the transducer until the cycle parks on a pending host call or
    /// is done.
    fn dispatch(&mut self, signal: Signal<D>) {
        let mut signal = signal;
        loop {
            match transducer::next(signal) {
                Instruction::Run { process, payload } => match self.run(process, payload) {
                    Some(next) => signal = next,
                    None => return,
                },
                Instruction::Interrupt {
                    process,
                    finalize,
                    datasource_swap,
                } => {
                    self.interrupt(process, finalize, datasource_swap);
                    signal = Signal::new(
                        Process::Init,
                        ProcessStatus::Start,
                        Payload::Initiator(process),
                    );
                }
                Instruction::Fail {
                    process,
                    error,
                    end,
                } => {
                    self.record_error(process, error.clone());
                    if !end {
                        self.done();
                        return;
                    }
                    match self.run(Process::End, Payload::Error(error)) {
                        Some(next) => signal = next,
                        None => return,
                    }
                }
                Instruction::Done => {
                    self.done();
                    return;
                }
            }
        }
    }

    /// Runs one process handler. `None` means the cycle waits for the host.
    fn run(&mut self, process: Process, payload: Payload<D>) -> Option<Signal<D>> {
        vtrace!(%process, cycle = %self.cycle_id(), "run");
        let signal = match process {
            Process::Init => self.init_process(payload),
            Process::Scroll => self.scroll_process(),
            Process::Reset
            | Process::Reload
            | Process::Append
            | Process::Prepend
            | Process::Check
            | Process::Remove
            | Process::UserClip
            | Process::Insert
            | Process::Replace
            | Process::Update
            | Process::Fix => self.adapter_process(process, payload),
            Process::Start => self.start_process(),
            Process::PreFetch => self.pre_fetch_process(),
            Process::Fetch => return self.fetch_process(),
            Process::PostFetch => self.post_fetch_process(payload),
            Process::Render => return self.render_process(),
            Process::PreClip => self.pre_clip_process(),
            Process::Clip => self.clip_process(),
            Process::Adjust => self.adjust_process(),
            Process::End => self.end_process(payload),
        };
        Some(signal)
    }

    fn interrupt(&mut self, process: Process, finalize: bool, datasource_swap: bool) {
        if !finalize {
            return;
        }
        self.cancel_outstanding(!datasource_swap);
        self.state.cycle.interrupter = Some(process);
        self.interruptions += 1;
        vdebug!(
            %process,
            call = self.call,
            interruptions = self.interruptions,
            "cycle interrupted"
        );
    }

    fn done(&mut self) {
        self.state.cycle.inner_loop.busy.set(false);
        self.state.cycle.busy.set(false);
        self.state.cycle.interrupter = None;
        self.cycles_done.set(self.cycles_done.get() + 1);
        vdebug!(cycle = %self.cycle_id(), "cycle done");
        if self.disposed {
            return;
        }
        if let Some(command) = self.deferred.pop_front() {
            self.start_command(command);
        } else if self.state.scroll.pending {
            self.state.scroll.pending = false;
            self.handle_scroll();
        }
    }

    fn record_error(&mut self, process: Process, error: Error) {
        verror!(%process, %error, "cycle error");
        let record = ErrorRecord {
            process,
            cycle: self.cycle_id(),
            time_ms: self.now_ms,
            error,
        };
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(&record);
        }
        self.errors.push(record);
    }
}

impl<D: Clone, R> core::fmt::Debug for Workflow<D, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Workflow")
            .field("instance", &self.instance)
            .field("settings", &self.settings)
            .field("reload_counter", &self.reload_counter)
            .field("call", &self.call)
            .field("items", &self.buffer.len())
            .field("busy", &self.state.cycle.busy.get())
            .field("errors", &self.errors.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}
