use core::fmt;

use vscroll::{
    BufferInfo, Command, Datasource, DatasourceError, Error, ErrorRecord, FixOptions, Index,
    InsertPosition, Item, Patch, Reactive, ReloadId, RemoveTarget, ResetOptions, Routines,
    Settings, SettingsError, Ticket, VisibleItem, Workflow,
};

use crate::{AdapterMethodResult, MethodPromise};

type RelaxCallback = Box<dyn FnOnce(&AdapterMethodResult)>;

/// A call that resolves when the engine goes idle.
struct Waiter {
    promise: MethodPromise,
    /// The reload generation the call expects to still be current when it resolves.
    reload_id: ReloadId,
    /// Error log length at call time. `None` for `relax`, which ignores cycle errors.
    /// Argument rejections further down the log belong to other calls.
    errors: Option<usize>,
    callback: Option<RelaxCallback>,
}

/// The command surface of one scroller.
///
/// Wraps a [`Workflow`] the way a UI binding would: the host keeps driving it through the
/// passthroughs (`start`, `tick`, `on_scroll`, `complete_fetch`, `complete_render`), and every
/// command method returns a [`MethodPromise`] that resolves once the engine has settled.
///
/// A command resolves with `success == false` when its arguments are rejected (immediately),
/// when a reset or reload started after it ran, or when a cycle recorded an error meanwhile.
pub struct Adapter<D, R> {
    workflow: Workflow<D, R>,
    waiters: Vec<Waiter>,
}

impl<D: Clone + 'static, R: Routines<D>> Adapter<D, R> {
    /// Creates the adapter together with its workflow.
    pub fn new(
        settings: Settings,
        datasource: impl Datasource<D> + 'static,
        routines: R,
    ) -> Result<Self, SettingsError> {
        Ok(Self::from_workflow(Workflow::new(
            settings, datasource, routines,
        )?))
    }

    pub fn from_workflow(workflow: Workflow<D, R>) -> Self {
        Self {
            workflow,
            waiters: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &Workflow<D, R> {
        &self.workflow
    }

    pub fn routines(&self) -> &R {
        self.workflow.routines()
    }

    pub fn routines_mut(&mut self) -> &mut R {
        self.workflow.routines_mut()
    }

    /// The engine instance id.
    pub fn id(&self) -> u32 {
        self.workflow.instance()
    }

    pub fn version(&self) -> &'static str {
        crate::VERSION
    }

    pub fn init(&self) -> &Reactive<bool> {
        self.workflow.initialized()
    }

    /// `true` while a cycle is running.
    pub fn is_loading(&self) -> &Reactive<bool> {
        self.workflow.busy()
    }

    /// `true` while an inner loop (fetch, render, clip, adjust) is running.
    pub fn loop_pending(&self) -> &Reactive<bool> {
        self.workflow.loop_busy()
    }

    pub fn first_visible(&self) -> &Reactive<Option<VisibleItem>> {
        self.workflow.first_visible()
    }

    pub fn last_visible(&self) -> &Reactive<Option<VisibleItem>> {
        self.workflow.last_visible()
    }

    pub fn bof(&self) -> &Reactive<bool> {
        self.workflow.bof()
    }

    pub fn eof(&self) -> &Reactive<bool> {
        self.workflow.eof()
    }

    /// Number of materialized items.
    pub fn items_count(&self) -> usize {
        self.workflow.buffer().len()
    }

    pub fn buffer_info(&self) -> BufferInfo {
        self.workflow.buffer().info()
    }

    pub fn reload_id(&self) -> ReloadId {
        self.workflow.reload_id()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        self.workflow.errors()
    }

    /// Calls that have not resolved yet.
    pub fn pending_calls(&self) -> usize {
        self.waiters.len()
    }

    // Host passthroughs.

    /// Starts the first cycle ([`Workflow::init`]).
    pub fn start(&mut self, now_ms: u64) {
        self.workflow.init(now_ms);
        self.settle(false);
    }

    pub fn tick(&mut self, now_ms: u64) {
        self.workflow.tick(now_ms);
        self.settle(false);
    }

    pub fn on_scroll(&mut self, now_ms: u64) {
        self.workflow.on_scroll(now_ms);
        self.settle(false);
    }

    pub fn complete_fetch(&mut self, ticket: Ticket, result: Result<Vec<D>, DatasourceError>) {
        self.workflow.complete_fetch(ticket, result);
        self.settle(false);
    }

    pub fn complete_render(&mut self, ticket: Ticket) {
        self.workflow.complete_render(ticket);
        self.settle(false);
    }

    /// Disposes the workflow. Unresolved calls resolve as failed.
    pub fn dispose(&mut self) {
        self.workflow.dispose();
        for waiter in self.waiters.drain(..) {
            let result = AdapterMethodResult {
                success: false,
                immediate: false,
                details: Some(String::from("disposed")),
            };
            resolve(waiter, result);
        }
    }

    // Commands.

    /// Drops everything and starts over, optionally with a new datasource or settings.
    pub fn reset(&mut self, options: ResetOptions<D>) -> MethodPromise {
        self.call(Command::Reset(options))
    }

    /// Drops the items and refetches around `start_index` (or the configured start index).
    pub fn reload(&mut self, start_index: Option<Index>) -> MethodPromise {
        self.call(Command::Reload { start_index })
    }

    /// Adds items after the last one. With `eof`, past the end of the dataset.
    pub fn append(&mut self, items: Vec<D>, eof: bool) -> MethodPromise {
        self.call(Command::Append { items, eof })
    }

    /// Adds items before the first one. With `bof`, before the start of the dataset.
    pub fn prepend(&mut self, items: Vec<D>, bof: bool) -> MethodPromise {
        self.call(Command::Prepend { items, bof })
    }

    /// Re-measures the materialized items.
    pub fn check(&mut self) -> MethodPromise {
        self.call(Command::Check)
    }

    pub fn remove(&mut self, target: RemoveTarget<D>, increase: bool) -> MethodPromise {
        self.call(Command::Remove { target, increase })
    }

    /// Releases items outside the padded viewport, even in infinite mode.
    pub fn clip(&mut self, forward_only: bool, backward_only: bool) -> MethodPromise {
        self.call(Command::Clip {
            forward_only,
            backward_only,
        })
    }

    pub fn insert(
        &mut self,
        items: Vec<D>,
        position: InsertPosition<D>,
        decrease: bool,
    ) -> MethodPromise {
        self.call(Command::Insert {
            items,
            position,
            decrease,
        })
    }

    /// Replaces the first matching item with `items` and removes further matches.
    pub fn replace(
        &mut self,
        items: Vec<D>,
        predicate: impl FnMut(&Item<D>) -> bool + 'static,
        fix_right: bool,
    ) -> MethodPromise {
        self.call(Command::Replace {
            items,
            predicate: Box::new(predicate),
            fix_right,
        })
    }

    pub fn update(
        &mut self,
        updater: impl FnMut(&Item<D>) -> Patch<D> + 'static,
        fix_right: bool,
    ) -> MethodPromise {
        self.call(Command::Update {
            updater: Box::new(updater),
            fix_right,
        })
    }

    pub fn fix(&mut self, options: FixOptions<D>) -> MethodPromise {
        self.call(Command::Fix(options))
    }

    /// Resolves when the engine is idle. Fails if a reset or reload happens first.
    pub fn relax(&mut self) -> MethodPromise {
        self.wait(None)
    }

    /// Like [`Adapter::relax`], and calls `callback` with the result.
    pub fn relax_with(
        &mut self,
        callback: impl FnOnce(&AdapterMethodResult) + 'static,
    ) -> MethodPromise {
        self.wait(Some(Box::new(callback)))
    }

    fn wait(&mut self, callback: Option<RelaxCallback>) -> MethodPromise {
        if self.workflow.is_disposed() {
            let result = AdapterMethodResult::rejected("disposed");
            if let Some(callback) = callback {
                callback(&result);
            }
            return MethodPromise::resolved(result);
        }
        let promise = MethodPromise::new();
        self.waiters.push(Waiter {
            promise: promise.clone(),
            reload_id: self.workflow.reload_id(),
            errors: None,
            callback,
        });
        self.settle(true);
        promise
    }

    fn call(&mut self, command: Command<D>) -> MethodPromise {
        let mut reload_id = self.workflow.reload_id();
        if command.interrupts() {
            reload_id.counter += 1;
        }
        let errors = self.workflow.errors().len();
        if let Err(error) = self.workflow.command(command) {
            let details = error.to_string();
            adebug!(%details, "method rejected");
            return MethodPromise::resolved(AdapterMethodResult::rejected(details));
        }
        let promise = MethodPromise::new();
        self.waiters.push(Waiter {
            promise: promise.clone(),
            reload_id,
            errors: Some(errors),
            callback: None,
        });
        self.settle(true);
        promise
    }

    /// Resolves the waiters once no cycle runs and no command is queued.
    fn settle(&mut self, immediate: bool) {
        if self.waiters.is_empty()
            || self.workflow.is_busy()
            || self.workflow.pending_commands() > 0
        {
            return;
        }
        let current = self.workflow.reload_id();
        let errors = self.workflow.errors();
        for waiter in core::mem::take(&mut self.waiters) {
            let result = if waiter.reload_id != current {
                awarn!(expected = %waiter.reload_id, %current, "call outlived its reload");
                AdapterMethodResult {
                    success: false,
                    immediate,
                    details: Some(format!("interrupted by reload {current}")),
                }
            } else if let Some(record) = waiter.errors.and_then(|n| cycle_error(errors, n)) {
                AdapterMethodResult {
                    success: false,
                    immediate,
                    details: Some(record.error.to_string()),
                }
            } else {
                AdapterMethodResult {
                    success: true,
                    immediate,
                    details: None,
                }
            };
            resolve(waiter, result);
        }
        adebug!(reload_id = %current, immediate, "calls settled");
    }
}

/// The first error a cycle recorded at or after `from`.
fn cycle_error(errors: &[ErrorRecord], from: usize) -> Option<&ErrorRecord> {
    errors
        .get(from..)?
        .iter()
        .find(|record| !matches!(record.error, Error::Argument(_)))
}

fn resolve(waiter: Waiter, result: AdapterMethodResult) {
    waiter.promise.resolve(result.clone());
    if let Some(callback) = waiter.callback {
        callback(&result);
    }
}

impl<D: Clone, R> fmt::Debug for Adapter<D, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("workflow", &self.workflow)
            .field("pending_calls", &self.waiters.len())
            .finish()
    }
}
