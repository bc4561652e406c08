use super::Workflow;
use crate::transducer::{Payload, Signal};
use crate::viewport::capture_anchor;
use crate::{Process, Routines};

impl<D: Clone + 'static, R: Routines<D>> Workflow<D, R> {
    pub(super) fn init_process(&mut self, payload: Payload<D>) -> Signal<D> {
        let initiator = match payload {
            Payload::Initiator(process) => process,
            _ => Process::Init,
        };
        self.state.start_cycle(initiator);
        vdebug!(%initiator, cycle = %self.cycle_id(), "cycle started");
        Signal::next(Process::Init)
    }

    pub(super) fn scroll_process(&mut self) -> Signal<D> {
        vtrace!(
            position = ?self.state.scroll.current.map(|e| e.position),
            direction = ?self.state.scroll.direction(),
            "scroll"
        );
        Signal::next(Process::Scroll)
    }

    /// Begins an inner-loop iteration and pins the viewport to the item at its top.
    pub(super) fn start_process(&mut self) -> Signal<D> {
        self.state.start_inner_loop();
        let position = self.routines.scroll_position();
        self.state.scroll.anchor = capture_anchor(&self.buffer, position);
        vtrace!(
            anchor = self.state.scroll.anchor.index,
            offset = self.state.scroll.anchor.offset,
            "start"
        );
        Signal::next(Process::Start)
    }

    /// Decides whether the cycle runs another inner-loop iteration.
    pub(super) fn end_process(&mut self, payload: Payload<D>) -> Signal<D> {
        let failed = matches!(payload, Payload::Error(_));
        let cycle = &self.state.cycle;
        let fetch = &self.state.fetch;
        let size_changed = self.state.render.size_changed();

        // An interrupted cycle never gets here: its outstanding tickets went stale.
        let again = !failed
            && if fetch.simulate {
                (cycle.initiator == Process::Check && fetch.check && size_changed)
                    || fetch.do_remove
            } else {
                (fetch.has_new_items && size_changed) || fetch.other_side_pending
            };

        self.state.cycle.inner_loop.busy.set(false);
        vtrace!(
            again,
            failed,
            simulate = fetch.simulate,
            has_new_items = fetch.has_new_items,
            size_changed,
            "end"
        );
        if again {
            Signal::next(Process::End)
        } else {
            Signal::done(Process::End)
        }
    }
}
