use crate::*;

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use vscroll::{
    DatasourceError, Direction, FetchRequest, FetchResponse, Index, Item, ItemId, RemoveTarget,
    ResetOptions, Routines, Settings, Ticket,
};

/// Every rendered element measures 20 in a 100 tall viewport.
#[derive(Debug, Default)]
struct Host {
    position: u64,
    paddings: (u64, u64),
    rendered: HashSet<ItemId>,
}

impl Routines<i64> for Host {
    fn scroll_position(&self) -> u64 {
        self.position
    }

    fn set_scroll_position(&mut self, position: u64) {
        self.position = position;
    }

    fn viewport_size(&self) -> u32 {
        100
    }

    fn set_padding_size(&mut self, direction: Direction, size: u64) {
        match direction {
            Direction::Backward => self.paddings.0 = size,
            Direction::Forward => self.paddings.1 = size,
        }
    }

    fn item_size(&self, id: ItemId) -> Option<u32> {
        self.rendered.contains(&id).then_some(20)
    }

    fn render(&mut self, _ticket: Ticket, items: &[&Item<i64>]) -> vscroll::RenderResponse {
        self.rendered.extend(items.iter().map(|i| i.id()));
        vscroll::RenderResponse::Ready
    }

    fn detach(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.rendered.remove(id);
        }
    }
}

fn dataset(index: Index, count: usize) -> Vec<i64> {
    (index..index + count as Index)
        .filter(|i| (1..=100).contains(i))
        .collect()
}

fn sync_adapter() -> Adapter<i64, Host> {
    let source = |index: Index, count: usize| -> Result<Vec<i64>, DatasourceError> {
        Ok(dataset(index, count))
    };
    Adapter::new(Settings::default(), source, Host::default()).unwrap()
}

/// A datasource that answers later; the test plays the server.
struct Deferred {
    requests: Rc<RefCell<Vec<FetchRequest>>>,
}

impl vscroll::Datasource<i64> for Deferred {
    fn get(&mut self, request: FetchRequest) -> FetchResponse<i64> {
        self.requests.borrow_mut().push(request);
        FetchResponse::Pending
    }
}

fn deferred_adapter() -> (Adapter<i64, Host>, Rc<RefCell<Vec<FetchRequest>>>) {
    let requests = Rc::new(RefCell::new(Vec::new()));
    let source = Deferred {
        requests: Rc::clone(&requests),
    };
    let adapter = Adapter::new(Settings::default(), source, Host::default()).unwrap();
    (adapter, requests)
}

/// Answers the latest request until the engine goes idle.
fn serve(adapter: &mut Adapter<i64, Host>, requests: &Rc<RefCell<Vec<FetchRequest>>>) {
    let mut rounds = 0;
    while adapter.is_loading().get() {
        rounds += 1;
        assert!(rounds < 50, "engine never settled");
        let request = *requests.borrow().last().unwrap();
        adapter.complete_fetch(request.ticket, Ok(dataset(request.index, request.count)));
    }
}

#[test]
fn sync_commands_resolve_immediately() {
    let mut adapter = sync_adapter();
    adapter.start(0);
    assert_eq!(adapter.items_count(), 10);
    assert!(adapter.bof().get());
    assert!(!adapter.eof().get());

    let promise = adapter.append(vec![1000, 1001], false);
    assert_eq!(
        promise.get(),
        Some(AdapterMethodResult {
            success: true,
            immediate: true,
            details: None,
        })
    );
    assert_eq!(adapter.buffer_info().last_index, Some(12));
    assert_eq!(adapter.pending_calls(), 0);

    let promise = adapter.remove(RemoveTarget::Indexes(vec![11, 12]), false);
    assert!(promise.get().is_some_and(|r| r.success));
    assert_eq!(adapter.buffer_info().last_index, Some(10));
}

#[test]
fn invalid_arguments_reject_without_touching_the_buffer() {
    let mut adapter = sync_adapter();
    adapter.start(0);
    let before = adapter.buffer_info();

    let result = adapter.append(Vec::new(), false).get().unwrap();
    assert!(!result.success);
    assert!(result.immediate);
    assert!(result.details.unwrap().contains("items must not be empty"));

    let result = adapter.clip(true, true).get().unwrap();
    assert!(!result.success);

    assert_eq!(adapter.buffer_info(), before);
    assert_eq!(adapter.errors().len(), 2);
}

#[test]
fn rejected_call_does_not_fail_a_queued_one() {
    let (mut adapter, requests) = deferred_adapter();
    adapter.start(0);
    assert!(adapter.is_loading().get());

    let append = adapter.append(vec![7], false);
    assert!(!append.is_resolved());
    let rejected = adapter.append(Vec::new(), false).get().unwrap();
    assert!(!rejected.success && rejected.immediate);
    assert_eq!(adapter.errors().len(), 1);

    serve(&mut adapter, &requests);
    assert_eq!(
        append.get(),
        Some(AdapterMethodResult {
            success: true,
            immediate: false,
            details: None,
        })
    );
    assert_eq!(adapter.buffer_info().last_index, Some(11));
    assert_eq!(adapter.workflow().buffer().get(11).map(|i| *i.data()), Some(7));
}

#[test]
fn calls_before_start_wait_for_init() {
    let mut adapter = sync_adapter();
    let promise = adapter.check();
    assert!(!promise.is_resolved());
    assert_eq!(adapter.pending_calls(), 1);

    adapter.start(0);
    assert_eq!(
        promise.get(),
        Some(AdapterMethodResult {
            success: true,
            immediate: false,
            details: None,
        })
    );
    assert!(adapter.init().get());
}

#[test]
fn relax_waits_for_outstanding_fetches() {
    let (mut adapter, requests) = deferred_adapter();
    adapter.start(0);
    assert!(adapter.is_loading().get());

    let relax = adapter.relax();
    assert!(!relax.is_resolved());

    serve(&mut adapter, &requests);
    let result = relax.get().unwrap();
    assert!(result.success);
    assert!(!result.immediate);
    assert_eq!(adapter.items_count(), 10);

    let again = adapter.relax();
    assert!(again.get().is_some_and(|r| r.success && r.immediate));
}

#[test]
fn reset_fails_an_earlier_relax() {
    let (mut adapter, requests) = deferred_adapter();
    adapter.start(0);
    let relax = adapter.relax();

    let reset = adapter.reset(ResetOptions::default());
    assert!(!relax.is_resolved());
    assert_eq!(adapter.workflow().interruptions(), 1);

    serve(&mut adapter, &requests);
    let result = relax.get().unwrap();
    assert!(!result.success);
    assert!(result.details.unwrap().contains("interrupted"));
    assert!(reset.get().is_some_and(|r| r.success));
    assert_eq!(adapter.reload_id().counter, 1);
}

#[test]
fn relax_with_calls_back_and_promise_on_fires_once() {
    let mut adapter = sync_adapter();
    adapter.start(0);

    let seen = Rc::new(Cell::new(0));
    let s = Rc::clone(&seen);
    adapter.relax_with(move |r| {
        assert!(r.success && r.immediate);
        s.set(s.get() + 1);
    });
    assert_eq!(seen.get(), 1);

    let (mut adapter, requests) = deferred_adapter();
    adapter.start(0);
    let promise = adapter.check();
    let s = Rc::clone(&seen);
    assert!(promise.on(move |_| s.set(s.get() + 10)).is_some());
    serve(&mut adapter, &requests);
    assert_eq!(seen.get(), 11);
    assert!(promise.get().is_some_and(|r| r.success));

    let s = Rc::clone(&seen);
    assert!(promise.on(move |_| s.set(s.get() + 100)).is_none());
    assert_eq!(seen.get(), 111);
}

#[test]
fn cycle_error_fails_the_call() {
    let offline = Rc::new(Cell::new(false));
    let flag = Rc::clone(&offline);
    let source = move |index: Index, count: usize| -> Result<Vec<i64>, DatasourceError> {
        if flag.get() {
            Err(DatasourceError::new("offline"))
        } else {
            Ok(dataset(index, count))
        }
    };
    let mut adapter = Adapter::new(Settings::default(), source, Host::default()).unwrap();
    adapter.start(0);
    offline.set(true);

    let result = adapter.reload(Some(50)).get().unwrap();
    assert!(!result.success);
    assert!(result.immediate);
    assert!(result.details.unwrap().contains("offline"));
    assert_eq!(adapter.items_count(), 0);
}

#[test]
fn dispose_fails_pending_calls() {
    let (mut adapter, _requests) = deferred_adapter();
    adapter.start(0);
    let relax = adapter.relax();

    adapter.dispose();
    let result = relax.get().unwrap();
    assert!(!result.success);
    assert_eq!(result.details.as_deref(), Some("disposed"));
    assert_eq!(adapter.pending_calls(), 0);

    let result = adapter.check().get().unwrap();
    assert!(!result.success && result.immediate);
    assert!(adapter.relax().get().is_some_and(|r| !r.success));
}

#[test]
fn property_table_covers_the_adapter() {
    let mut names = HashSet::new();
    for property in ADAPTER_PROPERTIES {
        assert!(names.insert(property.name), "duplicate {}", property.name);
    }
    let methods = ADAPTER_PROPERTIES
        .iter()
        .filter(|p| p.kind == PropertyKind::Method)
        .count();
    assert_eq!(methods, 12);
    assert_eq!(adapter_property("bof").map(|p| p.kind), Some(PropertyKind::Reactive));
    assert_eq!(
        adapter_property("buffer_info").map(|p| p.kind),
        Some(PropertyKind::Scalar)
    );
    assert!(adapter_property("init").is_some_and(|p| p.permanent));
    assert!(adapter_property("relax").is_some_and(|p| !p.permanent));
    assert!(adapter_property("bufferInfo").is_none());

    let mut adapter = sync_adapter();
    assert_eq!(adapter.id(), adapter.workflow().instance());
    assert_eq!(adapter.version(), VERSION);
    assert!(!adapter.init().get());
    adapter.start(0);
    assert!(!adapter.loop_pending().get());
    assert_eq!(adapter.first_visible().get().map(|v| v.index), Some(1));
    assert_eq!(adapter.last_visible().get().map(|v| v.index), Some(5));
    assert_eq!(adapter.routines().paddings, (0, 0));
}
