// Example: adapter methods against a datasource that answers asynchronously.
use std::cell::RefCell;
use std::rc::Rc;

use vscroll::{
    Datasource, Direction, FetchRequest, FetchResponse, Index, Item, ItemId, RenderResponse,
    Routines, Settings, Ticket,
};
use vscroll_adapter::Adapter;

#[derive(Default)]
struct Host {
    position: u64,
}

impl Routines<Index> for Host {
    fn scroll_position(&self) -> u64 {
        self.position
    }

    fn set_scroll_position(&mut self, position: u64) {
        self.position = position;
    }

    fn viewport_size(&self) -> u32 {
        100
    }

    fn set_padding_size(&mut self, _direction: Direction, _size: u64) {}

    fn item_size(&self, _id: ItemId) -> Option<u32> {
        Some(20)
    }

    fn render(&mut self, _ticket: Ticket, _items: &[&Item<Index>]) -> RenderResponse {
        RenderResponse::Ready
    }

    fn detach(&mut self, _ids: &[ItemId]) {}
}

/// Queues requests; `main` plays the server.
struct Remote(Rc<RefCell<Vec<FetchRequest>>>);

impl Datasource<Index> for Remote {
    fn get(&mut self, request: FetchRequest) -> FetchResponse<Index> {
        self.0.borrow_mut().push(request);
        FetchResponse::Pending
    }
}

fn main() {
    let queue = Rc::new(RefCell::new(Vec::new()));
    let mut adapter = match Adapter::new(
        Settings::default(),
        Remote(Rc::clone(&queue)),
        Host::default(),
    ) {
        Ok(adapter) => adapter,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    adapter.start(0);
    let relax = adapter.relax_with(|result| println!("relaxed: {result:?}"));
    let appended = adapter.append(vec![-1], false);

    loop {
        let next = queue.borrow_mut().pop();
        let Some(request) = next else {
            break;
        };
        let data = (request.index..request.index + request.count as Index)
            .filter(|i| (1..=20).contains(i))
            .collect();
        adapter.complete_fetch(request.ticket, Ok(data));
        println!("served {}..+{}: {:?}", request.index, request.count, adapter.buffer_info());
    }

    println!("relax: {:?}", relax.get());
    println!("append: {:?}", appended.get());
    println!("items: {}", adapter.items_count());
}
