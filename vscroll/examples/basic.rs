// Example: a scroller over 1000 items driven by a fake host.
use std::collections::HashMap;

use vscroll::{
    DatasourceError, Direction, Index, Item, ItemId, RenderResponse, Routines, Settings, Ticket,
    Workflow,
};

#[derive(Default)]
struct Host {
    position: u64,
    sizes: HashMap<ItemId, u32>,
}

impl Routines<String> for Host {
    fn scroll_position(&self) -> u64 {
        self.position
    }

    fn set_scroll_position(&mut self, position: u64) {
        self.position = position;
    }

    fn viewport_size(&self) -> u32 {
        200
    }

    fn set_padding_size(&mut self, direction: Direction, size: u64) {
        println!("padding {direction:?} = {size}");
    }

    fn item_size(&self, id: ItemId) -> Option<u32> {
        self.sizes.get(&id).copied()
    }

    fn render(&mut self, _ticket: Ticket, items: &[&Item<String>]) -> RenderResponse {
        for item in items {
            // Longer rows wrap onto a second line.
            let size = if item.data().len() > 8 { 40 } else { 20 };
            self.sizes.insert(item.id(), size);
        }
        RenderResponse::Ready
    }

    fn detach(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.sizes.remove(id);
        }
    }
}

fn main() {
    let datasource = |index: Index, count: usize| -> Result<Vec<String>, DatasourceError> {
        Ok((index..index + count as Index)
            .filter(|i| (1..=1000).contains(i))
            .map(|i| format!("row {i}"))
            .collect())
    };
    let settings = Settings::default().with_bounds(1, 1000);
    let mut workflow = match Workflow::new(settings, datasource, Host::default()) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    workflow.init(0);
    println!("after init: {:?}", workflow.buffer().info());

    workflow.routines_mut().position = 5_000;
    workflow.on_scroll(100);
    println!("after scroll: {:?}", workflow.buffer().info());
    println!(
        "visible: {:?}..{:?}",
        workflow.first_visible().get(),
        workflow.last_visible().get()
    );
}
