use crate::{Index, ItemId, VisibleItem};

/// A single virtualized record owned by the [`crate::Buffer`] while it is materialized.
///
/// `index` is rewritten whenever the buffer renumbers; `id` never changes.
#[derive(Clone, Debug)]
pub struct Item<D> {
    id: ItemId,
    index: Index,
    data: D,
    size: Option<u32>,
    pub(crate) invisible: bool,
    pub(crate) to_remove: bool,
    pub(crate) to_insert: bool,
}

impl<D> Item<D> {
    pub(crate) fn new(id: ItemId, index: Index, data: D) -> Self {
        Self {
            id,
            index,
            data,
            size: None,
            invisible: true,
            to_remove: false,
            to_insert: false,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn into_data(self) -> D {
        self.data
    }

    /// The last measured size, `None` until the item has been rendered once.
    pub fn size(&self) -> Option<u32> {
        self.size
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn is_to_remove(&self) -> bool {
        self.to_remove
    }

    pub fn is_to_insert(&self) -> bool {
        self.to_insert
    }

    pub fn visible(&self) -> VisibleItem {
        VisibleItem {
            id: self.id,
            index: self.index,
        }
    }

    pub(crate) fn set_index(&mut self, index: Index) {
        self.index = index;
    }

    pub(crate) fn shift(&mut self, delta: Index) {
        self.index += delta;
    }

    pub(crate) fn set_size(&mut self, size: u32) {
        self.size = Some(size);
    }
}
