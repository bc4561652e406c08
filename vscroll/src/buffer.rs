use crate::cache::{SubsetItem, removal_shift, sorted_unique};
use crate::{BufferInfo, Cache, Index, Item, ItemId, Reactive, Settings};

/// What [`Buffer::update_items`] does with one materialized item.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch<D> {
    /// Keep the item in place.
    Keep,
    /// Remove the item.
    Remove,
    /// Replace the item with a sequence; an empty sequence removes it.
    Splice(Vec<Splice<D>>),
}

/// One element of a [`Patch::Splice`] sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum Splice<D> {
    /// The original item, kept at this position.
    Keep,
    /// A new item built from the data.
    Insert(D),
}

/// Result of [`Buffer::update_items`].
#[derive(Debug)]
pub struct UpdateOutcome<D> {
    pub removed: Vec<Item<D>>,
    pub inserted: Vec<ItemId>,
}

impl<D> Default for UpdateOutcome<D> {
    fn default() -> Self {
        Self {
            removed: Vec::new(),
            inserted: Vec::new(),
        }
    }
}

/// The materialized, index-contiguous window of items plus the virtual bounds of the dataset.
///
/// Every index-shifting operation renumbers `items`, the absolute bounds and the [`Cache`]
/// with the same policy, so the three stay numerically aligned. `fix_right == false` keeps
/// low indexes in place; `fix_right == true` keeps high indexes in place.
#[derive(Debug)]
pub struct Buffer<D> {
    items: Vec<Item<D>>,
    pub(crate) cache: Cache<D>,
    abs_min_index: Option<Index>,
    abs_max_index: Option<Index>,
    start_index: Index,
    next_id: ItemId,
    min_bound: Option<Index>,
    max_bound: Option<Index>,
    bof: Reactive<bool>,
    eof: Reactive<bool>,
}

impl<D: Clone> Buffer<D> {
    pub fn new(settings: &Settings) -> Self {
        let mut buffer = Self {
            items: Vec::new(),
            cache: Cache::new(
                settings.item_size,
                settings.size_strategy,
                settings.cache_data,
            ),
            abs_min_index: settings.min_index,
            abs_max_index: settings.max_index,
            start_index: settings.clamped_start_index(settings.start_index),
            next_id: 0,
            min_bound: settings.min_index,
            max_bound: settings.max_index,
            bof: Reactive::new(false),
            eof: Reactive::new(false),
        };
        buffer.refresh_edges();
        buffer
    }

    pub fn items(&self) -> &[Item<D>] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Item<D>] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cache(&self) -> &Cache<D> {
        &self.cache
    }

    pub fn get(&self, index: Index) -> Option<&Item<D>> {
        let first = self.first_index()?;
        let pos = usize::try_from(index - first).ok()?;
        self.items.get(pos)
    }

    pub fn position_of_id(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id() == id)
    }

    pub fn first_index(&self) -> Option<Index> {
        self.items.first().map(Item::index)
    }

    pub fn last_index(&self) -> Option<Index> {
        self.items.last().map(Item::index)
    }

    /// Lowest cached index, or the start index when nothing is cached.
    pub fn min_index(&self) -> Index {
        self.cache.min_index().unwrap_or(self.start_index)
    }

    /// Highest cached index, or the start index when nothing is cached.
    pub fn max_index(&self) -> Index {
        self.cache.max_index().unwrap_or(self.start_index)
    }

    pub fn abs_min_index(&self) -> Option<Index> {
        self.abs_min_index
    }

    pub fn abs_max_index(&self) -> Option<Index> {
        self.abs_max_index
    }

    pub fn start_index(&self) -> Index {
        self.start_index
    }

    pub(crate) fn set_start_index(&mut self, index: Index) {
        self.start_index = self.clamp_to_bounds(index);
    }

    pub fn set_abs_min_index(&mut self, index: Option<Index>) {
        self.abs_min_index = index;
        self.refresh_edges();
    }

    pub fn set_abs_max_index(&mut self, index: Option<Index>) {
        self.abs_max_index = index;
        self.refresh_edges();
    }

    /// `true` when the absolute bounds describe an empty dataset.
    pub fn is_dataset_empty(&self) -> bool {
        matches!((self.abs_min_index, self.abs_max_index), (Some(min), Some(max)) if min > max)
    }

    pub fn bof(&self) -> &Reactive<bool> {
        &self.bof
    }

    pub fn eof(&self) -> &Reactive<bool> {
        &self.eof
    }

    pub fn default_size(&self) -> Option<u32> {
        self.cache.default_size()
    }

    pub fn size_by_index(&self, index: Index) -> Option<u32> {
        self.cache.size_by_index(index)
    }

    /// Index of the next item to append; `eof` targets the slot after the absolute maximum.
    pub fn index_to_append(&self, eof: bool) -> Index {
        let base = match (eof, self.last_index()) {
            (true, _) => self.abs_max_index.unwrap_or_else(|| self.max_index()),
            (false, Some(last)) => last,
            (false, None) => self.max_index(),
        };
        if self.items.is_empty() && !eof {
            base
        } else {
            base + 1
        }
    }

    /// Index of the next item to prepend; `bof` targets the slot before the absolute minimum.
    pub fn index_to_prepend(&self, bof: bool) -> Index {
        let base = match (bof, self.first_index()) {
            (true, _) => self.abs_min_index.unwrap_or_else(|| self.min_index()),
            (false, Some(first)) => first,
            (false, None) => self.min_index(),
        };
        if self.items.is_empty() && !bof {
            base
        } else {
            base - 1
        }
    }

    pub fn info(&self) -> BufferInfo {
        BufferInfo {
            first_index: self.first_index(),
            last_index: self.last_index(),
            min_index: self.min_index(),
            max_index: self.max_index(),
            abs_min_index: self.abs_min_index,
            abs_max_index: self.abs_max_index,
            default_size: self.default_size(),
        }
    }

    /// Wraps fetched data into new items numbered from `index`.
    pub fn make_items(&mut self, index: Index, data: Vec<D>) -> Vec<Item<D>> {
        data.into_iter()
            .enumerate()
            .map(|(i, d)| self.make_item(index + i as Index, d))
            .collect()
    }

    fn make_item(&mut self, index: Index, data: D) -> Item<D> {
        let id = self.next_id;
        self.next_id += 1;
        Item::new(id, index, data)
    }

    /// Accepts a contiguous batch adjacent to the window (or any batch if the window is empty).
    ///
    /// Returns `false` without mutating anything when the batch does not fit.
    pub fn set_items(&mut self, items: Vec<Item<D>>) -> bool {
        let (Some(first), Some(last)) = (items.first(), items.last()) else {
            return true;
        };
        let (first, last) = (first.index(), last.index());
        if !is_contiguous(&items) {
            vwarn!(first, last, "set_items: non-contiguous batch rejected");
            return false;
        }
        match (self.first_index(), self.last_index()) {
            (None, _) | (_, None) => self.append(items),
            (Some(current), _) if last + 1 == current => self.prepend(items),
            (_, Some(current)) if first == current + 1 => self.append(items),
            _ => {
                vwarn!(
                    first,
                    last,
                    current_first = ?self.first_index(),
                    current_last = ?self.last_index(),
                    "set_items: batch is not adjacent to the window"
                );
                return false;
            }
        }
        true
    }

    pub fn append(&mut self, items: Vec<Item<D>>) {
        if let (Some(last), Some(first)) = (self.last_index(), items.first()) {
            debug_assert_eq!(first.index(), last + 1, "append: batch must follow the window");
        }
        self.items.extend(items);
        self.widen_bounds();
        self.refresh_edges();
    }

    pub fn prepend(&mut self, items: Vec<Item<D>>) {
        if let (Some(first), Some(last)) = (self.first_index(), items.last()) {
            debug_assert_eq!(last.index() + 1, first, "prepend: batch must precede the window");
        }
        self.items.splice(0..0, items);
        self.widen_bounds();
        self.refresh_edges();
    }

    /// Drops `backward` items from the start and `forward` items from the end of the window.
    ///
    /// Indexes are not touched: clipped items stay in the dataset and in the cache.
    pub fn clip(&mut self, backward: usize, forward: usize) -> Vec<Item<D>> {
        let len = self.items.len();
        let backward = backward.min(len);
        let forward = forward.min(len - backward);
        let mut removed: Vec<Item<D>> = self.items.drain(..backward).collect();
        let keep = self.items.len() - forward;
        removed.extend(self.items.drain(keep..));
        if let Some(first) = self.first_index() {
            self.start_index = first;
        }
        self.refresh_edges();
        removed
    }

    /// Removes all items, returning them to the caller.
    pub fn take_all(&mut self) -> Vec<Item<D>> {
        let items = std::mem::take(&mut self.items);
        self.refresh_edges();
        items
    }

    /// Removes `indexes` from the dataset and renumbers everything on the moving side.
    ///
    /// With `virtual_only` the indexes are known to lie outside the window, so no materialized
    /// item is removed; materialized items are still renumbered. Returns the removed items.
    pub fn remove_items(
        &mut self,
        indexes: &[Index],
        fix_right: bool,
        virtual_only: bool,
    ) -> Vec<Item<D>> {
        let removed_indexes = sorted_unique(indexes);
        if removed_indexes.is_empty() {
            return Vec::new();
        }
        let mut removed = Vec::new();
        if !virtual_only {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
                .into_iter()
                .partition(|i| removed_indexes.binary_search(&i.index()).is_ok());
            self.items = kept;
            removed = gone;
        }
        for item in &mut self.items {
            let delta = removal_shift(&removed_indexes, item.index(), fix_right);
            item.shift(delta);
        }
        let n = removed_indexes.len() as Index;
        if fix_right {
            self.abs_min_index = self.abs_min_index.map(|i| i + n);
            self.start_index += removal_shift(&removed_indexes, self.start_index, true);
        } else {
            self.abs_max_index = self.abs_max_index.map(|i| i - n);
            self.start_index += removal_shift(&removed_indexes, self.start_index, false);
        }
        self.cache.remove_items(&removed_indexes, fix_right);
        vtrace!(count = n, fix_right, virtual_only, "Buffer::remove_items");
        debug_assert!(is_contiguous(&self.items), "remove_items broke contiguity");
        self.refresh_edges();
        removed
    }

    /// Inserts `data` at `from + addition`, next to the materialized item at `from`.
    ///
    /// `addition` is `0` to insert before `from` and `1` to insert after it. Returns the ids of
    /// the new items, which are flagged `to_insert`.
    pub fn insert_items(
        &mut self,
        data: Vec<D>,
        from: Index,
        addition: Index,
        fix_right: bool,
    ) -> Vec<ItemId> {
        let n = data.len() as Index;
        let Some(first) = self.first_index() else {
            return Vec::new();
        };
        if n == 0 {
            return Vec::new();
        }
        let at = from + addition;
        let Ok(pos) = usize::try_from(at - first) else {
            return Vec::new();
        };
        if pos > self.items.len() {
            return Vec::new();
        }
        let start = if fix_right { at - n } else { at };
        for item in &mut self.items {
            match (fix_right, item.index() >= at) {
                (false, true) => item.shift(n),
                (true, false) => item.shift(-n),
                _ => {}
            }
        }
        let mut inserted: Vec<Item<D>> = data
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, d)| self.make_item(start + i as Index, d))
            .collect();
        for item in &mut inserted {
            item.to_insert = true;
        }
        let ids = inserted.iter().map(Item::id).collect();
        self.items.splice(pos..pos, inserted);
        if fix_right {
            self.abs_min_index = self.abs_min_index.map(|i| i - n);
        } else {
            self.abs_max_index = self.abs_max_index.map(|i| i + n);
        }
        self.cache.insert_items(&data, at, fix_right);
        vtrace!(count = n, at, fix_right, "Buffer::insert_items");
        debug_assert!(is_contiguous(&self.items), "insert_items broke contiguity");
        self.refresh_edges();
        ids
    }

    /// Inserts `data` at `index` outside the window; nothing is materialized.
    pub fn insert_virtual(&mut self, data: Vec<D>, index: Index, fix_right: bool) {
        let n = data.len() as Index;
        if n == 0 {
            return;
        }
        for item in &mut self.items {
            match (fix_right, item.index() >= index) {
                (false, true) => item.shift(n),
                (true, false) => item.shift(-n),
                _ => {}
            }
        }
        if fix_right {
            self.abs_min_index = self.abs_min_index.map(|i| i - n);
            if self.start_index < index {
                self.start_index -= n;
            }
        } else {
            self.abs_max_index = self.abs_max_index.map(|i| i + n);
            if self.start_index >= index {
                self.start_index += n;
            }
        }
        self.cache.insert_items(&data, index, fix_right);
        vtrace!(count = n, index, fix_right, "Buffer::insert_virtual");
        self.refresh_edges();
    }

    /// Runs `f` over every materialized item and applies the returned [`Patch`]es in one
    /// renumbering pass.
    ///
    /// Items are renumbered from the fixed edge of the window with a running counter, so the
    /// net size change lands on the other side: the absolute maximum moves with
    /// `fix_right == false`, the absolute minimum otherwise.
    pub fn update_items(
        &mut self,
        mut f: impl FnMut(&Item<D>) -> Patch<D>,
        fix_right: bool,
    ) -> UpdateOutcome<D> {
        let (Some(first), Some(last)) = (self.first_index(), self.last_index()) else {
            return UpdateOutcome::default();
        };
        let mut patched: Vec<(Item<D>, Patch<D>)> = std::mem::take(&mut self.items)
            .into_iter()
            .map(|item| {
                let patch = f(&item);
                (item, patch)
            })
            .collect();
        if fix_right {
            patched.reverse();
        }

        let step: Index = if fix_right { -1 } else { 1 };
        let mut counter = if fix_right { last } else { first };
        let mut before = Vec::with_capacity(patched.len());
        let mut next: Vec<Item<D>> = Vec::with_capacity(patched.len());
        let mut outcome = UpdateOutcome::default();

        for (item, patch) in patched {
            let index = item.index();
            let slots = match patch {
                Patch::Keep => vec![Splice::Keep],
                Patch::Remove => Vec::new(),
                Patch::Splice(slots) => slots,
            };
            let keeps = slots.iter().filter(|s| matches!(s, Splice::Keep)).count();
            let spare = (keeps > 1).then(|| item.data().clone());
            let mut original = Some(item);
            let mut produced = Vec::with_capacity(slots.len());
            for slot in slots {
                let piece = match (slot, original.take()) {
                    (Splice::Keep, Some(o)) => o,
                    (Splice::Keep, None) => match &spare {
                        Some(d) => self.make_inserted(d.clone()),
                        None => continue,
                    },
                    (Splice::Insert(d), o) => {
                        original = o;
                        self.make_inserted(d)
                    }
                };
                produced.push(piece);
            }
            if fix_right {
                produced.reverse();
            }
            let to_remove = original.is_some();
            before.push(SubsetItem { index, to_remove });
            if let Some(mut gone) = original {
                gone.to_remove = true;
                outcome.removed.push(gone);
            }
            for mut piece in produced {
                piece.set_index(counter);
                counter += step;
                if piece.to_insert {
                    outcome.inserted.push(piece.id());
                }
                next.push(piece);
            }
        }

        if fix_right {
            next.reverse();
            before.reverse();
            outcome.removed.reverse();
            outcome.inserted.reverse();
        }
        let delta = next.len() as Index - before.len() as Index;
        if fix_right {
            self.abs_min_index = self.abs_min_index.map(|i| i - delta);
        } else {
            self.abs_max_index = self.abs_max_index.map(|i| i + delta);
        }
        if next.is_empty() {
            let start = if fix_right { last + 1 } else { first };
            self.start_index = self.clamp_to_bounds(start);
        }
        self.cache.update_subset(&before, &next, fix_right);
        self.items = next;
        vtrace!(
            removed = outcome.removed.len(),
            inserted = outcome.inserted.len(),
            fix_right,
            "Buffer::update_items"
        );
        debug_assert!(is_contiguous(&self.items), "update_items broke contiguity");
        self.refresh_edges();
        outcome
    }

    fn make_inserted(&mut self, data: D) -> Item<D> {
        let mut item = self.make_item(0, data);
        item.to_insert = true;
        item
    }

    /// Feeds a rendered item's size into the cache.
    pub(crate) fn cache_item(&mut self, pos: usize) {
        if let Some(item) = self.items.get(pos) {
            self.cache.add(item);
        }
    }

    /// Empties the window and restores bounds from settings.
    ///
    /// The cache is cleared when `force` is set. Returns the released items.
    pub fn reset(&mut self, force: bool, start_index: Option<Index>) -> Vec<Item<D>> {
        let released = std::mem::take(&mut self.items);
        self.abs_min_index = self.min_bound;
        self.abs_max_index = self.max_bound;
        if let Some(index) = start_index {
            self.start_index = index;
        }
        self.start_index = self.clamp_to_bounds(self.start_index);
        self.cache.reset(force);
        vdebug!(force, start_index = self.start_index, "Buffer::reset");
        self.refresh_edges();
        released
    }

    /// Replaces the settings-derived parts (bounds, cache policy).
    pub(crate) fn apply_settings(&mut self, settings: &Settings) {
        self.min_bound = settings.min_index;
        self.max_bound = settings.max_index;
        self.cache = Cache::new(
            settings.item_size,
            settings.size_strategy,
            settings.cache_data,
        );
        self.start_index = settings.clamped_start_index(settings.start_index);
    }

    fn clamp_to_bounds(&self, index: Index) -> Index {
        let mut index = index;
        if let Some(max) = self.max_bound {
            index = index.min(max);
        }
        if let Some(min) = self.min_bound {
            index = index.max(min);
        }
        index
    }

    fn widen_bounds(&mut self) {
        if let (Some(first), Some(min)) = (self.first_index(), self.abs_min_index) {
            if first < min {
                self.abs_min_index = Some(first);
            }
        }
        if let (Some(last), Some(max)) = (self.last_index(), self.abs_max_index) {
            if last > max {
                self.abs_max_index = Some(last);
            }
        }
    }

    pub(crate) fn refresh_edges(&mut self) {
        let bof = match self.first_index() {
            Some(first) => self.abs_min_index == Some(first),
            None => self.abs_min_index.is_some(),
        };
        let eof = match self.last_index() {
            Some(last) => self.abs_max_index == Some(last),
            None => self.abs_max_index.is_some(),
        };
        self.bof.set(bof);
        self.eof.set(eof);
    }

    pub(crate) fn dispose(&mut self) -> Vec<Item<D>> {
        self.bof.dispose();
        self.eof.dispose();
        self.cache.reset(true);
        std::mem::take(&mut self.items)
    }
}

fn is_contiguous<D>(items: &[Item<D>]) -> bool {
    items.windows(2).all(|w| w[1].index() == w[0].index() + 1)
}
