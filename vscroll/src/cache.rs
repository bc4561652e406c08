use std::collections::BTreeMap;

use crate::{Index, Item};

/// How the default size of never-rendered items is estimated.
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizeStrategy {
    /// Rounded mean of all sizes currently cached.
    #[default]
    Average,
    /// Most frequent cached size. Ties keep the previously chosen size.
    Frequent,
    /// `item_size` if configured, otherwise the first size ever observed.
    Constant,
}

#[derive(Clone, Copy, Debug)]
enum SizeEvent {
    New(u32),
    Updated { old: u32, new: u32 },
    Removed(u32),
}

#[derive(Clone, Debug)]
struct SizeEstimator {
    strategy: SizeStrategy,
    item_size: Option<u32>,
    sum: u64,
    count: u64,
    histogram: BTreeMap<u32, u64>,
    first_seen: Option<u32>,
    current: Option<u32>,
}

impl SizeEstimator {
    fn new(strategy: SizeStrategy, item_size: Option<u32>) -> Self {
        Self {
            strategy,
            item_size,
            sum: 0,
            count: 0,
            histogram: BTreeMap::new(),
            first_seen: None,
            current: None,
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.strategy, self.item_size);
    }

    fn apply(&mut self, event: SizeEvent) {
        match event {
            SizeEvent::New(size) => {
                self.first_seen.get_or_insert(size);
                self.sum += size as u64;
                self.count += 1;
                *self.histogram.entry(size).or_insert(0) += 1;
            }
            SizeEvent::Updated { old, new } => {
                self.sum = self.sum - old as u64 + new as u64;
                self.decrement(old);
                *self.histogram.entry(new).or_insert(0) += 1;
            }
            SizeEvent::Removed(size) => {
                debug_assert!(self.count > 0, "size estimator underflow");
                self.sum = self.sum.saturating_sub(size as u64);
                self.count = self.count.saturating_sub(1);
                self.decrement(size);
            }
        }
    }

    fn decrement(&mut self, size: u32) {
        if let Some(n) = self.histogram.get_mut(&size) {
            *n -= 1;
            if *n == 0 {
                self.histogram.remove(&size);
            }
        }
    }

    /// Recomputes the estimate from the accumulated events. Returns `true` if it changed.
    fn recalculate(&mut self) -> bool {
        let next = match self.strategy {
            SizeStrategy::Average => {
                if self.count == 0 {
                    None
                } else {
                    Some(((self.sum + self.count / 2) / self.count) as u32)
                }
            }
            SizeStrategy::Frequent => {
                let best = self.histogram.values().copied().max();
                match best {
                    None => None,
                    Some(best) => {
                        let keep = self
                            .current
                            .filter(|size| self.histogram.get(size) == Some(&best));
                        keep.or_else(|| {
                            self.histogram
                                .iter()
                                .find(|&(_, &n)| n == best)
                                .map(|(&size, _)| size)
                        })
                    }
                }
            }
            SizeStrategy::Constant => self.item_size.or(self.first_seen),
        };
        let changed = next != self.current;
        self.current = next;
        changed
    }

    fn get(&self) -> Option<u32> {
        self.current.or(self.item_size)
    }
}

/// Cached metadata for one dataset index.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<D> {
    index: Index,
    data: Option<D>,
    size: Option<u32>,
}

impl<D> CacheEntry<D> {
    pub fn index(&self) -> Index {
        self.index
    }

    /// The stored data, only kept when the cache was built with `save_data`.
    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }
}

/// Describes one item of a buffer sub-range handed to [`Cache::update_subset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubsetItem {
    pub index: Index,
    pub to_remove: bool,
}

/// Index-addressed item metadata that outlives the materialized window.
///
/// Keys are kept in an ordered map, so `min_index`/`max_index` are the first/last key.
#[derive(Clone, Debug)]
pub struct Cache<D> {
    entries: BTreeMap<Index, CacheEntry<D>>,
    estimator: SizeEstimator,
    save_data: bool,
}

impl<D: Clone> Cache<D> {
    pub fn new(item_size: Option<u32>, strategy: SizeStrategy, save_data: bool) -> Self {
        let mut estimator = SizeEstimator::new(strategy, item_size);
        estimator.recalculate();
        Self {
            entries: BTreeMap::new(),
            estimator,
            save_data,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min_index(&self) -> Option<Index> {
        self.entries.keys().next().copied()
    }

    pub fn max_index(&self) -> Option<Index> {
        self.entries.keys().next_back().copied()
    }

    pub fn get(&self, index: Index) -> Option<&CacheEntry<D>> {
        self.entries.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<D>> + '_ {
        self.entries.values()
    }

    pub fn size_strategy(&self) -> SizeStrategy {
        self.estimator.strategy
    }

    /// The size estimate for never-rendered items, falling back to the configured item size.
    pub fn default_size(&self) -> Option<u32> {
        self.estimator.get()
    }

    /// Recomputes the default size estimate. Returns `true` if it changed.
    pub fn recalculate(&mut self) -> bool {
        self.estimator.recalculate()
    }

    /// The cached size at `index`, or the default size.
    pub fn size_by_index(&self, index: Index) -> Option<u32> {
        self.entries
            .get(&index)
            .and_then(|e| e.size)
            .or_else(|| self.default_size())
    }

    /// Inserts or updates the entry at `item.index()`.
    pub fn add(&mut self, item: &Item<D>) {
        let index = item.index();
        let size = item.size();
        let data = self.save_data.then(|| item.data().clone());
        match self.entries.get_mut(&index) {
            Some(entry) => {
                if let Some(new) = size {
                    match entry.size {
                        Some(old) if old != new => {
                            self.estimator.apply(SizeEvent::Updated { old, new })
                        }
                        None => self.estimator.apply(SizeEvent::New(new)),
                        _ => {}
                    }
                    entry.size = Some(new);
                }
                if data.is_some() {
                    entry.data = data;
                }
            }
            None => {
                if let Some(new) = size {
                    self.estimator.apply(SizeEvent::New(new));
                }
                self.entries.insert(index, CacheEntry { index, data, size });
            }
        }
        self.estimator.recalculate();
    }

    /// Deletes the entries at `indexes` and closes the gaps.
    ///
    /// With `fix_right == false` entries above a removed index move down by one per removed
    /// index below them; with `fix_right == true` entries below a removed index move up by one
    /// per removed index above them.
    pub fn remove_items(&mut self, indexes: &[Index], fix_right: bool) {
        let removed = sorted_unique(indexes);
        if removed.is_empty() {
            return;
        }
        let old = std::mem::take(&mut self.entries);
        for (index, mut entry) in old {
            if removed.binary_search(&index).is_ok() {
                if let Some(size) = entry.size {
                    self.estimator.apply(SizeEvent::Removed(size));
                }
                continue;
            }
            let next = index + removal_shift(&removed, index, fix_right);
            entry.index = next;
            self.entries.insert(next, entry);
        }
        self.estimator.recalculate();
    }

    /// Opens a gap of `data.len()` indexes at `index`.
    ///
    /// With `fix_right == false` entries at `index` and above move up and the new items occupy
    /// `[index, index + n)`; otherwise entries below `index` move down and the new items occupy
    /// `[index - n, index)`. Entries for the new items are only created when data is saved.
    pub fn insert_items(&mut self, data: &[D], index: Index, fix_right: bool) {
        let n = data.len() as Index;
        if n == 0 {
            return;
        }
        let old = std::mem::take(&mut self.entries);
        for (key, mut entry) in old {
            let next = match (fix_right, key >= index) {
                (false, true) => key + n,
                (true, false) => key - n,
                _ => key,
            };
            entry.index = next;
            self.entries.insert(next, entry);
        }
        if self.save_data {
            let start = if fix_right { index - n } else { index };
            for (i, d) in data.iter().enumerate() {
                let at = start + i as Index;
                self.entries.insert(
                    at,
                    CacheEntry {
                        index: at,
                        data: Some(d.clone()),
                        size: None,
                    },
                );
            }
        }
    }

    /// Replaces the contiguous sub-range described by `before` with the items of `after`.
    ///
    /// Entries left of the sub-range shift by `after.first - before.first` and entries right of
    /// it by `after.last - before.last`. An empty `after` collapses the range toward the fixed
    /// side.
    pub fn update_subset(&mut self, before: &[SubsetItem], after: &[Item<D>], fix_right: bool) {
        let (Some(first), Some(last)) = (before.first(), before.last()) else {
            return;
        };
        let (first, last) = (first.index, last.index);
        let count = before.len() as Index;
        let (left_diff, right_diff) = match (after.first(), after.last()) {
            (Some(a), Some(b)) => (a.index() - first, b.index() - last),
            _ if fix_right => (count, 0),
            _ => (0, -count),
        };

        for item in before.iter().filter(|i| i.to_remove) {
            if let Some(size) = self.entries.get(&item.index).and_then(|e| e.size) {
                self.estimator.apply(SizeEvent::Removed(size));
            }
        }

        let old = std::mem::take(&mut self.entries);
        for (key, mut entry) in old {
            let next = if key < first {
                key + left_diff
            } else if key > last {
                key + right_diff
            } else {
                continue;
            };
            entry.index = next;
            self.entries.insert(next, entry);
        }
        for item in after {
            let index = item.index();
            self.entries.insert(
                index,
                CacheEntry {
                    index,
                    data: self.save_data.then(|| item.data().clone()),
                    size: item.size(),
                },
            );
        }
        self.estimator.recalculate();
    }

    /// Rigid translation of every key by `delta`.
    pub fn shift_indexes(&mut self, delta: Index) {
        if delta == 0 {
            return;
        }
        let old = std::mem::take(&mut self.entries);
        self.entries = old
            .into_iter()
            .map(|(key, mut entry)| {
                entry.index = key + delta;
                (key + delta, entry)
            })
            .collect();
    }

    /// Clears entries and the estimator when `force` is set; otherwise keeps everything.
    pub fn reset(&mut self, force: bool) {
        if !force {
            return;
        }
        self.entries.clear();
        self.estimator.reset();
        self.estimator.recalculate();
    }

    /// Total size of the inclusive index range `[from, to]`.
    ///
    /// Uncached indexes count as the default size (zero if unknown).
    pub fn virtual_size(&self, from: Index, to: Index) -> u64 {
        if from > to {
            return 0;
        }
        let default = self.default_size().unwrap_or(0) as i128;
        let count = (to - from + 1) as i128;
        let mut total = count * default;
        for entry in self.entries.range(from..=to).map(|(_, e)| e) {
            if let Some(size) = entry.size {
                total += size as i128 - default;
            }
        }
        total.max(0) as u64
    }
}

impl<D> Cache<D> {
    /// The index whose span contains the position `offset` units away from the start of
    /// `from` (negative offsets walk backward).
    ///
    /// Runs of uncached indexes are crossed in one step; zero sizes count as 1.
    pub fn index_at(&self, from: Index, offset: i64) -> Index {
        let default = self.estimator.get().unwrap_or(1).max(1) as i64;
        let sized = |e: &CacheEntry<D>| e.size.map(|s| s.max(1) as i64);
        if offset >= 0 {
            let mut index = from;
            let mut rest = offset;
            loop {
                let next = self
                    .entries
                    .range(index..)
                    .find_map(|(&k, e)| sized(e).map(|s| (k, s)));
                let Some((key, size)) = next else {
                    return index + rest / default;
                };
                let span = (key - index) * default;
                if rest < span {
                    return index + rest / default;
                }
                rest -= span;
                if rest < size {
                    return key;
                }
                rest -= size;
                index = key + 1;
            }
        } else {
            let mut index = from - 1;
            let mut rest = -offset;
            loop {
                let prev = self
                    .entries
                    .range(..=index)
                    .rev()
                    .find_map(|(&k, e)| sized(e).map(|s| (k, s)));
                let Some((key, size)) = prev else {
                    return index - (rest - 1) / default;
                };
                let span = (index - key) * default;
                if rest <= span {
                    return index - (rest - 1) / default;
                }
                rest -= span;
                if rest <= size {
                    return key;
                }
                rest -= size;
                index = key - 1;
            }
        }
    }
}

pub(crate) fn sorted_unique(indexes: &[Index]) -> Vec<Index> {
    let mut out = indexes.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// Index delta for a surviving key after removing the sorted `removed` set.
pub(crate) fn removal_shift(removed: &[Index], index: Index, fix_right: bool) -> Index {
    let below = removed.partition_point(|&r| r < index);
    if fix_right {
        (removed.len() - below) as Index
    } else {
        -(below as Index)
    }
}
