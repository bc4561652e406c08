use core::fmt;

/// A position in the (unbounded) dataset. May be negative.
pub type Index = i64;

/// Stable identity of a materialized item, allocated in creation order.
pub type ItemId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Identity of a materialized item as seen by observers (no user data attached).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisibleItem {
    pub id: ItemId,
    pub index: Index,
}

/// A snapshot of the buffer's bounds and size estimate.
///
/// `None` stands for "empty" (first/last) or "unbounded" (absolute bounds).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferInfo {
    pub first_index: Option<Index>,
    pub last_index: Option<Index>,
    pub min_index: Index,
    pub max_index: Index,
    pub abs_min_index: Option<Index>,
    pub abs_max_index: Option<Index>,
    pub default_size: Option<u32>,
}

/// Reload generation: an instance id plus a per-instance counter bumped by every reset/reload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReloadId {
    pub instance: u32,
    pub counter: u32,
}

impl fmt::Display for ReloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.instance, self.counter)
    }
}

/// Identifies one inner-loop iteration of one cycle of one instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleId {
    pub instance: u32,
    pub cycle: u64,
    pub inner_loop: u64,
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.instance, self.cycle, self.inner_loop)
    }
}

/// Handle for one outstanding asynchronous step (fetch or render).
///
/// `call` is the workflow generation the step was issued under; completions carrying an older
/// generation are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub call: u64,
    pub seq: u64,
}
