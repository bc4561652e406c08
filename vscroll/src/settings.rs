use core::fmt;

use crate::{Index, SizeStrategy};

/// Configuration for [`crate::Workflow`].
///
/// All fields are public; the `with_*` helpers exist for chained construction. Call
/// [`Settings::validate`] (or let `Workflow::new` call it) before use.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// Index of the item placed at the top of the viewport on start and on reload.
    pub start_index: Index,
    /// Lowest index of the dataset, when known up front.
    pub min_index: Option<Index>,
    /// Highest index of the dataset, when known up front.
    pub max_index: Option<Index>,
    /// Size assumed for items that were never rendered (before any measurement).
    pub item_size: Option<u32>,
    /// Minimal number of items requested per fetch.
    pub buffer_size: usize,
    /// Portion of the viewport size that is kept rendered beyond each edge of the viewport.
    pub padding: f64,
    /// Never clip items on scroll.
    pub infinite: bool,
    /// How the default size of never-rendered items is estimated.
    pub size_strategy: SizeStrategy,
    /// Keep a copy of item data in the cache, not just sizes.
    pub cache_data: bool,
    /// Keep cached sizes across `reload`.
    pub cache_on_reload: bool,
    /// Delay before the first cycle, in milliseconds.
    pub init_delay_ms: u64,
    /// Minimal distance between two handled scroll events, in milliseconds.
    pub throttle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_index: 1,
            min_index: None,
            max_index: None,
            item_size: None,
            buffer_size: 5,
            padding: 0.5,
            infinite: false,
            size_strategy: SizeStrategy::Average,
            cache_data: false,
            cache_on_reload: false,
            init_delay_ms: 0,
            throttle_ms: 40,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_index(mut self, start_index: Index) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_min_index(mut self, min_index: Option<Index>) -> Self {
        self.min_index = min_index;
        self
    }

    pub fn with_max_index(mut self, max_index: Option<Index>) -> Self {
        self.max_index = max_index;
        self
    }

    pub fn with_bounds(mut self, min_index: Index, max_index: Index) -> Self {
        self.min_index = Some(min_index);
        self.max_index = Some(max_index);
        self
    }

    pub fn with_item_size(mut self, item_size: Option<u32>) -> Self {
        self.item_size = item_size;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_infinite(mut self, infinite: bool) -> Self {
        self.infinite = infinite;
        self
    }

    pub fn with_size_strategy(mut self, size_strategy: SizeStrategy) -> Self {
        self.size_strategy = size_strategy;
        self
    }

    pub fn with_cache_data(mut self, cache_data: bool) -> Self {
        self.cache_data = cache_data;
        self
    }

    pub fn with_cache_on_reload(mut self, cache_on_reload: bool) -> Self {
        self.cache_on_reload = cache_on_reload;
        self
    }

    pub fn with_init_delay_ms(mut self, delay_ms: u64) -> Self {
        self.init_delay_ms = delay_ms;
        self
    }

    pub fn with_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.throttle_ms = throttle_ms;
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.buffer_size == 0 {
            return Err(SettingsError::BufferSize);
        }
        if !self.padding.is_finite() || self.padding <= 0.0 {
            return Err(SettingsError::Padding);
        }
        if self.item_size == Some(0) {
            return Err(SettingsError::ItemSize);
        }
        if let (Some(min), Some(max)) = (self.min_index, self.max_index) {
            if min > max {
                return Err(SettingsError::Bounds { min, max });
            }
        }
        Ok(())
    }

    /// `start_index` clamped into `[min_index, max_index]`.
    pub(crate) fn clamped_start_index(&self, start_index: Index) -> Index {
        let mut index = start_index;
        if let Some(max) = self.max_index {
            index = index.min(max);
        }
        if let Some(min) = self.min_index {
            index = index.max(min);
        }
        index
    }
}

/// A construction-time settings violation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SettingsError {
    /// `buffer_size` must be at least 1.
    BufferSize,
    /// `padding` must be a finite, positive fraction.
    Padding,
    /// `item_size` must be positive when set.
    ItemSize,
    /// `min_index` is greater than `max_index`.
    Bounds { min: Index, max: Index },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferSize => write!(f, "buffer_size must be at least 1"),
            Self::Padding => write!(f, "padding must be a finite positive number"),
            Self::ItemSize => write!(f, "item_size must be positive"),
            Self::Bounds { min, max } => {
                write!(f, "min_index ({min}) must not exceed max_index ({max})")
            }
        }
    }
}

impl std::error::Error for SettingsError {}
