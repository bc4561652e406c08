use core::fmt;

use crate::{ArgumentError, Datasource, Error, Index, Item, Patch, Process, Settings};

pub type ItemPredicate<D> = Box<dyn FnMut(&Item<D>) -> bool>;
pub type ItemUpdater<D> = Box<dyn FnMut(&Item<D>) -> Patch<D>>;
pub type ItemMutator<D> = Box<dyn FnMut(&mut Item<D>)>;

/// Overrides applied by `reset`. Missing fields keep the current value.
pub struct ResetOptions<D> {
    pub datasource: Option<Box<dyn Datasource<D>>>,
    pub settings: Option<Settings>,
}

impl<D> Default for ResetOptions<D> {
    fn default() -> Self {
        Self {
            datasource: None,
            settings: None,
        }
    }
}

pub enum RemoveTarget<D> {
    Predicate(ItemPredicate<D>),
    Indexes(Vec<Index>),
}

pub enum InsertPosition<D> {
    /// Before the first materialized item matching the predicate.
    Before(ItemPredicate<D>),
    /// After the first materialized item matching the predicate.
    After(ItemPredicate<D>),
    BeforeIndex(Index),
    AfterIndex(Index),
}

/// Synchronous adjustments applied by `fix`.
pub struct FixOptions<D> {
    pub scroll_position: Option<u64>,
    pub min_index: Option<Index>,
    pub max_index: Option<Index>,
    /// Runs over every materialized item.
    pub updater: Option<ItemMutator<D>>,
    /// Scrolls so that the first matching item is at the top of the viewport.
    pub scroll_to_item: Option<ItemPredicate<D>>,
}

impl<D> Default for FixOptions<D> {
    fn default() -> Self {
        Self {
            scroll_position: None,
            min_index: None,
            max_index: None,
            updater: None,
            scroll_to_item: None,
        }
    }
}

/// A call made through the command surface.
pub enum Command<D> {
    Reset(ResetOptions<D>),
    Reload {
        start_index: Option<Index>,
    },
    Append {
        items: Vec<D>,
        eof: bool,
    },
    Prepend {
        items: Vec<D>,
        bof: bool,
    },
    Check,
    Remove {
        target: RemoveTarget<D>,
        /// Keep high indexes in place.
        increase: bool,
    },
    Clip {
        forward_only: bool,
        backward_only: bool,
    },
    Insert {
        items: Vec<D>,
        position: InsertPosition<D>,
        /// Keep high indexes in place.
        decrease: bool,
    },
    Replace {
        items: Vec<D>,
        predicate: ItemPredicate<D>,
        fix_right: bool,
    },
    Update {
        updater: ItemUpdater<D>,
        fix_right: bool,
    },
    Fix(FixOptions<D>),
}

impl<D> Command<D> {
    /// The adapter process this command enters the workflow through.
    pub fn process(&self) -> Process {
        match self {
            Self::Reset(_) => Process::Reset,
            Self::Reload { .. } => Process::Reload,
            Self::Append { .. } => Process::Append,
            Self::Prepend { .. } => Process::Prepend,
            Self::Check => Process::Check,
            Self::Remove { .. } => Process::Remove,
            Self::Clip { .. } => Process::UserClip,
            Self::Insert { .. } => Process::Insert,
            Self::Replace { .. } => Process::Replace,
            Self::Update { .. } => Process::Update,
            Self::Fix(_) => Process::Fix,
        }
    }

    /// `reset` and `reload` interrupt a running cycle instead of waiting for it.
    pub fn interrupts(&self) -> bool {
        matches!(self, Self::Reset(_) | Self::Reload { .. })
    }

    /// Checks the arguments before the command enters the workflow.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_arguments()?;
        if let Self::Reset(ResetOptions {
            settings: Some(settings),
            ..
        }) = self
        {
            settings.validate()?;
        }
        Ok(())
    }

    fn check_arguments(&self) -> Result<(), ArgumentError> {
        match self {
            Self::Append { items, .. } | Self::Prepend { items, .. } | Self::Insert { items, .. }
                if items.is_empty() =>
            {
                Err(ArgumentError::NoItems {
                    process: self.process(),
                })
            }
            Self::Remove {
                target: RemoveTarget::Indexes(indexes),
                ..
            } if indexes.is_empty() => Err(ArgumentError::NoIndexes),
            Self::Clip {
                forward_only: true,
                backward_only: true,
            } => Err(ArgumentError::ClipConflict),
            Self::Fix(options) => {
                if options.scroll_position.is_none()
                    && options.min_index.is_none()
                    && options.max_index.is_none()
                    && options.updater.is_none()
                    && options.scroll_to_item.is_none()
                {
                    return Err(ArgumentError::NothingToFix);
                }
                match (options.min_index, options.max_index) {
                    (Some(min), Some(max)) if min > max => {
                        Err(ArgumentError::FixBounds { min, max })
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

impl<D> fmt::Debug for Command<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset(options) => f
                .debug_struct("Reset")
                .field("datasource", &options.datasource.is_some())
                .field("settings", &options.settings)
                .finish(),
            Self::Reload { start_index } => f
                .debug_struct("Reload")
                .field("start_index", start_index)
                .finish(),
            Self::Append { items, eof } => f
                .debug_struct("Append")
                .field("items", &items.len())
                .field("eof", eof)
                .finish(),
            Self::Prepend { items, bof } => f
                .debug_struct("Prepend")
                .field("items", &items.len())
                .field("bof", bof)
                .finish(),
            Self::Check => f.write_str("Check"),
            Self::Remove { target, increase } => {
                let target = match target {
                    RemoveTarget::Predicate(_) => "predicate".to_string(),
                    RemoveTarget::Indexes(indexes) => format!("{indexes:?}"),
                };
                f.debug_struct("Remove")
                    .field("target", &target)
                    .field("increase", increase)
                    .finish()
            }
            Self::Clip {
                forward_only,
                backward_only,
            } => f
                .debug_struct("Clip")
                .field("forward_only", forward_only)
                .field("backward_only", backward_only)
                .finish(),
            Self::Insert {
                items,
                position,
                decrease,
            } => {
                let position = match position {
                    InsertPosition::Before(_) => "before".to_string(),
                    InsertPosition::After(_) => "after".to_string(),
                    InsertPosition::BeforeIndex(i) => format!("before_index({i})"),
                    InsertPosition::AfterIndex(i) => format!("after_index({i})"),
                };
                f.debug_struct("Insert")
                    .field("items", &items.len())
                    .field("position", &position)
                    .field("decrease", decrease)
                    .finish()
            }
            Self::Replace {
                items, fix_right, ..
            } => f
                .debug_struct("Replace")
                .field("items", &items.len())
                .field("fix_right", fix_right)
                .finish(),
            Self::Update { fix_right, .. } => f
                .debug_struct("Update")
                .field("fix_right", fix_right)
                .finish(),
            Self::Fix(options) => f
                .debug_struct("Fix")
                .field("scroll_position", &options.scroll_position)
                .field("min_index", &options.min_index)
                .field("max_index", &options.max_index)
                .field("updater", &options.updater.is_some())
                .field("scroll_to_item", &options.scroll_to_item.is_some())
                .finish(),
        }
    }
}
