use core::fmt;

use crate::{CycleId, Index, ItemId, Process, SettingsError};

/// A malformed command argument, detected before the command enters the workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    /// The command needs at least one item.
    NoItems { process: Process },
    /// `remove` by indexes got an empty list.
    NoIndexes,
    /// `clip` cannot be both forward-only and backward-only.
    ClipConflict,
    /// `fix` got no field to apply.
    NothingToFix,
    /// `fix` got `min_index > max_index`.
    FixBounds { min: Index, max: Index },
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems { process } => write!(f, "{process}: items must not be empty"),
            Self::NoIndexes => write!(f, "remove: indexes must not be empty"),
            Self::ClipConflict => {
                write!(f, "clip: forward_only and backward_only are mutually exclusive")
            }
            Self::NothingToFix => write!(f, "fix: at least one option is required"),
            Self::FixBounds { min, max } => {
                write!(f, "fix: min_index ({min}) must not exceed max_index ({max})")
            }
        }
    }
}

impl std::error::Error for ArgumentError {}

/// A failure reported by the datasource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasourceError {
    message: String,
}

impl DatasourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DatasourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "datasource: {}", self.message)
    }
}

impl std::error::Error for DatasourceError {}

/// Every failure a cycle can end with.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Argument(ArgumentError),
    Datasource(DatasourceError),
    /// The host could not measure a materialized item.
    ElementNotFound { id: ItemId, index: Index },
    Settings(SettingsError),
    /// The workflow was disposed.
    Disposed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(e) => write!(f, "invalid argument: {e}"),
            Self::Datasource(e) => write!(f, "{e}"),
            Self::ElementNotFound { id, index } => {
                write!(f, "element of item {id} (index {index}) not found")
            }
            Self::Settings(e) => write!(f, "invalid settings: {e}"),
            Self::Disposed => write!(f, "workflow is disposed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Argument(e) => Some(e),
            Self::Datasource(e) => Some(e),
            Self::Settings(e) => Some(e),
            Self::ElementNotFound { .. } | Self::Disposed => None,
        }
    }
}

impl From<ArgumentError> for Error {
    fn from(e: ArgumentError) -> Self {
        Self::Argument(e)
    }
}

impl From<DatasourceError> for Error {
    fn from(e: DatasourceError) -> Self {
        Self::Datasource(e)
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

/// One entry of the workflow's error log.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorRecord {
    pub process: Process,
    pub cycle: CycleId,
    pub time_ms: u64,
    pub error: Error,
}
