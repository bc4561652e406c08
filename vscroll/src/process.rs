use core::fmt;

/// Every step the workflow can run.
///
/// The first group (`Reset` through `Fix`) are adapter processes: the entry points of
/// commands. `Init` and `Scroll` start cycles; the rest form the inner loop.
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Process {
    Init,
    Scroll,
    Reset,
    Reload,
    Append,
    Prepend,
    Check,
    Remove,
    /// `clip` issued through the adapter (as opposed to the inner-loop [`Process::Clip`]).
    UserClip,
    Insert,
    Replace,
    Update,
    Fix,
    Start,
    PreFetch,
    Fetch,
    PostFetch,
    Render,
    PreClip,
    Clip,
    Adjust,
    End,
}

impl Process {
    pub fn is_adapter(self) -> bool {
        matches!(
            self,
            Self::Reset
                | Self::Reload
                | Self::Append
                | Self::Prepend
                | Self::Check
                | Self::Remove
                | Self::UserClip
                | Self::Insert
                | Self::Replace
                | Self::Update
                | Self::Fix
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Scroll => "scroll",
            Self::Reset => "adapter.reset",
            Self::Reload => "adapter.reload",
            Self::Append => "adapter.append",
            Self::Prepend => "adapter.prepend",
            Self::Check => "adapter.check",
            Self::Remove => "adapter.remove",
            Self::UserClip => "adapter.clip",
            Self::Insert => "adapter.insert",
            Self::Replace => "adapter.replace",
            Self::Update => "adapter.update",
            Self::Fix => "adapter.fix",
            Self::Start => "start",
            Self::PreFetch => "preFetch",
            Self::Fetch => "fetch",
            Self::PostFetch => "postFetch",
            Self::Render => "render",
            Self::PreClip => "preClip",
            Self::Clip => "clip",
            Self::Adjust => "adjust",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome reported by a process when it finishes.
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessStatus {
    Start,
    Next,
    Done,
    Error,
}
