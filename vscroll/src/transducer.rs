//! The routing table of the workflow: which process runs after which.
//!
//! [`next`] is pure; all effects happen in the process handlers and the [`crate::Workflow`]
//! driver that executes the returned [`Instruction`].

use crate::{Command, Error, Process, ProcessStatus};

/// Data travelling with a signal.
pub enum Payload<D> {
    Empty,
    /// The command an adapter process was started with.
    Command(Command<D>),
    /// The process that started the cycle, handed to `init`.
    Initiator(Process),
    /// Emitted by reset/reload once their handler has run.
    Interrupt { finalize: bool, datasource_swap: bool },
    /// Emitted by the simulated-fetch processes.
    Proceed { render: bool, clip: bool },
    /// Data returned by the datasource.
    Fetched(Vec<D>),
    Error(Error),
}

impl<D> core::fmt::Debug for Payload<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Command(c) => f.debug_tuple("Command").field(c).finish(),
            Self::Initiator(p) => f.debug_tuple("Initiator").field(p).finish(),
            Self::Interrupt {
                finalize,
                datasource_swap,
            } => f
                .debug_struct("Interrupt")
                .field("finalize", finalize)
                .field("datasource_swap", datasource_swap)
                .finish(),
            Self::Proceed { render, clip } => f
                .debug_struct("Proceed")
                .field("render", render)
                .field("clip", clip)
                .finish(),
            Self::Fetched(items) => f.debug_tuple("Fetched").field(&items.len()).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

/// A process reporting its outcome.
#[derive(Debug)]
pub struct Signal<D> {
    pub process: Process,
    pub status: ProcessStatus,
    pub payload: Payload<D>,
}

impl<D> Signal<D> {
    pub fn new(process: Process, status: ProcessStatus, payload: Payload<D>) -> Self {
        Self {
            process,
            status,
            payload,
        }
    }

    pub fn next(process: Process) -> Self {
        Self::new(process, ProcessStatus::Next, Payload::Empty)
    }

    pub fn done(process: Process) -> Self {
        Self::new(process, ProcessStatus::Done, Payload::Empty)
    }

    pub fn error(process: Process, error: Error) -> Self {
        Self::new(process, ProcessStatus::Error, Payload::Error(error))
    }
}

/// What the driver does next.
#[derive(Debug)]
pub enum Instruction<D> {
    Run { process: Process, payload: Payload<D> },
    /// Tear down in-flight work, then run `init` for a new cycle started by `process`.
    Interrupt {
        process: Process,
        finalize: bool,
        datasource_swap: bool,
    },
    /// Record the error; `end` runs the `end` process with it, otherwise the cycle stops.
    Fail {
        process: Process,
        error: Error,
        end: bool,
    },
    /// The cycle has no further work.
    Done,
}

fn run<D>(process: Process, payload: Payload<D>) -> Instruction<D> {
    Instruction::Run { process, payload }
}

fn proceed<D>(render: bool, clip: bool) -> Instruction<D> {
    if render {
        run(Process::Render, Payload::Empty)
    } else if clip {
        run(Process::Clip, Payload::Empty)
    } else {
        run(Process::Adjust, Payload::Empty)
    }
}

/// Maps a signal to the next instruction.
pub fn next<D>(signal: Signal<D>) -> Instruction<D> {
    use Process as P;
    use ProcessStatus as S;

    let Signal {
        process,
        status,
        payload,
    } = signal;

    if status == S::Error {
        let error = match payload {
            Payload::Error(e) => e,
            _ => Error::Disposed,
        };
        return Instruction::Fail {
            process,
            error,
            end: !process.is_adapter(),
        };
    }

    match (process, status) {
        (P::Init, S::Start) => run(P::Init, payload),
        (P::Init, S::Next) => run(P::Start, Payload::Empty),
        (P::Scroll, S::Start) => run(P::Scroll, payload),
        (P::Scroll, S::Next) => run(P::Init, Payload::Initiator(P::Scroll)),
        (P::Reset | P::Reload, S::Start) => run(process, payload),
        (P::Reset | P::Reload, S::Next) => match payload {
            Payload::Interrupt {
                finalize,
                datasource_swap,
            } => Instruction::Interrupt {
                process,
                finalize,
                datasource_swap,
            },
            _ => run(P::Init, Payload::Initiator(process)),
        },
        (
            P::Append
            | P::Prepend
            | P::Check
            | P::Remove
            | P::UserClip
            | P::Insert
            | P::Replace
            | P::Update
            | P::Fix,
            S::Start,
        ) => run(process, payload),
        (
            P::Append | P::Prepend | P::Check | P::Remove | P::Insert | P::Replace | P::Update,
            S::Next,
        ) => match payload {
            Payload::Proceed { render, clip } => proceed(render, clip),
            _ => run(P::Adjust, Payload::Empty),
        },
        (P::UserClip, S::Next) => run(P::PreClip, Payload::Empty),
        (P::Fix, S::Next) => run(P::Start, Payload::Empty),
        (_, S::Done) if process.is_adapter() => run(P::End, Payload::Empty),
        (P::Start, S::Next) => run(P::PreFetch, Payload::Empty),
        (P::PreFetch, S::Next) => run(P::Fetch, Payload::Empty),
        (P::PreFetch, S::Done) => run(P::Adjust, Payload::Empty),
        (P::Fetch, S::Next) => run(P::PostFetch, payload),
        (P::PostFetch, S::Next) => run(P::Render, Payload::Empty),
        (P::PostFetch, S::Done) => run(P::Adjust, Payload::Empty),
        (P::Render, S::Next) => run(P::PreClip, Payload::Empty),
        (P::PreClip, S::Next) => match payload {
            Payload::Proceed { clip: true, .. } => run(P::Clip, Payload::Empty),
            _ => run(P::Adjust, Payload::Empty),
        },
        (P::Clip, S::Next) => run(P::Adjust, Payload::Empty),
        (P::Adjust, S::Next) => run(P::End, Payload::Empty),
        (P::End, S::Next) => run(P::Start, Payload::Empty),
        (P::End, S::Done) => Instruction::Done,
        _ => {
            vwarn!(%process, ?status, "transducer: unexpected signal");
            Instruction::Done
        }
    }
}
