pub(crate) mod engine;
pub(crate) mod runner;

pub(crate) use engine::{CountdownWarning, SessionEngine};
pub(crate) use runner::{
    SessionCommand, SessionEvent, SessionOutcome, SessionRunner, ViewSnapshot,
};
