//! Event Stream Abstraction
//!
//! The external-collaborator interface: per explored program path, an
//! ordered, finite, restartable sequence of call events and alias facts.

pub mod stream;
pub mod types;

pub use stream::{EventStream, ReplayStream, TraceFile, TracePath};
pub use types::{ArgValue, CallEvent, PathEvent, ValueId};
