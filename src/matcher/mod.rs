//! Tracked-Value Matcher
//!
//! Replays per-path call events against the automata of tracked values,
//! detects violations, and evaluates exit-time obligations.

pub mod path_matcher;
pub mod tracked_value;

pub use path_matcher::{AnalysisBudget, PathMatcher};
pub use tracked_value::{TrackState, TrackedValue};
