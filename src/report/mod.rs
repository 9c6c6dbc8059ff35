//! Diagnostic Reporter
//!
//! Structured findings with violation witnesses, and the cross-path
//! aggregation that deduplicates semantically identical counterexamples.

pub mod finding;
pub mod reporter;

pub use finding::{Finding, FindingKind};
pub use reporter::{Report, Reporter};
