//! Analysis Workflow
//!
//! End-to-end orchestration: load and compile contracts, replay every path
//! of a trace through the matcher, and aggregate the findings into a report.

pub mod engine;

pub use engine::{analyze_path, load_contracts, Engine};
