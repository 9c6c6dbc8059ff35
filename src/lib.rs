//! # Tracecheck
//!
//! A contract-driven resource-safety verification engine. Tracecheck loads
//! Hoare-style API-usage contracts, compiles their temporal "Future"
//! obligations into deterministic finite automata, and replays per-path call
//! traces against those automata to find memory leaks, double-frees,
//! use-after-free, null dereferences, and aliasing conflicts.
//!
//! ## Overview
//!
//! A contract declares, per library function, a guarded postcondition (which
//! abstract event the call produces, bound to one of its argument/return
//! identities) and an optional Future obligation: a regular expression over
//! the events that must subsequently occur on the produced value. For
//! example, a non-null `malloc` result must eventually be `free`d exactly
//! once:
//!
//! ```text
//! malloc(path):
//!     Post (ret=0, 𝝐) \/ (!(ret=0), malloc(ret))
//!     Future (!(ret=0), (!free(ret))^* · free(ret) · (_)^*)
//! ```
//!
//! The C front end that produces call events and the alias analysis that
//! relates value identities are external collaborators; this crate consumes
//! contracts and event streams as given.
//!
//! ## Architecture
//!
//! The system is organized into the following modules:
//!
//! - [`contract`]: Contract model (guards, effects, future expressions) and registry
//! - [`parser`]: Lexer and parser for the textual contract syntax
//! - [`automaton`]: Brzozowski-derivative regex-to-DFA compiler
//! - [`event`]: Event stream abstraction (call events, alias facts, trace files)
//! - [`matcher`]: Tracked values and the per-path matcher
//! - [`report`]: Findings, deduplicating reporter, analysis reports
//! - [`workflow`]: High-level engine API and parallel trace analysis
//! - [`app`]: CLI and configuration management
//!
//! ## Analysis Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Contract   │───▶│   Parser    │───▶│  Registry   │───▶│     DFA     │
//! │  Source     │    │             │    │ (validated) │    │  Compiler   │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │
//!                                                                 ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Report    │◀───│  Reporter   │◀───│    Path     │◀───│    Event    │
//! │   Output    │    │   (dedup)   │    │   Matcher   │    │   Streams   │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! The registry is built once at start-up and is immutable thereafter; it is
//! passed by reference to every matcher. Paths are analyzed independently and
//! may be processed in parallel with no shared mutable state.

pub mod app;
pub mod automaton;
pub mod contract;
pub mod event;
pub mod matcher;
pub mod parser;
pub mod report;
pub mod workflow;

// Re-export commonly used types
pub use automaton::dfa::Dfa;
pub use contract::registry::Registry;
pub use contract::types::{Contract, FutureExpr, Guard, PostEffect};
pub use event::stream::{EventStream, ReplayStream, TraceFile};
pub use event::types::{ArgValue, CallEvent, PathEvent, ValueId};
pub use report::finding::{Finding, FindingKind};
pub use report::reporter::{Report, Reporter};
pub use workflow::engine::{analyze_path, load_contracts, Engine};

/// Result type alias for the verification engine
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the verification engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Duplicate contract: {0}")]
    DuplicateContract(String),

    #[error("Ambiguous guards in contract '{contract}': {detail}")]
    AmbiguousGuards { contract: String, detail: String },

    #[error("Malformed expression in contract '{contract}': event '{event}' is not declared by any contract effect")]
    MalformedExpression { contract: String, event: String },

    #[error("Trace error: {0}")]
    Trace(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
