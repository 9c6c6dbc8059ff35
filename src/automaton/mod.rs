//! Regex-to-Automaton Compiler
//!
//! Compiles Future temporal expressions into deterministic finite automata
//! via Brzozowski derivatives with canonical normalization.

pub mod derivative;
pub mod dfa;

pub use dfa::Dfa;
