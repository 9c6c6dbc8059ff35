//! Contract Source Parser
//!
//! Lexer and recursive-descent parser for the textual contract syntax:
//! `name(params):` headers, guarded `Post` effects and `Future` temporal
//! expressions, with `𝝐`, `·`, `\/`, `^*`, `!` and `_` operators.

pub mod grammar;
pub mod lexer;

pub use grammar::{parse_contract, split_blocks, ContractBlock};
