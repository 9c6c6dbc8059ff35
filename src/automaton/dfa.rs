//! Deterministic Finite Automata
//!
//! Worklist construction over canonical derivatives: each state is a
//! derivative-equivalence class of the source expression, the start state is
//! the normalized expression itself, and a state accepts iff its expression
//! is nullable. A symbol with no transition entry is an implicit reject: the
//! default, unlisted continuation is always a violation, and contracts must
//! use `(!e)^*` explicitly to permit "any other event".

use crate::automaton::derivative::{derive, nullable, normalize};
use crate::contract::types::FutureExpr;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

/// One automaton state
#[derive(Debug, Clone)]
pub struct DfaState {
    /// Canonical residual obligation this state denotes
    pub expr: FutureExpr,
    /// Whether the event sequence observed so far is currently valid
    pub accepting: bool,
    /// Successor per alphabet symbol; missing entries are implicit rejects
    pub transitions: BTreeMap<String, usize>,
}

/// Deterministic automaton over the registry's event alphabet
#[derive(Debug, Clone)]
pub struct Dfa {
    states: Vec<DfaState>,
    start: usize,
}

impl Dfa {
    /// Compile a future expression over the given alphabet.
    ///
    /// Terminates for all inputs: finite expression trees have finitely many
    /// canonical derivatives. Symbols whose derivative is `Empty` get no
    /// transition entry.
    pub fn compile(expr: &FutureExpr, alphabet: &BTreeSet<String>) -> Dfa {
        let start_expr = normalize(expr);
        let mut index: HashMap<FutureExpr, usize> = HashMap::new();
        let mut states: Vec<DfaState> = Vec::new();
        let mut worklist: Vec<usize> = Vec::new();

        index.insert(start_expr.clone(), 0);
        states.push(DfaState {
            accepting: nullable(&start_expr),
            expr: start_expr,
            transitions: BTreeMap::new(),
        });
        worklist.push(0);

        while let Some(state_id) = worklist.pop() {
            for symbol in alphabet {
                let successor = derive(&states[state_id].expr, symbol);
                if successor == FutureExpr::Empty {
                    continue;
                }
                let next_id = match index.get(&successor) {
                    Some(&id) => id,
                    None => {
                        let id = states.len();
                        index.insert(successor.clone(), id);
                        states.push(DfaState {
                            accepting: nullable(&successor),
                            expr: successor,
                            transitions: BTreeMap::new(),
                        });
                        worklist.push(id);
                        id
                    }
                };
                states[state_id].transitions.insert(symbol.clone(), next_id);
            }
        }

        Dfa { states, start: 0 }
    }

    /// Start state
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the automaton has no states (never true after `compile`)
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Successor of `state` on `symbol`, or `None` for the implicit reject
    pub fn step(&self, state: usize, symbol: &str) -> Option<usize> {
        self.states[state].transitions.get(symbol).copied()
    }

    /// Whether the sequence reaching `state` is currently valid
    pub fn is_accepting(&self, state: usize) -> bool {
        self.states[state].accepting
    }

    /// State table, for inspection and diagnostics
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    /// Run a full event sequence from the start state.
    ///
    /// Returns the reached state, or `Err(position)` of the first rejected
    /// symbol.
    pub fn run<'a, I>(&self, symbols: I) -> std::result::Result<usize, usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.start;
        for (position, symbol) in symbols.into_iter().enumerate() {
            state = self.step(state, symbol).ok_or(position)?;
        }
        Ok(state)
    }

    /// Human-readable state table for the `inspect` command
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (id, state) in self.states.iter().enumerate() {
            let marker = if state.accepting { "(accept)" } else { "        " };
            let start = if id == self.start { "->" } else { "  " };
            let _ = writeln!(out, "{} state {} {} {}", start, id, marker, state.expr);
            for (symbol, next) in &state.transitions {
                let _ = writeln!(out, "       {} -> state {}", symbol, next);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::types::EventSym;

    fn alphabet(symbols: &[&str]) -> BTreeSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    /// (!free)^* · free · (_)^*
    fn malloc_future() -> FutureExpr {
        FutureExpr::seq(
            FutureExpr::star(FutureExpr::Complement(EventSym::Named("free".to_string()))),
            FutureExpr::seq(
                FutureExpr::event("free"),
                FutureExpr::star(FutureExpr::Event(EventSym::Any)),
            ),
        )
    }

    /// (!_)^* · (𝝐 \/ malloc · (_)^*)
    fn free_future() -> FutureExpr {
        FutureExpr::seq(
            FutureExpr::star(FutureExpr::Complement(EventSym::Any)),
            FutureExpr::union(
                FutureExpr::Epsilon,
                FutureExpr::seq(
                    FutureExpr::event("malloc"),
                    FutureExpr::star(FutureExpr::Event(EventSym::Any)),
                ),
            ),
        )
    }

    #[test]
    fn test_determinism_by_construction() {
        let dfa = Dfa::compile(&malloc_future(), &alphabet(&["malloc", "free", "memset"]));
        // BTreeMap keys are unique: at most one successor per symbol. Check
        // every successor is a valid state id.
        for state in dfa.states() {
            for (_, &next) in &state.transitions {
                assert!(next < dfa.len());
            }
        }
    }

    #[test]
    fn test_star_accepts_empty_at_start() {
        let expr = FutureExpr::star(FutureExpr::event("free"));
        let dfa = Dfa::compile(&expr, &alphabet(&["free"]));
        assert!(dfa.is_accepting(dfa.start()));
    }

    #[test]
    fn test_sequence_round_trip() {
        let expr = FutureExpr::seq(FutureExpr::event("a"), FutureExpr::event("b"));
        let dfa = Dfa::compile(&expr, &alphabet(&["a", "b"]));

        let end = dfa.run(["a", "b"]).expect("a·b must be accepted");
        assert!(dfa.is_accepting(end));

        // Wrong order rejects at the first symbol
        assert_eq!(dfa.run(["b", "a"]), Err(0));
    }

    #[test]
    fn test_malloc_future_accepts_use_then_free() {
        let dfa = Dfa::compile(&malloc_future(), &alphabet(&["malloc", "free", "memset"]));
        assert!(!dfa.is_accepting(dfa.start()));

        let end = dfa.run(["memset", "memset", "free"]).unwrap();
        assert!(dfa.is_accepting(end));

        // Without the free, the sequence is extendable but not yet valid
        let pending = dfa.run(["memset"]).unwrap();
        assert!(!dfa.is_accepting(pending));
    }

    #[test]
    fn test_free_future_rejects_second_free() {
        let dfa = Dfa::compile(&free_future(), &alphabet(&["malloc", "free", "memset"]));
        // Nothing after a free is fine
        assert!(dfa.is_accepting(dfa.start()));
        // Another event on the freed value rejects immediately unless it is
        // a re-allocation
        assert_eq!(dfa.run(["free"]), Err(0));
        assert_eq!(dfa.run(["memset"]), Err(0));
        let realloc = dfa.run(["malloc"]).unwrap();
        assert!(dfa.is_accepting(realloc));
        assert!(dfa.run(["malloc", "free"]).is_ok());
    }

    #[test]
    fn test_implicit_reject_for_unlisted_symbol() {
        let expr = FutureExpr::event("a");
        let dfa = Dfa::compile(&expr, &alphabet(&["a", "b"]));
        assert!(dfa.step(dfa.start(), "b").is_none());
    }

    #[test]
    fn test_no_event_expression_rejects_everything() {
        // (!_)^*: only the empty sequence
        let expr = FutureExpr::star(FutureExpr::Complement(EventSym::Any));
        let dfa = Dfa::compile(&expr, &alphabet(&["malloc", "free"]));
        assert!(dfa.is_accepting(dfa.start()));
        assert_eq!(dfa.run(["free"]), Err(0));
        assert_eq!(dfa.run(["malloc"]), Err(0));
    }

    #[test]
    fn test_state_merging_keeps_automaton_small() {
        // (!free)^* self-loops in a single state
        let expr = FutureExpr::star(FutureExpr::Complement(EventSym::Named("free".to_string())));
        let dfa = Dfa::compile(&expr, &alphabet(&["malloc", "free", "memset", "strcpy"]));
        assert_eq!(dfa.len(), 1);
        assert_eq!(dfa.step(dfa.start(), "memset"), Some(dfa.start()));
    }

    #[test]
    fn test_describe_lists_states() {
        let dfa = Dfa::compile(&malloc_future(), &alphabet(&["free", "memset"]));
        let text = dfa.describe();
        assert!(text.contains("state 0"));
        assert!(text.contains("free"));
    }
}
