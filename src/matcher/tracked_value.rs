//! Tracked Values
//!
//! One `TrackedValue` exists per abstract identity whose lifecycle a
//! contract governs, from creation until its automaton reaches a terminal
//! decision or the path ends. The creation event is the first entry of the
//! value's witness history; the automaton constrains the value's subsequent
//! event sequence.

use crate::automaton::dfa::Dfa;
use crate::event::types::ValueId;
use crate::report::finding::FindingKind;
use std::sync::Arc;

/// Lifecycle state of a tracked value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Matching; the automaton is in the given state
    Active(usize),
    /// The automaton rejected; further events on this identity are ignored
    /// (fail once per value, not once per event)
    Rejected,
    /// Path ended with the automaton in an accepting state
    AcceptedAtExit,
    /// Ownership transferred away; no further obligations, but further
    /// events are errors
    Consumed,
    /// No verdict (alias conflict); excluded from further matching
    Unknown,
}

/// Outcome of delivering one event symbol to a tracked value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The automaton advanced
    Advanced,
    /// No transition was defined for the symbol: a violation
    Rejected,
}

/// A value whose remaining event sequence a contract obligation governs
#[derive(Debug, Clone)]
pub struct TrackedValue {
    /// Abstract identity this value tracks
    pub id: ValueId,
    /// Call site that created the value
    pub creation_site: String,
    /// Name of the contract that created the value
    pub contract: String,
    /// Event symbol emitted by the creating Post effect, if any
    pub creation_event: Option<String>,
    /// The value's creation resolved to null; any event on it dereferences
    pub null_origin: bool,
    /// Compiled obligation automaton
    pub dfa: Arc<Dfa>,
    /// Current lifecycle state
    pub state: TrackState,
    /// Ordered event symbols observed on this identity (the witness)
    pub history: Vec<String>,
    /// Creation order within the path; alias merges fold later into earlier
    pub seq: u64,
}

impl TrackedValue {
    /// Instantiate a tracked value in its automaton's start state
    pub fn new(
        id: ValueId,
        creation_site: &str,
        contract: &str,
        creation_event: Option<&str>,
        null_origin: bool,
        dfa: Arc<Dfa>,
        seq: u64,
    ) -> Self {
        let state = TrackState::Active(dfa.start());
        let history = creation_event.map(|e| vec![e.to_string()]).unwrap_or_default();
        Self {
            id,
            creation_site: creation_site.to_string(),
            contract: contract.to_string(),
            creation_event: creation_event.map(|e| e.to_string()),
            null_origin,
            dfa,
            state,
            history,
            seq,
        }
    }

    /// Whether the value is still being matched
    pub fn is_live(&self) -> bool {
        matches!(self.state, TrackState::Active(_))
    }

    /// Deliver one event symbol.
    ///
    /// Must only be called while `Active`; records the symbol in the witness
    /// history and either advances the automaton or moves to `Rejected`.
    pub fn observe(&mut self, symbol: &str) -> Observation {
        let TrackState::Active(state) = self.state else {
            return Observation::Advanced;
        };
        self.history.push(symbol.to_string());
        match self.dfa.step(state, symbol) {
            Some(next) => {
                self.state = TrackState::Active(next);
                Observation::Advanced
            }
            None => {
                self.state = TrackState::Rejected;
                Observation::Rejected
            }
        }
    }

    /// Automaton state while active
    pub fn automaton_state(&self) -> Option<usize> {
        match self.state {
            TrackState::Active(state) => Some(state),
            _ => None,
        }
    }

    /// Classify a rejection of `symbol` on this value
    pub fn classify_rejection(&self, symbol: &str) -> FindingKind {
        if self.null_origin {
            FindingKind::NullDeref
        } else if self.creation_event.as_deref() == Some(symbol) {
            FindingKind::DoubleRelease
        } else {
            FindingKind::UseAfterRelease
        }
    }

    /// Evaluate the exit obligation at path end.
    ///
    /// Returns `false` when the value is still active in a non-accepting
    /// state (the obligation was never discharged).
    pub fn finish(&mut self) -> bool {
        match self.state {
            TrackState::Active(state) => {
                if self.dfa.is_accepting(state) {
                    self.state = TrackState::AcceptedAtExit;
                    true
                } else {
                    false
                }
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::types::{EventSym, FutureExpr};
    use std::collections::BTreeSet;

    fn alphabet() -> BTreeSet<String> {
        ["malloc", "free", "memset"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// (!free)^* · free · (_)^*
    fn malloc_dfa() -> Arc<Dfa> {
        let expr = FutureExpr::seq(
            FutureExpr::star(FutureExpr::Complement(EventSym::Named("free".to_string()))),
            FutureExpr::seq(
                FutureExpr::event("free"),
                FutureExpr::star(FutureExpr::Event(EventSym::Any)),
            ),
        );
        Arc::new(Dfa::compile(&expr, &alphabet()))
    }

    /// (!_)^*
    fn null_dfa() -> Arc<Dfa> {
        let expr = FutureExpr::star(FutureExpr::Complement(EventSym::Any));
        Arc::new(Dfa::compile(&expr, &alphabet()))
    }

    fn make_tracked(dfa: Arc<Dfa>, creation: Option<&str>, null_origin: bool) -> TrackedValue {
        TrackedValue::new(
            ValueId(1),
            "alloc.c:10",
            "malloc",
            creation,
            null_origin,
            dfa,
            0,
        )
    }

    #[test]
    fn test_creation_event_seeds_history() {
        let tracked = make_tracked(malloc_dfa(), Some("malloc"), false);
        assert_eq!(tracked.history, vec!["malloc".to_string()]);
        assert!(tracked.is_live());
    }

    #[test]
    fn test_observe_advances_and_accepts() {
        let mut tracked = make_tracked(malloc_dfa(), Some("malloc"), false);
        assert_eq!(tracked.observe("memset"), Observation::Advanced);
        assert_eq!(tracked.observe("free"), Observation::Advanced);
        assert!(tracked.finish());
        assert_eq!(tracked.state, TrackState::AcceptedAtExit);
    }

    #[test]
    fn test_unmet_obligation_at_exit() {
        let mut tracked = make_tracked(malloc_dfa(), Some("malloc"), false);
        assert!(!tracked.finish());
        assert!(!tracked.is_live());
        assert_ne!(tracked.state, TrackState::AcceptedAtExit);
    }

    #[test]
    fn test_null_origin_rejects_any_event() {
        let mut tracked = make_tracked(null_dfa(), None, true);
        assert!(tracked.history.is_empty());
        assert_eq!(tracked.observe("memset"), Observation::Rejected);
        assert_eq!(tracked.state, TrackState::Rejected);
        assert_eq!(tracked.classify_rejection("memset"), FindingKind::NullDeref);
    }

    #[test]
    fn test_rejection_classification() {
        let tracked = make_tracked(malloc_dfa(), Some("free"), false);
        assert_eq!(tracked.classify_rejection("free"), FindingKind::DoubleRelease);
        assert_eq!(
            tracked.classify_rejection("memset"),
            FindingKind::UseAfterRelease
        );
    }

    #[test]
    fn test_witness_records_rejecting_symbol() {
        let mut tracked = make_tracked(null_dfa(), None, true);
        tracked.observe("memset");
        assert_eq!(tracked.history, vec!["memset".to_string()]);
    }

    #[test]
    fn test_consumed_and_unknown_pass_exit_check() {
        let mut consumed = make_tracked(malloc_dfa(), Some("malloc"), false);
        consumed.state = TrackState::Consumed;
        assert!(consumed.finish());

        let mut unknown = make_tracked(malloc_dfa(), Some("malloc"), false);
        unknown.state = TrackState::Unknown;
        assert!(unknown.finish());
    }
}
