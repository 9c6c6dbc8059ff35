//! Per-Path Matching
//!
//! The matcher owns all tracked values of one program path. Events are
//! applied strictly in program order: the automaton transition function is
//! not commutative, so ordering is a correctness requirement. Each path
//! carries a step budget; exceeding it aborts the path with an `Unknown`
//! verdict rather than a false "safe".

use crate::contract::registry::Registry;
use crate::contract::types::{Contract, FutureBranch, PostBranch, PostEffect};
use crate::event::types::{ArgValue, CallEvent, PathEvent, ValueId};
use crate::matcher::tracked_value::{Observation, TrackState, TrackedValue};
use crate::report::finding::{Finding, FindingKind};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Per-path analysis budget
#[derive(Debug, Clone, Copy)]
pub struct AnalysisBudget {
    /// Maximum events applied to one path before aborting with `Unknown`
    pub max_steps: usize,
}

impl Default for AnalysisBudget {
    fn default() -> Self {
        Self { max_steps: 100_000 }
    }
}

/// Matcher state for one program path
pub struct PathMatcher<'a> {
    registry: &'a Registry,
    path_id: String,
    budget: AnalysisBudget,
    tracked: HashMap<ValueId, TrackedValue>,
    aliases: HashMap<ValueId, ValueId>,
    findings: Vec<Finding>,
    steps: usize,
    aborted: bool,
    next_seq: u64,
}

impl<'a> PathMatcher<'a> {
    /// Create a matcher for one path against a compiled registry
    pub fn new(registry: &'a Registry, path_id: &str, budget: AnalysisBudget) -> Self {
        Self {
            registry,
            path_id: path_id.to_string(),
            budget,
            tracked: HashMap::new(),
            aliases: HashMap::new(),
            findings: Vec::new(),
            steps: 0,
            aborted: false,
            next_seq: 0,
        }
    }

    /// Apply the next event in program order
    pub fn apply(&mut self, event: &PathEvent) {
        if self.aborted {
            return;
        }
        self.steps += 1;
        if self.steps > self.budget.max_steps {
            warn!(
                path = %self.path_id,
                max_steps = self.budget.max_steps,
                "step budget exceeded; aborting path with unknown verdict"
            );
            self.findings
                .push(Finding::path_verdict(FindingKind::Unknown, &self.path_id));
            self.aborted = true;
            return;
        }
        match event {
            PathEvent::Call(call) => self.apply_call(call),
            PathEvent::Alias(a, b) => self.apply_alias(*a, *b),
        }
    }

    /// End of path: every live value must be accepting-at-exit
    pub fn finish(mut self) -> Vec<Finding> {
        if !self.aborted {
            let path_id = self.path_id.clone();
            let mut values: Vec<&mut TrackedValue> = self.tracked.values_mut().collect();
            values.sort_by_key(|t| t.seq);
            for value in values {
                let failure_state = value.automaton_state();
                if !value.finish() {
                    self.findings.push(Finding {
                        kind: FindingKind::Leak,
                        creation_site: Some(value.creation_site.clone()),
                        function: Some(value.contract.clone()),
                        witness: value.history.clone(),
                        failure_state,
                        path: path_id.clone(),
                    });
                }
            }
        }
        self.findings
    }

    /// Number of events applied so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Whether the budget aborted this path
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Follow alias links to the canonical identity
    fn resolve(&self, id: ValueId) -> ValueId {
        let mut current = id;
        while let Some(&next) = self.aliases.get(&current) {
            current = next;
        }
        current
    }

    fn value_of(contract: &Contract, call: &CallEvent, var: &str) -> ArgValue {
        if var == "ret" {
            return call.ret;
        }
        contract
            .params
            .iter()
            .position(|p| p == var)
            .and_then(|i| call.args.get(i).copied())
            .unwrap_or(ArgValue::Unknown)
    }

    fn select_post<'c>(contract: &'c Contract, call: &CallEvent) -> Option<&'c PostBranch> {
        contract
            .post
            .iter()
            .find(|b| b.guard.evaluate(|var| Self::value_of(contract, call, var)))
    }

    fn select_future<'c>(contract: &'c Contract, call: &CallEvent) -> Option<&'c FutureBranch> {
        contract
            .future
            .iter()
            .find(|b| b.guard.evaluate(|var| Self::value_of(contract, call, var)))
    }

    fn apply_call(&mut self, call: &CallEvent) {
        let registry = self.registry;
        let Some(contract) = registry.lookup(&call.function, call.args.len()) else {
            debug!(function = %call.function, site = %call.site, "no contract; event ignored");
            return;
        };

        let post = Self::select_post(contract, call);
        let future = Self::select_future(contract, call);

        // Deliver the selected effect to an already-tracked identity, or
        // retire it on Consume. An effect on an untracked identity falls
        // through to obligation instantiation below.
        let mut handled_binding: Option<&str> = None;
        if let Some(branch) = post {
            match &branch.effect {
                PostEffect::Epsilon => {}
                PostEffect::Consume { binding } => {
                    self.consume(call, binding);
                    handled_binding = Some(binding);
                }
                PostEffect::Event { name, binding } => {
                    if let Some(raw) = call.identity_of(binding) {
                        let id = self.resolve(raw);
                        if self.tracked.contains_key(&id) {
                            self.deliver(id, name);
                            handled_binding = Some(binding);
                        }
                    } else {
                        warn!(
                            function = %call.function,
                            binding = %binding,
                            "effect binding carries no identity; event dropped"
                        );
                    }
                }
            }
        }

        // Instantiate the future obligation for a newly observed identity
        let Some(branch) = future else {
            return;
        };
        if handled_binding == Some(branch.binding.as_str()) {
            return;
        }
        let Some(raw) = call.identity_of(&branch.binding) else {
            debug!(
                function = %call.function,
                binding = %branch.binding,
                "future binding carries no identity; nothing tracked"
            );
            return;
        };
        let id = self.resolve(raw);
        if self.tracked.contains_key(&id) {
            return;
        }
        let Some(dfa) = branch.dfa.clone() else {
            warn!(function = %call.function, "registry not compiled; obligation skipped");
            return;
        };
        let creation_event = match post.map(|b| &b.effect) {
            Some(PostEffect::Event { name, binding }) if *binding == branch.binding => {
                Some(name.as_str())
            }
            _ => None,
        };
        let value = TrackedValue::new(
            id,
            &call.site,
            &contract.name,
            creation_event,
            branch.guard.is_null_test(&branch.binding),
            dfa,
            self.next_seq,
        );
        self.next_seq += 1;
        debug!(identity = %id, contract = %contract.name, site = %call.site, "tracking value");
        self.tracked.insert(id, value);
    }

    /// Advance a tracked value by one event symbol, reporting a rejection
    fn deliver(&mut self, id: ValueId, symbol: &str) {
        let Some(value) = self.tracked.get_mut(&id) else {
            return;
        };
        let finding = match value.state {
            TrackState::Active(_) => {
                let failure_state = value.automaton_state();
                match value.observe(symbol) {
                    Observation::Advanced => None,
                    Observation::Rejected => Some(Finding {
                        kind: value.classify_rejection(symbol),
                        creation_site: Some(value.creation_site.clone()),
                        function: Some(value.contract.clone()),
                        witness: value.history.clone(),
                        failure_state,
                        path: self.path_id.clone(),
                    }),
                }
            }
            TrackState::Consumed => {
                // Ownership was transferred away; an event here is an error,
                // reported once
                let mut witness = value.history.clone();
                witness.push(symbol.to_string());
                value.state = TrackState::Rejected;
                Some(Finding {
                    kind: FindingKind::UseAfterRelease,
                    creation_site: Some(value.creation_site.clone()),
                    function: Some(value.contract.clone()),
                    witness,
                    failure_state: None,
                    path: self.path_id.clone(),
                })
            }
            // Fail once per value: later events on a rejected or unknown
            // identity are ignored
            _ => None,
        };
        if let Some(finding) = finding {
            self.findings.push(finding);
        }
    }

    fn consume(&mut self, call: &CallEvent, binding: &str) {
        let Some(raw) = call.identity_of(binding) else {
            warn!(
                function = %call.function,
                binding = %binding,
                "consume binding carries no identity"
            );
            return;
        };
        let id = self.resolve(raw);
        let Some(value) = self.tracked.get_mut(&id) else {
            return;
        };
        match value.state {
            TrackState::Active(_) => {
                debug!(identity = %id, "ownership transferred; obligation retired");
                value.state = TrackState::Consumed;
            }
            TrackState::Consumed => {
                let finding = Finding {
                    kind: FindingKind::UseAfterRelease,
                    creation_site: Some(value.creation_site.clone()),
                    function: Some(value.contract.clone()),
                    witness: value.history.clone(),
                    failure_state: None,
                    path: self.path_id.clone(),
                };
                value.state = TrackState::Rejected;
                self.findings.push(finding);
            }
            _ => {}
        }
    }

    fn apply_alias(&mut self, a: ValueId, b: ValueId) {
        let ra = self.resolve(a);
        let rb = self.resolve(b);
        if ra == rb {
            return;
        }
        match (
            self.tracked.contains_key(&ra),
            self.tracked.contains_key(&rb),
        ) {
            (true, true) => self.merge(ra, rb),
            // At most one side is tracked: unify toward the tracked (or
            // arbitrary canonical) identity
            (false, true) => {
                self.aliases.insert(ra, rb);
            }
            _ => {
                self.aliases.insert(rb, ra);
            }
        }
    }

    /// Fold the later-created value into the earlier one by replaying its
    /// observed events from the earlier value's current state
    fn merge(&mut self, ra: ValueId, rb: ValueId) {
        let (keep, fold) = {
            let seq_a = self.tracked[&ra].seq;
            let seq_b = self.tracked[&rb].seq;
            if seq_a <= seq_b {
                (ra, rb)
            } else {
                (rb, ra)
            }
        };
        let Some(folded) = self.tracked.remove(&fold) else {
            return;
        };
        self.aliases.insert(fold, keep);

        let keep_contract = match self.tracked.get(&keep) {
            Some(value) => value.contract.clone(),
            None => return,
        };

        if folded.contract != keep_contract {
            warn!(
                earlier = %keep_contract,
                later = %folded.contract,
                "aliased identities governed by different contracts"
            );
            self.findings.push(Finding {
                kind: FindingKind::AliasConflict,
                creation_site: Some(folded.creation_site.clone()),
                function: Some(folded.contract.clone()),
                witness: folded.history.clone(),
                failure_state: None,
                path: self.path_id.clone(),
            });
            if let Some(value) = self.tracked.get_mut(&keep) {
                self.findings.push(Finding {
                    kind: FindingKind::AliasConflict,
                    creation_site: Some(value.creation_site.clone()),
                    function: Some(value.contract.clone()),
                    witness: value.history.clone(),
                    failure_state: None,
                    path: self.path_id.clone(),
                });
                value.state = TrackState::Unknown;
            }
            return;
        }

        debug!(kept = %keep, folded = %fold, "merging aliased identities");
        for symbol in folded.history {
            self.deliver(keep, &symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::grammar::{parse_contract, split_blocks};

    const CONTRACTS: &str = "\
malloc(path):\n\
    Post (ret=0, \u{1D750}) \\/ (!(ret=0), malloc(ret))\n\
    Future (ret=0, (!_(ret))^*) \\/ (!(ret=0), (!free(ret))^* \u{00B7} free(ret) \u{00B7} (_)^*)\n\
free(handler):\n\
    Post (TRUE, free(handler))\n\
    Future (TRUE, (!_(handler))^* \u{00B7} (\u{1D750} \\/ (malloc(handler) \u{00B7} (_)^*)))\n\
memset(a, b):\n\
    Post (TRUE, memset(a))\n\
open(path):\n\
    Post (TRUE, open(ret))\n\
    Future (TRUE, (!close(ret))^* \u{00B7} close(ret) \u{00B7} (_)^*)\n\
close(fd):\n\
    Post (TRUE, close(fd))\n\
handoff(h):\n\
    Post (TRUE, consume(h))\n";

    fn load_registry() -> Registry {
        let mut registry = Registry::new();
        for block in split_blocks(CONTRACTS) {
            registry
                .register(parse_contract(&block).expect("contract parses"))
                .expect("contract registers");
        }
        registry.compile();
        assert!(registry.diagnostics().is_empty());
        registry
    }

    fn malloc_at(site: &str, identity: u64) -> PathEvent {
        PathEvent::Call(
            CallEvent::new(site, "malloc")
                .with_arg(ArgValue::Unknown)
                .with_ret(ArgValue::Int(0x10), identity),
        )
    }

    fn null_malloc_at(site: &str, identity: u64) -> PathEvent {
        PathEvent::Call(
            CallEvent::new(site, "malloc")
                .with_arg(ArgValue::Unknown)
                .with_ret(ArgValue::Int(0), identity),
        )
    }

    fn free_at(site: &str, identity: u64) -> PathEvent {
        PathEvent::Call(
            CallEvent::new(site, "free").with_bound_arg("handler", ArgValue::Unknown, identity),
        )
    }

    fn memset_at(site: &str, identity: u64) -> PathEvent {
        PathEvent::Call(
            CallEvent::new(site, "memset")
                .with_bound_arg("a", ArgValue::Unknown, identity)
                .with_arg(ArgValue::Int(0)),
        )
    }

    fn run(events: &[PathEvent]) -> Vec<Finding> {
        let registry = load_registry();
        let mut matcher = PathMatcher::new(&registry, "p0", AnalysisBudget::default());
        for event in events {
            matcher.apply(event);
        }
        matcher.finish()
    }

    #[test]
    fn test_malloc_then_free_accepts_at_exit() {
        let findings = run(&[malloc_at("a.c:1", 1), free_at("a.c:2", 1)]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_malloc_without_free_is_leak() {
        let findings = run(&[malloc_at("a.c:1", 1)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Leak);
        assert_eq!(findings[0].creation_site.as_deref(), Some("a.c:1"));
        assert_eq!(findings[0].witness, vec!["malloc".to_string()]);
    }

    #[test]
    fn test_use_then_free_accepts() {
        let findings = run(&[
            malloc_at("a.c:1", 1),
            memset_at("a.c:2", 1),
            free_at("a.c:3", 1),
        ]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_double_free_without_malloc() {
        let findings = run(&[free_at("a.c:1", 7), free_at("a.c:2", 7)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DoubleRelease);
        assert_eq!(findings[0].creation_site.as_deref(), Some("a.c:1"));
        assert_eq!(
            findings[0].witness,
            vec!["free".to_string(), "free".to_string()]
        );
    }

    #[test]
    fn test_use_after_free_reported_once() {
        let findings = run(&[
            free_at("a.c:1", 7),
            memset_at("a.c:2", 7),
            memset_at("a.c:3", 7),
        ]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::UseAfterRelease);
    }

    #[test]
    fn test_free_then_realloc_is_clean() {
        let findings = run(&[
            free_at("a.c:1", 7),
            malloc_at("a.c:2", 7),
            free_at("a.c:3", 7),
        ]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_null_result_dereference() {
        let findings = run(&[null_malloc_at("a.c:1", 3), memset_at("a.c:2", 3)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::NullDeref);
        assert_eq!(findings[0].creation_site.as_deref(), Some("a.c:1"));
    }

    #[test]
    fn test_null_result_left_alone_is_clean() {
        let findings = run(&[null_malloc_at("a.c:1", 3)]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_consume_retires_obligation() {
        let handoff = PathEvent::Call(
            CallEvent::new("a.c:2", "handoff").with_bound_arg("h", ArgValue::Unknown, 1),
        );
        let findings = run(&[malloc_at("a.c:1", 1), handoff]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_event_after_consume_is_error() {
        let handoff = PathEvent::Call(
            CallEvent::new("a.c:2", "handoff").with_bound_arg("h", ArgValue::Unknown, 1),
        );
        let findings = run(&[malloc_at("a.c:1", 1), handoff, free_at("a.c:3", 1)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::UseAfterRelease);
    }

    #[test]
    fn test_alias_merge_same_contract() {
        // Two malloc results aliased; one free discharges the merged value
        let findings = run(&[
            malloc_at("a.c:1", 1),
            malloc_at("a.c:2", 2),
            PathEvent::Alias(ValueId(1), ValueId(2)),
            free_at("a.c:3", 2),
        ]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_alias_conflict_across_contracts() {
        let open = PathEvent::Call(
            CallEvent::new("a.c:2", "open")
                .with_arg(ArgValue::Unknown)
                .with_ret(ArgValue::Int(4), 2),
        );
        let findings = run(&[
            malloc_at("a.c:1", 1),
            open,
            PathEvent::Alias(ValueId(1), ValueId(2)),
        ]);
        let conflicts: Vec<_> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::AliasConflict)
            .collect();
        assert_eq!(conflicts.len(), 2);
        // Neither automaton is silently picked: no leak verdict either way
        assert!(findings.iter().all(|f| f.kind == FindingKind::AliasConflict));
    }

    #[test]
    fn test_alias_of_untracked_identities() {
        let findings = run(&[
            PathEvent::Alias(ValueId(8), ValueId(9)),
            malloc_at("a.c:1", 8),
            free_at("a.c:2", 9),
        ]);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_budget_exceeded_yields_unknown_only() {
        let registry = load_registry();
        let mut matcher =
            PathMatcher::new(&registry, "p0", AnalysisBudget { max_steps: 1 });
        matcher.apply(&malloc_at("a.c:1", 1));
        matcher.apply(&malloc_at("a.c:2", 2));
        assert!(matcher.is_aborted());
        let findings = matcher.finish();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Unknown);
        assert!(findings[0].creation_site.is_none());
    }

    #[test]
    fn test_unknown_function_is_ignored() {
        let unknown = PathEvent::Call(CallEvent::new("a.c:1", "sprintf"));
        let findings = run(&[unknown]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_events_keep_flowing_after_rejection() {
        // One value's rejection must not prevent findings on another
        let findings = run(&[
            free_at("a.c:1", 7),
            free_at("a.c:2", 7),
            malloc_at("a.c:3", 9),
        ]);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, FindingKind::DoubleRelease);
        assert_eq!(findings[1].kind, FindingKind::Leak);
    }
}
