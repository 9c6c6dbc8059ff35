//! Contract Registry
//!
//! The system's only intentional global: built once at load time, validated
//! and compiled, then immutable and passed by reference to every matcher.
//! Registration rejects duplicate contracts and jointly satisfiable guard
//! branches with diverging effects; compilation validates every future
//! expression against the registry-wide event alphabet and derives its DFA.

use crate::automaton::dfa::Dfa;
use crate::contract::types::Contract;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// A contract that failed to load; the rest of the registry stays usable
#[derive(Debug, Clone)]
pub struct LoadDiagnostic {
    /// Offending contract (or block position when no header parsed)
    pub context: String,
    /// Why it was rejected
    pub message: String,
}

/// Immutable store of validated, compiled contracts
#[derive(Debug, Default)]
pub struct Registry {
    contracts: HashMap<(String, usize), Contract>,
    order: Vec<(String, usize)>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract.
    ///
    /// Re-registering a byte-identical contract is an idempotent no-op; a
    /// textually different contract for the same function name and arity is
    /// a `DuplicateContract` error. Branch guards that are jointly
    /// satisfiable with different effects are an `AmbiguousGuards` error:
    /// non-exclusive branches are a contract-authoring mistake, flagged at
    /// load time rather than silently resolved by declaration order.
    pub fn register(&mut self, contract: Contract) -> Result<()> {
        Self::check_ambiguity(&contract)?;

        let key = (contract.name.clone(), contract.arity());
        if let Some(existing) = self.contracts.get(&key) {
            if existing.source == contract.source {
                debug!(contract = %contract.name, "byte-identical re-registration ignored");
                return Ok(());
            }
            return Err(Error::DuplicateContract(format!(
                "{}/{}",
                contract.name,
                contract.arity()
            )));
        }

        self.order.push(key.clone());
        self.contracts.insert(key, contract);
        Ok(())
    }

    fn check_ambiguity(contract: &Contract) -> Result<()> {
        for (i, a) in contract.post.iter().enumerate() {
            for b in contract.post.iter().skip(i + 1) {
                if a.guard.jointly_satisfiable(&b.guard) && a.effect != b.effect {
                    return Err(Error::AmbiguousGuards {
                        contract: contract.name.clone(),
                        detail: format!(
                            "Post guards '{}' and '{}' overlap with different effects",
                            a.guard, b.guard
                        ),
                    });
                }
            }
        }
        for (i, a) in contract.future.iter().enumerate() {
            for b in contract.future.iter().skip(i + 1) {
                if a.guard.jointly_satisfiable(&b.guard)
                    && (a.expr != b.expr || a.binding != b.binding)
                {
                    return Err(Error::AmbiguousGuards {
                        contract: contract.name.clone(),
                        detail: format!(
                            "Future guards '{}' and '{}' overlap with different obligations",
                            a.guard, b.guard
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up the contract for a function name and arity
    pub fn lookup(&self, name: &str, arity: usize) -> Option<&Contract> {
        self.contracts.get(&(name.to_string(), arity))
    }

    /// The event alphabet: every event name declared by a Post effect
    pub fn alphabet(&self) -> BTreeSet<String> {
        self.contracts
            .values()
            .flat_map(|c| c.declared_events())
            .collect()
    }

    /// Validate future expressions and compile their automata.
    ///
    /// A future expression referencing an event no contract declares is a
    /// configuration error (`MalformedExpression`), fatal to that contract
    /// only: the contract is dropped and recorded as a diagnostic.
    pub fn compile(&mut self) {
        let alphabet = self.alphabet();
        let mut dropped = Vec::new();

        for key in &self.order {
            let Some(contract) = self.contracts.get_mut(key) else {
                continue;
            };
            let mut malformed = None;
            for branch in &mut contract.future {
                for event in branch.expr.named_events() {
                    if !alphabet.contains(&event) {
                        malformed = Some(event);
                        break;
                    }
                }
                if malformed.is_some() {
                    break;
                }
                branch.dfa = Some(Arc::new(Dfa::compile(&branch.expr, &alphabet)));
            }
            if let Some(event) = malformed {
                let error = Error::MalformedExpression {
                    contract: contract.name.clone(),
                    event,
                };
                warn!(contract = %contract.name, %error, "dropping contract");
                self.diagnostics.push(LoadDiagnostic {
                    context: contract.name.clone(),
                    message: error.to_string(),
                });
                dropped.push(key.clone());
            }
        }

        for key in dropped {
            self.contracts.remove(&key);
            self.order.retain(|k| k != &key);
        }
    }

    /// Record a load failure for a block that never made it to registration
    pub fn push_diagnostic(&mut self, context: &str, message: &str) {
        self.diagnostics.push(LoadDiagnostic {
            context: context.to_string(),
            message: message.to_string(),
        });
    }

    /// Contracts that failed to load
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    /// Number of loaded contracts
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether the registry holds no contracts
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Contracts in registration order
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.order.iter().filter_map(|key| self.contracts.get(key))
    }
}
