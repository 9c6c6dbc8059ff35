//! Verification Engine
//!
//! Paths are independent, so the engine analyzes them in parallel with
//! scoped threads sharing one compiled registry. Findings are merged in
//! path order so reports are deterministic regardless of scheduling.

use crate::contract::registry::Registry;
use crate::event::stream::{EventStream, TraceFile};
use crate::matcher::path_matcher::{AnalysisBudget, PathMatcher};
use crate::parser::grammar::{parse_contract, split_blocks};
use crate::report::finding::Finding;
use crate::report::reporter::{Report, Reporter};
use crate::{Error, Result};
use std::thread;
use tracing::{debug, info, warn};

/// Parse, register and compile every contract block found in `text`.
///
/// Loading is lenient: a block that fails to parse or register becomes a
/// diagnostic on the returned registry and the remaining blocks still load.
/// Only a text with no contract blocks at all is an error.
pub fn load_contracts(text: &str) -> Result<Registry> {
    let blocks = split_blocks(text);
    if blocks.is_empty() {
        return Err(Error::Config("no contract blocks found".to_string()));
    }
    let mut registry = Registry::new();
    for block in &blocks {
        let contract = match parse_contract(block) {
            Ok(contract) => contract,
            Err(err) => {
                warn!(line = block.start_line, %err, "skipping malformed contract block");
                registry.push_diagnostic(&format!("block at line {}", block.start_line), &err.to_string());
                continue;
            }
        };
        let name = contract.name.clone();
        if let Err(err) = registry.register(contract) {
            warn!(contract = %name, %err, "skipping contract");
            registry.push_diagnostic(&name, &err.to_string());
        }
    }
    registry.compile();
    info!(
        contracts = registry.len(),
        diagnostics = registry.diagnostics().len(),
        "contracts loaded"
    );
    Ok(registry)
}

/// Replay one path's events through the matcher and return its findings
pub fn analyze_path(
    registry: &Registry,
    stream: &mut dyn EventStream,
    budget: &AnalysisBudget,
) -> Vec<Finding> {
    stream.restart();
    let mut matcher = PathMatcher::new(registry, stream.path_id(), *budget);
    while let Some(event) = stream.next_event() {
        matcher.apply(&event);
    }
    debug!(path = stream.path_id(), steps = matcher.steps(), "path replayed");
    matcher.finish()
}

/// Shared-registry engine for whole-trace analysis
pub struct Engine {
    registry: Registry,
    budget: AnalysisBudget,
}

impl Engine {
    /// Create an engine over a compiled registry with the default budget
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            budget: AnalysisBudget::default(),
        }
    }

    /// Override the per-path analysis budget
    pub fn with_budget(mut self, budget: AnalysisBudget) -> Self {
        self.budget = budget;
        self
    }

    /// The registry the engine matches against
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Analyze every path of a trace and aggregate findings into a report.
    ///
    /// Each path runs on its own scoped thread; merge order follows the
    /// trace's path order, not completion order.
    pub fn analyze_trace(&self, trace: &TraceFile) -> Report {
        info!(
            program = %trace.metadata.program,
            paths = trace.paths.len(),
            events = trace.event_count(),
            "analyzing trace"
        );
        let per_path: Vec<Vec<Finding>> = thread::scope(|scope| {
            let handles: Vec<_> = trace
                .paths
                .iter()
                .map(|path| {
                    scope.spawn(move || {
                        let mut stream = path.stream();
                        analyze_path(&self.registry, &mut stream, &self.budget)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(findings) => findings,
                    Err(_) => {
                        warn!("path analysis thread panicked; path skipped");
                        Vec::new()
                    }
                })
                .collect()
        });

        let mut reporter = Reporter::new();
        for (path, findings) in trace.paths.iter().zip(per_path) {
            reporter.record_path(findings, path.events.len());
        }
        reporter.into_report(&trace.metadata.program)
    }
}
