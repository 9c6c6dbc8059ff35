//! Report Aggregation
//!
//! Collects findings from every analyzed path, deduplicates semantically
//! identical counterexamples, and renders the final report. Two paths that
//! leak the same allocation with the same witness produce one entry.

use crate::report::finding::{Finding, FindingKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Accumulates findings across paths with cross-path deduplication
#[derive(Debug, Default)]
pub struct Reporter {
    findings: Vec<Finding>,
    seen: HashSet<(FindingKind, Option<String>, Vec<String>)>,
    paths_analyzed: usize,
    events_applied: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one path's findings; duplicates of already-reported
    /// counterexamples are dropped
    pub fn record_path(&mut self, findings: Vec<Finding>, events: usize) {
        self.paths_analyzed += 1;
        self.events_applied += events;
        for finding in findings {
            let key = finding.dedup_key();
            if self.seen.insert(key) {
                self.findings.push(finding);
            } else {
                debug!(kind = %finding.kind, path = %finding.path, "duplicate finding dropped");
            }
        }
    }

    /// Findings recorded so far, in discovery order
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Finalize into a report
    pub fn into_report(self, program: &str) -> Report {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.kind.to_string()).or_insert(0usize) += 1;
        }
        Report {
            id: Uuid::new_v4(),
            program: program.to_string(),
            created_at: Utc::now(),
            paths_analyzed: self.paths_analyzed,
            events_applied: self.events_applied,
            counts,
            findings: self.findings,
        }
    }
}

/// Final analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Unique report identifier
    pub id: Uuid,
    /// Program the analyzed trace was captured from
    pub program: String,
    /// When the report was produced
    pub created_at: DateTime<Utc>,
    /// Number of paths analyzed
    pub paths_analyzed: usize,
    /// Total events applied across all paths
    pub events_applied: usize,
    /// Finding counts per kind
    pub counts: BTreeMap<String, usize>,
    /// Deduplicated findings
    pub findings: Vec<Finding>,
}

impl Report {
    /// Whether any definite violation was found (`Unknown` is not one)
    pub fn has_violations(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.kind != FindingKind::Unknown)
    }

    /// Whether any path gave up without a verdict
    pub fn has_unknowns(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.kind == FindingKind::Unknown)
    }

    /// Human-readable rendering for terminal output
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Report for {}\n", self.program));
        out.push_str(&format!(
            "  paths: {}, events: {}, findings: {}\n",
            self.paths_analyzed,
            self.events_applied,
            self.findings.len()
        ));
        for (kind, count) in &self.counts {
            out.push_str(&format!("  {}: {}\n", kind, count));
        }
        if self.findings.is_empty() {
            out.push_str("  no violations found\n");
        }
        for finding in &self.findings {
            out.push_str(&format!("- {}\n", finding));
        }
        out
    }
}
