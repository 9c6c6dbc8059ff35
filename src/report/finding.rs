//! Violation Findings
//!
//! A finding is a counterexample witness: where the tracked value was
//! created, the ordered event sequence observed on it, and the automaton
//! state at failure. The witness is what tells a maintainer whether the fix
//! is a missing `free`/`close` or an extra guard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of contract violation (or non-verdict)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    /// Obligation unmet at path end (e.g. missing `free`/`close`)
    Leak,
    /// A release-style event repeated on the same identity
    DoubleRelease,
    /// An event on an identity after its release
    UseAfterRelease,
    /// An event on an identity whose creation resolved to null
    NullDeref,
    /// Aliased identities governed by different contracts
    AliasConflict,
    /// No verdict: budget exceeded or analysis gave up (never a false "safe")
    Unknown,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::Leak => "leak",
            FindingKind::DoubleRelease => "double-release",
            FindingKind::UseAfterRelease => "use-after-release",
            FindingKind::NullDeref => "null-deref",
            FindingKind::AliasConflict => "alias-conflict",
            FindingKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// One violation counterexample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Violation kind
    pub kind: FindingKind,
    /// Call site that created the tracked value; `None` for path-level
    /// verdicts such as a budget abort
    pub creation_site: Option<String>,
    /// Contract (function) that governed the value, when known
    pub function: Option<String>,
    /// Ordered event sequence observed on the value up to the failure
    pub witness: Vec<String>,
    /// Automaton state at failure, when the value was still being matched
    pub failure_state: Option<usize>,
    /// Identifier of the program path the finding was observed on
    pub path: String,
}

impl Finding {
    /// A path-level non-verdict (no tracked value involved)
    pub fn path_verdict(kind: FindingKind, path: &str) -> Self {
        Self {
            kind,
            creation_site: None,
            function: None,
            witness: Vec::new(),
            failure_state: None,
            path: path.to_string(),
        }
    }

    /// Dedup key: semantically identical findings share creation site, kind
    /// and minimal witness, regardless of which path produced them
    pub fn dedup_key(&self) -> (FindingKind, Option<String>, Vec<String>) {
        (self.kind, self.creation_site.clone(), self.witness.clone())
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(site) = &self.creation_site {
            write!(f, " of value created at {}", site)?;
        }
        if let Some(function) = &self.function {
            write!(f, " (contract {})", function)?;
        }
        if !self.witness.is_empty() {
            write!(f, "; observed [{}]", self.witness.join(", "))?;
        }
        write!(f, "; path {}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_leak(path: &str) -> Finding {
        Finding {
            kind: FindingKind::Leak,
            creation_site: Some("alloc.c:10".to_string()),
            function: Some("malloc".to_string()),
            witness: vec!["malloc".to_string()],
            failure_state: Some(0),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_dedup_key_ignores_path() {
        let a = make_leak("p0");
        let b = make_leak("p1");
        assert_ne!(a, b);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_kind() {
        let a = make_leak("p0");
        let mut b = make_leak("p0");
        b.kind = FindingKind::DoubleRelease;
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_display_mentions_site_and_witness() {
        let text = make_leak("p0").to_string();
        assert!(text.contains("leak"));
        assert!(text.contains("alloc.c:10"));
        assert!(text.contains("malloc"));
        assert!(text.contains("p0"));
    }

    #[test]
    fn test_path_verdict_has_no_site() {
        let finding = Finding::path_verdict(FindingKind::Unknown, "p3");
        assert_eq!(finding.kind, FindingKind::Unknown);
        assert!(finding.creation_site.is_none());
        assert!(finding.witness.is_empty());
    }

    #[test]
    fn test_finding_json_roundtrip() {
        let finding = make_leak("p0");
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(finding, back);
    }
}
