//! Event Streams and Trace Files
//!
//! Defines the stream interface consumed by the matcher and the JSON
//! serialization format for recorded traces.

use crate::event::types::PathEvent;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Current trace format version
pub const CURRENT_FORMAT_VERSION: &str = "1.0";

/// A lazy, finite, restartable sequence of path events in program order.
///
/// The matcher never mutates the stream beyond advancing it; multiple paths
/// may share prefixes but are matched independently.
pub trait EventStream {
    /// Identifier of the program path this stream describes
    fn path_id(&self) -> &str;

    /// Rewind to the first event
    fn restart(&mut self);

    /// Next event in program order, or `None` at path end
    fn next_event(&mut self) -> Option<PathEvent>;
}

/// In-memory event stream over a recorded path
#[derive(Debug, Clone)]
pub struct ReplayStream {
    path_id: String,
    events: Vec<PathEvent>,
    cursor: usize,
}

impl ReplayStream {
    /// Create a stream over pre-recorded events
    pub fn new(path_id: &str, events: Vec<PathEvent>) -> Self {
        Self {
            path_id: path_id.to_string(),
            events,
            cursor: 0,
        }
    }

    /// Number of events in the path
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the path carries no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventStream for ReplayStream {
    fn path_id(&self) -> &str {
        &self.path_id
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }

    fn next_event(&mut self) -> Option<PathEvent> {
        let event = self.events.get(self.cursor).cloned();
        if event.is_some() {
            self.cursor += 1;
        }
        event
    }
}

/// Trace metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Unique trace ID
    pub id: Uuid,
    /// Analyzed program or translation unit
    pub program: String,
    /// Time the trace was produced
    pub created_at: DateTime<Utc>,
    /// Version of the trace format
    pub format_version: String,
}

impl TraceMetadata {
    /// Create new metadata for a trace
    pub fn new(program: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            program: program.to_string(),
            created_at: Utc::now(),
            format_version: CURRENT_FORMAT_VERSION.to_string(),
        }
    }
}

/// One explored program path within a trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracePath {
    /// Path identifier, stable across re-analysis
    pub id: String,
    /// Events in program order
    pub events: Vec<PathEvent>,
}

impl TracePath {
    /// Create a path from its events
    pub fn new(id: &str, events: Vec<PathEvent>) -> Self {
        Self {
            id: id.to_string(),
            events,
        }
    }

    /// Stream view of the path
    pub fn stream(&self) -> ReplayStream {
        ReplayStream::new(&self.id, self.events.clone())
    }
}

/// A complete set of explored paths for one analyzed program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFile {
    /// Trace metadata
    pub metadata: TraceMetadata,
    /// Explored paths
    pub paths: Vec<TracePath>,
}

impl TraceFile {
    /// Create an empty trace for a program
    pub fn new(program: &str) -> Self {
        Self {
            metadata: TraceMetadata::new(program),
            paths: Vec::new(),
        }
    }

    /// Append a path
    pub fn push_path(&mut self, path: TracePath) {
        self.paths.push(path);
    }

    /// Total number of events across all paths
    pub fn event_count(&self) -> usize {
        self.paths.iter().map(|p| p.events.len()).sum()
    }

    /// Load a trace from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let trace: Self = serde_json::from_str(&content)?;
        if trace.metadata.format_version != CURRENT_FORMAT_VERSION {
            return Err(Error::Trace(format!(
                "unsupported trace format version '{}', expected '{}'",
                trace.metadata.format_version, CURRENT_FORMAT_VERSION
            )));
        }
        Ok(trace)
    }

    /// Save the trace as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
