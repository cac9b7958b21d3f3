//! Chronological record of applied transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which transition the machine applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// Advanced to a new state.
    Advance,
    /// Returned to a state popped from history.
    Back,
    /// Terminated the machine. A `Back` on empty history is recorded as an
    /// exit, since that is what it becomes.
    Exit,
}

/// One applied transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub kind: TraceKind,
    /// State that was active when the transition was applied.
    pub from: String,
    /// Target state, absent for exits.
    pub to: Option<String>,
    /// True when the transition was substituted by the recovery policy after
    /// a fault, rather than returned by the state.
    pub recovered: bool,
    pub timestamp: DateTime<Utc>,
}

/// Ordered diagnostic trace of every transition a machine applied.
///
/// Owned and appended to by the driver; exposed read-only for diagnostics
/// and assertions. Serializable for offline inspection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionTrace {
    records: Vec<TransitionRecord>,
}

impl TransitionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, record: TransitionRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the trace as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(from: &str, to: &str) -> TransitionRecord {
        TransitionRecord {
            kind: TraceKind::Advance,
            from: from.to_string(),
            to: Some(to.to_string()),
            recovered: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn records_preserve_insertion_order() {
        let mut trace = TransitionTrace::new();
        trace.record(advance("A", "B"));
        trace.record(advance("B", "C"));

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.records()[0].from, "A");
        assert_eq!(trace.records()[1].from, "B");
    }

    #[test]
    fn trace_serializes_to_json() {
        let mut trace = TransitionTrace::new();
        trace.record(advance("A", "B"));

        let json = trace.to_json().unwrap();
        assert!(json.contains("\"advance\""));
        assert!(json.contains("\"A\""));
    }

    #[test]
    fn trace_roundtrips_through_serde() {
        let mut trace = TransitionTrace::new();
        trace.record(advance("A", "B"));
        trace.record(TransitionRecord {
            kind: TraceKind::Exit,
            from: "B".to_string(),
            to: None,
            recovered: true,
            timestamp: Utc::now(),
        });

        let json = serde_json::to_string(&trace).unwrap();
        let restored: TransitionTrace = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.records()[1].kind, TraceKind::Exit);
        assert!(restored.records()[1].recovered);
    }
}
