//! Decision chain tracking
//!
//! Depth is read from the document, not from the call stack: each fragment
//! states its depth and the tracker walks the fragments in order as a small
//! state machine. Once halted, a chain stays halted.
//!
//! A cycle is a decision that reappears among its own ancestors. Siblings
//! with the same decision are not a cycle.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::RecursionError;
use crate::model::Trace;

/// Tracker state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainState {
    Active { depth: u32 },
    Halted { depth: u32, reason: RecursionError },
}

/// Result of adding one fragment to the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnOutcome {
    Accepted { depth: u32 },
    /// Accepted, but not deeper than its parent
    Regressed { depth: u32, parent_depth: u32 },
    Rejected(RecursionError),
}

impl SpawnOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SpawnOutcome::Accepted { .. })
    }
}

/// Tracks depth and ancestry of the decisions in one document
#[derive(Debug, Clone)]
pub struct ChainTracker {
    max_depth: u32,
    state: ChainState,
    /// Decision key to the key of its parent
    parents: HashMap<String, Option<String>>,
}

impl ChainTracker {
    /// A fresh chain in `Active(0)`
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            state: ChainState::Active { depth: 0 },
            parents: HashMap::new(),
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, ChainState::Halted { .. })
    }

    pub fn depth(&self) -> u32 {
        match self.state {
            ChainState::Active { depth } | ChainState::Halted { depth, .. } => depth,
        }
    }

    /// Register the root trace at its declared depth
    pub fn begin(&mut self, key: impl Into<String>, depth: u32) -> SpawnOutcome {
        self.parents.clear();
        self.state = ChainState::Active { depth: 0 };
        if depth > self.max_depth {
            return self.halt(RecursionError::LimitExceeded {
                attempted: depth,
                max: self.max_depth,
            });
        }
        self.parents.insert(key.into(), None);
        self.state = ChainState::Active { depth };
        SpawnOutcome::Accepted { depth }
    }

    /// Add a sub-decision declared at `depth` under `parent`, which sits at
    /// `parent_depth`
    pub fn spawn(
        &mut self,
        key: &str,
        parent: Option<&str>,
        depth: u32,
        parent_depth: u32,
    ) -> SpawnOutcome {
        if let ChainState::Halted { reason, .. } = &self.state {
            return SpawnOutcome::Rejected(RecursionError::Halted {
                reason: reason.code().to_string(),
            });
        }
        if depth > self.max_depth {
            return self.halt(RecursionError::LimitExceeded {
                attempted: depth,
                max: self.max_depth,
            });
        }
        if self.is_ancestor(key, parent) {
            return self.halt(RecursionError::CycleDetected { id: key.to_string() });
        }

        self.parents
            .insert(key.to_string(), parent.map(str::to_string));
        self.state = ChainState::Active { depth };
        debug!(depth, key, "sub-decision joined chain");
        if depth <= parent_depth {
            SpawnOutcome::Regressed { depth, parent_depth }
        } else {
            SpawnOutcome::Accepted { depth }
        }
    }

    /// Whether `key` is `parent` or one of its ancestors
    fn is_ancestor<'a>(&'a self, key: &str, parent: Option<&'a str>) -> bool {
        let mut cursor = parent;
        for _ in 0..=self.parents.len() {
            match cursor {
                Some(current) if current == key => return true,
                Some(current) => cursor = self.parents.get(current).and_then(|p| p.as_deref()),
                None => return false,
            }
        }
        false
    }

    fn halt(&mut self, reason: RecursionError) -> SpawnOutcome {
        let depth = self.depth();
        warn!(depth, %reason, "decision chain halted");
        self.state = ChainState::Halted {
            depth,
            reason: reason.clone(),
        };
        SpawnOutcome::Rejected(reason)
    }
}

/// Identity of a decision inside a chain
///
/// The declared decision id when there is one, otherwise `fp:` plus a short
/// SHA-256 fingerprint of the decision text with case and whitespace folded.
pub fn decision_key(trace: &Trace) -> String {
    if let Some(id) = trace.decision.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let normalized = trace
        .decision
        .text
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("fp:{}", &hex::encode(digest)[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Decision;

    fn trace(text: &str, id: Option<&str>) -> Trace {
        Trace {
            decision: Decision {
                text: Some(text.to_string()),
                id: id.map(str::to_string),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_chain_up_to_max() {
        let mut tracker = ChainTracker::new(5);
        assert!(tracker.begin("root", 0).is_accepted());
        let mut parent = "root".to_string();
        for depth in 1..=5 {
            let key = format!("d{}", depth);
            let outcome = tracker.spawn(&key, Some(&parent), depth, depth - 1);
            assert_eq!(outcome, SpawnOutcome::Accepted { depth });
            parent = key;
        }
        assert_eq!(tracker.depth(), 5);

        let outcome = tracker.spawn("d6", Some("d5"), 6, 5);
        assert_eq!(
            outcome,
            SpawnOutcome::Rejected(RecursionError::LimitExceeded { attempted: 6, max: 5 })
        );
        assert!(tracker.is_halted());
        assert_eq!(tracker.depth(), 5);
    }

    #[test]
    fn test_halt_is_idempotent() {
        let mut tracker = ChainTracker::new(1);
        tracker.begin("root", 0);
        tracker.spawn("a", Some("root"), 2, 0);
        let state = tracker.state().clone();

        // A shallow spawn after the halt is still rejected
        let outcome = tracker.spawn("b", Some("root"), 1, 0);
        assert!(matches!(outcome, SpawnOutcome::Rejected(RecursionError::Halted { .. })));
        assert_eq!(tracker.state(), &state);
    }

    #[test]
    fn test_cycle_detection() {
        let mut tracker = ChainTracker::new(5);
        tracker.begin("root", 0);
        assert!(tracker.spawn("a", Some("root"), 1, 0).is_accepted());
        let outcome = tracker.spawn("root", Some("a"), 2, 1);
        assert_eq!(
            outcome,
            SpawnOutcome::Rejected(RecursionError::CycleDetected { id: "root".to_string() })
        );
        assert!(tracker.is_halted());
    }

    #[test]
    fn test_identical_siblings_are_not_a_cycle() {
        let mut tracker = ChainTracker::new(5);
        tracker.begin("root", 0);
        assert!(tracker.spawn("fp:same", Some("root"), 1, 0).is_accepted());
        assert!(tracker.spawn("fp:same", Some("root"), 1, 0).is_accepted());
        assert!(!tracker.is_halted());

        // Under itself it is one
        let outcome = tracker.spawn("fp:same", Some("fp:same"), 2, 1);
        assert!(matches!(
            outcome,
            SpawnOutcome::Rejected(RecursionError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_regression_does_not_halt() {
        let mut tracker = ChainTracker::new(5);
        tracker.begin("root", 0);
        tracker.spawn("a", Some("root"), 2, 0);
        let outcome = tracker.spawn("b", Some("a"), 1, 2);
        assert_eq!(outcome, SpawnOutcome::Regressed { depth: 1, parent_depth: 2 });
        assert!(!tracker.is_halted());
        assert!(tracker.spawn("c", Some("b"), 2, 1).is_accepted());
    }

    #[test]
    fn test_root_deeper_than_max() {
        let mut tracker = ChainTracker::new(3);
        let outcome = tracker.begin("root", 4);
        assert!(matches!(
            outcome,
            SpawnOutcome::Rejected(RecursionError::LimitExceeded { attempted: 4, max: 3 })
        ));
    }

    #[test]
    fn test_decision_key() {
        assert_eq!(decision_key(&trace("anything", Some("D-7"))), "D-7");
        let a = decision_key(&trace("Use  a Cache", None));
        let b = decision_key(&trace("use a cache", None));
        assert_eq!(a, b);
        assert!(a.starts_with("fp:"));
        assert_eq!(a.len(), 3 + 16);
        assert_ne!(a, decision_key(&trace("use a queue", None)));
    }
}
