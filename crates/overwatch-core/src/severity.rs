//! Reason code to severity classification.
//!
//! The mapping is data: [`SeverityTable::default`] carries the built-in table
//! and [`SeverityTable::with_override`] extends or replaces entries without
//! touching the watch loop. Reasons missing from the table classify as
//! [`Level::Error`] so that unknown conditions surface instead of vanishing.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::level::Level;

/// Built-in reason codes and their levels.
static DEFAULT_REASONS: Lazy<HashMap<&'static str, Level>> = Lazy::new(|| {
    use Level::{Error, Info, Warn};

    [
        ("SuccessfulCreate", Info),
        ("SuccessfulDelete", Info),
        ("ContainerCreating", Info),
        ("Pulled", Info),
        ("Pulling", Info),
        ("Created", Info),
        ("Starting", Info),
        ("Started", Info),
        ("Killing", Info),
        ("NodeReady", Info),
        ("ScalingReplicaSet", Info),
        ("Scheduled", Info),
        ("NodeNotReady", Warn),
        ("MAPPING", Warn),
        ("UPDATE", Info),
        ("DELETE", Info),
        ("NodeOutOfDisk", Error),
        ("BackOff", Error),
        ("ImagePullBackOff", Error),
        ("FailedSync", Error),
        ("FreeDiskSpaceFailed", Warn),
        ("MissingClusterDNS", Error),
        ("RegisteredNode", Info),
        ("TerminatingEvictedPod", Warn),
        ("RemovingNode", Warn),
        ("TerminatedAllPods", Warn),
        ("CreatedLoadBalancer", Info),
        ("CreatingLoadBalancer", Info),
        ("NodeHasSufficientDisk", Info),
        ("NodeHasSufficientMemory", Info),
        ("NodeNotSchedulable", Error),
        ("DeletingAllPods", Warn),
        ("DeletingNode", Warn),
        ("UpdatedLoadBalancer", Info),
    ]
    .into_iter()
    .collect()
});

/// Maps event reason codes to notification levels.
#[derive(Debug, Clone)]
pub struct SeverityTable {
    reasons: HashMap<String, Level>,
}

impl SeverityTable {
    /// Creates an empty table. Every reason classifies as [`Level::Error`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            reasons: HashMap::new(),
        }
    }

    /// Adds or replaces the level for `reason`.
    #[must_use]
    pub fn with_override(mut self, reason: impl Into<String>, level: Level) -> Self {
        self.insert(reason, level);
        self
    }

    /// Adds or replaces the level for `reason`.
    pub fn insert(&mut self, reason: impl Into<String>, level: Level) {
        self.reasons.insert(reason.into(), level);
    }

    /// Classifies a reason code.
    #[must_use]
    pub fn classify(&self, reason: &str) -> Level {
        self.reasons.get(reason).copied().unwrap_or(Level::Error)
    }

    /// Returns true if the reason has an explicit entry.
    #[must_use]
    pub fn contains(&self, reason: &str) -> bool {
        self.reasons.contains_key(reason)
    }

    /// Number of known reasons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self {
            reasons: DEFAULT_REASONS
                .iter()
                .map(|(reason, level)| ((*reason).to_string(), *level))
                .collect(),
        }
    }
}

impl<S: Into<String>> Extend<(S, Level)> for SeverityTable {
    fn extend<I: IntoIterator<Item = (S, Level)>>(&mut self, iter: I) {
        for (reason, level) in iter {
            self.insert(reason, level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Scheduled", Level::Info)]
    #[test_case("ScalingReplicaSet", Level::Info)]
    #[test_case("NodeNotReady", Level::Warn)]
    #[test_case("TerminatingEvictedPod", Level::Warn)]
    #[test_case("BackOff", Level::Error)]
    #[test_case("ImagePullBackOff", Level::Error)]
    fn classifies_known_reasons(reason: &str, expected: Level) {
        assert_eq!(SeverityTable::default().classify(reason), expected);
    }

    #[test]
    fn unknown_reason_is_error() {
        let table = SeverityTable::default();
        assert!(!table.contains("OOMKilling"));
        assert_eq!(table.classify("OOMKilling"), Level::Error);
        assert_eq!(table.classify(""), Level::Error);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(SeverityTable::default().classify("scheduled"), Level::Error);
    }

    #[test]
    fn default_table_has_all_builtin_reasons() {
        assert_eq!(SeverityTable::default().len(), 34);
    }

    #[test]
    fn override_replaces_entry() {
        let table = SeverityTable::default().with_override("BackOff", Level::Warn);
        assert_eq!(table.classify("BackOff"), Level::Warn);
    }

    #[test]
    fn override_adds_entry() {
        let table = SeverityTable::default().with_override("OOMKilling", Level::Warn);
        assert_eq!(table.classify("OOMKilling"), Level::Warn);
    }

    #[test]
    fn extend_applies_all_entries() {
        let mut table = SeverityTable::empty();
        assert!(table.is_empty());

        table.extend([("Pulled", Level::Debug), ("Pulling", Level::Debug)]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.classify("Pulled"), Level::Debug);
        assert_eq!(table.classify("Scheduled"), Level::Error);
    }
}
