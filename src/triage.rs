//! triage.rs — urgency triage over the report taxonomy.
//!
//! Each weighted label carries a fixed severity; a case's priority is the
//! minimum (most severe) weight present. `Other` alone is undetermined and
//! must be assigned manually, never defaulted.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::report::ReportReason;

static SEVERITY: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    HashMap::from([
        ("Threat to do Physical Harm", 1),
        ("Imminent Danger", 1),
        ("Assets Sent", 2),
        ("Personal/Sensitive Information", 2),
        ("Personal Information Provided", 2),
        ("Suspicion of Impersonation", 3),
        ("Explicit Content", 3),
        ("Suspicious Link", 4),
    ])
});

/// Urgency level P1 (most urgent) through P5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(u8);

impl Priority {
    /// Clamps into the valid 1..=5 band.
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 5))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Color marker used in moderator-channel summaries.
    pub fn marker(&self) -> &'static str {
        match self.0 {
            1 => "\u{1F534}",  // red
            2 => "\u{1F7E0}",  // orange
            3 => "\u{1F7E1}",  // yellow
            4 => "\u{1F7E2}",  // green
            _ => "\u{26AA}\u{FE0F}", // white
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{} {}", self.0, self.marker())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageError {
    /// No weighted label present (e.g. `Other` alone): priority needs a
    /// human, not a silent default.
    Undetermined,
}

impl std::fmt::Display for TriageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriageError::Undetermined => {
                write!(f, "priority undetermined; manual assignment required")
            }
        }
    }
}

impl std::error::Error for TriageError {}

/// Minimum severity weight across all labels present in the reason.
pub fn priority(reason: &ReportReason) -> Result<Priority, TriageError> {
    reason
        .labels()
        .iter()
        .filter_map(|label| SEVERITY.get(label).copied())
        .min()
        .map(Priority::new)
        .ok_or(TriageError::Undetermined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Category, Modifier};

    #[test]
    fn imminent_danger_is_always_p1() {
        let base = ReportReason::new(Category::ImminentDanger);
        assert_eq!(priority(&base).unwrap().level(), 1);

        let diluted = ReportReason::new(Category::ImminentDanger)
            .with_modifier(Modifier::ExplicitContent)
            .with_modifier(Modifier::SuspicionOfImpersonation);
        assert_eq!(priority(&diluted).unwrap().level(), 1);
    }

    #[test]
    fn minimum_weight_wins() {
        let r = ReportReason::new(Category::SuspiciousLink).with_modifier(Modifier::AssetsSent);
        assert_eq!(priority(&r).unwrap().level(), 2);

        let r = ReportReason::new(Category::Other).with_modifier(Modifier::ExplicitContent);
        assert_eq!(priority(&r).unwrap().level(), 3);
    }

    #[test]
    fn suspicious_link_alone_is_p4() {
        let r = ReportReason::new(Category::SuspiciousLink);
        assert_eq!(priority(&r).unwrap().level(), 4);
    }

    #[test]
    fn other_alone_is_undetermined() {
        let r = ReportReason::new(Category::Other);
        assert_eq!(priority(&r), Err(TriageError::Undetermined));
    }

    #[test]
    fn blackmail_without_modifiers_is_undetermined() {
        let r = ReportReason::new(Category::Blackmail);
        assert_eq!(priority(&r), Err(TriageError::Undetermined));
    }

    #[test]
    fn markers_follow_levels() {
        assert_eq!(Priority::new(1).to_string(), "P1 \u{1F534}");
        assert_eq!(Priority::new(4).to_string(), "P4 \u{1F7E2}");
    }
}
