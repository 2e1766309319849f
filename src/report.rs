//! report.rs — report taxonomy, enforcement action sets, and case records.
//!
//! A report reason is one top-level category plus zero or more modifiers.
//! Wire/display format: `"Category - Mod1, Mod2"`. A bare modifier label is
//! accepted and mapped to `Other` + that modifier, so a revised reason like
//! `"Assets Sent"` still triages correctly.

use serde::{Deserialize, Serialize};

/// Top-level report category. Exactly one per reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Blackmail,
    InvestmentScam,
    SuspiciousLink,
    ImminentDanger,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Blackmail,
        Category::InvestmentScam,
        Category::SuspiciousLink,
        Category::ImminentDanger,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Blackmail => "Blackmail",
            Category::InvestmentScam => "Investment Scam",
            Category::SuspiciousLink => "Suspicious Link",
            Category::ImminentDanger => "Imminent Danger",
            Category::Other => "Other",
        }
    }

    /// Short description shown in the category-select prompt.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Blackmail => "You are being threatened to send cryptocurrency",
            Category::InvestmentScam => "You sent cryptocurrency to a fraudulent individual",
            Category::SuspiciousLink => "You received a link that may lead to a disreputable site",
            Category::ImminentDanger => "You are in immediate danger",
            Category::Other => "You have a different reason for reporting",
        }
    }

    pub fn parse(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.label() == label)
    }
}

/// Refining modifier. A reason may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    ExplicitContent,
    ThreatPhysicalHarm,
    PersonalSensitiveInfo,
    PersonalInfoProvided,
    AssetsSent,
    SuspicionOfImpersonation,
}

impl Modifier {
    pub const ALL: [Modifier; 6] = [
        Modifier::ExplicitContent,
        Modifier::ThreatPhysicalHarm,
        Modifier::PersonalSensitiveInfo,
        Modifier::PersonalInfoProvided,
        Modifier::AssetsSent,
        Modifier::SuspicionOfImpersonation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Modifier::ExplicitContent => "Explicit Content",
            Modifier::ThreatPhysicalHarm => "Threat to do Physical Harm",
            Modifier::PersonalSensitiveInfo => "Personal/Sensitive Information",
            Modifier::PersonalInfoProvided => "Personal Information Provided",
            Modifier::AssetsSent => "Assets Sent",
            Modifier::SuspicionOfImpersonation => "Suspicion of Impersonation",
        }
    }

    pub fn parse(label: &str) -> Option<Modifier> {
        Modifier::ALL.iter().copied().find(|m| m.label() == label)
    }
}

/// Error from parsing a free-text reason string (e.g. a moderator revision).
/// Unknown labels are carried for manual resolution, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl std::fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown report label: '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// Category + modifiers describing why content was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportReason {
    pub category: Category,
    pub modifiers: Vec<Modifier>,
}

impl ReportReason {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            modifiers: Vec::new(),
        }
    }

    /// Builder-style modifier append (skips duplicates).
    pub fn with_modifier(mut self, m: Modifier) -> Self {
        if !self.modifiers.contains(&m) {
            self.modifiers.push(m);
        }
        self
    }

    pub fn has_modifier(&self, m: Modifier) -> bool {
        self.modifiers.contains(&m)
    }

    /// Whether the taxonomy warrants notifying an external authority:
    /// imminent danger, a physical-harm threat, or assets already sent.
    pub fn escalates_to_authorities(&self) -> bool {
        self.category == Category::ImminentDanger
            || self.has_modifier(Modifier::ThreatPhysicalHarm)
            || self.has_modifier(Modifier::AssetsSent)
    }

    /// All labels present: category first, then modifiers in carried order.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut out = vec![self.category.label()];
        out.extend(self.modifiers.iter().map(Modifier::label));
        out
    }

    /// Parse `"Category - Mod1, Mod2"`, a bare category, or a bare modifier
    /// (mapped to `Other` + that modifier).
    pub fn parse(input: &str) -> Result<Self, UnknownLabel> {
        let input = input.trim();
        if let Some((head, tail)) = input.split_once(" - ") {
            let category =
                Category::parse(head.trim()).ok_or_else(|| UnknownLabel(head.trim().to_string()))?;
            let mut reason = ReportReason::new(category);
            for part in tail.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let m = Modifier::parse(part).ok_or_else(|| UnknownLabel(part.to_string()))?;
                reason = reason.with_modifier(m);
            }
            return Ok(reason);
        }
        if let Some(category) = Category::parse(input) {
            return Ok(ReportReason::new(category));
        }
        if let Some(m) = Modifier::parse(input) {
            return Ok(ReportReason::new(Category::Other).with_modifier(m));
        }
        Err(UnknownLabel(input.to_string()))
    }
}

impl std::fmt::Display for ReportReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifiers.is_empty() {
            return write!(f, "{}", self.category.label());
        }
        let mods: Vec<&str> = self.modifiers.iter().map(|m| m.label()).collect();
        write!(f, "{} - {}", self.category.label(), mods.join(", "))
    }
}

/// One enforcement action a moderator can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    BanUser,
    RemovePost,
    ReportToPlatform,
    PlaceOnProbation,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::BanUser,
        Action::RemovePost,
        Action::ReportToPlatform,
        Action::PlaceOnProbation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Action::BanUser => "Ban User",
            Action::RemovePost => "Remove Post",
            Action::ReportToPlatform => "Report User to Platform",
            Action::PlaceOnProbation => "Place User on Probation",
        }
    }

    /// Past-tense line used in the final moderator summary.
    pub fn applied_notice(&self) -> &'static str {
        match self {
            Action::BanUser => "Actor has been banned",
            Action::RemovePost => "Post has been removed",
            Action::ReportToPlatform => "Actor has been reported to the platform",
            Action::PlaceOnProbation => "Actor has been placed on temporary probation",
        }
    }
}

/// Independently toggleable enforcement flags, pre-populated by policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    pub ban_user: bool,
    pub remove_post: bool,
    pub report_to_platform: bool,
    pub place_on_probation: bool,
}

impl ActionSet {
    pub fn is_set(&self, action: Action) -> bool {
        match action {
            Action::BanUser => self.ban_user,
            Action::RemovePost => self.remove_post,
            Action::ReportToPlatform => self.report_to_platform,
            Action::PlaceOnProbation => self.place_on_probation,
        }
    }

    pub fn set(&mut self, action: Action, on: bool) {
        match action {
            Action::BanUser => self.ban_user = on,
            Action::RemovePost => self.remove_post = on,
            Action::ReportToPlatform => self.report_to_platform = on,
            Action::PlaceOnProbation => self.place_on_probation = on,
        }
    }

    /// Selected actions in stable display order.
    pub fn selected(&self) -> Vec<Action> {
        Action::ALL.iter().copied().filter(|a| self.is_set(*a)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.selected().is_empty()
    }
}

/// Reference to the message a case is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub author: String,
    pub channel: String,
    pub text: String,
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Open,
    ActionsApplied,
    FalseReport,
    Cancelled,
    Unresolved,
}

/// A filed report under moderator review. Created when a report is submitted
/// or an automated signal fires; discarded once actions are recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCase {
    pub message: MessageRef,
    pub reason: ReportReason,
    pub priority: Option<crate::triage::Priority>,
    pub automated: bool,
    pub resolution: Resolution,
}

impl ReportCase {
    pub fn new(message: MessageRef, reason: ReportReason, automated: bool) -> Self {
        let priority = crate::triage::priority(&reason).ok();
        Self {
            message,
            reason,
            priority,
            automated,
            resolution: Resolution::Open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_category_with_modifiers() {
        let r = ReportReason::parse("Blackmail - Explicit Content, Threat to do Physical Harm")
            .unwrap();
        assert_eq!(r.category, Category::Blackmail);
        assert!(r.has_modifier(Modifier::ExplicitContent));
        assert!(r.has_modifier(Modifier::ThreatPhysicalHarm));
        assert_eq!(r.modifiers.len(), 2);
    }

    #[test]
    fn parse_bare_category_and_bare_modifier() {
        let r = ReportReason::parse("Investment Scam").unwrap();
        assert_eq!(r.category, Category::InvestmentScam);
        assert!(r.modifiers.is_empty());

        let r = ReportReason::parse("Assets Sent").unwrap();
        assert_eq!(r.category, Category::Other);
        assert!(r.has_modifier(Modifier::AssetsSent));
    }

    #[test]
    fn parse_surfaces_unknown_labels() {
        let err = ReportReason::parse("Totally Made Up").unwrap_err();
        assert_eq!(err.0, "Totally Made Up");

        let err = ReportReason::parse("Blackmail - Nonsense Modifier").unwrap_err();
        assert_eq!(err.0, "Nonsense Modifier");
    }

    #[test]
    fn display_round_trips() {
        let r = ReportReason::new(Category::InvestmentScam).with_modifier(Modifier::AssetsSent);
        let s = r.to_string();
        assert_eq!(s, "Investment Scam - Assets Sent");
        assert_eq!(ReportReason::parse(&s).unwrap(), r);
    }

    #[test]
    fn escalation_covers_category_and_modifiers() {
        assert!(ReportReason::new(Category::ImminentDanger).escalates_to_authorities());
        assert!(ReportReason::new(Category::Blackmail)
            .with_modifier(Modifier::ThreatPhysicalHarm)
            .escalates_to_authorities());
        assert!(ReportReason::new(Category::InvestmentScam)
            .with_modifier(Modifier::AssetsSent)
            .escalates_to_authorities());
        assert!(!ReportReason::new(Category::SuspiciousLink).escalates_to_authorities());
    }

    #[test]
    fn action_set_toggles_independently() {
        let mut set = ActionSet::default();
        assert!(set.is_empty());
        set.set(Action::RemovePost, true);
        set.set(Action::PlaceOnProbation, true);
        assert_eq!(
            set.selected(),
            vec![Action::RemovePost, Action::PlaceOnProbation]
        );
        set.set(Action::PlaceOnProbation, false);
        assert_eq!(set.selected(), vec![Action::RemovePost]);
    }
}
