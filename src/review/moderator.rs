//! moderator.rs — the moderator-facing case review conversation.
//!
//! Pure state machine: every input yields a list of effects the engine
//! interprets (channel messages, prompts, blacklist inserts, authority
//! notifications, action application). Side effects only ever appear in an
//! `Apply` effect, so a cancelled case provably has none.

use crate::policy;
use crate::prompt::{self, Prompt, CONFIRM_RECOMMENDED, NO_ACTION};
use crate::report::{Action, ActionSet, ReportReason, Resolution};
use crate::review::ReviewInput;
use crate::triage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    AwaitingLegitimacy,
    ReasonRevision,
    /// Manual malicious/not-malicious review for `Suspicious Link` cases.
    LinkReview,
    AuthorityNotification,
    AwaitingActionConfirmation,
    // Terminal states.
    FalseReport,
    NotMalicious,
    ActionsApplied,
    Cancelled,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReviewState::FalseReport
                | ReviewState::NotMalicious
                | ReviewState::ActionsApplied
                | ReviewState::Cancelled
        )
    }
}

/// Where a case enters the machine: reported cases start at legitimacy
/// review; automated cases may start at link review or go straight to
/// action confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    Legitimacy,
    LinkReview,
    ActionConfirmation,
}

/// One instruction to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEffect {
    /// Post to the moderator channel.
    Say(String),
    /// Post a prompt and wait for a selection.
    Ask(Prompt),
    /// Post a free-text request and wait for a reply.
    AskText(String),
    /// Add URLs to the blacklist cache.
    BlacklistUrls(Vec<String>),
    /// Forward the moderator's message to the authority channel.
    NotifyAuthorities(String),
    /// Apply the confirmed actions. An empty set means "no action": no
    /// offense increment, no side effects, summary only.
    Apply(ActionSet),
}

#[derive(Debug)]
pub struct ModeratorReview {
    reason: ReportReason,
    /// Reported user's offense count when the case opened.
    offense_count: u32,
    /// URLs the resolver flagged for manual review.
    flagged_urls: Vec<String>,
    /// Recommendation computed on entry to action confirmation; honored by
    /// the 'confirm' shortcut.
    recommended: ActionSet,
    state: ReviewState,
}

impl ModeratorReview {
    pub fn new(reason: ReportReason, offense_count: u32) -> Self {
        Self {
            reason,
            offense_count,
            flagged_urls: Vec::new(),
            recommended: ActionSet::default(),
            state: ReviewState::AwaitingLegitimacy,
        }
    }

    pub fn with_flagged_urls(mut self, urls: Vec<String>) -> Self {
        self.flagged_urls = urls;
        self
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn reason(&self) -> &ReportReason {
        &self.reason
    }

    pub fn resolution(&self) -> Resolution {
        match self.state {
            ReviewState::ActionsApplied => Resolution::ActionsApplied,
            ReviewState::FalseReport | ReviewState::NotMalicious => Resolution::FalseReport,
            ReviewState::Cancelled => Resolution::Cancelled,
            _ => Resolution::Open,
        }
    }

    /// Effects that open the conversation at the given start point.
    pub fn open(&mut self, start: StartPoint) -> Vec<ReviewEffect> {
        match start {
            StartPoint::Legitimacy => {
                self.state = ReviewState::AwaitingLegitimacy;
                vec![ReviewEffect::Ask(prompt::legitimacy())]
            }
            StartPoint::LinkReview => {
                self.state = ReviewState::LinkReview;
                vec![ReviewEffect::Ask(prompt::malicious_link())]
            }
            StartPoint::ActionConfirmation => self.enter_action_confirmation(),
        }
    }

    pub fn apply(&mut self, input: ReviewInput) -> Vec<ReviewEffect> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        if matches!(input, ReviewInput::Cancel) {
            self.state = ReviewState::Cancelled;
            return vec![ReviewEffect::Say(
                "Case review cancelled. No actions were taken.".to_string(),
            )];
        }

        match self.state {
            ReviewState::AwaitingLegitimacy => self.on_legitimacy(input),
            ReviewState::ReasonRevision => self.on_revision(input),
            ReviewState::LinkReview => self.on_link_review(input),
            ReviewState::AuthorityNotification => self.on_authority(input),
            ReviewState::AwaitingActionConfirmation => self.on_action_confirmation(input),
            _ => Vec::new(),
        }
    }

    fn on_legitimacy(&mut self, input: ReviewInput) -> Vec<ReviewEffect> {
        let choice = match input {
            ReviewInput::Selection(values) => values.first().cloned().unwrap_or_default(),
            ReviewInput::TimedOut => return self.timeout_reissue(prompt::legitimacy()),
            _ => return vec![ReviewEffect::Ask(prompt::legitimacy())],
        };

        match choice.as_str() {
            "legitimate" => {
                let mut effects = vec![ReviewEffect::Say("Report reason is confirmed.".to_string())];
                effects.extend(self.after_reason_confirmed());
                effects
            }
            "update required" => {
                self.state = ReviewState::ReasonRevision;
                vec![ReviewEffect::AskText(
                    "Please specify the appropriate abuse type.".to_string(),
                )]
            }
            "not legitimate" => {
                self.state = ReviewState::FalseReport;
                vec![ReviewEffect::Say(
                    "The content was falsely reported. No further action is required. \
                     Thank you for moderating this report!"
                        .to_string(),
                )]
            }
            _ => vec![ReviewEffect::Ask(prompt::legitimacy())],
        }
    }

    /// Confirmed (or revised-and-confirmed) taxonomy decides the next stop:
    /// link review, authority notification, or straight to actions.
    fn after_reason_confirmed(&mut self) -> Vec<ReviewEffect> {
        if self.reason.category == crate::report::Category::SuspiciousLink {
            self.state = ReviewState::LinkReview;
            return vec![ReviewEffect::Ask(prompt::malicious_link())];
        }
        if self.reason.escalates_to_authorities() {
            self.state = ReviewState::AuthorityNotification;
            return vec![ReviewEffect::AskText(
                "Please type a message that can be sent to the authorities regarding this case."
                    .to_string(),
            )];
        }
        self.enter_action_confirmation()
    }

    fn on_revision(&mut self, input: ReviewInput) -> Vec<ReviewEffect> {
        let text = match input {
            ReviewInput::Text(text) => text,
            ReviewInput::TimedOut => {
                // The case stays unresolved; hand the decision back to the
                // moderator rather than guessing a taxonomy.
                self.state = ReviewState::AwaitingLegitimacy;
                return vec![
                    ReviewEffect::Say(
                        "You did not respond in time. The case remains unresolved.".to_string(),
                    ),
                    ReviewEffect::Ask(prompt::legitimacy()),
                ];
            }
            _ => {
                return vec![ReviewEffect::AskText(
                    "Please specify the appropriate abuse type.".to_string(),
                )]
            }
        };

        match ReportReason::parse(&text) {
            Ok(reason) => {
                let priority_line = match triage::priority(&reason) {
                    Ok(p) => format!("* Priority: {p}"),
                    Err(triage::TriageError::Undetermined) => {
                        "* Priority: undetermined; please assign manually.".to_string()
                    }
                };
                self.reason = reason;
                self.state = ReviewState::AwaitingLegitimacy;
                vec![
                    ReviewEffect::Say(format!(
                        "* Report reason has been updated: {}\n{priority_line}",
                        self.reason
                    )),
                    ReviewEffect::Ask(prompt::legitimacy()),
                ]
            }
            Err(unknown) => {
                // Unknown labels are surfaced, never silently defaulted.
                vec![ReviewEffect::AskText(format!(
                    "{unknown}. Please use 'Category - Modifier, Modifier' with known labels."
                ))]
            }
        }
    }

    fn on_link_review(&mut self, input: ReviewInput) -> Vec<ReviewEffect> {
        let choice = match input {
            ReviewInput::Selection(values) => values.first().cloned().unwrap_or_default(),
            ReviewInput::TimedOut => return self.timeout_reissue(prompt::malicious_link()),
            _ => return vec![ReviewEffect::Ask(prompt::malicious_link())],
        };

        match choice.as_str() {
            "yes" => {
                let mut effects = vec![
                    ReviewEffect::BlacklistUrls(self.flagged_urls.clone()),
                    ReviewEffect::Say(
                        "Link is marked as malicious and has been added to our internal blacklist."
                            .to_string(),
                    ),
                ];
                effects.extend(self.enter_action_confirmation());
                effects
            }
            "no" => {
                self.state = ReviewState::NotMalicious;
                vec![ReviewEffect::Say(
                    "Link was deemed not malicious. No further action is required. \
                     Thank you for moderating this report!"
                        .to_string(),
                )]
            }
            _ => vec![ReviewEffect::Ask(prompt::malicious_link())],
        }
    }

    fn on_authority(&mut self, input: ReviewInput) -> Vec<ReviewEffect> {
        match input {
            ReviewInput::Text(text) => {
                let mut effects = vec![
                    ReviewEffect::NotifyAuthorities(text),
                    ReviewEffect::Say(
                        "Thank you for your response. A report has been filed with the \
                         authorities. Please wait for further instructions."
                            .to_string(),
                    ),
                ];
                effects.extend(self.enter_action_confirmation());
                effects
            }
            // Timeout still advances: the action decision cannot hang on a
            // missing authority note.
            ReviewInput::TimedOut => {
                let mut effects = vec![ReviewEffect::Say(
                    "You did not respond in time.".to_string(),
                )];
                effects.extend(self.enter_action_confirmation());
                effects
            }
            _ => vec![ReviewEffect::AskText(
                "Please type a message that can be sent to the authorities regarding this case."
                    .to_string(),
            )],
        }
    }

    fn enter_action_confirmation(&mut self) -> Vec<ReviewEffect> {
        self.recommended = policy::recommend(&self.reason, self.offense_count);
        self.state = ReviewState::AwaitingActionConfirmation;
        vec![ReviewEffect::Ask(prompt::action_confirmation(
            &self.recommended,
        ))]
    }

    fn on_action_confirmation(&mut self, input: ReviewInput) -> Vec<ReviewEffect> {
        let values = match input {
            ReviewInput::Selection(values) => values,
            ReviewInput::Text(text) if text.trim() == CONFIRM_RECOMMENDED => {
                vec![CONFIRM_RECOMMENDED.to_string()]
            }
            ReviewInput::TimedOut => {
                return self.timeout_reissue(prompt::action_confirmation(&self.recommended))
            }
            _ => {
                return vec![ReviewEffect::Ask(prompt::action_confirmation(
                    &self.recommended,
                ))]
            }
        };

        let confirmed = if values.iter().any(|v| v == CONFIRM_RECOMMENDED) {
            self.recommended
        } else if values.iter().any(|v| v == NO_ACTION) {
            ActionSet::default()
        } else {
            let mut set = ActionSet::default();
            for value in &values {
                if let Some(action) = Action::ALL.iter().find(|a| a.label() == value) {
                    set.set(*action, true);
                }
            }
            set
        };

        self.state = ReviewState::ActionsApplied;

        let summary = if confirmed.is_empty() {
            "No actions were taken. Thank you for moderating this report!".to_string()
        } else {
            let taken: Vec<&str> = confirmed
                .selected()
                .iter()
                .map(|a| a.applied_notice())
                .collect();
            format!(
                "Actions taken: {}. Thank you for moderating this report!",
                taken.join(", ")
            )
        };

        vec![ReviewEffect::Apply(confirmed), ReviewEffect::Say(summary)]
    }

    /// Per-prompt timeout: notify, stay in the same step, reissue.
    fn timeout_reissue(&self, prompt: Prompt) -> Vec<ReviewEffect> {
        vec![
            ReviewEffect::Say("You did not respond in time.".to_string()),
            ReviewEffect::Ask(prompt),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Category, Modifier};

    fn select(value: &str) -> ReviewInput {
        ReviewInput::Selection(vec![value.to_string()])
    }

    fn reason(category: Category, mods: &[Modifier]) -> ReportReason {
        mods.iter()
            .fold(ReportReason::new(category), |r, m| r.with_modifier(*m))
    }

    fn applied(effects: &[ReviewEffect]) -> Option<ActionSet> {
        effects.iter().find_map(|e| match e {
            ReviewEffect::Apply(set) => Some(*set),
            _ => None,
        })
    }

    #[test]
    fn legitimate_plain_case_goes_straight_to_actions() {
        let mut review = ModeratorReview::new(reason(Category::InvestmentScam, &[]), 0);
        review.open(StartPoint::Legitimacy);

        let effects = review.apply(select("legitimate"));
        assert_eq!(review.state(), ReviewState::AwaitingActionConfirmation);
        assert!(matches!(effects.last(), Some(ReviewEffect::Ask(_))));

        let effects = review.apply(select(CONFIRM_RECOMMENDED));
        let set = applied(&effects).expect("actions applied");
        assert!(set.remove_post && set.ban_user);
        assert!(!set.report_to_platform && !set.place_on_probation);
        assert_eq!(review.resolution(), Resolution::ActionsApplied);
    }

    #[test]
    fn false_report_terminates_without_effects() {
        let mut review = ModeratorReview::new(reason(Category::Blackmail, &[]), 0);
        review.open(StartPoint::Legitimacy);
        let effects = review.apply(select("not legitimate"));
        assert_eq!(review.state(), ReviewState::FalseReport);
        assert!(applied(&effects).is_none());
        assert_eq!(review.resolution(), Resolution::FalseReport);
    }

    #[test]
    fn revision_loops_back_to_legitimacy_with_new_taxonomy() {
        let mut review = ModeratorReview::new(reason(Category::Other, &[]), 0);
        review.open(StartPoint::Legitimacy);
        review.apply(select("update required"));
        assert_eq!(review.state(), ReviewState::ReasonRevision);

        let effects = review.apply(ReviewInput::Text(
            "Blackmail - Threat to do Physical Harm".to_string(),
        ));
        assert_eq!(review.state(), ReviewState::AwaitingLegitimacy);
        assert!(matches!(effects.first(), Some(ReviewEffect::Say(s)) if s.contains("P1")));
        assert_eq!(
            review.reason().to_string(),
            "Blackmail - Threat to do Physical Harm"
        );

        // Once confirmed, the revised taxonomy escalates to the authorities.
        let effects = review.apply(select("legitimate"));
        assert_eq!(review.state(), ReviewState::AuthorityNotification);
        assert!(matches!(effects.last(), Some(ReviewEffect::AskText(_))));
    }

    #[test]
    fn unknown_revision_label_is_surfaced_not_defaulted() {
        let mut review = ModeratorReview::new(reason(Category::Other, &[]), 0);
        review.open(StartPoint::Legitimacy);
        review.apply(select("update required"));
        let effects = review.apply(ReviewInput::Text("Bogus Reason".to_string()));
        assert_eq!(review.state(), ReviewState::ReasonRevision);
        assert!(
            matches!(effects.first(), Some(ReviewEffect::AskText(s)) if s.contains("Bogus Reason"))
        );
    }

    #[test]
    fn revision_timeout_leaves_case_unresolved() {
        let mut review = ModeratorReview::new(reason(Category::Other, &[]), 0);
        review.open(StartPoint::Legitimacy);
        review.apply(select("update required"));
        let effects = review.apply(ReviewInput::TimedOut);
        assert!(matches!(effects.first(), Some(ReviewEffect::Say(s)) if s.contains("did not respond")));
        assert_eq!(review.state(), ReviewState::AwaitingLegitimacy);
        assert_eq!(review.resolution(), Resolution::Open);
    }

    #[test]
    fn authority_timeout_still_advances_to_action_confirmation() {
        let mut review =
            ModeratorReview::new(reason(Category::Blackmail, &[Modifier::ThreatPhysicalHarm]), 0);
        review.open(StartPoint::Legitimacy);
        review.apply(select("legitimate"));
        assert_eq!(review.state(), ReviewState::AuthorityNotification);

        let effects = review.apply(ReviewInput::TimedOut);
        assert_eq!(review.state(), ReviewState::AwaitingActionConfirmation);
        assert!(matches!(effects.first(), Some(ReviewEffect::Say(s)) if s.contains("did not respond")));
        assert!(matches!(effects.last(), Some(ReviewEffect::Ask(_))));
    }

    #[test]
    fn authority_message_is_forwarded_before_actions() {
        let mut review =
            ModeratorReview::new(reason(Category::InvestmentScam, &[Modifier::AssetsSent]), 0);
        review.open(StartPoint::Legitimacy);
        review.apply(select("legitimate"));
        let effects = review.apply(ReviewInput::Text("victim sent 2 ETH to the actor".into()));
        assert_eq!(
            effects.first(),
            Some(&ReviewEffect::NotifyAuthorities(
                "victim sent 2 ETH to the actor".to_string()
            ))
        );
        assert_eq!(review.state(), ReviewState::AwaitingActionConfirmation);
    }

    #[test]
    fn suspicious_link_case_reviews_the_link_first() {
        let mut review = ModeratorReview::new(reason(Category::SuspiciousLink, &[]), 0)
            .with_flagged_urls(vec!["http://shady.example".to_string()]);
        review.open(StartPoint::Legitimacy);

        let effects = review.apply(select("legitimate"));
        assert_eq!(review.state(), ReviewState::LinkReview);
        assert!(matches!(effects.last(), Some(ReviewEffect::Ask(_))));

        let effects = review.apply(select("yes"));
        assert_eq!(
            effects.first(),
            Some(&ReviewEffect::BlacklistUrls(vec![
                "http://shady.example".to_string()
            ]))
        );
        assert_eq!(review.state(), ReviewState::AwaitingActionConfirmation);
    }

    #[test]
    fn not_malicious_link_closes_without_action() {
        let mut review = ModeratorReview::new(reason(Category::SuspiciousLink, &[]), 0)
            .with_flagged_urls(vec!["http://fine.example".to_string()]);
        review.open(StartPoint::LinkReview);
        let effects = review.apply(select("no"));
        assert_eq!(review.state(), ReviewState::NotMalicious);
        assert!(applied(&effects).is_none());
    }

    #[test]
    fn no_action_skips_side_effects_but_summarizes() {
        let mut review = ModeratorReview::new(reason(Category::Other, &[]), 0);
        review.open(StartPoint::ActionConfirmation);
        let effects = review.apply(select(NO_ACTION));
        let set = applied(&effects).expect("apply effect present");
        assert!(set.is_empty());
        assert!(
            matches!(effects.last(), Some(ReviewEffect::Say(s)) if s.contains("No actions were taken"))
        );
        assert_eq!(review.resolution(), Resolution::ActionsApplied);
    }

    #[test]
    fn moderator_can_override_the_recommendation() {
        let mut review = ModeratorReview::new(reason(Category::InvestmentScam, &[]), 0);
        review.open(StartPoint::ActionConfirmation);
        let effects = review.apply(ReviewInput::Selection(vec!["Remove Post".to_string()]));
        let set = applied(&effects).expect("actions applied");
        assert!(set.remove_post && !set.ban_user);
    }

    #[test]
    fn suspicious_link_recommendation_follows_offense_history() {
        let mut review = ModeratorReview::new(reason(Category::SuspiciousLink, &[]), 2);
        let effects = review.open(StartPoint::ActionConfirmation);
        let Some(ReviewEffect::Ask(p)) = effects.first() else {
            panic!("expected action prompt");
        };
        assert!(p.preselected_values().contains(&"Ban User".to_string()));
        assert!(!p.preselected_values().contains(&"Place User on Probation".to_string()));
    }

    #[test]
    fn cancel_anywhere_has_no_side_effects() {
        for start in [
            StartPoint::Legitimacy,
            StartPoint::LinkReview,
            StartPoint::ActionConfirmation,
        ] {
            let mut review = ModeratorReview::new(reason(Category::SuspiciousLink, &[]), 0);
            review.open(start);
            let effects = review.apply(ReviewInput::Cancel);
            assert_eq!(review.state(), ReviewState::Cancelled);
            assert!(applied(&effects).is_none());
            assert!(!effects
                .iter()
                .any(|e| matches!(e, ReviewEffect::BlacklistUrls(_) | ReviewEffect::NotifyAuthorities(_))));
            // Terminal: nothing further happens.
            assert!(review.apply(select("legitimate")).is_empty());
        }
    }
}
