//! reporter.rs — the reporter-facing intake conversation.
//!
//! `Idle → CategorySelected → DetailsGathered → Submitted`, cancellable at
//! every step. On submission the engine hands the summary to the moderator
//! flow.

use crate::prompt::{self, Prompt};
use crate::report::{Category, Modifier, ReportReason};
use crate::review::ReviewInput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterState {
    Idle,
    /// Category prompt issued, waiting for the pick.
    AwaitingCategory,
    /// Category chosen, modifier prompt issued.
    CategorySelected(Category),
    /// Taxonomy complete, waiting for the reported user's name.
    AwaitingReportedUser(ReportReason),
    /// Waiting for the message reference itself.
    DetailsGathered {
        reason: ReportReason,
        reported_user: String,
    },
    Submitted,
    Cancelled,
}

/// Completed report handed to the moderator flow.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedReport {
    pub reason: ReportReason,
    /// Who posted the reported content.
    pub reported_user: String,
    /// Reporter-supplied reference to (or copy of) the offending message.
    pub details: String,
}

/// What one intake step produced.
#[derive(Debug, Default)]
pub struct StepOutput {
    pub replies: Vec<String>,
    pub prompt: Option<Prompt>,
    pub submitted: Option<SubmittedReport>,
}

#[derive(Debug)]
pub struct ReporterFlow {
    state: ReporterState,
}

impl Default for ReporterFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReporterFlow {
    pub fn new() -> Self {
        Self {
            state: ReporterState::Idle,
        }
    }

    pub fn state(&self) -> &ReporterState {
        &self.state
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            ReporterState::Submitted | ReporterState::Cancelled
        )
    }

    pub fn handle(&mut self, input: ReviewInput) -> StepOutput {
        let mut out = StepOutput::default();

        if self.is_complete() {
            return out;
        }
        if matches!(input, ReviewInput::Cancel) {
            self.state = ReporterState::Cancelled;
            out.replies.push("Report cancelled.".to_string());
            return out;
        }

        let state = self.state.clone();
        match (state, input) {
            (ReporterState::Idle, _) => {
                out.replies.push(
                    "Thank you for starting the reporting process. Say 'cancel' at any time \
                     to cancel the report."
                        .to_string(),
                );
                out.prompt = Some(prompt::category_select());
                self.state = ReporterState::AwaitingCategory;
            }
            (ReporterState::AwaitingCategory, ReviewInput::Selection(values)) => {
                match values.first().map(String::as_str).and_then(Category::parse) {
                    Some(category) => {
                        out.prompt = Some(prompt::modifier_select());
                        self.state = ReporterState::CategorySelected(category);
                    }
                    None => {
                        out.replies
                            .push("That is not one of the listed reasons.".to_string());
                        out.prompt = Some(prompt::category_select());
                    }
                }
            }
            (ReporterState::CategorySelected(category), ReviewInput::Selection(values)) => {
                let mut reason = ReportReason::new(category);
                for value in &values {
                    if let Some(m) = Modifier::parse(value) {
                        reason = reason.with_modifier(m);
                    }
                }
                out.replies.push(
                    "Who posted the content you are reporting? Please reply with their username."
                        .to_string(),
                );
                self.state = ReporterState::AwaitingReportedUser(reason);
            }
            (ReporterState::AwaitingReportedUser(reason), ReviewInput::Text(user)) => {
                out.replies.push(
                    "Please reply with a link to, or a copy of, the message you are reporting."
                        .to_string(),
                );
                self.state = ReporterState::DetailsGathered {
                    reason,
                    reported_user: user.trim().to_string(),
                };
            }
            (
                ReporterState::DetailsGathered {
                    reason,
                    reported_user,
                },
                ReviewInput::Text(details),
            ) => {
                out.replies.push(
                    "Thank you for reporting. Our moderation team will review the message and \
                     take appropriate action."
                        .to_string(),
                );
                out.submitted = Some(SubmittedReport {
                    reason,
                    reported_user,
                    details,
                });
                self.state = ReporterState::Submitted;
            }
            (_, ReviewInput::TimedOut) => {
                out.replies
                    .push("You did not respond in time.".to_string());
            }
            // Off-script input: repeat what we are waiting for.
            (ReporterState::AwaitingCategory, _) => {
                out.prompt = Some(prompt::category_select());
            }
            (ReporterState::CategorySelected(_), _) => {
                out.prompt = Some(prompt::modifier_select());
            }
            (ReporterState::AwaitingReportedUser(_), _) => {
                out.replies.push(
                    "Who posted the content you are reporting? Please reply with their username."
                        .to_string(),
                );
            }
            (ReporterState::DetailsGathered { .. }, _) => {
                out.replies.push(
                    "Please reply with a link to, or a copy of, the message you are reporting."
                        .to_string(),
                );
            }
            (ReporterState::Submitted | ReporterState::Cancelled, _) => {}
        }

        out
    }
}
