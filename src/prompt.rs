//! prompt.rs — declarative interactive-prompt descriptors.
//!
//! The state machines return these; the rendering layer (whatever it is)
//! only displays the options and reports selected values back. No
//! callbacks, no per-widget state.

use serde::{Deserialize, Serialize};

use crate::report::{Action, ActionSet, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub label: String,
    pub value: String,
    pub description: String,
    /// Pre-selected in the rendered menu (policy defaults).
    #[serde(default)]
    pub preselected: bool,
}

impl PromptOption {
    pub fn new(label: &str, value: &str, description: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
            description: description.to_string(),
            preselected: false,
        }
    }

    pub fn preselected(mut self, on: bool) -> Self {
        self.preselected = on;
        self
    }
}

/// A labeled set of choices with single/multi cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    pub options: Vec<PromptOption>,
    pub cardinality: Cardinality,
}

impl Prompt {
    pub fn single(text: impl Into<String>, options: Vec<PromptOption>) -> Self {
        Self {
            text: text.into(),
            options,
            cardinality: Cardinality::Single,
        }
    }

    pub fn multi(text: impl Into<String>, options: Vec<PromptOption>) -> Self {
        Self {
            text: text.into(),
            options,
            cardinality: Cardinality::Multi,
        }
    }

    pub fn preselected_values(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|o| o.preselected)
            .map(|o| o.value.clone())
            .collect()
    }
}

/// Reply value for the action prompt's one-click shortcut.
pub const CONFIRM_RECOMMENDED: &str = "confirm";
/// Reply value declining every action.
pub const NO_ACTION: &str = "No action taken";

/// Category selection shown to a reporter.
pub fn category_select() -> Prompt {
    let options = Category::ALL
        .iter()
        .map(|c| PromptOption::new(c.label(), c.label(), c.description()))
        .collect();
    Prompt::single("Please select the reason for reporting.", options)
}

/// Modifier refinement shown to a reporter after the category.
pub fn modifier_select() -> Prompt {
    let mut options: Vec<PromptOption> = crate::report::Modifier::ALL
        .iter()
        .map(|m| PromptOption::new(m.label(), m.label(), "Applies to the reported content"))
        .collect();
    options.push(PromptOption::new(
        "None of these",
        "none",
        "No additional detail applies",
    ));
    Prompt::multi(
        "Select any details that apply to the reported content.",
        options,
    )
}

/// Legitimacy review shown to a moderator.
pub fn legitimacy() -> Prompt {
    Prompt::single(
        "Is the report reason appropriate for the reported content?",
        vec![
            PromptOption::new("Yes", "legitimate", "The report reason is appropriate"),
            PromptOption::new(
                "No, revision required",
                "update required",
                "The report reason needs to be revised",
            ),
            PromptOption::new(
                "No, false report",
                "not legitimate",
                "The content was falsely reported",
            ),
        ],
    )
}

/// Manual link review shown to a moderator.
pub fn malicious_link() -> Prompt {
    Prompt::single(
        "Please review the reported link. Is it malicious?",
        vec![
            PromptOption::new("Yes", "yes", "The link is malicious"),
            PromptOption::new("No", "no", "The link is not malicious"),
        ],
    )
}

/// Editable action multi-select, defaulting to the policy recommendation.
pub fn action_confirmation(recommended: &ActionSet) -> Prompt {
    let mut options: Vec<PromptOption> = Action::ALL
        .iter()
        .map(|a| {
            PromptOption::new(a.label(), a.label(), a.applied_notice())
                .preselected(recommended.is_set(*a))
        })
        .collect();
    options.push(PromptOption::new(
        "No action required",
        NO_ACTION,
        "Report was false or no action needed",
    ));
    Prompt::multi(
        "Please select the action(s) you want to take. To proceed with the \
         preselected, recommended actions, reply 'confirm'. If not, please \
         update the selection of appropriate actions.",
        options,
    )
}

/// Rule-management menu; edit/delete only offered once the user has rules.
pub fn rules_menu(has_rules: bool) -> Prompt {
    let mut options = vec![PromptOption::new(
        "Add a Rule",
        "add",
        "You can add a new word to flag",
    )];
    if has_rules {
        options.push(PromptOption::new(
            "Edit a Rule",
            "edit",
            "Edit a previously added rule",
        ));
        options.push(PromptOption::new(
            "Delete a Rule",
            "delete",
            "Delete a previously added rule",
        ));
    }
    Prompt::single("Select an option", options)
}

/// Single-select over the user's own phrases (edit/delete flows).
pub fn rule_pick(verb: &str, phrases: &[String]) -> Prompt {
    let options = phrases
        .iter()
        .map(|p| PromptOption::new(p, p, &format!("{verb} '{p}'")))
        .collect();
    Prompt::single(
        format!("Please select the rule you would like to {verb}"),
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy;
    use crate::report::{Category, ReportReason};

    #[test]
    fn category_select_lists_all_categories() {
        let p = category_select();
        assert_eq!(p.cardinality, Cardinality::Single);
        assert_eq!(p.options.len(), Category::ALL.len());
    }

    #[test]
    fn action_prompt_preselects_policy_defaults() {
        let reason = ReportReason::new(Category::InvestmentScam);
        let recommended = policy::recommend(&reason, 0);
        let p = action_confirmation(&recommended);
        assert_eq!(p.cardinality, Cardinality::Multi);
        assert_eq!(
            p.preselected_values(),
            vec!["Ban User".to_string(), "Remove Post".to_string()]
        );
        // "No action" is always on offer, never preselected.
        assert!(p.options.iter().any(|o| o.value == NO_ACTION && !o.preselected));
    }

    #[test]
    fn rules_menu_grows_with_ownership() {
        assert_eq!(rules_menu(false).options.len(), 1);
        assert_eq!(rules_menu(true).options.len(), 3);
    }
}
