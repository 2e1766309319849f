//! rules_flow.rs — per-user management of flagged phrases.
//!
//! `rules` in a DM opens the menu; add collects a new phrase, edit is
//! delete-then-collect, delete picks from the user's own phrases. Every
//! mutation goes through the record store, which keeps the global flag set
//! current for the matcher.

use std::sync::Arc;

use crate::prompt::{self, Prompt};
use crate::review::ReviewInput;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RulesState {
    Start,
    AwaitingMenuChoice,
    /// Waiting for a phrase; `editing` carries the phrase being replaced.
    AwaitingPhrase { editing: Option<String> },
    AwaitingEditPick,
    AwaitingDeletePick,
    Done,
    Cancelled,
}

#[derive(Debug, Default)]
pub struct StepOutput {
    pub replies: Vec<String>,
    pub prompt: Option<Prompt>,
}

pub struct RulesFlow {
    store: Arc<RecordStore>,
    user: String,
    state: RulesState,
}

impl RulesFlow {
    pub fn new(store: Arc<RecordStore>, user: impl Into<String>) -> Self {
        Self {
            store,
            user: user.into(),
            state: RulesState::Start,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, RulesState::Done | RulesState::Cancelled)
    }

    pub fn handle(&mut self, input: ReviewInput) -> StepOutput {
        let mut out = StepOutput::default();

        if self.is_complete() {
            return out;
        }
        if matches!(input, ReviewInput::Cancel) {
            self.state = RulesState::Cancelled;
            out.replies.push("Rule creation cancelled.".to_string());
            return out;
        }
        if matches!(input, ReviewInput::TimedOut) {
            out.replies.push("You did not respond in time.".to_string());
            return out;
        }

        let state = self.state.clone();
        match (state, input) {
            (RulesState::Start, _) => {
                let has_rules = !self.store.user_rules(&self.user).is_empty();
                out.replies
                    .push("Thank you for starting the rule creation process.".to_string());
                out.prompt = Some(prompt::rules_menu(has_rules));
                self.state = RulesState::AwaitingMenuChoice;
            }
            (RulesState::AwaitingMenuChoice, ReviewInput::Selection(values)) => {
                match values.first().map(String::as_str) {
                    Some("add") => {
                        out.replies.push(
                            "What word or phrase would you like to flag from the channel?"
                                .to_string(),
                        );
                        self.state = RulesState::AwaitingPhrase { editing: None };
                    }
                    Some("edit") => {
                        let phrases = self.store.user_rules(&self.user);
                        if phrases.is_empty() {
                            out.replies.push("You have no rules to edit.".to_string());
                            self.state = RulesState::Done;
                        } else {
                            out.prompt = Some(prompt::rule_pick("edit", &phrases));
                            self.state = RulesState::AwaitingEditPick;
                        }
                    }
                    Some("delete") => {
                        let phrases = self.store.user_rules(&self.user);
                        if phrases.is_empty() {
                            out.replies.push("You have no rules to delete.".to_string());
                            self.state = RulesState::Done;
                        } else {
                            out.prompt = Some(prompt::rule_pick("delete", &phrases));
                            self.state = RulesState::AwaitingDeletePick;
                        }
                    }
                    _ => {
                        let has_rules = !self.store.user_rules(&self.user).is_empty();
                        out.prompt = Some(prompt::rules_menu(has_rules));
                    }
                }
            }
            (RulesState::AwaitingEditPick, ReviewInput::Selection(values)) => {
                let picked = values.first().cloned().unwrap_or_default();
                if self.store.remove_rule(&self.user, &picked) {
                    out.replies
                        .push(format!("What would you like to update '{picked}' to?"));
                    self.state = RulesState::AwaitingPhrase {
                        editing: Some(picked),
                    };
                } else {
                    let phrases = self.store.user_rules(&self.user);
                    out.prompt = Some(prompt::rule_pick("edit", &phrases));
                }
            }
            (RulesState::AwaitingDeletePick, ReviewInput::Selection(values)) => {
                let picked = values.first().cloned().unwrap_or_default();
                if self.store.remove_rule(&self.user, &picked) {
                    out.replies
                        .push(format!("The rule for '{picked}' has been deleted."));
                    self.state = RulesState::Done;
                } else {
                    let phrases = self.store.user_rules(&self.user);
                    out.prompt = Some(prompt::rule_pick("delete", &phrases));
                }
            }
            (RulesState::AwaitingPhrase { editing }, ReviewInput::Text(phrase)) => {
                let phrase = phrase.trim().to_string();
                if self.store.user_rules(&self.user).contains(&phrase) {
                    out.replies
                        .push(format!("Rule for '{phrase}' is already in rules."));
                } else {
                    self.store.add_rule(&self.user, &phrase);
                    if editing.is_some() {
                        out.replies
                            .push(format!("Rule for '{phrase}' has been updated."));
                    } else {
                        out.replies.push(format!("Rule for '{phrase}' created."));
                    }
                }
                self.state = RulesState::Done;
            }
            (RulesState::Done | RulesState::Cancelled, _) => {}
            // Off-script input: ask again for what we were waiting for.
            (RulesState::AwaitingMenuChoice, _) => {
                let has_rules = !self.store.user_rules(&self.user).is_empty();
                out.prompt = Some(prompt::rules_menu(has_rules));
            }
            (RulesState::AwaitingEditPick, _) => {
                out.prompt = Some(prompt::rule_pick("edit", &self.store.user_rules(&self.user)));
            }
            (RulesState::AwaitingDeletePick, _) => {
                out.prompt = Some(prompt::rule_pick(
                    "delete",
                    &self.store.user_rules(&self.user),
                ));
            }
            (RulesState::AwaitingPhrase { .. }, _) => {
                out.replies
                    .push("Please reply with the word or phrase.".to_string());
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> Arc<RecordStore> {
        let path = std::env::temp_dir().join(format!(
            "mde-rulesflow-{name}-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(RecordStore::open(path))
    }

    fn select(value: &str) -> ReviewInput {
        ReviewInput::Selection(vec![value.to_string()])
    }

    #[test]
    fn add_rule_round_trip() {
        let store = temp_store("add");
        let mut flow = RulesFlow::new(store.clone(), "u1");

        let out = flow.handle(ReviewInput::Text("rules".into()));
        assert!(out.prompt.is_some());
        flow.handle(select("add"));
        let out = flow.handle(ReviewInput::Text("cash now".into()));
        assert_eq!(out.replies, vec!["Rule for 'cash now' created."]);
        assert!(flow.is_complete());
        assert_eq!(store.global_flags(), vec!["cash now"]);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let store = temp_store("dup");
        store.add_rule("u1", "money");
        let mut flow = RulesFlow::new(store.clone(), "u1");
        flow.handle(ReviewInput::Text("rules".into()));
        flow.handle(select("add"));
        let out = flow.handle(ReviewInput::Text("money".into()));
        assert_eq!(out.replies, vec!["Rule for 'money' is already in rules."]);
        assert_eq!(store.user_rules("u1"), vec!["money"]);
    }

    #[test]
    fn edit_replaces_the_phrase() {
        let store = temp_store("edit");
        store.add_rule("u1", "crypto");
        let mut flow = RulesFlow::new(store.clone(), "u1");
        flow.handle(ReviewInput::Text("rules".into()));
        let out = flow.handle(select("edit"));
        assert!(out.prompt.is_some());
        flow.handle(select("crypto"));
        let out = flow.handle(ReviewInput::Text("crypto deal".into()));
        assert_eq!(out.replies, vec!["Rule for 'crypto deal' has been updated."]);
        assert_eq!(store.user_rules("u1"), vec!["crypto deal"]);
    }

    #[test]
    fn delete_removes_and_updates_global_set() {
        let store = temp_store("delete");
        store.add_rule("u1", "money");
        let mut flow = RulesFlow::new(store.clone(), "u1");
        flow.handle(ReviewInput::Text("rules".into()));
        flow.handle(select("delete"));
        let out = flow.handle(select("money"));
        assert_eq!(out.replies, vec!["The rule for 'money' has been deleted."]);
        assert!(store.global_flags().is_empty());
        assert!(flow.is_complete());
    }

    #[test]
    fn menu_offers_edit_delete_only_with_rules() {
        let store = temp_store("menu");
        let mut flow = RulesFlow::new(store.clone(), "u1");
        let out = flow.handle(ReviewInput::Text("rules".into()));
        assert_eq!(out.prompt.unwrap().options.len(), 1);

        store.add_rule("u1", "money");
        let mut flow = RulesFlow::new(store, "u1");
        let out = flow.handle(ReviewInput::Text("rules".into()));
        assert_eq!(out.prompt.unwrap().options.len(), 3);
    }

    #[test]
    fn cancel_leaves_store_untouched() {
        let store = temp_store("cancel");
        store.add_rule("u1", "money");
        let mut flow = RulesFlow::new(store.clone(), "u1");
        flow.handle(ReviewInput::Text("rules".into()));
        flow.handle(select("delete"));
        let out = flow.handle(ReviewInput::Cancel);
        assert_eq!(out.replies, vec!["Rule creation cancelled."]);
        assert!(flow.is_complete());
        assert_eq!(store.user_rules("u1"), vec!["money"]);
    }
}
