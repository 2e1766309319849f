//! rules.rs — phrase matcher over the community's flagged terms.
//!
//! One case-insensitive alternation is compiled from the global flag set
//! (every phrase literally escaped) and cached until the store's phrase
//! generation changes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::store::RecordStore;

struct MatcherCache {
    generation: u64,
    /// None when the flag set is empty: no phrases, no pattern, no matches.
    pattern: Option<Regex>,
    /// lowercased match → canonical phrase
    canonical: HashMap<String, String>,
}

/// Scans message text against the union of all users' flagged phrases.
pub struct RuleMatcher {
    store: Arc<RecordStore>,
    cache: RwLock<MatcherCache>,
}

impl RuleMatcher {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(MatcherCache {
                generation: u64::MAX,
                pattern: None,
                canonical: HashMap::new(),
            }),
        }
    }

    /// Matched phrases, deduplicated in first-hit order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        self.refresh();

        let cache = self.cache.read().expect("matcher cache lock poisoned");
        let Some(pattern) = &cache.pattern else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        for m in pattern.find_iter(text) {
            let key = m.as_str().to_lowercase();
            if let Some(phrase) = cache.canonical.get(&key) {
                if !hits.contains(phrase) {
                    hits.push(phrase.clone());
                }
            }
        }
        hits
    }

    /// Rebuild the alternation if the global flag set changed.
    fn refresh(&self) {
        let generation = self.store.rules_generation();
        {
            let cache = self.cache.read().expect("matcher cache lock poisoned");
            if cache.generation == generation {
                return;
            }
        }

        let mut phrases = self.store.global_flags();
        // Longest first so overlapping phrases resolve to the longer one.
        phrases.sort_by(|a, b| b.len().cmp(&a.len()));

        let pattern = if phrases.is_empty() {
            None
        } else {
            let alternation = phrases
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!("(?i){alternation}")).expect("escaped alternation compiles"))
        };

        let canonical = phrases
            .iter()
            .map(|p| (p.to_lowercase(), p.clone()))
            .collect();

        let mut cache = self.cache.write().expect("matcher cache lock poisoned");
        *cache = MatcherCache {
            generation,
            pattern,
            canonical,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(name: &str, rules: &[(&str, &str)]) -> Arc<RecordStore> {
        let path = std::env::temp_dir().join(format!(
            "mde-rules-{name}-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let store = Arc::new(RecordStore::open(path));
        for (user, phrase) in rules {
            store.add_rule(user, phrase);
        }
        store
    }

    #[test]
    fn finds_phrases_across_users() {
        let matcher = RuleMatcher::new(store_with(
            "across",
            &[("u1", "get you"), ("u2", "cash"), ("u2", "money")],
        ));
        assert_eq!(matcher.matches("Im going to get you"), vec!["get you"]);
        assert_eq!(matcher.matches("I love me some cash"), vec!["cash"]);
        assert!(matcher.matches("I love me some crypto").is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let matcher = RuleMatcher::new(store_with("case", &[("u1", "money")]));
        assert_eq!(matcher.matches("You cash now have your MONEY"), vec!["money"]);
    }

    #[test]
    fn empty_flag_set_matches_nothing() {
        let matcher = RuleMatcher::new(store_with("empty", &[]));
        assert!(matcher.matches("anything at all").is_empty());
    }

    #[test]
    fn phrases_are_escaped_literally() {
        let matcher = RuleMatcher::new(store_with("escape", &[("u1", "win $$$ (fast)")]));
        assert_eq!(
            matcher.matches("you can win $$$ (fast) today"),
            vec!["win $$$ (fast)"]
        );
        assert!(matcher.matches("win dollars fast").is_empty());
    }

    #[test]
    fn picks_up_newly_added_rules() {
        let store = store_with("reload", &[("u1", "money")]);
        let matcher = RuleMatcher::new(store.clone());
        assert!(matcher.matches("send crypto").is_empty());
        store.add_rule("u2", "crypto");
        assert_eq!(matcher.matches("send crypto"), vec!["crypto"]);
    }

    #[test]
    fn longer_phrase_wins_overlap() {
        let matcher = RuleMatcher::new(store_with(
            "overlap",
            &[("u1", "cash"), ("u2", "cash now")],
        ));
        assert_eq!(matcher.matches("give me cash now"), vec!["cash now"]);
    }
}
