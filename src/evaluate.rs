//! evaluate.rs — per-message signal evaluation and moderator-channel rendering.
//!
//! Fans a message out to the link resolver, the rule matcher, and the scam
//! classifier, then collapses the results into a signal set the engine acts
//! on. Message text is only ever logged as an anonymized fingerprint.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::debug;

use crate::classifier::ScamClassifier;
use crate::linkscan::{LinkScanner, LinkVerdict};
use crate::report::MessageRef;
use crate::rules::RuleMatcher;

/// Everything the automated pass found in one message.
#[derive(Debug, Default)]
pub struct MessageSignals {
    pub links: HashMap<String, LinkVerdict>,
    pub rule_hits: Vec<String>,
    pub scam: bool,
}

impl MessageSignals {
    /// Any malicious or needs-review verdict marks the message.
    pub fn suspicious_link(&self) -> bool {
        self.links.values().any(LinkVerdict::is_flagged)
    }

    pub fn any(&self) -> bool {
        self.suspicious_link() || !self.rule_hits.is_empty() || self.scam
    }

    pub fn malicious_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .links
            .iter()
            .filter(|(_, v)| **v == LinkVerdict::Malicious)
            .map(|(u, _)| u.clone())
            .collect();
        urls.sort();
        urls
    }

    pub fn review_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .links
            .iter()
            .filter(|(_, v)| **v == LinkVerdict::NeedsManualReview)
            .map(|(u, _)| u.clone())
            .collect();
        urls.sort();
        urls
    }
}

/// Short anonymized fingerprint for logging message content.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Runs every automated signal over a message.
pub struct MessageEvaluator {
    scanner: LinkScanner,
    matcher: RuleMatcher,
    classifier: Arc<dyn ScamClassifier>,
}

impl MessageEvaluator {
    pub fn new(
        scanner: LinkScanner,
        matcher: RuleMatcher,
        classifier: Arc<dyn ScamClassifier>,
    ) -> Self {
        Self {
            scanner,
            matcher,
            classifier,
        }
    }

    pub async fn evaluate(&self, text: &str) -> MessageSignals {
        counter!("messages_evaluated_total").increment(1);

        let links = self.scanner.resolve(text).await;
        let rule_hits = self.matcher.matches(text);
        let scam = self.classifier.predict(text);

        let signals = MessageSignals {
            links,
            rule_hits,
            scam,
        };
        if signals.any() {
            counter!("messages_flagged_total").increment(1);
            debug!(
                msg = %anon_hash(text),
                links = signals.links.len(),
                rule_hits = signals.rule_hits.len(),
                scam = signals.scam,
                "message flagged"
            );
        }
        signals
    }
}

// --- Moderator-channel rendering ----------------------------------------

fn quoted(message: &MessageRef) -> String {
    format!("```{}: {}```", message.author, message.text)
}

fn filing_date() -> String {
    Utc::now().format("%B %d, %Y").to_string()
}

/// Automated (or re-run) suspicious-link report.
pub fn link_report(message: &MessageRef, signals: &MessageSignals, automated: bool) -> String {
    let mut out = String::new();
    if automated {
        out.push_str(&format!(
            "An automated report was filed on {} on the following message:\n{}\n* Report reason: Suspicious Link\n* Priority: {}",
            filing_date(),
            quoted(message),
            crate::triage::Priority::new(4)
        ));
    }
    let malicious = signals.malicious_urls();
    if !malicious.is_empty() {
        out.push_str(&format!(
            "\n* The following links were verified as malicious = {}.",
            malicious.join(",")
        ));
    }
    let review = signals.review_urls();
    if !review.is_empty() {
        out.push_str(&format!(
            "\n* The following links require manual review = {}.",
            review.join(",")
        ));
    }
    out
}

/// Notice for messages that only tripped community phrase rules.
pub fn rules_notice(message: &MessageRef, hits: &[String]) -> String {
    format!(
        "The following message was automatically flagged and deleted:\n{}\nThis is due to containing the following phrase(s): {}",
        quoted(message),
        hits.join(", ")
    )
}

/// Automated scam-classifier report.
pub fn scam_report(message: &MessageRef) -> String {
    format!(
        "An automated report was filed on {} on the following message:\n{}\n* Report reason: Suspected Cryptocurrency Scam\n* Priority: {}\n\nPlease determine if this is a scam and select the appropriate actions, if required.",
        filing_date(),
        quoted(message),
        crate::triage::Priority::new(3)
    )
}

/// Header for a reporter-submitted case, including the reported user's
/// history.
pub fn submitted_summary(
    message: &MessageRef,
    reason: &crate::report::ReportReason,
    priority: Option<crate::triage::Priority>,
    offenses: u32,
) -> String {
    let priority_line = match priority {
        Some(p) => format!("* Priority: {p}"),
        None => "* Priority: undetermined; please assign manually.".to_string(),
    };
    format!(
        "A report was filed on {} on the following message:\n{}\n* Report reason: {}\n{}\n* {} has had {} report(s) confirmed against them\n\nIs the report reason appropriate for the reported content?",
        filing_date(),
        quoted(message),
        reason,
        priority_line,
        message.author,
        offenses
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Category, ReportReason};

    fn msg(text: &str) -> MessageRef {
        MessageRef {
            author: "actor".to_string(),
            channel: "general".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn link_report_lists_both_url_groups() {
        let mut signals = MessageSignals::default();
        signals
            .links
            .insert("https://scam.com".to_string(), LinkVerdict::Malicious);
        signals.links.insert(
            "http://shady.example".to_string(),
            LinkVerdict::NeedsManualReview,
        );
        let text = link_report(&msg("see https://scam.com"), &signals, true);
        assert!(text.contains("Report reason: Suspicious Link"));
        assert!(text.contains("verified as malicious = https://scam.com"));
        assert!(text.contains("require manual review = http://shady.example"));
        assert!(text.contains("P4"));
    }

    #[test]
    fn rules_notice_names_the_phrases() {
        let text = rules_notice(&msg("send cash now"), &["cash".to_string()]);
        assert!(text.contains("actor: send cash now"));
        assert!(text.contains("phrase(s): cash"));
    }

    #[test]
    fn submitted_summary_carries_offense_history() {
        let reason = ReportReason::new(Category::Blackmail);
        let text = submitted_summary(&msg("pay up"), &reason, None, 2);
        assert!(text.contains("Report reason: Blackmail"));
        assert!(text.contains("undetermined"));
        assert!(text.contains("actor has had 2 report(s)"));
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("hello"), anon_hash("hello"));
        assert_eq!(anon_hash("hello").len(), 12);
        assert_ne!(anon_hash("hello"), anon_hash("world"));
    }
}
