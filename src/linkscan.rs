//! linkscan.rs — URL extraction and link-reputation resolution.
//!
//! Every URL found in a message resolves to a `LinkVerdict` using a shared
//! append-only blacklist cache and an external multi-vendor reputation
//! service. The provider is a trait so tests run against a deterministic
//! mock; the shipped provider speaks a VirusTotal-style two-step API.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, gauge};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

/// Generic host pattern: optional scheme, optional `www.`, at least one
/// `label.tld` pair, optional path. A scheme is deliberately not required.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:https?://)?(?:www\.)?[a-zA-Z0-9-]+(?:\.[a-zA-Z]{2,})+(?:/[a-zA-Z0-9@:%_+.~#?&/=,-]*)?")
        .expect("valid url pattern")
});

/// Vendor consensus needed to auto-confirm a URL as malicious.
const MALICIOUS_VENDOR_FLOOR: u32 = 5;

/// Per-URL resolution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkVerdict {
    Clean,
    NeedsManualReview,
    Malicious,
}

impl LinkVerdict {
    /// Whether this verdict contributes to the message's suspicious-link signal.
    pub fn is_flagged(&self) -> bool {
        !matches!(self, LinkVerdict::Clean)
    }
}

/// Process-local set of URLs already confirmed malicious. Append-only for
/// the process lifetime and shared across all concurrent evaluations.
#[derive(Debug)]
pub struct Blacklist {
    inner: RwLock<HashSet<String>>,
}

impl Blacklist {
    /// Starts from the known-bad seed list.
    pub fn seeded() -> Self {
        let mut set = HashSet::new();
        set.insert("https://scam.com".to_string());
        Self {
            inner: RwLock::new(set),
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(HashSet::new()),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.read().expect("blacklist lock poisoned").contains(url)
    }

    /// Returns true if the URL was newly added.
    pub fn insert(&self, url: &str) -> bool {
        let mut guard = self.inner.write().expect("blacklist lock poisoned");
        let added = guard.insert(url.to_string());
        if added {
            gauge!("blacklist_size").set(guard.len() as f64);
        }
        added
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("blacklist lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-category vendor tallies for one URL. `total` is the sum of all
/// categories; zero total means the service has no data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorTally(pub HashMap<String, u32>);

impl VendorTally {
    pub fn malicious(&self) -> u32 {
        self.0.get("malicious").copied().unwrap_or(0)
    }

    pub fn suspicious(&self) -> u32 {
        self.0.get("suspicious").copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }
}

/// Low-level reputation lookup. Separated so production and tests share the
/// same resolution logic.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    async fn tallies(&self, url: &str) -> anyhow::Result<VendorTally>;
    fn name(&self) -> &'static str;
}

// --- VirusTotal-style provider -----------------------------------------

#[derive(Deserialize)]
struct SubmitResponse {
    data: SubmitData,
}

#[derive(Deserialize)]
struct SubmitData {
    id: String,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    data: AnalysisData,
}

#[derive(Deserialize)]
struct AnalysisData {
    attributes: AnalysisAttributes,
}

#[derive(Deserialize)]
struct AnalysisAttributes {
    stats: HashMap<String, u32>,
}

/// Multi-vendor URL scanning service: submit the URL, then fetch the
/// per-category stats of the resulting analysis.
pub struct VirusTotalProvider {
    http: reqwest::Client,
    api_key: String,
    base: String,
}

impl VirusTotalProvider {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("moderation-decision-engine/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            base: "https://www.virustotal.com/api/v3".to_string(),
        }
    }

    /// Point at a different endpoint (local stub server).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }
}

#[async_trait]
impl ReputationProvider for VirusTotalProvider {
    async fn tallies(&self, url: &str) -> anyhow::Result<VendorTally> {
        let submit: SubmitResponse = self
            .http
            .post(format!("{}/urls", self.base))
            .header("x-apikey", &self.api_key)
            .form(&[("url", url)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let analysis: AnalysisResponse = self
            .http
            .get(format!("{}/analyses/{}", self.base, submit.data.id))
            .header("x-apikey", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(VendorTally(analysis.data.attributes.stats))
    }

    fn name(&self) -> &'static str {
        "virustotal"
    }
}

// --- Test/mock provider -------------------------------------------------

/// Deterministic provider for tests: canned tallies per URL, optional
/// forced failures, and a call log to assert on lookup counts.
#[derive(Default)]
pub struct MockProvider {
    pub responses: HashMap<String, VendorTally>,
    pub failures: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tally(mut self, url: &str, pairs: &[(&str, u32)]) -> Self {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<HashMap<_, _>>();
        self.responses.insert(url.to_string(), VendorTally(map));
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock call log").len()
    }
}

#[async_trait]
impl ReputationProvider for MockProvider {
    async fn tallies(&self, url: &str) -> anyhow::Result<VendorTally> {
        self.calls
            .lock()
            .expect("mock call log")
            .push(url.to_string());
        if self.failures.contains(url) {
            anyhow::bail!("simulated lookup failure for {url}");
        }
        Ok(self.responses.get(url).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// --- Extraction & resolution --------------------------------------------

/// URLs found in the text, deduplicated in first-seen order.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// Schemeless URLs are checked under both schemes; a URL that already
/// carries one is its own single variant.
pub fn variants(url: &str) -> Vec<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        vec![url.to_string()]
    } else {
        vec![format!("http://{url}"), format!("https://{url}")]
    }
}

/// Resolves message URLs against the blacklist cache and the reputation
/// provider.
pub struct LinkScanner {
    provider: Arc<dyn ReputationProvider>,
    blacklist: Arc<Blacklist>,
}

impl LinkScanner {
    pub fn new(provider: Arc<dyn ReputationProvider>, blacklist: Arc<Blacklist>) -> Self {
        Self {
            provider,
            blacklist,
        }
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    /// Verdict for every URL in the message text.
    pub async fn resolve(&self, text: &str) -> HashMap<String, LinkVerdict> {
        let mut verdicts = HashMap::new();
        for url in extract_urls(text) {
            let verdict = self.resolve_url(&url).await;
            debug!(url = %url, ?verdict, "link resolved");
            verdicts.insert(url, verdict);
        }
        verdicts
    }

    async fn resolve_url(&self, url: &str) -> LinkVerdict {
        let mut suspicious_acc: u32 = 0;
        let mut total_acc: u32 = 0;

        for variant in variants(url) {
            // Cache first: a confirmed-malicious URL never goes back out
            // to the vendors.
            if self.blacklist.contains(&variant) {
                return LinkVerdict::Malicious;
            }

            counter!("reputation_lookups_total").increment(1);
            let tally = match self.provider.tallies(&variant).await {
                Ok(t) => t,
                Err(e) => {
                    // A failed lookup contributes nothing; the message
                    // evaluation must not fail with it.
                    warn!(url = %variant, provider = self.provider.name(), error = %e, "reputation lookup failed");
                    counter!("reputation_lookup_errors_total").increment(1);
                    continue;
                }
            };

            let total = tally.total();
            if total == 0 {
                continue;
            }
            if tally.malicious() >= MALICIOUS_VENDOR_FLOOR {
                self.blacklist.insert(&variant);
                return LinkVerdict::Malicious;
            }
            if f64::from(tally.suspicious()) / f64::from(total) > 0.5 {
                return LinkVerdict::NeedsManualReview;
            }
            suspicious_acc += tally.suspicious();
            total_acc += total;
        }

        // No vendor consensus at all: a human has to look.
        if total_acc == 0 {
            return LinkVerdict::NeedsManualReview;
        }
        if f64::from(suspicious_acc) / f64::from(total_acc) > 0.5 {
            LinkVerdict::NeedsManualReview
        } else {
            LinkVerdict::Clean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(provider: MockProvider) -> (LinkScanner, Arc<Blacklist>) {
        let blacklist = Arc::new(Blacklist::seeded());
        (
            LinkScanner::new(Arc::new(provider), blacklist.clone()),
            blacklist,
        )
    }

    #[test]
    fn extracts_with_and_without_scheme() {
        let urls = extract_urls("see https://example.com/path and also tinyurl.io ok");
        assert_eq!(urls, vec!["https://example.com/path", "tinyurl.io"]);
    }

    #[test]
    fn extraction_dedupes_and_ignores_plain_words() {
        let urls = extract_urls("go to scam.com, really scam.com, not a url here");
        assert_eq!(urls, vec!["scam.com"]);
        assert!(extract_urls("nothing suspicious at all").is_empty());
    }

    #[test]
    fn variants_only_expand_schemeless() {
        assert_eq!(
            variants("scam.com"),
            vec!["http://scam.com", "https://scam.com"]
        );
        assert_eq!(variants("https://scam.com"), vec!["https://scam.com"]);
    }

    #[tokio::test]
    async fn blacklisted_url_skips_external_lookup() {
        let provider = Arc::new(MockProvider::new());
        let scanner = LinkScanner::new(provider.clone(), Arc::new(Blacklist::seeded()));
        let verdicts = scanner.resolve("careful: https://scam.com").await;
        assert_eq!(verdicts["https://scam.com"], LinkVerdict::Malicious);
        // Provider must not have been consulted at all.
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn vendor_consensus_adds_to_blacklist() {
        let provider =
            MockProvider::new().with_tally("http://evil.example", &[("malicious", 7), ("harmless", 3)]);
        let (scanner, blacklist) = scanner(provider);
        let verdicts = scanner.resolve("http://evil.example").await;
        assert_eq!(verdicts["http://evil.example"], LinkVerdict::Malicious);
        assert!(blacklist.contains("http://evil.example"));
    }

    #[tokio::test]
    async fn suspicious_majority_needs_manual_review() {
        let provider = MockProvider::new()
            .with_tally("http://shady.example", &[("suspicious", 6), ("harmless", 4)]);
        let (scanner, _) = scanner(provider);
        let verdicts = scanner.resolve("http://shady.example").await;
        assert_eq!(
            verdicts["http://shady.example"],
            LinkVerdict::NeedsManualReview
        );
    }

    #[tokio::test]
    async fn no_vendor_data_needs_manual_review() {
        let (scanner, _) = scanner(MockProvider::new());
        let verdicts = scanner.resolve("http://unknown.example").await;
        assert_eq!(
            verdicts["http://unknown.example"],
            LinkVerdict::NeedsManualReview
        );
    }

    #[tokio::test]
    async fn tallies_accumulate_across_variants() {
        // Each variant is individually under the 0.5 ratio and stays under
        // it when accumulated: the URL comes back clean.
        let provider = MockProvider::new()
            .with_tally("http://mixed.example", &[("suspicious", 2), ("harmless", 8)])
            .with_tally("https://mixed.example", &[("suspicious", 1), ("harmless", 9)]);
        let (scanner, _) = scanner(provider);
        let verdicts = scanner.resolve("mixed.example").await;
        assert_eq!(verdicts["mixed.example"], LinkVerdict::Clean);
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_remaining_variant() {
        let provider = MockProvider::new()
            .with_failure("http://flaky.example")
            .with_tally("https://flaky.example", &[("harmless", 10)]);
        let (scanner, _) = scanner(provider);
        let verdicts = scanner.resolve("flaky.example").await;
        assert_eq!(verdicts["flaky.example"], LinkVerdict::Clean);
    }

    #[tokio::test]
    async fn failure_on_all_variants_means_no_data() {
        let provider = MockProvider::new()
            .with_failure("http://down.example")
            .with_failure("https://down.example");
        let (scanner, _) = scanner(provider);
        let verdicts = scanner.resolve("down.example").await;
        assert_eq!(verdicts["down.example"], LinkVerdict::NeedsManualReview);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_for_clean_urls() {
        let provider = MockProvider::new()
            .with_tally("http://fine.example", &[("harmless", 10)])
            .with_tally("https://fine.example", &[("harmless", 10)]);
        let (scanner, _) = scanner(provider);
        let first = scanner.resolve("fine.example").await;
        let second = scanner.resolve("fine.example").await;
        assert_eq!(first["fine.example"], LinkVerdict::Clean);
        assert_eq!(first["fine.example"], second["fine.example"]);
    }
}
