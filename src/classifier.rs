//! classifier.rs — scam-text classification boundary.
//!
//! The engine only depends on the `ScamClassifier` trait; the shipped
//! implementation is a TF-IDF vectorizer fit once at startup over the
//! embedded labeled corpus, feeding a multinomial naive Bayes. Training is
//! deterministic, inference is stateless.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;

/// Labeled training document. `label` is 1 for scam, 0 for benign.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusEntry {
    pub text: String,
    pub label: u8,
}

static CORPUS: Lazy<Vec<CorpusEntry>> = Lazy::new(|| {
    let raw = include_str!("../data/scam_corpus.json");
    serde_json::from_str::<Vec<CorpusEntry>>(raw).expect("valid scam corpus")
});

/// Binary text classifier boundary. Implementations must be stateless at
/// inference time so a single instance can serve concurrent evaluations.
pub trait ScamClassifier: Send + Sync {
    /// `true` = the message reads like a scam.
    fn predict(&self, text: &str) -> bool;
    fn name(&self) -> &'static str;
}

/// Predicts `false` always; used when classification is switched off.
pub struct DisabledClassifier;

impl ScamClassifier for DisabledClassifier {
    fn predict(&self, _text: &str) -> bool {
        false
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "for", "from", "has", "have", "i",
    "if", "in", "is", "it", "me", "my", "of", "on", "or", "our", "so", "that", "the", "this",
    "to", "was", "we", "will", "with", "you", "your",
];

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

/// Laplace smoothing for the naive Bayes term probabilities.
const SMOOTHING: f64 = 1.0;

/// TF-IDF + multinomial naive Bayes, fit once at construction.
pub struct TfidfNaiveBayes {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
}

impl TfidfNaiveBayes {
    /// Fit over the embedded corpus.
    pub fn from_embedded_corpus() -> Self {
        Self::fit(&CORPUS)
    }

    pub fn fit(docs: &[CorpusEntry]) -> Self {
        // Vocabulary and document frequencies.
        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<u32> = Vec::new();
        let mut doc_tokens: Vec<(Vec<usize>, u8)> = Vec::with_capacity(docs.len());

        for doc in docs {
            let mut ids = Vec::new();
            let mut seen = std::collections::HashSet::new();
            for token in tokenize(&doc.text) {
                let next_id = vocab.len();
                let id = *vocab.entry(token).or_insert(next_id);
                if id == doc_freq.len() {
                    doc_freq.push(0);
                }
                if seen.insert(id) {
                    doc_freq[id] += 1;
                }
                ids.push(id);
            }
            doc_tokens.push((ids, doc.label));
        }

        // Smoothed inverse document frequency.
        let n_docs = docs.len() as f64;
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|df| ((1.0 + n_docs) / (1.0 + f64::from(*df))).ln() + 1.0)
            .collect();

        // Per-class accumulated tf-idf mass per term.
        let mut class_counts = [0usize; 2];
        let mut feature_sums = [vec![0.0f64; vocab.len()], vec![0.0f64; vocab.len()]];
        for (ids, label) in &doc_tokens {
            let class = usize::from(*label == 1);
            class_counts[class] += 1;
            let mut tf: HashMap<usize, f64> = HashMap::new();
            for id in ids {
                *tf.entry(*id).or_insert(0.0) += 1.0;
            }
            for (id, count) in tf {
                feature_sums[class][id] += count * idf[id];
            }
        }

        let total_docs = (class_counts[0] + class_counts[1]).max(1) as f64;
        let class_log_prior = [
            (class_counts[0].max(1) as f64 / total_docs).ln(),
            (class_counts[1].max(1) as f64 / total_docs).ln(),
        ];

        let vocab_len = vocab.len() as f64;
        let feature_log_prob = [0usize, 1].map(|class| {
            let mass: f64 = feature_sums[class].iter().sum();
            feature_sums[class]
                .iter()
                .map(|s| ((s + SMOOTHING) / (mass + SMOOTHING * vocab_len)).ln())
                .collect::<Vec<f64>>()
        });

        Self {
            vocab,
            idf,
            class_log_prior,
            feature_log_prob,
        }
    }

    /// tf-idf weights of the known tokens in the input.
    fn vectorize(&self, text: &str) -> Vec<(usize, f64)> {
        let mut tf: HashMap<usize, f64> = HashMap::new();
        for token in tokenize(text) {
            if let Some(id) = self.vocab.get(&token) {
                *tf.entry(*id).or_insert(0.0) += 1.0;
            }
        }
        tf.into_iter()
            .map(|(id, count)| (id, count * self.idf[id]))
            .collect()
    }
}

impl ScamClassifier for TfidfNaiveBayes {
    fn predict(&self, text: &str) -> bool {
        let features = self.vectorize(text);
        if features.is_empty() {
            return false;
        }
        let mut scores = self.class_log_prior;
        for (id, weight) in features {
            scores[0] += weight * self.feature_log_prob[0][id];
            scores[1] += weight * self.feature_log_prob[1][id];
        }
        scores[1] > scores[0]
    }

    fn name(&self) -> &'static str {
        "tfidf-nb"
    }
}
