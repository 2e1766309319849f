//! config.rs — startup configuration and credentials.
//!
//! Environment variables first (a `.env` file is honored via `dotenvy` in
//! the entrypoint), with a `tokens.json` fallback for the two credentials.
//! A missing reputation credential is fatal before any event is accepted.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;

pub const ENV_REPUTATION_API_KEY: &str = "REPUTATION_API_KEY";
pub const ENV_AUTHORITY_WEBHOOK: &str = "AUTHORITY_WEBHOOK_URL";
pub const ENV_STORE_PATH: &str = "RECORD_STORE_PATH";
pub const ENV_REPLY_TIMEOUT: &str = "REPLY_TIMEOUT_SECS";
pub const ENV_MOD_CHANNEL: &str = "MOD_CHANNEL";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_STORE_PATH: &str = "state/records.json";
pub const DEFAULT_MOD_CHANNEL: &str = "moderation";
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 300;

const TOKENS_FILE: &str = "tokens.json";

/// Optional on-disk credential fallback.
#[derive(Debug, Clone, Default, Deserialize)]
struct TokensFile {
    #[serde(default)]
    reputation: Option<String>,
    #[serde(default)]
    authority_webhook: Option<String>,
}

fn load_tokens_file(path: &Path) -> TokensFile {
    match std::fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => TokensFile::default(),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub reputation_api_key: String,
    pub authority_webhook: Option<String>,
    pub store_path: String,
    pub reply_timeout_secs: u64,
    pub mod_channel: String,
    pub metrics_addr: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tokens = load_tokens_file(Path::new(TOKENS_FILE));
        Self::resolve(|name| std::env::var(name).ok(), tokens)
    }

    fn resolve<F>(env: F, tokens: TokensFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reputation_api_key = env(ENV_REPUTATION_API_KEY)
            .filter(|v| !v.is_empty())
            .or(tokens.reputation)
            .filter(|v| !v.is_empty());
        let Some(reputation_api_key) = reputation_api_key else {
            bail!(
                "missing reputation-service credential: set {ENV_REPUTATION_API_KEY} or provide {TOKENS_FILE}"
            );
        };

        let authority_webhook = env(ENV_AUTHORITY_WEBHOOK)
            .filter(|v| !v.is_empty())
            .or(tokens.authority_webhook)
            .filter(|v| !v.is_empty());

        let reply_timeout_secs = env(ENV_REPLY_TIMEOUT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REPLY_TIMEOUT_SECS);

        Ok(Self {
            reputation_api_key,
            authority_webhook,
            store_path: env(ENV_STORE_PATH).unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
            reply_timeout_secs,
            mod_channel: env(ENV_MOD_CHANNEL).unwrap_or_else(|| DEFAULT_MOD_CHANNEL.to_string()),
            metrics_addr: env(ENV_METRICS_ADDR),
        })
    }
}
