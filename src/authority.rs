//! authority.rs — forwards escalated cases to the external authority channel.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct AuthorityNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl AuthorityNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Post the moderator's free-text note for the given case. Retries with
    /// exponential backoff; the caller logs the final error, the case
    /// continues either way.
    pub async fn forward(&self, case_reason: &str, note: &str) -> Result<()> {
        let title = format!("Escalated case: {case_reason}");
        let payload = WebhookPayload::embed(&title, note);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("authority webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("authority webhook request failed: {e}"));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct WebhookEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct WebhookPayload {
    content: Option<String>,
    embeds: Vec<WebhookEmbed>,
}

impl WebhookPayload {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            content: None,
            embeds: vec![WebhookEmbed {
                title: title.to_string(),
                description: description.to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausted_retries_surface_an_error() {
        // Unroutable per RFC 5737; fails fast on connect.
        let notifier = AuthorityNotifier::new("http://192.0.2.1:9/hook".to_string())
            .with_timeout(1)
            .with_retries(1);
        let err = notifier.forward("Imminent Danger", "note").await;
        assert!(err.is_err());
    }
}
