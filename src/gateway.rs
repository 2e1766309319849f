//! gateway.rs — chat-platform boundary.
//!
//! The engine only ever talks to the platform through this trait: outbound
//! text (optionally with a prompt descriptor), direct notifications, and
//! the opaque enforcement primitives. `RecordingGateway` captures traffic
//! for tests.

use anyhow::Result;
use async_trait::async_trait;

use crate::prompt::Prompt;
use crate::report::MessageRef;

/// An inbound platform event. `guild` is `None` for a direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author: String,
    pub text: String,
    pub guild: Option<String>,
    pub channel: String,
}

impl InboundMessage {
    pub fn dm(author: &str, text: &str) -> Self {
        Self {
            author: author.to_string(),
            text: text.to_string(),
            guild: None,
            channel: format!("dm:{author}"),
        }
    }

    pub fn channel(author: &str, guild: &str, channel: &str, text: &str) -> Self {
        Self {
            author: author.to_string(),
            text: text.to_string(),
            guild: Some(guild.to_string()),
            channel: channel.to_string(),
        }
    }

    pub fn is_dm(&self) -> bool {
        self.guild.is_none()
    }
}

#[async_trait]
pub trait PlatformGateway: Send + Sync {
    /// Outbound text to a channel, optionally carrying an interactive prompt.
    async fn send_channel(&self, channel: &str, text: &str, prompt: Option<Prompt>) -> Result<()>;

    /// Direct notification to a specific user.
    async fn notify_user(&self, user: &str, text: &str) -> Result<()>;

    // Enforcement primitives, opaque to this crate.
    async fn ban_user(&self, user: &str) -> Result<()>;
    async fn remove_message(&self, message: &MessageRef) -> Result<()>;
    async fn report_to_platform(&self, user: &str, reason: &str) -> Result<()>;
}

/// Outbound traffic captured by `RecordingGateway`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Channel {
        channel: String,
        text: String,
        prompt: Option<Prompt>,
    },
    Dm {
        user: String,
        text: String,
    },
    Ban(String),
    Removal(MessageRef),
    PlatformReport {
        user: String,
        reason: String,
    },
}

/// Test double: records everything, sends nothing.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    outbound: std::sync::Mutex<Vec<Outbound>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().expect("gateway log").clone()
    }

    pub fn bans(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Ban(user) => Some(user),
                _ => None,
            })
            .collect()
    }

    pub fn dms_to(&self, user: &str) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Dm { user: u, text } if u == user => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn channel_texts(&self, channel: &str) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Channel { channel: c, text, .. } if c == channel => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, item: Outbound) {
        self.outbound.lock().expect("gateway log").push(item);
    }
}

#[async_trait]
impl PlatformGateway for RecordingGateway {
    async fn send_channel(&self, channel: &str, text: &str, prompt: Option<Prompt>) -> Result<()> {
        self.push(Outbound::Channel {
            channel: channel.to_string(),
            text: text.to_string(),
            prompt,
        });
        Ok(())
    }

    async fn notify_user(&self, user: &str, text: &str) -> Result<()> {
        self.push(Outbound::Dm {
            user: user.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn ban_user(&self, user: &str) -> Result<()> {
        self.push(Outbound::Ban(user.to_string()));
        Ok(())
    }

    async fn remove_message(&self, message: &MessageRef) -> Result<()> {
        self.push(Outbound::Removal(message.clone()));
        Ok(())
    }

    async fn report_to_platform(&self, user: &str, reason: &str) -> Result<()> {
        self.push(Outbound::PlatformReport {
            user: user.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }
}
