//! Moderation Decision Engine — Binary Entrypoint
//! Boots the engine with the real reputation provider and a line-oriented
//! console harness standing in for the chat-platform connectivity layer.
//!
//! Console protocol:
//!   `dm <user> <text...>`             — direct message from <user>
//!   `msg <channel> <user> <text...>`  — channel message from <user>
//!   `quit`                            — exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use moderation_decision_engine::authority::AuthorityNotifier;
use moderation_decision_engine::classifier::TfidfNaiveBayes;
use moderation_decision_engine::config::Config;
use moderation_decision_engine::evaluate::MessageEvaluator;
use moderation_decision_engine::gateway::{InboundMessage, PlatformGateway};
use moderation_decision_engine::linkscan::{Blacklist, LinkScanner, VirusTotalProvider};
use moderation_decision_engine::prompt::Prompt;
use moderation_decision_engine::report::MessageRef;
use moderation_decision_engine::rules::RuleMatcher;
use moderation_decision_engine::{metrics, ModerationEngine, RecordStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("moderation_decision_engine=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Prints outbound traffic instead of delivering it. The interactive-prompt
/// descriptor is rendered as a numbered option list.
struct ConsoleGateway;

#[async_trait]
impl PlatformGateway for ConsoleGateway {
    async fn send_channel(&self, channel: &str, text: &str, prompt: Option<Prompt>) -> Result<()> {
        println!("[#{channel}] {text}");
        if let Some(p) = prompt {
            for (i, opt) in p.options.iter().enumerate() {
                let mark = if opt.preselected { "*" } else { " " };
                println!("  {mark}{}. {} ({})", i + 1, opt.label, opt.description);
            }
        }
        Ok(())
    }

    async fn notify_user(&self, user: &str, text: &str) -> Result<()> {
        println!("[dm -> {user}] {text}");
        Ok(())
    }

    async fn ban_user(&self, user: &str) -> Result<()> {
        println!("[enforce] ban {user}");
        Ok(())
    }

    async fn remove_message(&self, message: &MessageRef) -> Result<()> {
        println!("[enforce] remove message by {} in #{}", message.author, message.channel);
        Ok(())
    }

    async fn report_to_platform(&self, user: &str, reason: &str) -> Result<()> {
        println!("[enforce] platform report: {user} ({reason})");
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<InboundMessage> {
    let mut parts = line.splitn(2, ' ');
    match parts.next()? {
        "dm" => {
            let rest = parts.next()?;
            let (user, text) = rest.split_once(' ')?;
            Some(InboundMessage::dm(user, text))
        }
        "msg" => {
            let rest = parts.next()?;
            let (channel, rest) = rest.split_once(' ')?;
            let (user, text) = rest.split_once(' ')?;
            Some(InboundMessage::channel(user, "console", channel, text))
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Missing credentials are fatal before any event is accepted.
    let cfg = Config::from_env()?;
    metrics::init(cfg.metrics_addr.as_deref())?;

    let store = Arc::new(RecordStore::open(&cfg.store_path));
    let blacklist = Arc::new(Blacklist::seeded());
    let provider = Arc::new(VirusTotalProvider::new(cfg.reputation_api_key.clone()));
    let scanner = LinkScanner::new(provider, blacklist.clone());
    let matcher = RuleMatcher::new(store.clone());
    let classifier = Arc::new(TfidfNaiveBayes::from_embedded_corpus());
    let evaluator = Arc::new(MessageEvaluator::new(scanner, matcher, classifier));

    let mut engine = ModerationEngine::new(
        Arc::new(ConsoleGateway),
        store,
        blacklist,
        evaluator,
        cfg.mod_channel.clone(),
    )
    .with_reply_timeout(Duration::from_secs(cfg.reply_timeout_secs));
    if let Some(webhook) = &cfg.authority_webhook {
        engine = engine.with_authority(AuthorityNotifier::new(webhook.clone()));
    }
    let engine = Arc::new(engine);

    info!(mod_channel = %cfg.mod_channel, "moderation engine ready");
    println!("Moderation engine ready. Commands: dm <user> <text> | msg <channel> <user> <text> | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        match parse_line(&line) {
            Some(msg) => {
                let engine = engine.clone();
                tokio::spawn(async move { engine.handle_inbound(msg).await });
            }
            None => println!("unrecognized input; use: dm <user> <text> | msg <channel> <user> <text>"),
        }
    }

    Ok(())
}
