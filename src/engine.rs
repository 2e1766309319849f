//! # Moderation Engine
//! Routes inbound platform events to the right conversation, drives the
//! review state machines, and interprets their effects. Each conversation
//! runs as its own task; waits are routed through an explicit
//! `(user, channel)` correlation table with a per-prompt timeout, and a
//! literal `cancel` releases any pending wait immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::authority::AuthorityNotifier;
use crate::evaluate::{self, MessageEvaluator, MessageSignals};
use crate::gateway::{InboundMessage, PlatformGateway};
use crate::linkscan::{self, Blacklist};
use crate::prompt::Prompt;
use crate::report::{Action, ActionSet, Category, MessageRef, ReportCase, ReportReason};
use crate::review::{
    ModeratorReview, ReporterFlow, ReviewEffect, ReviewInput, RulesFlow, StartPoint,
    CANCEL_KEYWORD, HELP_KEYWORD, REPORT_KEYWORD, RULES_KEYWORD,
};
use crate::store::RecordStore;
use crate::triage;

/// Absolute per-prompt reply timeout.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(300);

const HELP_TEXT: &str = "Use the `report` command to begin the reporting process.\n\
                         Use the `rules` command to begin the rule creation process.\n\
                         Use the `cancel` command to cancel the current process.";

/// Conversation correlation key: `("*", channel)` waits on anyone in the
/// channel (moderator case review), `(user, channel)` on one user (DM flows).
type ConvKey = (String, String);

pub struct ModerationEngine {
    gateway: Arc<dyn PlatformGateway>,
    store: Arc<RecordStore>,
    blacklist: Arc<Blacklist>,
    evaluator: Arc<MessageEvaluator>,
    authority: Option<AuthorityNotifier>,
    mod_channel: String,
    reply_timeout: Duration,
    waits: Mutex<HashMap<ConvKey, mpsc::Sender<InboundMessage>>>,
}

impl ModerationEngine {
    pub fn new(
        gateway: Arc<dyn PlatformGateway>,
        store: Arc<RecordStore>,
        blacklist: Arc<Blacklist>,
        evaluator: Arc<MessageEvaluator>,
        mod_channel: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            blacklist,
            evaluator,
            authority: None,
            mod_channel: mod_channel.into(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            waits: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_authority(mut self, authority: AuthorityNotifier) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Shortened in tests; 300 s in production.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Entry point for every inbound platform event.
    pub async fn handle_inbound(self: &Arc<Self>, msg: InboundMessage) {
        if self.route_to_wait(&msg).await {
            return;
        }
        if msg.is_dm() {
            self.handle_dm(msg).await;
        } else {
            self.handle_channel_message(msg).await;
        }
    }

    // --- Conversation correlation --------------------------------------

    async fn route_to_wait(&self, msg: &InboundMessage) -> bool {
        let exact = (msg.author.clone(), msg.channel.clone());
        let wildcard = ("*".to_string(), msg.channel.clone());

        let sender = {
            let waits = self.waits.lock().expect("wait table lock poisoned");
            waits.get(&exact).or_else(|| waits.get(&wildcard)).cloned()
        };
        let Some(sender) = sender else {
            return false;
        };
        if sender.send(msg.clone()).await.is_err() {
            // The conversation ended without unregistering (task aborted);
            // clear the stale entries and treat the message as fresh.
            let mut waits = self.waits.lock().expect("wait table lock poisoned");
            waits.remove(&exact);
            waits.remove(&wildcard);
            return false;
        }
        true
    }

    fn register(&self, key: ConvKey) -> mpsc::Receiver<InboundMessage> {
        let (tx, rx) = mpsc::channel(8);
        let previous = self
            .waits
            .lock()
            .expect("wait table lock poisoned")
            .insert(key.clone(), tx);
        if previous.is_some() {
            warn!(user = %key.0, channel = %key.1, "conversation replaced an active wait");
        }
        rx
    }

    fn unregister(&self, key: &ConvKey) {
        self.waits
            .lock()
            .expect("wait table lock poisoned")
            .remove(key);
    }

    /// One time-boxed wait. `expecting_selection` decides how the reply
    /// text is shaped for the state machine.
    async fn wait_for_reply(
        &self,
        rx: &mut mpsc::Receiver<InboundMessage>,
        expecting_selection: bool,
    ) -> ReviewInput {
        match tokio::time::timeout(self.reply_timeout, rx.recv()).await {
            Ok(Some(msg)) => {
                let text = msg.text.trim().to_string();
                if text == CANCEL_KEYWORD {
                    ReviewInput::Cancel
                } else if expecting_selection {
                    ReviewInput::Selection(
                        text.split(',')
                            .map(|v| v.trim().to_string())
                            .filter(|v| !v.is_empty())
                            .collect(),
                    )
                } else {
                    ReviewInput::Text(text)
                }
            }
            Ok(None) => ReviewInput::Cancel,
            Err(_) => ReviewInput::TimedOut,
        }
    }

    // --- DM flows -------------------------------------------------------

    async fn handle_dm(self: &Arc<Self>, msg: InboundMessage) {
        let text = msg.text.trim();
        if text == HELP_KEYWORD {
            self.notify(&msg.author, HELP_TEXT).await;
            return;
        }
        if text.starts_with(REPORT_KEYWORD) {
            counter!("reporter_flows_total").increment(1);
            let key = (msg.author.clone(), msg.channel.clone());
            let rx = self.register(key.clone());
            let engine = self.clone();
            tokio::spawn(async move { engine.drive_reporter(key, rx, msg).await });
            return;
        }
        if text.starts_with(RULES_KEYWORD) {
            counter!("rules_flows_total").increment(1);
            let key = (msg.author.clone(), msg.channel.clone());
            let rx = self.register(key.clone());
            let engine = self.clone();
            tokio::spawn(async move { engine.drive_rules(key, rx, msg).await });
            return;
        }
        debug!(user = %msg.author, "dm ignored; no active flow");
    }

    async fn drive_reporter(
        self: Arc<Self>,
        key: ConvKey,
        mut rx: mpsc::Receiver<InboundMessage>,
        first: InboundMessage,
    ) {
        let reporter = first.author.clone();
        let dm_channel = first.channel.clone();
        let mut flow = ReporterFlow::new();
        let mut input = ReviewInput::Text(first.text);

        loop {
            if matches!(input, ReviewInput::TimedOut) {
                // Conversation state is destroyed on timeout.
                self.notify(&reporter, "You did not respond in time.").await;
                break;
            }
            let out = flow.handle(input);
            for reply in &out.replies {
                self.notify(&reporter, reply).await;
            }
            let expecting_selection = out.prompt.is_some();
            if let Some(prompt) = out.prompt {
                self.send_prompt(&dm_channel, prompt).await;
            }
            if let Some(submitted) = out.submitted {
                self.open_submitted_case(submitted).await;
                break;
            }
            if flow.is_complete() {
                break;
            }
            input = self.wait_for_reply(&mut rx, expecting_selection).await;
        }
        self.unregister(&key);
    }

    async fn drive_rules(
        self: Arc<Self>,
        key: ConvKey,
        mut rx: mpsc::Receiver<InboundMessage>,
        first: InboundMessage,
    ) {
        let user = first.author.clone();
        let dm_channel = first.channel.clone();
        let mut flow = RulesFlow::new(self.store.clone(), user.clone());
        let mut input = ReviewInput::Text(first.text);

        loop {
            if matches!(input, ReviewInput::TimedOut) {
                self.notify(&user, "You did not respond in time.").await;
                break;
            }
            let out = flow.handle(input);
            for reply in &out.replies {
                self.notify(&user, reply).await;
            }
            let expecting_selection = out.prompt.is_some();
            if let Some(prompt) = out.prompt {
                self.send_prompt(&dm_channel, prompt).await;
            }
            if flow.is_complete() {
                break;
            }
            input = self.wait_for_reply(&mut rx, expecting_selection).await;
        }
        self.unregister(&key);
    }

    // --- Channel evaluation & automated cases ---------------------------

    async fn handle_channel_message(self: &Arc<Self>, msg: InboundMessage) {
        // The review channel itself is never evaluated.
        if msg.channel == self.mod_channel {
            return;
        }

        let signals = self.evaluator.evaluate(&msg.text).await;
        if !signals.any() {
            return;
        }

        let message = MessageRef {
            author: msg.author.clone(),
            channel: msg.channel.clone(),
            text: msg.text.clone(),
        };

        if signals.suspicious_link() {
            self.open_link_case(message, signals).await;
        } else if signals.scam {
            self.open_scam_case(message).await;
        } else {
            self.flag_rule_hits(message, &signals).await;
        }
    }

    async fn open_link_case(self: &Arc<Self>, message: MessageRef, signals: MessageSignals) {
        let reason = ReportReason::new(Category::SuspiciousLink);
        let case = ReportCase::new(message.clone(), reason.clone(), true);

        self.remove_and_notify(
            &message,
            "\u{1F6A8} The above content has been removed as it contains a suspicious link. \
             If you believe this to be in error, please submit your feedback. \u{1F6A8}",
        )
        .await;

        let report = evaluate::link_report(&message, &signals, true);
        self.say_mod(&report).await;

        let review_urls = signals.review_urls();
        let start = if review_urls.is_empty() {
            // Everything already verified malicious: only the action
            // decision is left.
            StartPoint::ActionConfirmation
        } else {
            StartPoint::LinkReview
        };
        let offenses = self.store.offenses(&message.author);
        let review = ModeratorReview::new(reason, offenses).with_flagged_urls(review_urls);
        self.spawn_review(review, case, start);
    }

    async fn open_scam_case(self: &Arc<Self>, message: MessageRef) {
        let reason = ReportReason::new(Category::Other);
        let mut case = ReportCase::new(message.clone(), reason.clone(), true);
        case.priority = Some(triage::Priority::new(3));

        self.remove_and_notify(
            &message,
            "\u{1F6A8} The above content has been removed as it violates our policies on \
             cryptocurrency. If you believe this to be in error, please submit your feedback. \
             \u{1F6A8}",
        )
        .await;

        self.say_mod(&evaluate::scam_report(&message)).await;

        let offenses = self.store.offenses(&message.author);
        let review = ModeratorReview::new(reason, offenses);
        self.spawn_review(review, case, StartPoint::ActionConfirmation);
    }

    /// Phrase hits alone: remove, tell the channel, post the notice. No
    /// case is opened.
    async fn flag_rule_hits(&self, message: MessageRef, signals: &MessageSignals) {
        self.remove_and_notify(
            &message,
            "\u{1F6A8} The above content has been removed as it violates our community \
             guidelines. If you believe this to be in error, please submit your feedback. \
             \u{1F6A8}",
        )
        .await;
        self.say_mod(&evaluate::rules_notice(&message, &signals.rule_hits))
            .await;
    }

    // --- Reported cases -------------------------------------------------

    async fn open_submitted_case(self: &Arc<Self>, submitted: crate::review::SubmittedReport) {
        let message = MessageRef {
            author: submitted.reported_user.clone(),
            channel: "unknown".to_string(),
            text: submitted.details.clone(),
        };
        let case = ReportCase::new(message.clone(), submitted.reason.clone(), false);
        let offenses = self.store.offenses(&message.author);

        let summary =
            evaluate::submitted_summary(&message, &submitted.reason, case.priority, offenses);
        self.say_mod(&summary).await;

        // The legitimacy step re-runs the resolver for link cases so the
        // manual-review path has fresh verdicts to act on.
        let flagged_urls = if submitted.reason.category == Category::SuspiciousLink {
            let signals = self.evaluator.evaluate(&submitted.details).await;
            let review = signals.review_urls();
            if review.is_empty() {
                linkscan::extract_urls(&submitted.details)
            } else {
                review
            }
        } else {
            Vec::new()
        };

        let review =
            ModeratorReview::new(submitted.reason, offenses).with_flagged_urls(flagged_urls);
        self.spawn_review(review, case, StartPoint::Legitimacy);
    }

    // --- Moderator case driver ------------------------------------------

    fn spawn_review(
        self: &Arc<Self>,
        review: ModeratorReview,
        case: ReportCase,
        start: StartPoint,
    ) {
        counter!("cases_opened_total").increment(1);
        let key = ("*".to_string(), self.mod_channel.clone());
        let rx = self.register(key.clone());
        let engine = self.clone();
        tokio::spawn(async move { engine.drive_review(key, rx, review, case, start).await });
    }

    async fn drive_review(
        self: Arc<Self>,
        key: ConvKey,
        mut rx: mpsc::Receiver<InboundMessage>,
        mut review: ModeratorReview,
        mut case: ReportCase,
        start: StartPoint,
    ) {
        let mut effects = review.open(start);
        let mut expecting_selection = false;

        loop {
            for effect in effects.drain(..) {
                match effect {
                    ReviewEffect::Say(text) => self.say_mod(&text).await,
                    ReviewEffect::Ask(prompt) => {
                        expecting_selection = true;
                        self.send_prompt(&self.mod_channel, prompt).await;
                    }
                    ReviewEffect::AskText(text) => {
                        expecting_selection = false;
                        self.say_mod(&text).await;
                    }
                    ReviewEffect::BlacklistUrls(urls) => self.blacklist_urls(&urls),
                    ReviewEffect::NotifyAuthorities(note) => {
                        self.forward_to_authorities(review.reason(), &note).await
                    }
                    ReviewEffect::Apply(actions) => self.apply_actions(&case, actions).await,
                }
            }
            if review.state().is_terminal() {
                break;
            }
            let input = self.wait_for_reply(&mut rx, expecting_selection).await;
            effects = review.apply(input);
        }

        case.resolution = review.resolution();
        counter!("cases_resolved_total").increment(1);
        info!(
            resolution = ?case.resolution,
            automated = case.automated,
            msg = %evaluate::anon_hash(&case.message.text),
            "case resolved"
        );
        self.unregister(&key);
    }

    fn blacklist_urls(&self, urls: &[String]) {
        for url in urls {
            for variant in linkscan::variants(url) {
                if self.blacklist.insert(&variant) {
                    info!(url = %variant, "added to blacklist");
                }
            }
        }
    }

    async fn forward_to_authorities(&self, reason: &ReportReason, note: &str) {
        counter!("authority_reports_total").increment(1);
        match &self.authority {
            Some(notifier) => {
                if let Err(e) = notifier.forward(&reason.to_string(), note).await {
                    warn!(error = %e, "authority notification failed");
                }
            }
            None => {
                info!(reason = %reason, "authority channel not configured; note recorded locally")
            }
        }
    }

    /// Applies a confirmed action set. An empty set is "no action": no
    /// offense increment, no side effects.
    async fn apply_actions(&self, case: &ReportCase, actions: ActionSet) {
        if actions.is_empty() {
            return;
        }
        let user = &case.message.author;
        let count = self.store.record_offense(user);
        counter!("offenses_recorded_total").increment(1);
        debug!(user = %user, offenses = count, "offense recorded");

        for action in actions.selected() {
            let result = match action {
                Action::BanUser => {
                    self.notify(user, "You have been banned from the server.").await;
                    self.gateway.ban_user(user).await
                }
                Action::RemovePost => self.gateway.remove_message(&case.message).await,
                Action::ReportToPlatform => {
                    self.gateway
                        .report_to_platform(user, &case.reason.to_string())
                        .await
                }
                Action::PlaceOnProbation => {
                    self.gateway
                        .notify_user(
                            user,
                            "Your account has been put on temporary probation and will have \
                             limited access to features due to policy violations.",
                        )
                        .await
                }
            };
            if let Err(e) = result {
                warn!(action = action.label(), error = %e, "enforcement call failed");
            }
        }
    }

    // --- Outbound helpers ------------------------------------------------

    async fn say_mod(&self, text: &str) {
        if let Err(e) = self
            .gateway
            .send_channel(&self.mod_channel, text, None)
            .await
        {
            warn!(error = %e, "moderator channel send failed");
        }
    }

    async fn send_prompt(&self, channel: &str, prompt: Prompt) {
        let text = prompt.text.clone();
        if let Err(e) = self
            .gateway
            .send_channel(channel, &text, Some(prompt))
            .await
        {
            warn!(error = %e, "prompt send failed");
        }
    }

    async fn notify(&self, user: &str, text: &str) {
        if let Err(e) = self.gateway.notify_user(user, text).await {
            warn!(user = %user, error = %e, "user notification failed");
        }
    }

    async fn remove_and_notify(&self, message: &MessageRef, notice: &str) {
        if let Err(e) = self.gateway.remove_message(message).await {
            warn!(error = %e, "message removal failed");
        }
        if let Err(e) = self
            .gateway
            .send_channel(&message.channel, notice, None)
            .await
        {
            warn!(error = %e, "channel notice failed");
        }
    }
}
