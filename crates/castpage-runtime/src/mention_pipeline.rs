//! Mention pipeline: fetch, deduplicate, dispatch, reply and persist, one notification at a time.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use castpage_ai::LlmClient;
use serde_json::{json, Value};

use crate::{
    artifact_generator::{ArtifactGenerator, ArtifactGeneratorConfig},
    artifact_storage::ArtifactStorage,
    bot_state::BotState,
    clock::Clock,
    command_parser::{parse_mention_command, MentionCommand},
    feed_transport::{MentionNotification, MentionSource, ReplyPublisher},
    scheduler::CycleRunner,
    state_store::{JsonlEventLog, StateStore},
    transport_helpers::truncate_for_cast,
};

/// Cast length limit enforced by the feed, counted in UTF-8 bytes.
pub const MAX_REPLY_BYTES: usize = 320;
pub const DEFAULT_FETCH_LIMIT: usize = 10;
pub const INBOUND_LOG_FILE_NAME: &str = "inbound-events.jsonl";
pub const OUTBOUND_LOG_FILE_NAME: &str = "outbound-events.jsonl";

const HELP_REPLY: &str = "I turn mentions into landing pages. Send: landing <name> | <description> | <call to action>. Example: landing Acme | Handmade coffee gear | Join the waitlist";
const USAGE_REPLY: &str = "I need three parts separated by |. Try: landing <name> | <description> | <call to action>";
const MAINTENANCE_REPLY: &str = "Landing page generation is paused for maintenance right now. Please try again later.";
const APOLOGY_REPLY: &str = "Sorry, I'm handling too many requests right now. Please try again in a few minutes.";

#[derive(Clone)]
/// Collaborators and settings for [`MentionPipeline`].
pub struct MentionPipelineConfig {
    pub mention_source: Arc<dyn MentionSource>,
    pub reply_publisher: Arc<dyn ReplyPublisher>,
    pub artifact_storage: Arc<dyn ArtifactStorage>,
    pub llm_client: Arc<dyn LlmClient>,
    pub clock: Arc<dyn Clock>,
    pub generation: ArtifactGeneratorConfig,
    pub bot_account_id: u64,
    pub bot_handle: String,
    pub fetch_limit: usize,
    pub processed_cap: usize,
    pub state_dir: PathBuf,
    /// Overrides the persisted maintenance flag when set.
    pub maintenance_override: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollCycleReport {
    pub discovered_mentions: usize,
    pub processed_mentions: usize,
    pub skipped_duplicate_mentions: usize,
    pub skipped_invalid_mentions: usize,
    pub skipped_self_mentions: usize,
    pub replies_published: usize,
    pub apologies_published: usize,
    pub failed_mentions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    LandingPage,
    Maintenance,
    Usage,
    Help,
}

impl ReplyKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::LandingPage => "landing_page",
            Self::Maintenance => "maintenance",
            Self::Usage => "usage",
            Self::Help => "help",
        }
    }
}

pub struct MentionPipeline {
    mention_source: Arc<dyn MentionSource>,
    reply_publisher: Arc<dyn ReplyPublisher>,
    artifact_storage: Arc<dyn ArtifactStorage>,
    clock: Arc<dyn Clock>,
    generator: ArtifactGenerator,
    state_store: StateStore,
    inbound_log: JsonlEventLog,
    outbound_log: JsonlEventLog,
    bot_account_id: u64,
    bot_handle: String,
    fetch_limit: usize,
    maintenance_override: Option<bool>,
}

impl MentionPipeline {
    pub fn new(config: MentionPipelineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir).with_context(|| {
            format!("failed to create state dir {}", config.state_dir.display())
        })?;
        let inbound_log = JsonlEventLog::open(config.state_dir.join(INBOUND_LOG_FILE_NAME))?;
        let outbound_log = JsonlEventLog::open(config.state_dir.join(OUTBOUND_LOG_FILE_NAME))?;
        let state_store = StateStore::new(
            &config.state_dir,
            config.processed_cap,
            config.generation.window,
        );
        let generator = ArtifactGenerator::new(
            config.llm_client,
            config.clock.clone(),
            config.generation,
        );

        Ok(Self {
            mention_source: config.mention_source,
            reply_publisher: config.reply_publisher,
            artifact_storage: config.artifact_storage,
            clock: config.clock,
            generator,
            state_store,
            inbound_log,
            outbound_log,
            bot_account_id: config.bot_account_id,
            bot_handle: config.bot_handle,
            fetch_limit: config.fetch_limit.max(1),
            maintenance_override: config.maintenance_override,
        })
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state_store
    }

    /// Loads persisted state and applies the configured maintenance override.
    pub fn load_state(&self) -> BotState {
        let mut state = self.state_store.load(self.clock.now_unix_ms());
        if let Some(enabled) = self.maintenance_override {
            state.set_maintenance_mode(enabled);
        }
        state
    }

    /// Runs one poll cycle. A fetch failure returns an error before `state` is touched.
    pub async fn run_cycle(&self, state: &mut BotState) -> Result<PollCycleReport> {
        let mentions = self
            .mention_source
            .fetch_mentions(self.bot_account_id, self.fetch_limit)
            .await
            .context("failed to fetch mention notifications")?;

        let mut report = PollCycleReport {
            discovered_mentions: mentions.len(),
            ..PollCycleReport::default()
        };
        for mention in mentions {
            self.handle_mention(state, mention, &mut report).await;
        }

        let now_ms = self.clock.now_unix_ms();
        state.set_last_checked_time(now_ms);
        self.state_store.save(state, now_ms);

        tracing::info!(
            discovered = report.discovered_mentions,
            processed = report.processed_mentions,
            skipped_duplicate = report.skipped_duplicate_mentions,
            skipped_invalid = report.skipped_invalid_mentions,
            skipped_self = report.skipped_self_mentions,
            replies = report.replies_published,
            apologies = report.apologies_published,
            failed = report.failed_mentions,
            "mention poll cycle completed"
        );
        Ok(report)
    }

    async fn handle_mention(
        &self,
        state: &mut BotState,
        mention: MentionNotification,
        report: &mut PollCycleReport,
    ) {
        let Some(identifier) = mention.identifier.clone() else {
            report.skipped_invalid_mentions = report.skipped_invalid_mentions.saturating_add(1);
            tracing::debug!(author = %mention.author_handle, "skipping mention without cast identifier");
            return;
        };
        if state.is_processed(&identifier) {
            report.skipped_duplicate_mentions = report.skipped_duplicate_mentions.saturating_add(1);
            return;
        }

        self.append_log(
            &self.inbound_log,
            json!({
                "timestamp_unix_ms": self.clock.now_unix_ms(),
                "cast": identifier,
                "author_handle": mention.author_handle,
                "author_id": mention.author_id,
                "text": mention.text,
            }),
        );

        if mention.author_id == Some(self.bot_account_id) {
            report.skipped_self_mentions = report.skipped_self_mentions.saturating_add(1);
            self.record_processed(state, &identifier);
            return;
        }

        report.processed_mentions = report.processed_mentions.saturating_add(1);
        let command = parse_mention_command(&mention.text, &self.bot_handle);
        tracing::debug!(cast = %identifier, command = command.as_str(), "parsed mention");

        if let Some((kind, text)) = self.render_reply(state, &command, &mention, &identifier).await {
            self.publish(&identifier, &command, kind, &text, report).await;
        }
        self.record_processed(state, &identifier);
    }

    async fn render_reply(
        &self,
        state: &mut BotState,
        command: &MentionCommand,
        mention: &MentionNotification,
        identifier: &str,
    ) -> Option<(ReplyKind, String)> {
        match command {
            MentionCommand::Generate(request) => {
                if state.maintenance_mode() {
                    return Some((ReplyKind::Maintenance, MAINTENANCE_REPLY.to_string()));
                }
                let artifact = self
                    .generator
                    .generate(state, &self.state_store, request)
                    .await;
                let owner = mention
                    .author_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| mention.author_handle.clone());
                let url = self.artifact_storage.store(&artifact.html, &owner).await;
                tracing::info!(
                    cast = %identifier,
                    source = artifact.source.as_str(),
                    url = %url,
                    "landing page ready"
                );
                Some((ReplyKind::LandingPage, render_link_reply(&request.name, &url)))
            }
            MentionCommand::MalformedGenerate => Some((ReplyKind::Usage, USAGE_REPLY.to_string())),
            MentionCommand::Help => Some((ReplyKind::Help, HELP_REPLY.to_string())),
            MentionCommand::Unrecognized => None,
        }
    }

    async fn publish(
        &self,
        identifier: &str,
        command: &MentionCommand,
        kind: ReplyKind,
        text: &str,
        report: &mut PollCycleReport,
    ) {
        let text = truncate_for_cast(text, MAX_REPLY_BYTES);
        let outcome = self.reply_publisher.publish_reply(&text, identifier).await;
        let mut entry = json!({
            "timestamp_unix_ms": self.clock.now_unix_ms(),
            "cast": identifier,
            "command": command.as_str(),
            "reply_kind": kind.as_str(),
            "text": text,
        });

        match outcome {
            Ok(()) => {
                report.replies_published = report.replies_published.saturating_add(1);
                entry["status"] = Value::String("sent".to_string());
                self.append_log(&self.outbound_log, entry);
            }
            Err(error) => {
                report.failed_mentions = report.failed_mentions.saturating_add(1);
                tracing::warn!(%error, cast = %identifier, reply_kind = kind.as_str(), "failed to publish reply");
                entry["status"] = Value::String("failed".to_string());
                entry["error"] = Value::String(error.to_string());
                self.append_log(&self.outbound_log, entry);

                if error.is_rate_limited() {
                    self.publish_apology(identifier, report).await;
                }
            }
        }
    }

    async fn publish_apology(&self, identifier: &str, report: &mut PollCycleReport) {
        match self
            .reply_publisher
            .publish_reply(APOLOGY_REPLY, identifier)
            .await
        {
            Ok(()) => {
                report.apologies_published = report.apologies_published.saturating_add(1);
                self.append_log(
                    &self.outbound_log,
                    json!({
                        "timestamp_unix_ms": self.clock.now_unix_ms(),
                        "cast": identifier,
                        "reply_kind": "apology",
                        "status": "sent",
                        "text": APOLOGY_REPLY,
                    }),
                );
            }
            Err(error) => {
                tracing::warn!(%error, cast = %identifier, "failed to publish rate limit apology");
            }
        }
    }

    fn record_processed(&self, state: &mut BotState, identifier: &str) {
        state.mark_processed(identifier);
        self.state_store.save(state, self.clock.now_unix_ms());
    }

    fn append_log(&self, log: &JsonlEventLog, entry: Value) {
        if let Err(error) = log.append(&entry) {
            tracing::warn!(
                error = %format!("{error:#}"),
                path = %log.path().display(),
                "failed to append event log"
            );
        }
    }
}

fn render_link_reply(name: &str, url: &str) -> String {
    let reply = format!("Your landing page for {name} is ready: {url}");
    if reply.len() <= MAX_REPLY_BYTES {
        return reply;
    }
    format!("Your landing page is ready: {url}")
}

/// Pipeline plus the state it exclusively owns; the unit handed to the scheduler.
pub struct PipelineRuntime {
    pipeline: MentionPipeline,
    state: BotState,
}

impl PipelineRuntime {
    pub fn new(pipeline: MentionPipeline) -> Self {
        let state = pipeline.load_state();
        Self { pipeline, state }
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }
}

#[async_trait]
impl CycleRunner for PipelineRuntime {
    async fn run_cycle(&mut self) -> Result<PollCycleReport> {
        self.pipeline.run_cycle(&mut self.state).await
    }
}
