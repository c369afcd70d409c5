use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use castpage_ai::{OpenAiClient, OpenAiConfig};
use castpage_runtime::{
    ArtifactGeneratorConfig, Clock, FeedApiClient, FeedApiConfig, FileArtifactStorage,
    MentionPipeline, MentionPipelineConfig, PipelineRuntime, PollScheduler, SystemClock,
};

use crate::{cli_args::Cli, redacted::RedactedCli};

pub(crate) async fn run(cli: Cli) -> Result<()> {
    validate_cli(&cli)?;
    tracing::info!(config = ?RedactedCli(&cli), "starting castpage");

    let config = build_pipeline_config(&cli, Arc::new(SystemClock))?;
    let pipeline = MentionPipeline::new(config).context("failed to initialize mention pipeline")?;
    let runtime = PipelineRuntime::new(pipeline);
    tracing::info!(
        processed = runtime.state().processed_casts().len(),
        maintenance = runtime.state().maintenance_mode(),
        "bot state loaded"
    );

    let mut scheduler =
        PollScheduler::new(runtime, Duration::from_secs(cli.poll_interval_seconds));
    if cli.poll_once {
        return scheduler.run_once().await;
    }
    scheduler.run().await
}

pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
    for (name, value) in [
        ("--feed-api-key", &cli.feed_api_key),
        ("--signer-uuid", &cli.signer_uuid),
        ("--bot-handle", &cli.bot_handle),
        ("--openai-api-key", &cli.openai_api_key),
        ("--public-base-url", &cli.public_base_url),
    ] {
        if value.trim().is_empty() {
            bail!("{name} cannot be empty");
        }
    }

    let public_base_url = cli.public_base_url.trim();
    if !public_base_url.starts_with("https://") && !public_base_url.starts_with("http://") {
        bail!("--public-base-url must start with http:// or https://");
    }
    if cli.artifact_dir == cli.state_dir {
        bail!("--artifact-dir must differ from --state-dir");
    }
    Ok(())
}

pub(crate) fn build_pipeline_config(
    cli: &Cli,
    clock: Arc<dyn Clock>,
) -> Result<MentionPipelineConfig> {
    let feed = Arc::new(
        FeedApiClient::new(FeedApiConfig {
            api_base: cli.feed_api_base.clone(),
            api_key: cli.feed_api_key.clone(),
            signer_uuid: cli.signer_uuid.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        })
        .context("failed to create feed api client")?,
    );
    let provider = Arc::new(
        OpenAiClient::new(OpenAiConfig {
            api_base: cli.openai_api_base.clone(),
            api_key: cli.openai_api_key.clone(),
            organization: cli.openai_organization.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            max_retries: cli.retry_max_attempts.saturating_sub(1),
        })
        .context("failed to create generation provider client")?,
    );
    let storage = Arc::new(FileArtifactStorage::new(
        cli.artifact_dir.clone(),
        &cli.public_base_url,
        clock.clone(),
    ));

    Ok(MentionPipelineConfig {
        mention_source: feed.clone(),
        reply_publisher: feed,
        artifact_storage: storage,
        llm_client: provider,
        clock,
        generation: ArtifactGeneratorConfig {
            model: cli.model.clone(),
            temperature: Some(cli.temperature),
            max_tokens: Some(cli.max_tokens),
            timeout: Duration::from_secs(cli.generation_timeout_seconds),
            window: Duration::from_secs(cli.generation_window_seconds),
            quota: cli.generation_quota,
        },
        bot_account_id: cli.bot_fid,
        bot_handle: cli.bot_handle.trim().to_string(),
        fetch_limit: cli.fetch_limit,
        processed_cap: cli.processed_cap,
        state_dir: cli.state_dir.clone(),
        maintenance_override: cli.maintenance,
    })
}
