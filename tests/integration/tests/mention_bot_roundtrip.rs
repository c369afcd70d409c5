use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use castpage_ai::{OpenAiClient, OpenAiConfig};
use castpage_runtime::{
    ArtifactGeneratorConfig, Clock, FeedApiClient, FeedApiConfig, FileArtifactStorage,
    ManualClock, MentionPipeline, MentionPipelineConfig, PipelineRuntime, PollScheduler,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;

const BOT_FID: u64 = 900;
const PUBLIC_BASE_URL: &str = "https://pages.example.com";
const PROVIDER_PAGE: &str = "<!DOCTYPE html><html><head><title>Acme</title></head><body><h1>Acme</h1></body></html>";

fn build_runtime(server: &MockServer, state_dir: &Path, artifact_dir: &Path) -> PipelineRuntime {
    let feed = Arc::new(
        FeedApiClient::new(FeedApiConfig {
            api_base: server.base_url(),
            api_key: "feed-key".to_string(),
            signer_uuid: "signer-1".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("feed client"),
    );
    let provider = Arc::new(
        OpenAiClient::new(OpenAiConfig {
            api_base: format!("{}/v1", server.base_url()),
            api_key: "sk-test".to_string(),
            organization: None,
            request_timeout_ms: 2_000,
            max_retries: 0,
        })
        .expect("provider client"),
    );
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000_000));
    let storage = Arc::new(FileArtifactStorage::new(
        artifact_dir.to_path_buf(),
        PUBLIC_BASE_URL,
        clock.clone(),
    ));

    let pipeline = MentionPipeline::new(MentionPipelineConfig {
        mention_source: feed.clone(),
        reply_publisher: feed,
        artifact_storage: storage,
        llm_client: provider,
        clock,
        generation: ArtifactGeneratorConfig {
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(4_000),
            timeout: Duration::from_secs(5),
            window: Duration::from_secs(60),
            quota: 1,
        },
        bot_account_id: BOT_FID,
        bot_handle: "castpage".to_string(),
        fetch_limit: 10,
        processed_cap: 1_000,
        state_dir: state_dir.to_path_buf(),
        maintenance_override: None,
    })
    .expect("pipeline");
    PipelineRuntime::new(pipeline)
}

fn notification(hash: &str, text: &str, fid: u64) -> Value {
    json!({
        "type": "mention",
        "cast": {
            "hash": hash,
            "text": text,
            "author": {"fid": fid, "username": format!("user{fid}")}
        }
    })
}

fn html_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn integration_mentions_are_answered_once_across_restarts() {
    let server = MockServer::start();
    let state_dir = tempdir().expect("state dir");
    let artifact_dir = tempdir().expect("artifact dir");

    let notifications = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/farcaster/notifications")
            .query_param("fid", "900")
            .header("x-api-key", "feed-key");
        then.status(200).json_body(json!({
            "notifications": [
                notification("0xa", "@castpage help", 42),
                notification("0xb", "@castpage landing Acme | Great stuff | Sign up", 42),
                notification("0xc", "@castpage help", BOT_FID),
                {"type": "mention", "cast": {"text": "no hash"}}
            ]
        }));
    });
    let provider = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": PROVIDER_PAGE}, "finish_reason": "stop"}]
        }));
    });
    let help_reply = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/farcaster/cast")
            .body_includes("\"parent\":\"0xa\"");
        then.status(200).json_body(json!({"success": true}));
    });
    let link_reply = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/farcaster/cast")
            .body_includes("\"parent\":\"0xb\"")
            .body_includes("https://pages.example.com/42/acme-1700000000000.html");
        then.status(200).json_body(json!({"success": true}));
    });
    let self_reply = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/farcaster/cast")
            .body_includes("\"parent\":\"0xc\"");
        then.status(200).json_body(json!({"success": true}));
    });

    let mut scheduler = PollScheduler::new(
        build_runtime(&server, state_dir.path(), artifact_dir.path()),
        Duration::from_secs(60),
    );
    scheduler.run_once().await.expect("first cycle");
    drop(scheduler);

    let mut restarted = PollScheduler::new(
        build_runtime(&server, state_dir.path(), artifact_dir.path()),
        Duration::from_secs(60),
    );
    restarted.run_once().await.expect("second cycle");

    notifications.assert_calls(2);
    help_reply.assert_calls(1);
    link_reply.assert_calls(1);
    self_reply.assert_calls(0);
    provider.assert_calls(1);

    let pages = html_files(&artifact_dir.path().join("42"));
    assert_eq!(pages.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&pages[0]).expect("page"),
        PROVIDER_PAGE
    );

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(state_dir.path().join("state.json")).expect("state file"),
    )
    .expect("state json");
    assert_eq!(state["processed_casts"], json!(["0xa", "0xb", "0xc"]));
    assert_eq!(state["generation_request_queue"], json!([1_700_000_000_000_u64]));
    let backup =
        std::fs::read_to_string(state_dir.path().join("state.backup.json")).expect("backup file");
    assert_eq!(serde_json::from_str::<Value>(&backup).expect("backup json"), state);
}

#[tokio::test]
async fn integration_provider_failure_publishes_fallback_page() {
    let server = MockServer::start();
    let state_dir = tempdir().expect("state dir");
    let artifact_dir = tempdir().expect("artifact dir");

    server.mock(|when, then| {
        when.method(GET).path("/v2/farcaster/notifications");
        then.status(200).json_body(json!({
            "notifications": [
                notification("0xfallback", "@castpage landing Acme | Great stuff | Sign up", 77)
            ]
        }));
    });
    let provider = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(500).body("provider down");
    });
    let link_reply = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/farcaster/cast")
            .body_includes("\"parent\":\"0xfallback\"")
            .body_includes("https://pages.example.com/77/acme-1700000000000.html");
        then.status(200).json_body(json!({"success": true}));
    });

    let mut scheduler = PollScheduler::new(
        build_runtime(&server, state_dir.path(), artifact_dir.path()),
        Duration::from_secs(60),
    );
    scheduler.run_once().await.expect("cycle");

    provider.assert_calls(1);
    link_reply.assert_calls(1);
    let pages = html_files(&artifact_dir.path().join("77"));
    assert_eq!(pages.len(), 1);
    let page = std::fs::read_to_string(&pages[0]).expect("page");
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<p>great stuff</p>"));
    assert!(page.contains(">sign up</a>"));
}

#[tokio::test]
async fn integration_feed_outage_fails_cycle_without_touching_state() {
    let server = MockServer::start();
    let state_dir = tempdir().expect("state dir");
    let artifact_dir = tempdir().expect("artifact dir");

    server.mock(|when, then| {
        when.method(GET).path("/v2/farcaster/notifications");
        then.status(503).body("maintenance");
    });

    let mut scheduler = PollScheduler::new(
        build_runtime(&server, state_dir.path(), artifact_dir.path()),
        Duration::from_secs(60),
    );
    let error = scheduler.run_once().await.expect_err("cycle fails");

    assert!(error.to_string().contains("failed to fetch mention notifications"));
    assert!(!state_dir.path().join("state.json").exists());
    assert_eq!(scheduler.stats().failed_cycles, 1);
}
