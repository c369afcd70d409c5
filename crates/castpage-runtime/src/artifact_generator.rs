//! Rate-limited landing page generation with a guaranteed fallback.

use std::{sync::Arc, time::Duration};

use castpage_ai::{AiError, ChatRequest, LlmClient, Message};
use thiserror::Error;

use crate::{
    bot_state::BotState, clock::Clock, command_parser::LandingRequest,
    fallback_template::render_fallback_page, rate_limiter::SlidingWindowLimiter,
    state_store::StateStore,
};

/// Lower-case substrings every accepted document must contain.
pub const REQUIRED_HTML_MARKERS: [&str; 5] = ["<!doctype html", "<html", "</html>", "<head", "<body"];

const LANDING_PAGE_SYSTEM_PROMPT: &str = "You are a web designer who writes complete, \
self-contained landing pages. Respond with a single HTML5 document only: start with \
<!DOCTYPE html>, include <html>, <head> with a <title> and inline <style>, and <body>. \
Do not use external scripts, stylesheets or images. Do not wrap the document in Markdown.";

#[derive(Debug, Clone)]
pub struct ArtifactGeneratorConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    pub window: Duration,
    pub quota: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    Provider,
    Fallback,
}

impl ArtifactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub html: String,
    pub source: ArtifactSource,
}

#[derive(Debug, Error)]
enum GenerationFailure {
    #[error("provider request failed: {0}")]
    Provider(#[from] AiError),
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("provider output failed structural validation ({0} chars)")]
    InvalidDocument(usize),
}

impl GenerationFailure {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider(error) if error.is_rate_limited())
    }
}

pub struct ArtifactGenerator {
    client: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
    limiter: SlidingWindowLimiter,
    config: ArtifactGeneratorConfig,
}

impl ArtifactGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        clock: Arc<dyn Clock>,
        config: ArtifactGeneratorConfig,
    ) -> Self {
        let limiter = SlidingWindowLimiter::new(config.window, config.quota);
        Self {
            client,
            clock,
            limiter,
            config,
        }
    }

    /// Always returns a document that passes [`passes_structural_validation`].
    ///
    /// The rate-limit grant is recorded in `state` and persisted before the provider is called,
    /// so a crash during generation still counts against the window after restart.
    pub async fn generate(
        &self,
        state: &mut BotState,
        store: &StateStore,
        request: &LandingRequest,
    ) -> GeneratedArtifact {
        let granted_at = self
            .limiter
            .acquire(state.generation_request_queue_mut(), self.clock.as_ref())
            .await;
        state.set_last_generation_call(granted_at);
        store.save(state, granted_at);

        match self.request_document(request).await {
            Ok(html) => GeneratedArtifact {
                html,
                source: ArtifactSource::Provider,
            },
            Err(error) => {
                tracing::warn!(
                    %error,
                    name = %request.name,
                    provider_rate_limited = error.is_rate_limited(),
                    "using fallback landing page"
                );
                GeneratedArtifact {
                    html: render_fallback_page(
                        Some(&request.name),
                        Some(&request.description),
                        Some(&request.purpose),
                    ),
                    source: ArtifactSource::Fallback,
                }
            }
        }
    }

    async fn request_document(&self, request: &LandingRequest) -> Result<String, GenerationFailure> {
        let chat_request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message::system(LANDING_PAGE_SYSTEM_PROMPT),
                Message::user(render_landing_prompt(request)),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = tokio::time::timeout(self.config.timeout, self.client.complete(chat_request))
            .await
            .map_err(|_| GenerationFailure::Timeout(self.config.timeout))??;

        let html = extract_html_document(response.message.text_content());
        if !passes_structural_validation(&html) {
            return Err(GenerationFailure::InvalidDocument(html.chars().count()));
        }
        Ok(html)
    }
}

fn render_landing_prompt(request: &LandingRequest) -> String {
    format!(
        "Create a landing page.\nProduct name: {}\nDescription: {}\nPrimary call to action: {}\n\
The page needs a hero heading with the product name, a short section expanding on the \
description, and a prominent call-to-action button labelled with the call to action.",
        request.name, request.description, request.purpose
    )
}

/// Unwraps a Markdown code fence around the document, if any, and trims whitespace.
pub fn extract_html_document(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    let Some(fence_start) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_fence = &trimmed[fence_start + 3..];
    let body_start = after_fence
        .find('\n')
        .map(|index| index + 1)
        .unwrap_or(after_fence.len());
    let body = &after_fence[body_start..];
    let body = body.find("```").map(|end| &body[..end]).unwrap_or(body);
    body.trim().to_string()
}

pub fn passes_structural_validation(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    REQUIRED_HTML_MARKERS
        .iter()
        .all(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use castpage_ai::{AiError, ChatRequest, ChatResponse, ChatUsage, LlmClient, Message};
    use tempfile::tempdir;

    use super::{
        extract_html_document, passes_structural_validation, ArtifactGenerator,
        ArtifactGeneratorConfig, ArtifactSource, GenerationFailure, REQUIRED_HTML_MARKERS,
    };
    use crate::{
        bot_state::BotState,
        clock::{Clock, ManualClock},
        command_parser::LandingRequest,
        state_store::StateStore,
    };

    const VALID_PAGE: &str =
        "<!DOCTYPE html><html><head><title>acme</title></head><body><h1>acme</h1></body></html>";

    struct ScriptedClient {
        reply: Result<String, u16>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    message: Message::assistant_text(text.clone()),
                    finish_reason: Some("stop".to_string()),
                    usage: ChatUsage::default(),
                }),
                Err(status) => Err(AiError::HttpStatus {
                    status: *status,
                    body: "provider unavailable".to_string(),
                }),
            }
        }
    }

    struct HangingClient;

    #[async_trait]
    impl LlmClient for HangingClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, AiError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Err(AiError::InvalidResponse("unreachable".to_string()))
        }
    }

    fn test_config(timeout: Duration) -> ArtifactGeneratorConfig {
        ArtifactGeneratorConfig {
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(4_000),
            timeout,
            window: Duration::from_secs(60),
            quota: 1,
        }
    }

    fn landing_request() -> LandingRequest {
        LandingRequest {
            name: "acme".to_string(),
            description: "great stuff".to_string(),
            purpose: "sign up".to_string(),
        }
    }

    #[test]
    fn unit_passes_structural_validation_is_case_insensitive() {
        assert!(passes_structural_validation(
            "<!doctype HTML><HTML><HEAD></HEAD><BODY></BODY></HTML>"
        ));
        assert!(!passes_structural_validation("<html><head></head><body></body></html>"));
        assert!(!passes_structural_validation(""));
    }

    #[test]
    fn unit_generation_failure_flags_only_provider_rate_limits() {
        let limited = GenerationFailure::Provider(AiError::HttpStatus {
            status: 429,
            body: "slow down".to_string(),
        });
        assert!(limited.is_rate_limited());
        assert!(!GenerationFailure::Timeout(Duration::from_secs(1)).is_rate_limited());
        assert!(!GenerationFailure::InvalidDocument(0).is_rate_limited());
    }

    #[test]
    fn unit_extract_html_document_unwraps_markdown_fence() {
        let raw = format!("Here you go:\n```html\n{VALID_PAGE}\n```\nEnjoy!");
        assert_eq!(extract_html_document(&raw), VALID_PAGE);
        assert_eq!(extract_html_document(&format!("  {VALID_PAGE}\n")), VALID_PAGE);
    }

    #[tokio::test]
    async fn functional_generate_returns_provider_page_and_persists_grant() {
        let temp = tempdir().expect("tempdir");
        let store = StateStore::new(temp.path(), 1_000, Duration::from_secs(60));
        let clock = ManualClock::new(1_000);
        let client = Arc::new(ScriptedClient::replying(&format!("```html\n{VALID_PAGE}\n```")));
        let generator = ArtifactGenerator::new(
            client.clone(),
            Arc::new(clock.clone()),
            test_config(Duration::from_secs(5)),
        );
        let mut state = BotState::default();

        let artifact = generator
            .generate(&mut state, &store, &landing_request())
            .await;

        assert_eq!(artifact.source, ArtifactSource::Provider);
        assert_eq!(artifact.html, VALID_PAGE);
        assert_eq!(state.last_generation_call(), Some(1_000));
        let persisted = store.load(1_000);
        assert_eq!(persisted.generation_request_queue().len(), 1);
        assert_eq!(persisted.last_generation_call(), Some(1_000));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn functional_generate_falls_back_for_error_empty_and_invalid_output() {
        let temp = tempdir().expect("tempdir");
        let store = StateStore::new(temp.path(), 1_000, Duration::from_secs(60));
        let clients: Vec<Arc<dyn LlmClient>> = vec![
            Arc::new(ScriptedClient::failing(500)),
            Arc::new(ScriptedClient::replying("")),
            Arc::new(ScriptedClient::replying(
                "<!DOCTYPE html><html><head></head><p>no body</p></html>",
            )),
        ];

        for client in clients {
            let generator = ArtifactGenerator::new(
                client,
                Arc::new(ManualClock::new(0)),
                test_config(Duration::from_secs(5)),
            );
            let mut state = BotState::default();
            let artifact = generator
                .generate(&mut state, &store, &landing_request())
                .await;
            assert_eq!(artifact.source, ArtifactSource::Fallback);
            assert!(passes_structural_validation(&artifact.html));
            assert!(artifact.html.contains("acme"));
        }
    }

    #[tokio::test]
    async fn regression_generate_falls_back_when_any_single_marker_is_missing() {
        let temp = tempdir().expect("tempdir");
        let store = StateStore::new(temp.path(), 1_000, Duration::from_secs(60));
        let lowered_page = VALID_PAGE.to_ascii_lowercase();
        assert!(passes_structural_validation(&lowered_page));

        for marker in REQUIRED_HTML_MARKERS {
            let stripped = lowered_page.replace(marker, "");
            assert!(
                !passes_structural_validation(&stripped),
                "document without {marker} must be rejected"
            );

            let generator = ArtifactGenerator::new(
                Arc::new(ScriptedClient::replying(&stripped)),
                Arc::new(ManualClock::new(0)),
                test_config(Duration::from_secs(5)),
            );
            let mut state = BotState::default();
            let artifact = generator
                .generate(&mut state, &store, &landing_request())
                .await;
            assert_eq!(artifact.source, ArtifactSource::Fallback, "missing {marker}");
            assert!(passes_structural_validation(&artifact.html));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn regression_generate_times_out_slow_provider_into_fallback() {
        let temp = tempdir().expect("tempdir");
        let store = StateStore::new(temp.path(), 1_000, Duration::from_secs(60));
        let generator = ArtifactGenerator::new(
            Arc::new(HangingClient),
            Arc::new(ManualClock::new(0)),
            test_config(Duration::from_millis(50)),
        );
        let mut state = BotState::default();
        let artifact = generator
            .generate(&mut state, &store, &landing_request())
            .await;
        assert_eq!(artifact.source, ArtifactSource::Fallback);
    }

    #[tokio::test]
    async fn functional_consecutive_generations_wait_for_window() {
        let temp = tempdir().expect("tempdir");
        let store = StateStore::new(temp.path(), 1_000, Duration::from_secs(60));
        let clock = ManualClock::new(0);
        let generator = ArtifactGenerator::new(
            Arc::new(ScriptedClient::replying(VALID_PAGE)),
            Arc::new(clock.clone()),
            test_config(Duration::from_secs(5)),
        );
        let mut state = BotState::default();

        generator
            .generate(&mut state, &store, &landing_request())
            .await;
        generator
            .generate(&mut state, &store, &landing_request())
            .await;

        assert_eq!(state.last_generation_call(), Some(60_000));
        assert_eq!(clock.now_unix_ms(), 60_000);
    }
}
