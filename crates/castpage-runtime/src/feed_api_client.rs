//! Neynar-style feed API client used for mention polling and reply publishing.

use std::time::Duration;

use async_trait::async_trait;
use castpage_ai::parse_retry_after_ms;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::{
    feed_transport::{FeedError, MentionNotification, MentionSource, ReplyPublisher},
    transport_helpers::{
        is_retryable_feed_status, is_retryable_transport_error, retry_delay, truncate_for_error,
    },
};

const MENTION_NOTIFICATION_TYPE: &str = "mention";

#[derive(Debug, Clone)]
pub struct FeedApiConfig {
    pub api_base: String,
    pub api_key: String,
    pub signer_uuid: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct NotificationsResponse {
    #[serde(default)]
    notifications: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    cast: Option<RawCast>,
}

#[derive(Debug, Deserialize)]
struct RawCast {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    fid: Option<u64>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishCastResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct FeedApiClient {
    http: reqwest::Client,
    api_base: String,
    signer_uuid: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl FeedApiClient {
    pub fn new(config: FeedApiConfig) -> Result<Self, FeedError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(FeedError::Config("api key cannot be empty".to_string()));
        }
        if config.signer_uuid.trim().is_empty() {
            return Err(FeedError::Config("signer uuid cannot be empty".to_string()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("castpage-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "x-api-key",
            reqwest::header::HeaderValue::from_str(api_key)
                .map_err(|error| FeedError::Config(format!("invalid api key header: {error}")))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| FeedError::Config(format!("failed to create http client: {error}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            signer_uuid: config.signer_uuid.trim().to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms,
        })
    }

    async fn request_json<T, F>(&self, operation: &str, mut builder: F) -> Result<T, FeedError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(
                    "x-castpage-retry-attempt",
                    attempt.saturating_sub(1).to_string(),
                )
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|source| FeedError::Decode {
                            operation: operation.to_string(),
                            source,
                        });
                    }

                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_feed_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after_ms,
                        ))
                        .await;
                        continue;
                    }

                    if status.as_u16() == 429 {
                        return Err(FeedError::RateLimited {
                            operation: operation.to_string(),
                        });
                    }
                    return Err(FeedError::HttpStatus {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(source) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&source)
                    {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(FeedError::Transport {
                        operation: operation.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl MentionSource for FeedApiClient {
    async fn fetch_mentions(
        &self,
        account_id: u64,
        limit: usize,
    ) -> Result<Vec<MentionNotification>, FeedError> {
        let fid = account_id.to_string();
        let limit = limit.max(1).to_string();
        let response: NotificationsResponse = self
            .request_json("notifications", || {
                self.http
                    .get(format!("{}/v2/farcaster/notifications", self.api_base))
                    .query(&[
                        ("fid", fid.as_str()),
                        ("type", "mentions"),
                        ("limit", limit.as_str()),
                    ])
            })
            .await?;

        Ok(response
            .notifications
            .into_iter()
            .filter_map(normalize_notification)
            .collect())
    }
}

#[async_trait]
impl ReplyPublisher for FeedApiClient {
    async fn publish_reply(&self, text: &str, parent_identifier: &str) -> Result<(), FeedError> {
        let payload = json!({
            "signer_uuid": self.signer_uuid,
            "text": text,
            "parent": parent_identifier,
        });
        let response: PublishCastResponse = self
            .request_json("cast", || {
                self.http
                    .post(format!("{}/v2/farcaster/cast", self.api_base))
                    .json(&payload)
            })
            .await?;

        if response.success == Some(false) {
            return Err(FeedError::Rejected {
                operation: "cast".to_string(),
                message: response
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }
}

/// Drops non-mention notifications; malformed entries surface with no identifier.
fn normalize_notification(raw: Value) -> Option<MentionNotification> {
    let parsed = match serde_json::from_value::<RawNotification>(raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::debug!(%error, "feed notification did not match the expected shape");
            return Some(MentionNotification {
                identifier: None,
                text: String::new(),
                author_handle: String::new(),
                author_id: None,
            });
        }
    };

    if parsed
        .kind
        .as_deref()
        .is_some_and(|kind| !kind.eq_ignore_ascii_case(MENTION_NOTIFICATION_TYPE))
    {
        return None;
    }

    let cast = parsed.cast;
    let identifier = cast
        .as_ref()
        .and_then(|cast| cast.hash.as_deref())
        .map(str::trim)
        .filter(|hash| !hash.is_empty())
        .map(str::to_string);
    let text = cast
        .as_ref()
        .and_then(|cast| cast.text.clone())
        .unwrap_or_default();
    let author = cast.and_then(|cast| cast.author);
    Some(MentionNotification {
        identifier,
        text,
        author_handle: author
            .as_ref()
            .and_then(|author| author.username.clone())
            .unwrap_or_default(),
        author_id: author.and_then(|author| author.fid),
    })
}
