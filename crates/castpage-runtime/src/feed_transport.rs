//! Boundary types for the social feed: inbound mentions and outbound replies.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A mention normalized at the transport boundary. Entries without an identifier are skipped.
pub struct MentionNotification {
    pub identifier: Option<String>,
    pub text: String,
    pub author_handle: String,
    pub author_id: Option<u64>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed api {operation} was rate limited")]
    RateLimited { operation: String },
    #[error("feed api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("feed api {operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode feed api {operation} response: {source}")]
    Decode {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed api {operation} rejected the request: {message}")]
    Rejected { operation: String, message: String },
    #[error("invalid feed api configuration: {0}")]
    Config(String),
}

impl FeedError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[async_trait]
pub trait MentionSource: Send + Sync {
    async fn fetch_mentions(
        &self,
        account_id: u64,
        limit: usize,
    ) -> Result<Vec<MentionNotification>, FeedError>;
}

#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    async fn publish_reply(&self, text: &str, parent_identifier: &str) -> Result<(), FeedError>;
}
