//! Mention-driven landing page runtime: state, rate limiting, generation, transports and the
//! polling pipeline.

pub mod artifact_generator;
pub mod artifact_storage;
pub mod bot_state;
pub mod clock;
pub mod command_parser;
pub mod fallback_template;
pub mod feed_api_client;
pub mod feed_transport;
pub mod mention_pipeline;
pub mod rate_limiter;
pub mod scheduler;
pub mod state_store;
mod transport_helpers;

pub use artifact_generator::{
    extract_html_document, passes_structural_validation, ArtifactGenerator,
    ArtifactGeneratorConfig, ArtifactSource, GeneratedArtifact, REQUIRED_HTML_MARKERS,
};
pub use artifact_storage::{ArtifactStorage, FileArtifactStorage};
pub use bot_state::{BotState, DEFAULT_PROCESSED_CAP};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command_parser::{parse_mention_command, LandingRequest, MentionCommand};
pub use fallback_template::render_fallback_page;
pub use feed_api_client::{FeedApiClient, FeedApiConfig};
pub use feed_transport::{FeedError, MentionNotification, MentionSource, ReplyPublisher};
pub use mention_pipeline::{
    MentionPipeline, MentionPipelineConfig, PipelineRuntime, PollCycleReport,
    DEFAULT_FETCH_LIMIT, MAX_REPLY_BYTES,
};
pub use rate_limiter::{Admission, SlidingWindowLimiter};
pub use scheduler::{CycleRunner, PollScheduler, SchedulerStats, TickOutcome};
pub use state_store::{JsonlEventLog, StateStore};
