use std::path::PathBuf;

use castpage_runtime::{DEFAULT_FETCH_LIMIT, DEFAULT_PROCESSED_CAP};
use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed = value
        .parse::<f32>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || !(0.0..=2.0).contains(&parsed) {
        return Err("value must be in range 0.0..=2.0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "castpage",
    about = "Mention bot that answers `landing` requests with generated landing pages",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "feed-api-key",
        env = "CASTPAGE_FEED_API_KEY",
        hide_env_values = true,
        help = "API key sent as x-api-key to the feed API"
    )]
    pub(crate) feed_api_key: String,

    #[arg(
        long = "feed-api-base",
        env = "CASTPAGE_FEED_API_BASE",
        default_value = "https://api.neynar.com",
        help = "Base URL of the feed API"
    )]
    pub(crate) feed_api_base: String,

    #[arg(
        long = "signer-uuid",
        env = "CASTPAGE_SIGNER_UUID",
        hide_env_values = true,
        help = "Signer id used to publish replies as the bot"
    )]
    pub(crate) signer_uuid: String,

    #[arg(
        long = "bot-fid",
        env = "CASTPAGE_BOT_FID",
        value_parser = parse_positive_u64,
        help = "Account id whose mentions are polled"
    )]
    pub(crate) bot_fid: u64,

    #[arg(
        long = "bot-handle",
        env = "CASTPAGE_BOT_HANDLE",
        help = "Bot handle stripped from the start of mention text"
    )]
    pub(crate) bot_handle: String,

    #[arg(
        long = "openai-api-key",
        env = "CASTPAGE_OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the generation provider"
    )]
    pub(crate) openai_api_key: String,

    #[arg(
        long = "openai-api-base",
        env = "CASTPAGE_OPENAI_API_BASE",
        default_value = "https://api.openai.com/v1",
        help = "Base URL of the OpenAI-compatible provider"
    )]
    pub(crate) openai_api_base: String,

    #[arg(
        long = "openai-organization",
        env = "CASTPAGE_OPENAI_ORGANIZATION",
        help = "Optional OpenAI organization header"
    )]
    pub(crate) openai_organization: Option<String>,

    #[arg(
        long,
        env = "CASTPAGE_MODEL",
        default_value = "gpt-4o-mini",
        help = "Model used for landing page generation"
    )]
    pub(crate) model: String,

    #[arg(
        long,
        env = "CASTPAGE_TEMPERATURE",
        default_value_t = 0.7,
        value_parser = parse_temperature,
        help = "Sampling temperature for generation"
    )]
    pub(crate) temperature: f32,

    #[arg(
        long = "max-tokens",
        env = "CASTPAGE_MAX_TOKENS",
        default_value_t = 4_000,
        help = "Completion token limit for generation"
    )]
    pub(crate) max_tokens: u32,

    #[arg(
        long = "public-base-url",
        env = "CASTPAGE_PUBLIC_BASE_URL",
        help = "Public URL prefix under which the artifact directory is served"
    )]
    pub(crate) public_base_url: String,

    #[arg(
        long = "state-dir",
        env = "CASTPAGE_STATE_DIR",
        default_value = ".castpage/state",
        help = "Directory for state.json, its backup and the event logs"
    )]
    pub(crate) state_dir: PathBuf,

    #[arg(
        long = "artifact-dir",
        env = "CASTPAGE_ARTIFACT_DIR",
        default_value = ".castpage/pages",
        help = "Directory generated pages are written to"
    )]
    pub(crate) artifact_dir: PathBuf,

    #[arg(
        long = "poll-interval-seconds",
        env = "CASTPAGE_POLL_INTERVAL_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Seconds between poll cycles"
    )]
    pub(crate) poll_interval_seconds: u64,

    #[arg(
        long = "fetch-limit",
        env = "CASTPAGE_FETCH_LIMIT",
        default_value_t = DEFAULT_FETCH_LIMIT,
        value_parser = parse_positive_usize,
        help = "Maximum mentions fetched per cycle"
    )]
    pub(crate) fetch_limit: usize,

    #[arg(
        long = "processed-cap",
        env = "CASTPAGE_PROCESSED_CAP",
        default_value_t = DEFAULT_PROCESSED_CAP,
        value_parser = parse_positive_usize,
        help = "Most recent processed cast ids kept in state"
    )]
    pub(crate) processed_cap: usize,

    #[arg(
        long = "generation-window-seconds",
        env = "CASTPAGE_GENERATION_WINDOW_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Sliding window length for generation rate limiting"
    )]
    pub(crate) generation_window_seconds: u64,

    #[arg(
        long = "generation-quota",
        env = "CASTPAGE_GENERATION_QUOTA",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Generation calls allowed per window"
    )]
    pub(crate) generation_quota: usize,

    #[arg(
        long = "generation-timeout-seconds",
        env = "CASTPAGE_GENERATION_TIMEOUT_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Upper bound for a single generation call before the fallback page is used"
    )]
    pub(crate) generation_timeout_seconds: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "CASTPAGE_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for feed and provider requests"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "CASTPAGE_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per HTTP request, including the first"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "CASTPAGE_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base delay for exponential retry backoff"
    )]
    pub(crate) retry_base_delay_ms: u64,

    #[arg(
        long,
        env = "CASTPAGE_MAINTENANCE",
        help = "Override the persisted maintenance flag (true or false)"
    )]
    pub(crate) maintenance: Option<bool>,

    #[arg(
        long = "poll-once",
        env = "CASTPAGE_POLL_ONCE",
        action = ArgAction::SetTrue,
        help = "Run a single poll cycle and exit"
    )]
    pub(crate) poll_once: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    const REQUIRED: [&str; 13] = [
        "castpage",
        "--feed-api-key",
        "feed-key",
        "--signer-uuid",
        "signer-1",
        "--bot-fid",
        "900",
        "--bot-handle",
        "castpage",
        "--openai-api-key",
        "sk-test",
        "--public-base-url",
        "https://pages.example.com",
    ];

    #[test]
    fn unit_cli_defaults_match_documented_settings() {
        let cli = Cli::try_parse_from(REQUIRED).expect("parse");
        assert_eq!(cli.poll_interval_seconds, 60);
        assert_eq!(cli.fetch_limit, 10);
        assert_eq!(cli.processed_cap, 1_000);
        assert_eq!(cli.generation_window_seconds, 60);
        assert_eq!(cli.generation_quota, 1);
        assert_eq!(cli.generation_timeout_seconds, 60);
        assert_eq!(cli.model, "gpt-4o-mini");
        assert!(cli.maintenance.is_none());
        assert!(!cli.poll_once);
    }

    #[test]
    fn functional_cli_accepts_overrides() {
        let mut args = REQUIRED.to_vec();
        args.extend([
            "--poll-once",
            "--maintenance",
            "true",
            "--fetch-limit",
            "25",
            "--temperature",
            "0.2",
        ]);
        let cli = Cli::try_parse_from(args).expect("parse");
        assert!(cli.poll_once);
        assert_eq!(cli.maintenance, Some(true));
        assert_eq!(cli.fetch_limit, 25);
        assert!((cli.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn regression_cli_rejects_zero_limits_and_missing_credentials() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--poll-interval-seconds", "0"]);
        assert!(Cli::try_parse_from(args).is_err());

        let mut args = REQUIRED.to_vec();
        args.extend(["--temperature", "3.5"]);
        assert!(Cli::try_parse_from(args).is_err());

        let missing_key = REQUIRED
            .iter()
            .copied()
            .filter(|arg| *arg != "--openai-api-key" && *arg != "sk-test")
            .collect::<Vec<_>>();
        assert!(Cli::try_parse_from(missing_key).is_err());
    }
}
