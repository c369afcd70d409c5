use std::fmt;

use crate::cli_args::Cli;

/// Startup view of [`Cli`] with credentials masked.
pub(crate) struct RedactedCli<'a>(pub(crate) &'a Cli);

impl fmt::Debug for RedactedCli<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cli = self.0;
        f.debug_struct("Cli")
            .field("feed_api_base", &cli.feed_api_base)
            .field("feed_api_key", &mask(&cli.feed_api_key))
            .field("signer_uuid", &mask(&cli.signer_uuid))
            .field("bot_fid", &cli.bot_fid)
            .field("bot_handle", &cli.bot_handle)
            .field("openai_api_base", &cli.openai_api_base)
            .field("openai_api_key", &mask(&cli.openai_api_key))
            .field("model", &cli.model)
            .field("public_base_url", &cli.public_base_url)
            .field("state_dir", &cli.state_dir)
            .field("artifact_dir", &cli.artifact_dir)
            .field("poll_interval_seconds", &cli.poll_interval_seconds)
            .field("fetch_limit", &cli.fetch_limit)
            .field("generation_window_seconds", &cli.generation_window_seconds)
            .field("generation_quota", &cli.generation_quota)
            .field("maintenance", &cli.maintenance)
            .field("poll_once", &cli.poll_once)
            .finish_non_exhaustive()
    }
}

fn mask(secret: &str) -> String {
    let visible = secret.chars().take(3).collect::<String>();
    if secret.chars().count() <= 6 {
        "***".to_string()
    } else {
        format!("{visible}***")
    }
}
