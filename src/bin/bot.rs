use anyhow::{anyhow, Context};
use telegram::BotClient;
use tracing::info;

use plate_gate::bot::IntakeBot;
use plate_gate::config::Config;
use plate_gate::init_logging;
use plate_gate::staging::StagingFile;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_logging(&config.log_level);

    let token = config
        .telegram
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("telegram.token is not set"))?;
    let client = BotClient::with_api_url(&config.telegram.api_url, token)
        .context("invalid telegram settings")?;

    info!(
        "Starting intake bot, requests go to {:?}",
        config.staging_path
    );
    let staging = StagingFile::new(config.staging_path.clone());
    IntakeBot::new(client, staging, config.telegram.poll_timeout_secs)
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    Ok(())
}
