mod bot;

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use surge_radar::config::Config;
use surge_radar::market::KisClient;
use surge_radar::notify::TelegramNotifier;
use surge_radar::tracking::JsonFileStore;

use crate::bot::SurgeBot;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let market = Box::new(KisClient::new(&cfg));
    let store = Box::new(JsonFileStore::new(cfg.candidate_log_path()));
    let notifier = Box::new(TelegramNotifier::new(
        cfg.telegram_bot_token.clone(),
        cfg.telegram_chat_id.clone(),
    ));
    let shared_config = cfg.shared();

    let mut bot = SurgeBot::new(shared_config, market, store, notifier).await;
    bot.run().await?;

    Ok(())
}
