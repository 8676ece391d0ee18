use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::oneshot;

mod ai;
mod bsky;
mod config;
mod conversation;
mod error;
mod follow_back;
mod models;
mod poller;
mod reply_policy;
mod triage;
mod watermark;

use ai::OpenAIClient;
use bsky::BskyClient;
use config::Config;
use error::BotError;
use poller::PollLoop;
use watermark::{FileWatermarkStore, Watermark};

async fn run(config: Config) -> Result<(), BotError> {
    let social = BskyClient::new(&config.service_url, &config.handle, &config.password)?;
    let completion = OpenAIClient::new(
        &config.openai_api_key,
        config.openai_organization.as_deref(),
        Some(&config.openai_endpoint),
        Some(&config.openai_model),
    )?;

    let store = FileWatermarkStore::new(config.watermark_file.clone());
    log::info!("Using watermark file: {}", store.path().display());
    let watermark = Watermark::load(Box::new(store));

    let poller = PollLoop::new(Arc::new(social), Arc::new(completion), watermark, config.poll_config());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Dropping the sender would stop the poller, so hold it forever.
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl-C, shutting down");
        let _ = shutdown_tx.send(());
    });

    poller.run(shutdown_rx).await
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    log::info!("Starting aibot for @{} ({:?})", config.handle, config.source);

    if let Err(e) = run(config).await {
        log::error!("aibot stopped: {}", e);
        std::process::exit(1);
    }
}
