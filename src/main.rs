use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;
mod models;
mod services;
mod utils;

use api::history::HistoryClient;
use config::AppConfig;
use services::page_service::PageRegistry;

struct Handler;

/// Historical-data views, one per channel
struct Pages;

impl TypeMapKey for Pages {
    type Value = Arc<Mutex<PageRegistry>>;
}

struct HistoryApi;

impl TypeMapKey for HistoryApi {
    type Value = Arc<HistoryClient>;
}

struct Settings;

impl TypeMapKey for Settings {
    type Value = Arc<AppConfig>;
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        commands::handle_message(&ctx, &msg).await;
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let data = ctx.data.read().await;
        if let Some(config) = data.get::<Settings>() {
            match (&config.history_channels, &config.refresh_command) {
                (Some(channels), _) if channels.is_empty() => {
                    warn!("HISTORY_CHANNEL_IDS is empty; no channel will show charts")
                }
                (Some(channels), Some(command)) => {
                    info!("Serving {} history channel(s) via {}", channels.len(), command)
                }
                (None, Some(command)) => info!("Serving every channel via {}", command),
                (_, None) => warn!("No refresh command configured; charts stay empty"),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::from_default_env();
    let filter = match "stock_history_chart=debug".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    let filter = match "serenity=warn".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("📈 Starting stock history chart bot...");

    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    info!("Historical data backend: {}", config.api_base_url);

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create client: {}", e);
            return;
        }
    };

    {
        let mut data = client.data.write().await;
        data.insert::<HistoryApi>(Arc::new(HistoryClient::new(config.api_base_url.clone())));
        data.insert::<Pages>(Arc::new(Mutex::new(PageRegistry::new(Arc::clone(&config)))));
        data.insert::<Settings>(config);
    }

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }
}
