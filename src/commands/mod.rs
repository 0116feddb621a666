pub mod help;
pub mod history;

use serenity::builder::CreateEmbed;
use serenity::model::channel::Message;
use serenity::prelude::Context;

pub const HELP_COMMAND: &str = "$help";

pub async fn handle_message(ctx: &Context, msg: &Message) {
    if msg.author.bot {
        return;
    }

    // Parse command and arguments
    let parts: Vec<&str> = msg.content.split_whitespace().collect();
    let Some((&command, args)) = parts.split_first() else {
        return;
    };

    // First sight of a history channel initializes its page, but only for
    // commands that use one
    let page = {
        let registry = {
            let data = ctx.data.read().await;
            match data.get::<crate::Pages>() {
                Some(registry) => registry.clone(),
                None => {
                    tracing::error!("Page registry not initialized");
                    return;
                }
            }
        };
        let mut registry = registry.lock().await;
        if !registry.handles(command) {
            return;
        }
        registry.page_for(msg.channel_id.get())
    };

    let refresh_page = match page {
        Some(page) => {
            let accepted = page.lock().await.accepts(command);
            accepted.then_some(page)
        }
        None => None,
    };

    let result = match (command, refresh_page) {
        (HELP_COMMAND, _) => help::execute(ctx, msg).await,
        (_, Some(page)) => history::execute(ctx, msg, page, args).await,
        _ => return,
    };

    if let Err(e) = result {
        tracing::error!("❌ Error executing command {}: {}", command, e);

        let message = serenity::builder::CreateMessage::default().embed(alert_embed(&e));
        if let Err(send_err) = msg.channel_id.send_message(ctx, message).await {
            tracing::warn!("Failed to deliver alert: {}", send_err);
        }
    }
}

/// Alert shown in place of a failed command; the text is used as-is
fn alert_embed(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("⚠️ Alert")
        .description(message)
        .color(0xff0000)
}
