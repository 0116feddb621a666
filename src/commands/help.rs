use serenity::builder::CreateEmbed;
use serenity::model::channel::Message;
use serenity::prelude::Context;

use crate::utils::extract_clean_error;

pub async fn execute(ctx: &Context, msg: &Message) -> Result<(), String> {
    let refresh_command = {
        let data = ctx.data.read().await;
        data.get::<crate::Settings>()
            .and_then(|config| config.refresh_command.clone())
    };

    let usage = match &refresh_command {
        Some(command) => format!(
            "`{} <SYMBOL> <START_DATE> [END_DATE]` - Fetch daily closes and redraw this channel's chart\nDates are `YYYY-MM-DD`; the end date defaults to today.",
            command
        ),
        None => "Charts are read-only here: no refresh command is configured.".to_string(),
    };

    let embed = CreateEmbed::default()
        .title("📖 Stock History Help")
        .description("Plots historical closing prices for a stock symbol.")
        .color(0x00b0f4)
        .field("🎯 General", "`$help` - Show this help message", false)
        .field("📊 Charts", usage, false)
        .field(
            "📐 Axis",
            "Ranges over two years are labelled by year (January 1st ticks).\nShorter ranges are labelled by month and day.",
            false,
        );

    msg.channel_id
        .send_message(ctx, serenity::builder::CreateMessage::default().embed(embed))
        .await
        .map_err(|e| extract_clean_error(&e.to_string()))?;

    Ok(())
}
