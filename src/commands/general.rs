use poise::serenity_prelude as serenity;
use tracing::info;

use super::{gate, send_report};
use crate::jobs::JobReport;
use crate::policy::CommandPolicy;
use crate::{Context, Error};

const DEFAULT_LOG_COUNT: usize = 20;
const MAX_LOG_COUNT: usize = 200;

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(
        poise::CreateReply::default()
            .content("Pong! Bot is working!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("/ping", "Check if the bot is running", false)
        .field("/check_member", "Check one member's monthly activity", false)
        .field("/ingots", "Show an ingot balance", false)
        .field("/check_activity", "Run the activity check (Officer)", false)
        .field("/check_discrepancies", "Compare Discord and WOM rosters (Officer)", false)
        .field("/sync_members", "Sync the member list with WOM (Officer)", false)
        .field("/run_jobs", "Run every job at once (Officer)", false)
        .field("/ingots_add, /ingots_remove", "Change an ingot balance (Officer)", false)
        .field("/absences, /absence_add", "Read or add to the absence list (Officer)", false)
        .field("/raffle_buy, /raffle_status", "Buy raffle tickets with ingots, or see the running raffle", false)
        .field("/raffle_start, /raffle_end", "Open a raffle, or close it and draw the winner (Officer)", false)
        .field("/set_rank", "Set a member's rank tier (Officer)", false)
        .field("/logs", "Show recent warnings and errors (Officer)", false)
        .color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Show recent warnings and errors
#[poise::command(slash_command, guild_only)]
pub async fn logs(
    ctx: Context<'_>,
    #[description = "How many entries to show"]
    #[min = 1]
    count: Option<u32>,
) -> Result<(), Error> {
    let policy = CommandPolicy::officer("logs", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let count = count.map_or(DEFAULT_LOG_COUNT, |c| c as usize).min(MAX_LOG_COUNT);
    let entries = ctx.data().log_buffer.get_recent(count);
    let body = if entries.is_empty() {
        "No warnings or errors logged since startup.".to_string()
    } else {
        entries
            .iter()
            .map(|e| e.format())
            .collect::<Vec<_>>()
            .join("\n")
    };

    send_report(ctx, &JobReport::text(body)).await
}
