use anyhow::{Context as _, Result};
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot for clan activity tracking and member management
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to all guilds (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to sync commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,

    /// Run every job once as soon as the bot is ready
    #[arg(long)]
    run_jobs_on_start: bool,
}

mod activity;
mod commands;
mod config;
mod error;
mod events;
mod jobs;
mod logging;
mod messages;
mod policy;
mod state;
mod wom;

use commands::{
    absence_add, absences, check_activity, check_discrepancies, check_member, help, ingots,
    ingots_add, ingots_remove, logs, ping, raffle_buy, raffle_end, raffle_start, raffle_status,
    run_jobs, set_rank, sync_members,
};
use config::ClanConfig;
use events::{handle_member_add, handle_member_remove};
use jobs::{run_all_jobs, spawn_scheduler, JobContext};
use logging::SharedLogBuffer;
use policy::{RateLimiter, SharedRateLimiter};
use state::{
    create_shared_member_database, create_shared_raffle_book, JsonSheetStore, MemberDatabase,
    RaffleBook, SharedMemberDatabase, SharedRaffleBook, SheetStore,
};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub config: Arc<ClanConfig>,
    pub members: SharedMemberDatabase,
    pub members_path: String,
    pub raffles: SharedRaffleBook,
    pub raffles_path: String,
    pub sheets: Arc<dyn SheetStore>,
    pub rate_limiter: SharedRateLimiter,
    pub log_buffer: SharedLogBuffer,
}

impl Data {
    pub fn job_context(&self, http: Arc<serenity::Http>) -> JobContext {
        JobContext {
            http,
            config: self.config.clone(),
            members: self.members.clone(),
            members_path: self.members_path.clone(),
            sheets: self.sheets.clone(),
        }
    }
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = handle_member_add(new_member, data).await {
                error!("Failed to handle new member: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if let Err(e) = handle_member_remove(*guild_id, user, data).await {
                error!("Failed to handle member removal: {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

/// The application id is the base64 encoded first segment of a bot token
fn application_id_from_token(token: &str) -> Option<String> {
    use base64::Engine;

    let segment = token.split('.').next()?;
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(segment)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(segment))
        .ok()?;
    String::from_utf8(decoded).ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Keeps recent warnings and errors for /logs
    let log_buffer = logging::create_log_buffer(1000);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .with(logging::LogCaptureLayer::new(
            log_buffer.clone(),
            tracing::Level::WARN,
        ))
        .init();

    let token =
        std::env::var("DISCORD_TOKEN").context("Missing DISCORD_TOKEN environment variable")?;

    if let Some(app_id) = application_id_from_token(&token) {
        info!(
            "Bot ID: {} (configure intents at https://discord.com/developers/applications/{}/bot)",
            app_id, app_id
        );
    }

    let data_path = std::env::var("DATA_PATH").unwrap_or_else(|_| "data".to_string());
    let state_path = std::env::var("STATE_PATH").unwrap_or_else(|_| "state".to_string());

    tokio::fs::create_dir_all(&state_path)
        .await
        .with_context(|| format!("Could not create state directory {}", state_path))?;

    let config_path = format!("{}/clan.json", data_path);
    info!("Loading clan configuration from {}...", config_path);
    let config = Arc::new(ClanConfig::load_from_file(&config_path)?);

    info!("Loading member database...");
    let members_path = format!("{}/members.json", state_path);
    let member_database = MemberDatabase::load(&members_path).await?;
    info!("Loaded {} members", member_database.member_count());
    let members = create_shared_member_database(member_database);

    let raffles_path = format!("{}/raffles.json", state_path);
    let raffles = create_shared_raffle_book(RaffleBook::load(&raffles_path).await?);

    let sheets: Arc<dyn SheetStore> =
        Arc::new(JsonSheetStore::new(&format!("{}/absences.json", state_path)));
    let rate_limiter: SharedRateLimiter = Arc::new(RateLimiter::new());

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id;
    let run_jobs_on_start = args.run_jobs_on_start;

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Targeting specific guild {}", gid);
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                ping(),
                help(),
                logs(),
                check_activity(),
                check_discrepancies(),
                sync_members(),
                run_jobs(),
                check_member(),
                ingots(),
                ingots_add(),
                ingots_remove(),
                absences(),
                absence_add(),
                set_rank(),
                raffle_start(),
                raffle_buy(),
                raffle_status(),
                raffle_end(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("❌ {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                            let _ = ctx.say(format!("Could not read the command arguments: {}", error)).await;
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let config = config.clone();
            let members = members.clone();
            let members_path = members_path.clone();
            let raffles = raffles.clone();
            let raffles_path = raffles_path.clone();
            let sheets = sheets.clone();
            let rate_limiter = rate_limiter.clone();
            let log_buffer = log_buffer.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                if !ready.guilds.iter().any(|g| g.id.get() == config.guild_id) {
                    warn!("Bot is not in the configured guild {}", config.guild_id);
                }

                let guilds_to_register: Vec<serenity::GuildId> = if let Some(gid) = target_guild_id {
                    vec![serenity::GuildId::new(gid)]
                } else {
                    ready.guilds.iter().map(|g| g.id).collect()
                };

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        ).await {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Successfully registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    ).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!("Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                              framework.options().commands.len());
                    }
                }

                let data = Data {
                    config,
                    members,
                    members_path,
                    raffles,
                    raffles_path,
                    sheets,
                    rate_limiter,
                    log_buffer,
                };

                let job_context = data.job_context(ctx.http.clone());
                match data.config.job_interval_hours {
                    Some(hours) if hours > 0 => spawn_scheduler(job_context.clone(), hours),
                    _ => info!("No job interval configured, jobs run on command only"),
                }
                if run_jobs_on_start {
                    info!("--run-jobs-on-start: Running all jobs now");
                    tokio::spawn(async move {
                        run_all_jobs(&job_context).await;
                    });
                }

                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS;

    info!("Requesting privileged intents: [\"GUILD_MEMBERS\"]");

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("GUILD_MEMBERS must be enabled in the Discord Developer Portal:");
            error!("Go to https://discord.com/developers/applications -> Your App -> Bot -> Privileged Gateway Intents");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable GUILD_MEMBERS in the Discord Developer Portal"
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_id_from_token() {
        // "123456789" encoded without padding
        assert_eq!(
            application_id_from_token("MTIzNDU2Nzg5.GhIjKl.secret"),
            Some("123456789".to_string())
        );
        assert_eq!(application_id_from_token("!!!.x.y"), None);
    }
}
