pub mod absences;
pub mod activity;
pub mod general;
pub mod ingots;
pub mod members;
pub mod raffle;

pub use absences::{absence_add, absences};
pub use activity::{check_activity, check_discrepancies, check_member, run_jobs, sync_members};
pub use general::{help, logs, ping};
pub use ingots::{ingots, ingots_add, ingots_remove};
pub use members::set_rank;
pub use raffle::{raffle_buy, raffle_end, raffle_start, raffle_status};

use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::info;

use crate::jobs::JobReport;
use crate::messages::{chunk_message, MESSAGE_LIMIT};
use crate::policy::{evaluate, CommandPolicy, GuardOutcome, Invocation};
use crate::{Context, Error};

/// Names of the caller's roles in the guild the command came from
async fn caller_role_names(ctx: Context<'_>) -> Result<Vec<String>, Error> {
    let (Some(guild_id), Some(member)) = (ctx.guild_id(), ctx.author_member().await) else {
        return Ok(Vec::new());
    };
    let guild_roles = guild_id.roles(ctx.http()).await?;
    Ok(member
        .roles
        .iter()
        .filter_map(|id| guild_roles.get(id).map(|role| role.name.clone()))
        .collect())
}

/// Run the guard pipeline for a command.
///
/// On denial the caller gets an ephemeral reply and `false`. Otherwise the
/// interaction is deferred, once, and the handler may go on.
pub async fn gate(ctx: Context<'_>, policy: &CommandPolicy) -> Result<bool, Error> {
    let role_names = if policy.required_roles.is_empty() {
        Vec::new()
    } else {
        caller_role_names(ctx).await?
    };
    let invocation = Invocation {
        user_id: ctx.author().id.get(),
        channel_id: ctx.channel_id().get(),
        role_names: &role_names,
        now: Utc::now(),
    };

    match evaluate(policy, &invocation, &ctx.data().rate_limiter) {
        GuardOutcome::Deny(reason) => {
            info!(
                "Denied '{}' for {}: {}",
                policy.command,
                ctx.author().name,
                reason
            );
            ctx.send(
                poise::CreateReply::default()
                    .content(reason)
                    .ephemeral(true),
            )
            .await?;
            Ok(false)
        }
        GuardOutcome::Proceed => {
            ctx.defer().await?;
            Ok(true)
        }
    }
}

/// Reply with a job report, chunked, with its attachment last
pub async fn send_report(ctx: Context<'_>, report: &JobReport) -> Result<(), Error> {
    for chunk in chunk_message(&report.body, MESSAGE_LIMIT) {
        ctx.say(chunk).await?;
    }
    if let Some((filename, bytes)) = &report.attachment {
        ctx.send(
            poise::CreateReply::default()
                .attachment(serenity::CreateAttachment::bytes(bytes.clone(), filename.clone())),
        )
        .await?;
    }
    Ok(())
}
