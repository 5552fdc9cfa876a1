use super::{gate, send_report};
use crate::jobs::{
    check_single_member, job_check_activity, job_check_membership_discrepancies,
    job_sync_members, run_all_jobs,
};
use crate::messages::member_check_message;
use crate::policy::CommandPolicy;
use crate::{Context, Error};

/// Check every group member's monthly XP against their rank requirement
#[poise::command(slash_command, guild_only)]
pub async fn check_activity(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::officer("check_activity", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let jobs = ctx.data().job_context(ctx.serenity_context().http.clone());
    let report = job_check_activity(&jobs).await?;
    send_report(ctx, &report).await
}

/// Compare the Discord member list against the WOM group
#[poise::command(slash_command, guild_only)]
pub async fn check_discrepancies(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::officer("check_discrepancies", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let jobs = ctx.data().job_context(ctx.serenity_context().http.clone());
    let report = job_check_membership_discrepancies(&jobs).await?;
    send_report(ctx, &report).await
}

/// Pull the WOM group roster into the member list
#[poise::command(slash_command, guild_only)]
pub async fn sync_members(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::officer("sync_members", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let jobs = ctx.data().job_context(ctx.serenity_context().http.clone());
    let report = job_sync_members(&jobs).await?;
    send_report(ctx, &report).await
}

/// Run every job at once; reports go to the report channel
#[poise::command(slash_command, guild_only)]
pub async fn run_jobs(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::officer("run_jobs", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let jobs = ctx.data().job_context(ctx.serenity_context().http.clone());
    tokio::spawn(async move {
        run_all_jobs(&jobs).await;
    });

    ctx.say(format!(
        "Running all jobs. Reports will be posted in <#{}>.",
        ctx.data().config.report_channel_id
    ))
    .await?;
    Ok(())
}

/// Check one member's monthly activity
#[poise::command(slash_command, guild_only)]
pub async fn check_member(
    ctx: Context<'_>,
    #[description = "In-game name"] nickname: String,
) -> Result<(), Error> {
    let policy = CommandPolicy::open("check_member", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let jobs = ctx.data().job_context(ctx.serenity_context().http.clone());
    let result = check_single_member(&jobs, &nickname).await?;
    ctx.say(member_check_message(&result)).await?;
    Ok(())
}
