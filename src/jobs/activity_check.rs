use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

use super::{JobContext, JobReport};
use crate::activity::{
    absentee_names, check_member_activity, reconcile_absences, sort_for_report,
    sweep_group_activity, ActivityCheckResult, ActivityRules, MemberIdentity,
};
use crate::error::{BotError, Result};
use crate::messages::{activity_csv, activity_report};
use crate::policy::retry;
use crate::state::{read_absences, write_absences, MemberDirectory};
use crate::wom::{GainsRecord, PlayerGains, WomClient, OVERALL};

/// Observation window for activity
pub const ACTIVITY_PERIOD: &str = "month";

/// Read the absence ledger, reconcile it against the directory and write back any fixes.
/// Returns the lower-cased names of everyone currently absent.
async fn load_absentees(ctx: &JobContext) -> Result<HashSet<String>> {
    let sheet = ctx.config.absence_sheet.as_str();
    let records = retry(ctx.storage_retry(), "read absences", || {
        read_absences(ctx.sheets.as_ref(), sheet)
    })
    .await?;

    let reconciliation = {
        let db = ctx.members.read().await;
        reconcile_absences(records, &*db)
    };

    if reconciliation.changed > 0 {
        info!(
            "Writing back {} reconciled absences ({} unlinked)",
            reconciliation.changed, reconciliation.unlinked
        );
        retry(ctx.storage_retry(), "write absences", || {
            write_absences(ctx.sheets.as_ref(), sheet, &reconciliation.records)
        })
        .await?;
    }

    Ok(absentee_names(&reconciliation.records))
}

/// Check every group member's monthly gains against their rank requirement
pub async fn job_check_activity(ctx: &JobContext) -> Result<JobReport> {
    let group_id = ctx.config.wom.group_id;
    let client = WomClient::new(&ctx.config.wom)?;

    let group = client.get_group_details(group_id).await?;
    let gains = client
        .get_all_group_gains(group_id, OVERALL, ACTIVITY_PERIOD)
        .await?;
    let absentees = load_absentees(ctx).await?;
    let rules = ActivityRules::from_config(&ctx.config);

    let mut results: Vec<ActivityCheckResult> = {
        let db = ctx.members.read().await;
        sweep_group_activity(&group, &gains, &*db, &absentees, &rules, Utc::now())
    };
    sort_for_report(&mut results);

    info!(
        "Activity check complete: {} members checked against group '{}'",
        results.len(),
        group.name
    );

    Ok(JobReport {
        body: activity_report(&results),
        attachment: Some((
            format!("activity-{}.csv", Utc::now().format("%Y-%m-%d")),
            activity_csv(&results).into_bytes(),
        )),
    })
}

/// Classify a single member from their own gains
pub async fn check_single_member(ctx: &JobContext, nickname: &str) -> Result<ActivityCheckResult> {
    let (player_id, rank_tier, stored_name) = {
        let db = ctx.members.read().await;
        let member = db
            .get_member_by_nickname(nickname)
            .ok_or_else(|| BotError::MemberNotFound {
                nickname: nickname.to_string(),
            })?;
        (member.wom_player_id, member.rank_tier, member.nickname.clone())
    };

    let client = WomClient::new(&ctx.config.wom)?;
    let group = client.get_group_details(ctx.config.wom.group_id).await?;

    let player_id = player_id.or_else(|| {
        group
            .memberships
            .iter()
            .find(|m| m.player.display_name.eq_ignore_ascii_case(&stored_name))
            .map(|m| m.player_id)
    });

    // Players outside the group have nothing worth fetching
    let gains = match player_id.and_then(|id| group.membership_for(id)) {
        Some(membership) => {
            client
                .get_player_gains(&membership.player.username, ACTIVITY_PERIOD)
                .await?
        }
        None => PlayerGains::default(),
    };
    let absentees = load_absentees(ctx).await?;
    let rules = ActivityRules::from_config(&ctx.config);

    Ok(check_member_activity(
        MemberIdentity {
            player_id,
            nickname: &stored_name,
            rank_tier,
        },
        &GainsRecord::Player(gains),
        &group,
        &absentees,
        &rules,
        Utc::now(),
    ))
}
