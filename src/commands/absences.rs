use tracing::info;

use super::{gate, send_report};
use crate::jobs::JobReport;
use crate::policy::{retry, CommandPolicy, RetryPolicy};
use crate::state::{append_absence, read_absences, AbsenceRecord, MemberDirectory};
use crate::{Context, Error};

fn storage_retry(ctx: Context<'_>) -> RetryPolicy {
    RetryPolicy::with_attempts(ctx.data().config.wom.retries)
}

/// List recorded absences
#[poise::command(slash_command, guild_only)]
pub async fn absences(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::officer("absences", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let data = ctx.data();
    let records = retry(storage_retry(ctx), "read absences", || {
        read_absences(data.sheets.as_ref(), &data.config.absence_sheet)
    })
    .await?;

    let body = if records.is_empty() {
        "No absences recorded.".to_string()
    } else {
        let mut lines = vec![format!("**Absences ({})**", records.len())];
        for record in &records {
            let mut line = format!("- **{}** ({})", record.nickname, record.date);
            if !record.information.is_empty() {
                line.push_str(&format!(": {}", record.information));
            }
            lines.push(line);
        }
        lines.join("\n")
    };

    send_report(ctx, &JobReport::text(body)).await
}

/// Record an absence for a member
#[poise::command(slash_command, guild_only)]
pub async fn absence_add(
    ctx: Context<'_>,
    #[description = "In-game name"] nickname: String,
    #[description = "When, e.g. 2026-11-01 to 2026-11-20"] date: String,
    #[description = "Reason or notes"] information: String,
) -> Result<(), Error> {
    let policy = CommandPolicy::officer("absence_add", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let member_id = {
        let db = ctx.data().members.read().await;
        db.get_member_by_nickname(&nickname).map(|m| m.id)
    };
    let record = AbsenceRecord::new(member_id, &nickname, &date, &information);

    let data = ctx.data();
    retry(storage_retry(ctx), "append absence", || {
        append_absence(data.sheets.as_ref(), &data.config.absence_sheet, &record)
    })
    .await?;

    info!("{} recorded an absence for {}", ctx.author().name, nickname);
    let note = if member_id.is_none() {
        " (no matching member yet, it will be linked on the next activity check)"
    } else {
        ""
    };
    ctx.say(format!("Absence recorded for **{}**{}.", nickname, note))
        .await?;
    Ok(())
}
