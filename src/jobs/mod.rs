pub mod activity_check;
pub mod member_sync;
pub mod membership_discrepancies;

use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ClanConfig;
use crate::error::Result;
use crate::messages::{chunk_message, MESSAGE_LIMIT};
use crate::policy::RetryPolicy;
use crate::state::{SharedMemberDatabase, SheetStore};

pub use activity_check::{check_single_member, job_check_activity};
pub use member_sync::job_sync_members;
pub use membership_discrepancies::job_check_membership_discrepancies;

/// Everything a job needs. Each job opens its own WOM client.
#[derive(Clone)]
pub struct JobContext {
    pub http: Arc<serenity::Http>,
    pub config: Arc<ClanConfig>,
    pub members: SharedMemberDatabase,
    pub members_path: String,
    pub sheets: Arc<dyn SheetStore>,
}

impl JobContext {
    /// Retry policy for storage I/O, same attempts as WOM calls
    pub fn storage_retry(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.config.wom.retries)
    }
}

/// Text and an optional file produced by a job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub body: String,
    pub attachment: Option<(String, Vec<u8>)>,
}

impl JobReport {
    pub fn text(body: String) -> Self {
        Self {
            body,
            attachment: None,
        }
    }
}

/// Send a report to a channel, split to fit message limits
pub async fn post_report(
    http: &serenity::Http,
    channel_id: serenity::ChannelId,
    report: &JobReport,
) -> Result<()> {
    for chunk in chunk_message(&report.body, MESSAGE_LIMIT) {
        channel_id
            .send_message(http, serenity::CreateMessage::new().content(chunk))
            .await?;
    }
    if let Some((filename, bytes)) = &report.attachment {
        channel_id
            .send_message(
                http,
                serenity::CreateMessage::new()
                    .add_file(serenity::CreateAttachment::bytes(bytes.clone(), filename.clone())),
            )
            .await?;
    }
    Ok(())
}

/// Post a job's report, or a single failure line if it errored
pub async fn post_outcome(ctx: &JobContext, job_name: &str, outcome: Result<JobReport>) {
    let channel_id = serenity::ChannelId::new(ctx.config.report_channel_id);
    let report = match outcome {
        Ok(report) => {
            info!("Job '{}' finished", job_name);
            report
        }
        Err(e) => {
            error!("Job '{}' failed: {}", job_name, e);
            JobReport::text(format!("❌ **{}** failed: {}", job_name, e))
        }
    };

    if let Err(e) = post_report(&ctx.http, channel_id, &report).await {
        error!("Failed to post report for '{}': {}", job_name, e);
    }
}

/// Run all jobs concurrently and post each outcome to the report channel
pub async fn run_all_jobs(ctx: &JobContext) {
    info!("Running all jobs");
    let (sync, activity, discrepancies) = futures::join!(
        job_sync_members(ctx),
        job_check_activity(ctx),
        job_check_membership_discrepancies(ctx),
    );

    post_outcome(ctx, "Member sync", sync).await;
    post_outcome(ctx, "Activity check", activity).await;
    post_outcome(ctx, "Membership discrepancies", discrepancies).await;
}

/// Run all jobs every `hours` hours, starting one interval from now
pub fn spawn_scheduler(ctx: JobContext, hours: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        interval.tick().await;
        info!("Scheduler started, running jobs every {} hours", hours);
        loop {
            interval.tick().await;
            run_all_jobs(&ctx).await;
        }
    });
}
