use poise::serenity_prelude as serenity;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{JobContext, JobReport};
use crate::activity::compute_roster_diff;
use crate::error::{BotError, Result};
use crate::messages::roster_report;
use crate::wom::WomClient;

/// Largest page the guild member endpoint returns
const MEMBER_PAGE: u64 = 1000;

/// A guild member reduced to what the roster comparison looks at
#[derive(Debug, Clone)]
pub struct GuildRosterEntry {
    pub display_name: String,
    pub bot: bool,
    pub roles: Vec<String>,
}

/// Display names of guild members that take part in the comparison.
/// Bots and holders of an ignored role are left out.
pub fn comparable_guild_names(entries: &[GuildRosterEntry], ignored_roles: &[String]) -> Vec<String> {
    let ignored: HashSet<String> = ignored_roles.iter().map(|r| r.to_lowercase()).collect();
    entries
        .iter()
        .filter(|e| !e.bot)
        .filter(|e| !e.roles.iter().any(|r| ignored.contains(&r.to_lowercase())))
        .map(|e| e.display_name.clone())
        .collect()
}

/// Page through every member of the guild
async fn fetch_guild_roster(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
) -> Result<Vec<GuildRosterEntry>> {
    let role_names: HashMap<serenity::RoleId, String> = guild_id
        .roles(http)
        .await?
        .into_iter()
        .map(|(id, role)| (id, role.name))
        .collect();

    let mut entries = Vec::new();
    let mut after: Option<serenity::UserId> = None;
    loop {
        let page = guild_id.members(http, Some(MEMBER_PAGE), after).await?;
        let page_len = page.len() as u64;
        after = page.last().map(|m| m.user.id);

        for member in page {
            entries.push(GuildRosterEntry {
                display_name: member.display_name().to_string(),
                bot: member.user.bot,
                roles: member
                    .roles
                    .iter()
                    .filter_map(|id| role_names.get(id).cloned())
                    .collect(),
            });
        }

        if page_len < MEMBER_PAGE {
            break;
        }
    }

    debug!("Fetched {} guild members", entries.len());
    Ok(entries)
}

/// Compare the Discord guild roster against the WOM group roster
pub async fn job_check_membership_discrepancies(ctx: &JobContext) -> Result<JobReport> {
    let client = WomClient::new(&ctx.config.wom)?;
    let group = client
        .get_group_details(ctx.config.wom.group_id)
        .await
        .map_err(|e| BotError::RosterUnavailable {
            source_name: "Wise Old Man".to_string(),
            message: e.to_string(),
        })?;

    let guild_id = serenity::GuildId::new(ctx.config.guild_id);
    let guild = fetch_guild_roster(&ctx.http, guild_id)
        .await
        .map_err(|e| BotError::RosterUnavailable {
            source_name: "Discord".to_string(),
            message: e.to_string(),
        })?;
    if guild.is_empty() {
        return Err(BotError::RosterUnavailable {
            source_name: "Discord".to_string(),
            message: "guild has 0 members".to_string(),
        });
    }

    let guild_names = comparable_guild_names(&guild, &ctx.config.ignored_guild_roles);
    let group_names = group.display_names();
    let diff = compute_roster_diff(
        guild_names.iter().map(String::as_str),
        group_names.iter().map(String::as_str),
        ctx.config.ignored_names.iter().map(String::as_str),
    );

    info!(
        "Roster comparison: {} only in Discord, {} only in WOM",
        diff.only_in_guild.len(),
        diff.only_in_group.len()
    );

    Ok(JobReport::text(roster_report(&diff)))
}
