use tracing::info;

use super::gate;
use crate::error::BotError;
use crate::policy::CommandPolicy;
use crate::{Context, Error};

/// Set a member's rank tier
#[poise::command(slash_command, guild_only)]
pub async fn set_rank(
    ctx: Context<'_>,
    #[description = "In-game name"] nickname: String,
    #[description = "Rank tier"] tier: u32,
) -> Result<(), Error> {
    let policy = CommandPolicy::officer("set_rank", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let ranks = &ctx.data().config.ranks;
    let rank = ranks.get(tier).ok_or(BotError::UnknownRank { tier })?;

    let mut db = ctx.data().members.write().await;
    let id = db
        .find_id_by_nickname(&nickname)
        .ok_or_else(|| BotError::MemberNotFound {
            nickname: nickname.clone(),
        })?;
    let previous = match db.get_member_mut(id) {
        Some(member) => std::mem::replace(&mut member.rank_tier, tier),
        None => {
            return Err(BotError::MemberNotFound { nickname }.into());
        }
    };
    db.save(&ctx.data().members_path).await?;
    drop(db);

    info!(
        "{} set rank of {} from {} to {}",
        ctx.author().name,
        nickname,
        previous,
        tier
    );
    ctx.say(format!(
        "**{}** is now {} ({} xp/month, was {}).",
        nickname,
        rank.name,
        crate::messages::format_xp(rank.monthly_xp),
        ranks.name_for(previous)
    ))
    .await?;
    Ok(())
}
