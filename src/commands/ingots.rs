use tracing::info;

use super::gate;
use crate::error::BotError;
use crate::policy::CommandPolicy;
use crate::state::MemberDirectory;
use crate::{Context, Error};

/// Show an ingot balance, your own if no name is given
#[poise::command(slash_command, guild_only)]
pub async fn ingots(
    ctx: Context<'_>,
    #[description = "In-game name"] nickname: Option<String>,
) -> Result<(), Error> {
    let policy = CommandPolicy::open("ingots", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let db = ctx.data().members.read().await;
    let member = match &nickname {
        Some(name) => db.get_member_by_nickname(name),
        None => db
            .find_id_by_discord_id(ctx.author().id.get())
            .and_then(|id| db.get_member_by_id(id)),
    };

    let reply = match (member, nickname) {
        (Some(member), _) => format!("**{}** has {} ingots.", member.nickname, member.ingots),
        (None, Some(name)) => return Err(BotError::MemberNotFound { nickname: name }.into()),
        (None, None) => {
            "Your Discord account isn't linked to a member. Try `/ingots <name>`.".to_string()
        }
    };
    drop(db);

    ctx.say(reply).await?;
    Ok(())
}

async fn change_ingots(ctx: Context<'_>, command: &str, nickname: &str, delta: i64) -> Result<(), Error> {
    let policy = CommandPolicy::officer(command, &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let mut db = ctx.data().members.write().await;
    let balance = db.adjust_ingots(nickname, delta)?;
    db.save(&ctx.data().members_path).await?;
    drop(db);

    info!(
        "{} changed ingots for {} by {} (now {})",
        ctx.author().name,
        nickname,
        delta,
        balance
    );
    ctx.say(format!("**{}** now has {} ingots.", nickname, balance))
        .await?;
    Ok(())
}

/// Give ingots to a member
#[poise::command(slash_command, guild_only)]
pub async fn ingots_add(
    ctx: Context<'_>,
    #[description = "In-game name"] nickname: String,
    #[description = "Ingots to add"]
    #[min = 1]
    amount: i64,
) -> Result<(), Error> {
    change_ingots(ctx, "ingots_add", &nickname, amount).await
}

/// Take ingots from a member
#[poise::command(slash_command, guild_only)]
pub async fn ingots_remove(
    ctx: Context<'_>,
    #[description = "In-game name"] nickname: String,
    #[description = "Ingots to remove"]
    #[min = 1]
    amount: i64,
) -> Result<(), Error> {
    change_ingots(ctx, "ingots_remove", &nickname, -amount).await
}
