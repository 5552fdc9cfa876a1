use tracing::info;

use super::gate;
use crate::messages::format_xp;
use crate::policy::CommandPolicy;
use crate::state::MemberDirectory;
use crate::{Context, Error};

/// Open a raffle that members buy into with ingots
#[poise::command(slash_command, guild_only)]
pub async fn raffle_start(
    ctx: Context<'_>,
    #[description = "Raffle name"] name: String,
    #[description = "Ingots per ticket"]
    #[min = 1]
    ticket_price: i64,
) -> Result<(), Error> {
    let policy = CommandPolicy::officer("raffle_start", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let mut book = ctx.data().raffles.write().await;
    let id = book.start(&name, ticket_price)?;
    book.save(&ctx.data().raffles_path).await?;
    drop(book);

    info!("{} started raffle {} '{}'", ctx.author().name, id, name);
    ctx.say(format!(
        "🎟️ **{}** is open! Tickets cost {} ingots. Use `/raffle_buy` to enter.",
        name,
        format_xp(ticket_price)
    ))
    .await?;
    Ok(())
}

/// Buy raffle tickets with your ingots
#[poise::command(slash_command, guild_only)]
pub async fn raffle_buy(
    ctx: Context<'_>,
    #[description = "Number of tickets"]
    #[min = 1]
    count: u32,
) -> Result<(), Error> {
    let policy = CommandPolicy::open("raffle_buy", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    // Members before raffles, everywhere both are held
    let mut db = ctx.data().members.write().await;
    let Some(nickname) = db
        .find_id_by_discord_id(ctx.author().id.get())
        .and_then(|id| db.get_member_by_id(id))
        .map(|m| m.nickname.clone())
    else {
        drop(db);
        ctx.say("Your Discord account isn't linked to a member, so you can't buy tickets.")
            .await?;
        return Ok(());
    };

    let mut book = ctx.data().raffles.write().await;
    let held = book.buy_tickets(&mut db, &nickname, count)?;
    db.save(&ctx.data().members_path).await?;
    book.save(&ctx.data().raffles_path).await?;
    let balance = db.get_member_by_nickname(&nickname).map_or(0, |m| m.ingots);
    drop(book);
    drop(db);

    info!("{} bought {} raffle tickets", nickname, count);
    ctx.say(format!(
        "**{}** bought {} ticket(s) and now holds {}. {} ingots left.",
        nickname, count, held, balance
    ))
    .await?;
    Ok(())
}

/// Show the running raffle
#[poise::command(slash_command, guild_only)]
pub async fn raffle_status(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::open("raffle_status", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let db = ctx.data().members.read().await;
    let book = ctx.data().raffles.read().await;
    let reply = match book.active() {
        None => "No raffle is running.".to_string(),
        Some(raffle) => {
            let mut reply = format!(
                "🎟️ **{}**: {} tickets at {} ingots, pot {}\n",
                raffle.name,
                raffle.total_tickets(),
                format_xp(raffle.ticket_price),
                format_xp(raffle.pot())
            );
            for (member_id, count) in &raffle.tickets {
                let name = db
                    .get_member_by_id(*member_id)
                    .map_or("unknown member", |m| m.nickname.as_str());
                reply.push_str(&format!("- {}: {}\n", name, count));
            }
            reply
        }
    };
    drop(book);
    drop(db);

    ctx.say(reply).await?;
    Ok(())
}

/// Close the running raffle and draw the winner
#[poise::command(slash_command, guild_only)]
pub async fn raffle_end(ctx: Context<'_>) -> Result<(), Error> {
    let policy = CommandPolicy::officer("raffle_end", &ctx.data().config);
    if !gate(ctx, &policy).await? {
        return Ok(());
    }

    let db = ctx.data().members.read().await;
    let mut book = ctx.data().raffles.write().await;
    let result = book.end()?;
    book.save(&ctx.data().raffles_path).await?;
    let winner = result
        .winner
        .map(|id| {
            db.get_member_by_id(id)
                .map_or_else(|| format!("member {}", id), |m| m.nickname.clone())
        });
    drop(book);
    drop(db);

    info!(
        "{} ended raffle {} with {} tickets, winner {:?}",
        ctx.author().name,
        result.raffle_id,
        result.total_tickets,
        winner
    );
    let reply = match winner {
        Some(name) => format!(
            "🎉 **{}** wins **{}**! {} tickets were sold for a pot of {} ingots.",
            name,
            result.name,
            result.total_tickets,
            format_xp(result.pot)
        ),
        None => format!("**{}** closed without any tickets sold.", result.name),
    };
    ctx.say(reply).await?;
    Ok(())
}
