use poise::serenity_prelude as serenity;
use tracing::{debug, info};

use crate::state::{MemberDatabase, MemberDirectory};
use crate::{Data, Error};

/// What joining the guild did to the member directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Created(u64),
    Linked(u64),
    Rejoined(u64),
}

/// Link a joining Discord user to their member record, creating one if needed
pub fn record_guild_join(
    db: &mut MemberDatabase,
    discord_id: u64,
    display_name: &str,
    default_tier: u32,
) -> JoinOutcome {
    let existing = db
        .find_id_by_discord_id(discord_id)
        .or_else(|| {
            db.get_member_by_nickname(display_name)
                .filter(|m| m.discord_id.is_none())
                .map(|m| m.id)
        });

    let Some(id) = existing else {
        let id = db.create_member(display_name, default_tier);
        if let Some(member) = db.get_member_mut(id) {
            member.discord_id = Some(discord_id);
        }
        return JoinOutcome::Created(id);
    };

    match db.get_member_mut(id) {
        Some(member) if !member.active => {
            member.active = true;
            member.discord_id = Some(discord_id);
            JoinOutcome::Rejoined(id)
        }
        Some(member) => {
            member.discord_id = Some(discord_id);
            JoinOutcome::Linked(id)
        }
        None => JoinOutcome::Linked(id),
    }
}

/// Archive the member linked to a departing Discord user.
/// Returns their nickname if anything changed.
pub fn record_guild_leave(db: &mut MemberDatabase, discord_id: u64) -> Option<String> {
    let id = db.find_id_by_discord_id(discord_id)?;
    if db.archive(id) {
        db.get_member_by_id(id).map(|m| m.nickname.clone())
    } else {
        None
    }
}

/// Handle when a new member joins the guild
pub async fn handle_member_add(
    new_member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    if new_member.guild_id.get() != data.config.guild_id || new_member.user.bot {
        return Ok(());
    }

    let display_name = new_member.display_name().to_string();
    let mut db = data.members.write().await;
    let outcome = record_guild_join(
        &mut db,
        new_member.user.id.get(),
        &display_name,
        data.config.ranks.lowest_tier(),
    );
    db.save(&data.members_path).await?;

    match outcome {
        JoinOutcome::Created(id) => info!("New member joined: {} (member {})", display_name, id),
        JoinOutcome::Rejoined(id) => info!("Member rejoined: {} (member {})", display_name, id),
        JoinOutcome::Linked(id) => debug!("Linked {} to member {}", display_name, id),
    }
    Ok(())
}

/// Handle when a member leaves the guild
pub async fn handle_member_remove(
    guild_id: serenity::GuildId,
    user: &serenity::User,
    data: &Data,
) -> Result<(), Error> {
    if guild_id.get() != data.config.guild_id {
        return Ok(());
    }

    let mut db = data.members.write().await;
    if let Some(nickname) = record_guild_leave(&mut db, user.id.get()) {
        db.save(&data.members_path).await?;
        info!("Member left the guild: {} ({})", nickname, user.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_unknown_user() {
        let mut db = MemberDatabase::new();
        let outcome = record_guild_join(&mut db, 500, "Alice", 1);

        let JoinOutcome::Created(id) = outcome else {
            panic!("expected a new member, got {:?}", outcome);
        };
        let member = db.get_member_by_id(id).unwrap();
        assert_eq!(member.discord_id, Some(500));
        assert_eq!(member.rank_tier, 1);
    }

    #[test]
    fn test_join_links_by_name_then_by_discord_id() {
        let mut db = MemberDatabase::new();
        let id = db.create_member("Alice", 2);

        assert_eq!(record_guild_join(&mut db, 500, "alice", 1), JoinOutcome::Linked(id));
        // Same account under a new display name
        assert_eq!(record_guild_join(&mut db, 500, "Ally", 1), JoinOutcome::Linked(id));
        assert_eq!(db.member_count(), 1);
        assert_eq!(db.get_member_by_id(id).unwrap().rank_tier, 2);
    }

    #[test]
    fn test_leave_then_rejoin() {
        let mut db = MemberDatabase::new();
        record_guild_join(&mut db, 500, "Alice", 1);

        assert_eq!(record_guild_leave(&mut db, 500), Some("Alice".to_string()));
        assert_eq!(record_guild_leave(&mut db, 500), None);
        assert_eq!(record_guild_leave(&mut db, 999), None);

        let outcome = record_guild_join(&mut db, 500, "Alice", 1);
        assert!(matches!(outcome, JoinOutcome::Rejoined(_)));
        assert!(db.get_member_by_nickname("Alice").unwrap().active);
    }

    #[test]
    fn test_name_already_linked_to_other_account_creates_new() {
        let mut db = MemberDatabase::new();
        record_guild_join(&mut db, 500, "Alice", 1);

        let outcome = record_guild_join(&mut db, 600, "Alice", 1);
        assert!(matches!(outcome, JoinOutcome::Created(_)));
        assert_eq!(db.member_count(), 2);
    }
}
