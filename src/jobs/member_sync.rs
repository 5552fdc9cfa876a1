use std::collections::HashSet;
use tracing::info;

use super::{JobContext, JobReport};
use crate::error::Result;
use crate::policy::retry;
use crate::state::{MemberDatabase, MemberDirectory};
use crate::wom::{GroupDetails, Membership, WomClient};

/// What a sync changed in the member directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: Vec<String>,
    pub reactivated: Vec<String>,
    pub archived: Vec<String>,
    /// (old nickname, new nickname)
    pub renamed: Vec<(String, String)>,
    pub role_changes: usize,
}

impl SyncSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.reactivated.is_empty()
            && self.archived.is_empty()
            && self.renamed.is_empty()
            && self.role_changes == 0
    }

    pub fn report(&self) -> String {
        if self.is_empty() {
            return "Member directory is up to date with the WOM group. ✅".to_string();
        }

        let mut lines = vec!["**Member sync**".to_string()];
        if !self.added.is_empty() {
            lines.push(format!("Added ({}): {}", self.added.len(), self.added.join(", ")));
        }
        if !self.reactivated.is_empty() {
            lines.push(format!(
                "Rejoined ({}): {}",
                self.reactivated.len(),
                self.reactivated.join(", ")
            ));
        }
        if !self.archived.is_empty() {
            lines.push(format!(
                "Left the group ({}): {}",
                self.archived.len(),
                self.archived.join(", ")
            ));
        }
        for (old, new) in &self.renamed {
            lines.push(format!("Renamed: {} → {}", old, new));
        }
        if self.role_changes > 0 {
            lines.push(format!("Group role changes: {}", self.role_changes));
        }
        lines.join("\n")
    }
}

/// Find the directory entry for a group membership.
/// Name matches only count for members not yet linked to a WOM player.
fn match_member(db: &MemberDatabase, membership: &Membership) -> Option<u64> {
    if let Some(member) = db.get_member_by_player_id(membership.player.id) {
        return Some(member.id);
    }
    db.get_member_by_nickname(&membership.player.display_name)
        .filter(|m| m.wom_player_id.is_none())
        .map(|m| m.id)
}

/// Bring the member directory in line with the WOM group roster
pub fn sync_members_with_group(
    db: &mut MemberDatabase,
    group: &GroupDetails,
    default_tier: u32,
) -> SyncSummary {
    let mut summary = SyncSummary::default();
    let mut in_group = HashSet::new();

    for membership in &group.memberships {
        let player = &membership.player;
        in_group.insert(player.id);

        let id = match match_member(db, membership) {
            Some(id) => id,
            None => {
                summary.added.push(player.display_name.clone());
                db.create_member(&player.display_name, default_tier)
            }
        };
        let Some(member) = db.get_member_mut(id) else {
            continue;
        };

        if !member.active {
            member.active = true;
            summary.reactivated.push(player.display_name.clone());
        }
        if member.nickname != player.display_name {
            summary
                .renamed
                .push((member.nickname.clone(), player.display_name.clone()));
            member.nickname = player.display_name.clone();
        }
        let role = membership.role_name().to_string();
        if member.group_role.as_deref() != Some(role.as_str()) {
            if member.group_role.is_some() {
                summary.role_changes += 1;
            }
            member.group_role = Some(role);
        }
        member.wom_player_id = Some(player.id);
    }

    // Only members linked to a WOM player can be known to have left
    let departed: Vec<u64> = db
        .active_members()
        .into_iter()
        .filter(|m| matches!(m.wom_player_id, Some(pid) if !in_group.contains(&pid)))
        .map(|m| m.id)
        .collect();
    for id in departed {
        if db.archive(id) {
            if let Some(member) = db.get_member_by_id(id) {
                summary.archived.push(member.nickname.clone());
            }
        }
    }

    summary
}

/// Pull the WOM group roster into the member directory and save it
pub async fn job_sync_members(ctx: &JobContext) -> Result<JobReport> {
    let client = WomClient::new(&ctx.config.wom)?;
    let group = client.get_group_details(ctx.config.wom.group_id).await?;
    let default_tier = ctx.config.ranks.lowest_tier();

    let mut db = ctx.members.write().await;
    let summary = sync_members_with_group(&mut db, &group, default_tier);

    if !summary.is_empty() {
        let db = &*db;
        retry(ctx.storage_retry(), "save members", || db.save(&ctx.members_path))
        .await?;
    }

    info!(
        "Member sync complete: {} added, {} rejoined, {} archived, {} renamed",
        summary.added.len(),
        summary.reactivated.len(),
        summary.archived.len(),
        summary.renamed.len()
    );

    Ok(JobReport::text(summary.report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::classifier::tests::group;

    #[test]
    fn test_adds_new_members_with_default_tier() {
        let mut db = MemberDatabase::new();
        let group = group(&[(1, "Alice", "dogsbody"), (2, "Bob", "prospector")]);

        let summary = sync_members_with_group(&mut db, &group, 1);

        assert_eq!(summary.added, vec!["Alice", "Bob"]);
        assert_eq!(db.member_count(), 2);
        let bob = db.get_member_by_nickname("bob").unwrap();
        assert_eq!(bob.rank_tier, 1);
        assert_eq!(bob.wom_player_id, Some(2));
        assert_eq!(bob.group_role.as_deref(), Some("prospector"));
        // First role assignment is not a change
        assert_eq!(summary.role_changes, 0);
    }

    #[test]
    fn test_links_existing_member_by_name() {
        let mut db = MemberDatabase::new();
        let id = db.create_member("alice", 3);

        let summary = sync_members_with_group(&mut db, &group(&[(1, "Alice", "dogsbody")]), 1);

        assert!(summary.added.is_empty());
        assert_eq!(summary.renamed, vec![("alice".to_string(), "Alice".to_string())]);
        let alice = db.get_member_by_id(id).unwrap();
        assert_eq!(alice.wom_player_id, Some(1));
        assert_eq!(alice.rank_tier, 3);
    }

    #[test]
    fn test_archives_departed_and_reactivates_returning() {
        let mut db = MemberDatabase::new();
        sync_members_with_group(
            &mut db,
            &group(&[(1, "Alice", "dogsbody"), (2, "Bob", "dogsbody")]),
            1,
        );
        let manual = db.create_member("Unlinked", 1);

        let summary = sync_members_with_group(&mut db, &group(&[(1, "Alice", "dogsbody")]), 1);
        assert_eq!(summary.archived, vec!["Bob"]);
        assert!(!db.get_member_by_nickname("Bob").unwrap().active);
        // Members never linked to WOM are left alone
        assert!(db.get_member_by_id(manual).unwrap().active);

        let summary = sync_members_with_group(
            &mut db,
            &group(&[(1, "Alice", "administrator"), (2, "Bobby", "dogsbody")]),
            1,
        );
        assert_eq!(summary.reactivated, vec!["Bobby"]);
        assert_eq!(summary.renamed, vec![("Bob".to_string(), "Bobby".to_string())]);
        assert_eq!(summary.role_changes, 1);
        assert_eq!(db.member_count(), 3);
    }

    #[test]
    fn test_linked_member_is_not_claimed_by_name() {
        let mut db = MemberDatabase::new();
        sync_members_with_group(&mut db, &group(&[(1, "Alice", "dogsbody")]), 1);

        // A different player takes the name
        let summary = sync_members_with_group(
            &mut db,
            &group(&[(1, "Ally", "dogsbody"), (9, "Alice", "dogsbody")]),
            1,
        );

        assert_eq!(summary.added, vec!["Alice"]);
        assert_eq!(db.get_member_by_player_id(1).unwrap().nickname, "Ally");
        assert_eq!(db.get_member_by_player_id(9).unwrap().nickname, "Alice");
    }

    #[test]
    fn test_unchanged_roster_reports_up_to_date() {
        let mut db = MemberDatabase::new();
        let group = group(&[(1, "Alice", "dogsbody")]);
        sync_members_with_group(&mut db, &group, 1);

        let summary = sync_members_with_group(&mut db, &group, 1);
        assert!(summary.is_empty());
        assert!(summary.report().contains("up to date"));
    }
}
