use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::classifier::{check_member_activity, ActivityCheckResult, ActivityRules, MemberIdentity};
use crate::state::MemberDirectory;
use crate::wom::{GainsRecord, GroupDetails, GroupGainsEntry};

/// Classify every gains entry whose player is in the member directory,
/// matched by WOM player id first and then by name.
///
/// Players the directory doesn't know are logged and skipped. Results keep the
/// order of `gains`.
pub fn sweep_group_activity(
    group: &GroupDetails,
    gains: &[GroupGainsEntry],
    directory: &dyn MemberDirectory,
    absentees: &HashSet<String>,
    rules: &ActivityRules,
    now: DateTime<Utc>,
) -> Vec<ActivityCheckResult> {
    let mut results = Vec::with_capacity(gains.len());

    for entry in gains {
        let player = &entry.player;
        // Names only count for members not yet linked to a WOM player
        let member = directory.get_member_by_player_id(player.id).or_else(|| {
            directory
                .get_member_by_nickname(&player.display_name)
                .filter(|m| m.wom_player_id.is_none())
        });

        let Some(member) = member else {
            warn!(
                "Skipping {} (WOM id {}): not in the member directory",
                player.display_name, player.id
            );
            continue;
        };

        let identity = MemberIdentity {
            player_id: Some(player.id),
            nickname: &member.nickname,
            rank_tier: member.rank_tier,
        };
        let result = check_member_activity(
            identity,
            &GainsRecord::Group(entry.clone()),
            group,
            absentees,
            rules,
            now,
        );
        debug!(
            "{}: {} / {} xp ({})",
            result.username,
            result.xp_gained,
            result.xp_threshold,
            result.status()
        );
        results.push(result);
    }

    results
}

/// Ascending by XP gained; ties keep their sweep order
pub fn sort_for_report(results: &mut [ActivityCheckResult]) {
    results.sort_by_key(|r| r.xp_gained);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::classifier::tests::{gains, group, rules};
    use crate::activity::ActivityStatus;
    use crate::state::MemberDatabase;

    #[test]
    fn test_skips_unknown_members_and_keeps_order() {
        let mut db = MemberDatabase::new();
        db.create_member("Carol", 1);
        db.create_member("Alice", 2);

        let group = group(&[
            (1, "Alice", "dogsbody"),
            (2, "Bob", "dogsbody"),
            (3, "Carol", "dogsbody"),
        ]);
        let gains = vec![
            gains(3, "Carol", 60_000),
            gains(2, "Bob", 10),
            gains(1, "Alice", 100_000),
        ];

        let results = sweep_group_activity(
            &group,
            &gains,
            &db,
            &HashSet::new(),
            &rules(),
            Utc::now(),
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].username, "Carol");
        assert_eq!(results[0].status(), ActivityStatus::Safe);
        assert_eq!(results[1].username, "Alice");
        assert_eq!(results[1].status(), ActivityStatus::InDanger);
    }

    #[test]
    fn test_falls_back_to_player_id() {
        let mut db = MemberDatabase::new();
        let id = db.create_member("Old Name", 1);
        db.get_member_mut(id).unwrap().wom_player_id = Some(5);

        let group = group(&[(5, "New Name", "dogsbody")]);
        let results = sweep_group_activity(
            &group,
            &[gains(5, "New Name", 0)],
            &db,
            &HashSet::new(),
            &rules(),
            Utc::now(),
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].username, "New Name");
        assert_eq!(results[0].xp_threshold, 50_000);
    }

    #[test]
    fn test_taken_name_does_not_borrow_linked_member() {
        let mut db = MemberDatabase::new();
        let veteran = db.create_member("Alice", 2);
        db.get_member_mut(veteran).unwrap().wom_player_id = Some(1);

        // Player 1 renamed; player 9 picked up the old name
        let group = group(&[(1, "Ally", "dogsbody"), (9, "Alice", "dogsbody")]);
        let results = sweep_group_activity(
            &group,
            &[gains(1, "Ally", 200_000), gains(9, "Alice", 0)],
            &db,
            &HashSet::new(),
            &rules(),
            Utc::now(),
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].username, "Ally");
        assert_eq!(results[0].xp_threshold, 150_000);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut db = MemberDatabase::new();
        for name in ["A", "B", "C"] {
            db.create_member(name, 1);
        }
        let group = group(&[(1, "A", "dogsbody"), (2, "B", "dogsbody"), (3, "C", "dogsbody")]);
        let mut results = sweep_group_activity(
            &group,
            &[gains(1, "A", 500), gains(2, "B", 100), gains(3, "C", 500)],
            &db,
            &HashSet::new(),
            &rules(),
            Utc::now(),
        );

        sort_for_report(&mut results);
        let names: Vec<&str> = results.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }
}
