use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::config::{ClanConfig, RankTable};
use crate::wom::{GainsRecord, GroupDetails};

/// Why a member was left out of the activity requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotInGroup,
    Absent,
    Exempt,
    Prospect,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotInGroup => "not_in_group",
            SkipReason::Absent => "absent",
            SkipReason::Exempt => "exempt",
            SkipReason::Prospect => "prospect",
        };
        f.write_str(s)
    }
}

/// How a result shows up in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    NotInGroup,
    Absent,
    Safe,
    InDanger,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityStatus::NotInGroup => "not in group",
            ActivityStatus::Absent => "absent",
            ActivityStatus::Safe => "safe",
            ActivityStatus::InDanger => "in danger",
        };
        f.write_str(s)
    }
}

/// The rules a member's gains are checked against
#[derive(Debug, Clone)]
pub struct ActivityRules {
    pub ranks: RankTable,
    pub role_mapping: std::collections::HashMap<String, String>,
    pub exempt_roles: HashSet<String>,
    pub prospect_role: String,
}

impl ActivityRules {
    pub fn from_config(config: &ClanConfig) -> Self {
        Self {
            ranks: config.ranks.clone(),
            role_mapping: config.role_mapping.clone(),
            exempt_roles: config.exempt_roles.iter().map(|r| r.to_lowercase()).collect(),
            prospect_role: config.prospect_role.clone(),
        }
    }

    fn internal_role(&self, group_role: &str) -> String {
        self.role_mapping
            .get(group_role)
            .cloned()
            .unwrap_or_else(|| group_role.to_string())
    }

    fn is_exempt(&self, internal_role: &str) -> bool {
        self.exempt_roles.contains(&internal_role.to_lowercase())
    }
}

/// Verdict for one member on one run. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityCheckResult {
    pub username: String,
    pub group_role: String,
    pub internal_role: String,
    pub xp_gained: i64,
    pub xp_threshold: i64,
    pub is_active: bool,
    pub is_exempt: bool,
    pub is_absent: bool,
    pub is_prospect: bool,
    pub skip_reason: Option<SkipReason>,
    pub last_progressed: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl ActivityCheckResult {
    fn not_in_group(username: &str, checked_at: DateTime<Utc>) -> Self {
        Self {
            username: username.to_string(),
            group_role: String::new(),
            internal_role: String::new(),
            xp_gained: 0,
            xp_threshold: 0,
            is_active: false,
            is_exempt: false,
            is_absent: false,
            is_prospect: false,
            skip_reason: Some(SkipReason::NotInGroup),
            last_progressed: None,
            checked_at,
        }
    }

    /// Prospects, exempt and active members are safe; everyone else left is in danger
    pub fn status(&self) -> ActivityStatus {
        match self.skip_reason {
            Some(SkipReason::NotInGroup) => ActivityStatus::NotInGroup,
            Some(SkipReason::Absent) => ActivityStatus::Absent,
            _ if self.is_prospect || self.is_exempt || self.is_active => ActivityStatus::Safe,
            _ => ActivityStatus::InDanger,
        }
    }
}

/// A member as the classifier needs to see them
#[derive(Debug, Clone, Copy)]
pub struct MemberIdentity<'a> {
    /// WOM player id, when known
    pub player_id: Option<i64>,
    /// Fallback name when the player is not in the group
    pub nickname: &'a str,
    pub rank_tier: u32,
}

/// Classify one member's activity over the observation window.
///
/// `absentees` holds lower-cased nicknames.
pub fn check_member_activity(
    member: MemberIdentity<'_>,
    gains: &GainsRecord,
    group: &GroupDetails,
    absentees: &HashSet<String>,
    rules: &ActivityRules,
    now: DateTime<Utc>,
) -> ActivityCheckResult {
    let Some(membership) = member
        .player_id
        .and_then(|id| group.membership_for(id))
    else {
        return ActivityCheckResult::not_in_group(member.nickname, now);
    };

    let username = membership.player.display_name.clone();
    let group_role = membership.role_name().to_string();

    let is_absent = absentees.contains(&username.to_lowercase())
        || absentees.contains(&membership.player.username.to_lowercase());
    let is_prospect = group_role.eq_ignore_ascii_case(&rules.prospect_role);
    let internal_role = rules.internal_role(&group_role);
    let is_exempt = rules.is_exempt(&internal_role);

    let xp_threshold = rules.ranks.threshold_for(member.rank_tier);
    let xp_gained = gains.overall_xp_gained();
    let is_active = xp_gained >= xp_threshold;

    let skip_reason = if is_absent {
        Some(SkipReason::Absent)
    } else if is_exempt {
        Some(SkipReason::Exempt)
    } else if is_prospect {
        Some(SkipReason::Prospect)
    } else {
        None
    };

    ActivityCheckResult {
        username,
        group_role,
        internal_role,
        xp_gained,
        xp_threshold,
        is_active,
        is_exempt,
        is_absent,
        is_prospect,
        skip_reason,
        last_progressed: membership.player.last_changed_at,
        checked_at: now,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::RankDefinition;
    use crate::wom::models::{Delta, GroupGainsEntry, Membership, Player};

    pub(crate) fn player(id: i64, name: &str) -> Player {
        Player {
            id,
            username: name.to_lowercase(),
            display_name: name.to_string(),
            last_changed_at: None,
        }
    }

    pub(crate) fn group(members: &[(i64, &str, &str)]) -> GroupDetails {
        GroupDetails {
            id: 1,
            name: "Test Clan".to_string(),
            member_count: members.len() as u32,
            memberships: members
                .iter()
                .map(|(id, name, role)| Membership {
                    player_id: *id,
                    role: Some(role.to_string()),
                    player: player(*id, name),
                })
                .collect(),
        }
    }

    pub(crate) fn gains(id: i64, name: &str, xp: i64) -> GroupGainsEntry {
        GroupGainsEntry {
            player: player(id, name),
            data: Delta {
                gained: Some(xp),
                start: None,
                end: None,
            },
        }
    }

    pub(crate) fn rules() -> ActivityRules {
        ActivityRules {
            ranks: RankTable::new(vec![
                RankDefinition {
                    tier: 1,
                    name: "Bronze".to_string(),
                    monthly_xp: 50_000,
                },
                RankDefinition {
                    tier: 2,
                    name: "Iron".to_string(),
                    monthly_xp: 150_000,
                },
            ]),
            role_mapping: [
                ("administrator".to_string(), "Staff".to_string()),
                ("dogsbody".to_string(), "Member".to_string()),
            ]
            .into_iter()
            .collect(),
            exempt_roles: ["staff".to_string()].into_iter().collect(),
            prospect_role: "prospector".to_string(),
        }
    }

    fn identity(player_id: i64, rank_tier: u32) -> MemberIdentity<'static> {
        MemberIdentity {
            player_id: Some(player_id),
            nickname: "someone",
            rank_tier,
        }
    }

    fn check(
        player_id: i64,
        rank_tier: u32,
        xp: i64,
        group: &GroupDetails,
        absentees: &[&str],
    ) -> ActivityCheckResult {
        let absentees = absentees.iter().map(|a| a.to_lowercase()).collect();
        check_member_activity(
            identity(player_id, rank_tier),
            &GainsRecord::Group(gains(player_id, "x", xp)),
            group,
            &absentees,
            &rules(),
            Utc::now(),
        )
    }

    #[test]
    fn test_not_in_group() {
        let group = group(&[(1, "Alice", "dogsbody")]);
        let result = check(99, 2, 1_000_000, &group, &["someone"]);

        assert_eq!(result.skip_reason, Some(SkipReason::NotInGroup));
        assert!(!result.is_active && !result.is_exempt && !result.is_absent && !result.is_prospect);
        assert_eq!(result.xp_gained, 0);
        assert_eq!(result.xp_threshold, 0);
        assert_eq!(result.username, "someone");
        assert_eq!(result.status(), ActivityStatus::NotInGroup);
    }

    #[test]
    fn test_alice_below_threshold_is_in_danger() {
        let group = group(&[(1, "Alice", "dogsbody")]);
        let result = check(1, 2, 100_000, &group, &[]);

        assert_eq!(result.username, "Alice");
        assert_eq!(result.internal_role, "Member");
        assert_eq!(result.xp_threshold, 150_000);
        assert!(!result.is_active);
        assert_eq!(result.skip_reason, None);
        assert_eq!(result.status(), ActivityStatus::InDanger);
        assert_eq!(result.status().to_string(), "in danger");
    }

    #[test]
    fn test_meeting_threshold_is_active() {
        let group = group(&[(1, "Alice", "dogsbody")]);
        let result = check(1, 2, 150_000, &group, &[]);

        assert!(result.is_active);
        assert_eq!(result.skip_reason, None);
        assert_eq!(result.status(), ActivityStatus::Safe);
    }

    #[test]
    fn test_absence_takes_precedence() {
        let group = group(&[(1, "Alice", "administrator"), (2, "Bob", "prospector")]);

        let alice = check(1, 2, 0, &group, &["ALICE"]);
        assert!(alice.is_absent);
        assert!(alice.is_exempt);
        assert_eq!(alice.skip_reason, Some(SkipReason::Absent));
        assert_eq!(alice.status(), ActivityStatus::Absent);

        let bob = check(2, 2, 0, &group, &["bob"]);
        assert!(bob.is_absent);
        assert!(bob.is_prospect);
        assert_eq!(bob.skip_reason, Some(SkipReason::Absent));
    }

    #[test]
    fn test_exempt_before_prospect() {
        let mut rules = rules();
        rules.exempt_roles.insert("prospector".to_string());
        let group = group(&[(1, "Carl", "prospector")]);

        let result = check_member_activity(
            identity(1, 1),
            &GainsRecord::Group(gains(1, "Carl", 0)),
            &group,
            &HashSet::new(),
            &rules,
            Utc::now(),
        );
        assert!(result.is_exempt && result.is_prospect);
        assert_eq!(result.skip_reason, Some(SkipReason::Exempt));
        assert_eq!(result.status(), ActivityStatus::Safe);
    }

    #[test]
    fn test_prospect_is_safe_without_xp() {
        let group = group(&[(1, "Dana", "prospector")]);
        let result = check(1, 2, 0, &group, &[]);

        assert!(result.is_prospect);
        assert!(!result.is_active);
        assert_eq!(result.skip_reason, Some(SkipReason::Prospect));
        assert_eq!(result.status(), ActivityStatus::Safe);
    }

    #[test]
    fn test_unknown_rank_and_missing_gains() {
        let group = group(&[(1, "Eve", "dogsbody")]);
        let result = check_member_activity(
            identity(1, 42),
            &GainsRecord::Player(crate::wom::PlayerGains {
                starts_at: None,
                ends_at: None,
                data: Default::default(),
            }),
            &group,
            &HashSet::new(),
            &rules(),
            Utc::now(),
        );

        assert_eq!(result.xp_gained, 0);
        assert_eq!(result.xp_threshold, 0);
        assert!(result.is_active);
        assert_eq!(result.status(), ActivityStatus::Safe);
    }
}
