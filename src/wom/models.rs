//! Wise Old Man API payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metric used for activity checks
pub const OVERALL: &str = "overall";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    /// Last time the player's stats changed
    #[serde(default)]
    pub last_changed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub player_id: i64,
    #[serde(default)]
    pub role: Option<String>,
    pub player: Player,
}

impl Membership {
    pub fn role_name(&self) -> &str {
        self.role.as_deref().unwrap_or("member")
    }
}

/// Group roster snapshot from `GET /groups/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl GroupDetails {
    pub fn membership_for(&self, player_id: i64) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.player_id == player_id || m.player.id == player_id)
    }

    pub fn display_names(&self) -> Vec<String> {
        self.memberships
            .iter()
            .map(|m| m.player.display_name.clone())
            .collect()
    }
}

/// Start/end/gained triple for a single metric
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    #[serde(default)]
    pub gained: Option<i64>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

/// One row of `GET /groups/{id}/gained`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupGainsEntry {
    pub player: Player,
    #[serde(default)]
    pub data: Delta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillDelta {
    #[serde(default)]
    pub experience: Option<Delta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerGainsData {
    #[serde(default)]
    pub skills: HashMap<String, SkillDelta>,
}

/// `GET /players/{username}/gained`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGains {
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: PlayerGainsData,
}

/// Gains for one player, in whichever shape the API returned them
#[derive(Debug, Clone, PartialEq)]
pub enum GainsRecord {
    Player(PlayerGains),
    Group(GroupGainsEntry),
}

impl GainsRecord {
    /// Overall XP gained over the period, 0 when the data is missing
    pub fn overall_xp_gained(&self) -> i64 {
        match self {
            GainsRecord::Player(gains) => player_overall_xp(gains),
            GainsRecord::Group(entry) => group_overall_xp(entry),
        }
    }
}

fn player_overall_xp(gains: &PlayerGains) -> i64 {
    gains
        .data
        .skills
        .get(OVERALL)
        .and_then(|s| s.experience.as_ref())
        .and_then(|e| e.gained)
        .unwrap_or(0)
}

/// Group gains are requested for the overall metric only
fn group_overall_xp(entry: &GroupGainsEntry) -> i64 {
    entry.data.gained.unwrap_or(0)
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_details() {
        let json = r#"{
            "id": 139,
            "name": "Iron Foundry",
            "memberCount": 2,
            "memberships": [
                {
                    "playerId": 1,
                    "groupId": 139,
                    "role": "administrator",
                    "player": { "id": 1, "username": "alice", "displayName": "Alice",
                                "lastChangedAt": "2026-10-01T12:00:00.000Z" }
                },
                {
                    "playerId": 2,
                    "groupId": 139,
                    "role": null,
                    "player": { "id": 2, "username": "bob", "displayName": "Bob" }
                }
            ]
        }"#;

        let group: GroupDetails = serde_json::from_str(json).unwrap();
        assert_eq!(group.memberships.len(), 2);
        assert_eq!(group.membership_for(1).unwrap().role_name(), "administrator");
        assert_eq!(group.membership_for(2).unwrap().role_name(), "member");
        assert!(group.membership_for(3).is_none());
        assert!(group.memberships[0].player.last_changed_at.is_some());
        assert_eq!(group.display_names(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_xp_from_both_shapes() {
        let player: PlayerGains = serde_json::from_str(
            r#"{
                "startsAt": "2026-09-18T00:00:00.000Z",
                "endsAt": "2026-10-18T00:00:00.000Z",
                "data": { "skills": {
                    "overall": { "metric": "overall", "experience": { "gained": 120000, "start": 1, "end": 120001 } },
                    "attack": { "metric": "attack", "experience": { "gained": 5 } }
                } }
            }"#,
        )
        .unwrap();
        let group: GroupGainsEntry = serde_json::from_str(
            r#"{
                "player": { "id": 1, "username": "alice", "displayName": "Alice" },
                "startDate": "2026-09-18T00:00:00.000Z",
                "endDate": "2026-10-18T00:00:00.000Z",
                "data": { "gained": 120000, "start": 1, "end": 120001 }
            }"#,
        )
        .unwrap();

        assert_eq!(GainsRecord::Player(player).overall_xp_gained(), 120_000);
        assert_eq!(GainsRecord::Group(group).overall_xp_gained(), 120_000);
    }

    #[test]
    fn test_missing_metric_is_zero() {
        let player: PlayerGains = serde_json::from_str(r#"{ "data": { "skills": {} } }"#).unwrap();
        let group: GroupGainsEntry = serde_json::from_str(
            r#"{ "player": { "id": 1, "username": "a", "displayName": "A" } }"#,
        )
        .unwrap();

        assert_eq!(GainsRecord::Player(player).overall_xp_gained(), 0);
        assert_eq!(GainsRecord::Group(group).overall_xp_gained(), 0);
    }

    #[test]
    fn test_malformed_gains_are_rejected() {
        let result = serde_json::from_str::<GroupGainsEntry>(
            r#"{ "player": { "id": 1, "username": "a", "displayName": "A" }, "data": { "gained": "lots" } }"#,
        );
        assert!(result.is_err());
    }
}
