use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{BotError, Result};

/// Lookups the activity engine needs from the member store
pub trait MemberDirectory {
    fn get_member_by_nickname(&self, nickname: &str) -> Option<&Member>;
    fn get_member_by_id(&self, id: u64) -> Option<&Member>;
    fn get_member_by_player_id(&self, player_id: i64) -> Option<&Member>;
}

/// Clan member directory, persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDatabase {
    /// Schema version for migrations
    pub version: u32,

    /// Last update time
    pub last_updated: DateTime<Utc>,

    /// Next identifier to hand out
    pub next_id: u64,

    /// Members by identifier
    pub members: BTreeMap<u64, Member>,
}

impl Default for MemberDatabase {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: Utc::now(),
            next_id: 1,
            members: BTreeMap::new(),
        }
    }
}

impl MemberDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or create new if not exists
    pub async fn load(path: &str) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
                path: path.to_string(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(BotError::StateLoad {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Save to a JSON file atomically
    pub async fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        Ok(())
    }

    /// Add a new member and return their identifier
    pub fn create_member(&mut self, nickname: &str, rank_tier: u32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.members.insert(id, Member::new(id, nickname, rank_tier));
        self.last_updated = Utc::now();
        id
    }

    pub fn get_member_mut(&mut self, id: u64) -> Option<&mut Member> {
        self.last_updated = Utc::now();
        self.members.get_mut(&id)
    }

    pub fn find_id_by_nickname(&self, nickname: &str) -> Option<u64> {
        self.get_member_by_nickname(nickname).map(|m| m.id)
    }

    pub fn find_id_by_discord_id(&self, discord_id: u64) -> Option<u64> {
        self.members
            .values()
            .find(|m| m.discord_id == Some(discord_id))
            .map(|m| m.id)
    }

    /// Mark a member as having left. Returns false if they were already archived.
    pub fn archive(&mut self, id: u64) -> bool {
        match self.get_member_mut(id) {
            Some(member) if member.active => {
                member.active = false;
                true
            }
            _ => false,
        }
    }

    pub fn active_members(&self) -> Vec<&Member> {
        self.members.values().filter(|m| m.active).collect()
    }

    /// Adjust a member's ingot balance. The balance never goes below zero.
    pub fn adjust_ingots(&mut self, nickname: &str, delta: i64) -> Result<i64> {
        let id = self
            .find_id_by_nickname(nickname)
            .ok_or_else(|| BotError::MemberNotFound {
                nickname: nickname.to_string(),
            })?;
        let member = self.get_member_mut(id).ok_or_else(|| BotError::MemberNotFound {
            nickname: nickname.to_string(),
        })?;

        let updated = member.ingots + delta;
        if updated < 0 {
            return Err(BotError::InsufficientIngots {
                nickname: member.nickname.clone(),
                balance: member.ingots,
            });
        }
        member.ingots = updated;
        Ok(updated)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl MemberDirectory for MemberDatabase {
    /// Case-insensitive. Active members win over archived ones with the same name.
    fn get_member_by_nickname(&self, nickname: &str) -> Option<&Member> {
        let wanted = nickname.trim().to_lowercase();
        let mut matches = self
            .members
            .values()
            .filter(|m| m.nickname.to_lowercase() == wanted);
        let first = matches.next()?;
        if first.active {
            return Some(first);
        }
        matches.find(|m| m.active).or(Some(first))
    }

    fn get_member_by_id(&self, id: u64) -> Option<&Member> {
        self.members.get(&id)
    }

    fn get_member_by_player_id(&self, player_id: i64) -> Option<&Member> {
        self.members
            .values()
            .find(|m| m.wom_player_id == Some(player_id))
    }
}

/// A clan member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: u64,

    /// In-game display name
    pub nickname: String,

    /// Internal rank tier, drives the activity requirement
    pub rank_tier: u32,

    /// False once the member has left
    pub active: bool,

    /// Role in the WOM group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wom_player_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<u64>,

    #[serde(default)]
    pub ingots: i64,

    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(id: u64, nickname: &str, rank_tier: u32) -> Self {
        Self {
            id,
            nickname: nickname.to_string(),
            rank_tier,
            active: true,
            group_role: None,
            wom_player_id: None,
            discord_id: None,
            ingots: 0,
            joined_at: Utc::now(),
        }
    }
}

/// Shared member database type
pub type SharedMemberDatabase = Arc<tokio::sync::RwLock<MemberDatabase>>;

pub fn create_shared_member_database(db: MemberDatabase) -> SharedMemberDatabase {
    Arc::new(tokio::sync::RwLock::new(db))
}
