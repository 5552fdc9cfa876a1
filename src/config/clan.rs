use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ranks::RankTable;

/// Clan configuration - group, channels, roles and activity rules
/// Loaded from data/clan.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClanConfig {
    pub wom: WomSettings,

    /// Discord guild the clan lives in
    pub guild_id: u64,

    /// Channel that job reports are posted to
    pub report_channel_id: u64,

    /// Restrict officer commands to this channel
    #[serde(default)]
    pub command_channel_id: Option<u64>,

    /// Discord roles allowed to run officer commands
    #[serde(default)]
    pub officer_roles: Vec<String>,

    /// Rank tiers and their monthly XP requirement
    #[serde(default)]
    pub ranks: RankTable,

    /// WOM group role -> internal role label
    #[serde(default)]
    pub role_mapping: HashMap<String, String>,

    /// Internal role labels that are never checked for activity
    #[serde(default)]
    pub exempt_roles: Vec<String>,

    /// WOM role given to members on probation
    #[serde(default = "default_prospect_role")]
    pub prospect_role: String,

    /// Names left out of the roster comparison
    #[serde(default)]
    pub ignored_names: Vec<String>,

    /// Discord roles whose holders are left out of the roster comparison
    #[serde(default)]
    pub ignored_guild_roles: Vec<String>,

    /// Per-command cooldowns, keyed by command name
    #[serde(default)]
    pub rate_limits: HashMap<String, CommandLimit>,

    /// Run all jobs on this interval when set
    #[serde(default)]
    pub job_interval_hours: Option<u64>,

    /// Sheet holding the absence ledger
    #[serde(default = "default_absence_sheet")]
    pub absence_sheet: String,
}

/// Wise Old Man client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WomSettings {
    pub group_id: u64,

    #[serde(default = "default_wom_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request, including the first one
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Page size for group gains
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Allow `rate` invocations per `seconds` for each user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CommandLimit {
    pub rate: usize,
    pub seconds: i64,
}

fn default_prospect_role() -> String {
    "prospector".to_string()
}

fn default_absence_sheet() -> String {
    "Absences".to_string()
}

fn default_wom_base_url() -> String {
    "https://api.wiseoldman.net/v2".to_string()
}

fn default_user_agent() -> String {
    format!("clanbot/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_page_size() -> u32 {
    50
}

impl ClanConfig {
    /// Load from a JSON file
    pub fn load_from_file(path: &str) -> crate::error::Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| crate::error::BotError::ConfigLoad {
                path: path.to_string(),
                source: e,
            })?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| crate::error::BotError::ConfigParse {
                path: path.to_string(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.wom.retries == 0 {
            return Err(crate::error::BotError::ConfigValidation {
                message: "wom.retries must be at least 1".to_string(),
            });
        }
        if self.wom.page_size == 0 {
            return Err(crate::error::BotError::ConfigValidation {
                message: "wom.page_size must be at least 1".to_string(),
            });
        }
        for (command, limit) in &self.rate_limits {
            if limit.rate == 0 || limit.seconds <= 0 {
                return Err(crate::error::BotError::ConfigValidation {
                    message: format!("rate limit for '{}' must be positive", command),
                });
            }
        }
        self.ranks.validate()
    }

    pub fn rate_limit(&self, command: &str) -> Option<CommandLimit> {
        self.rate_limits.get(command).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "wom": { "group_id": 1234 },
        "guild_id": 7,
        "report_channel_id": 42,
        "officer_roles": ["Officer"],
        "ranks": [
            {"tier": 1, "name": "Bronze", "monthly_xp": 50000},
            {"tier": 2, "name": "Iron", "monthly_xp": 150000}
        ],
        "role_mapping": { "administrator": "Staff", "dogsbody": "Member" },
        "exempt_roles": ["staff"],
        "rate_limits": { "check_activity": { "rate": 1, "seconds": 3600 } }
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config: ClanConfig = serde_json::from_str(SAMPLE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.wom.retries, 3);
        assert_eq!(config.wom.timeout_secs, 30);
        assert_eq!(config.wom.base_url, "https://api.wiseoldman.net/v2");
        assert_eq!(config.prospect_role, "prospector");
        assert_eq!(config.absence_sheet, "Absences");
        assert!(config.command_channel_id.is_none());
        assert_eq!(
            config.rate_limit("check_activity"),
            Some(CommandLimit { rate: 1, seconds: 3600 })
        );
    }

    #[test]
    fn test_rejects_zero_rate_limit() {
        let mut config: ClanConfig = serde_json::from_str(SAMPLE).unwrap();
        config
            .rate_limits
            .insert("sync".to_string(), CommandLimit { rate: 0, seconds: 10 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let json = r#"{ "wom": { "group_id": 1 }, "guild_id": 1, "report_channel_id": 1, "bogus": true }"#;
        assert!(serde_json::from_str::<ClanConfig>(json).is_err());
    }
}
