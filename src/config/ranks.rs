use serde::{Deserialize, Serialize};

/// A clan rank tier and the XP it must gain per month
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RankDefinition {
    pub tier: u32,
    pub name: String,
    /// Required XP over the observation window
    pub monthly_xp: i64,
}

/// Lookup table from rank tier to activity requirement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable {
    pub ranks: Vec<RankDefinition>,
}

impl RankTable {
    pub fn new(ranks: Vec<RankDefinition>) -> Self {
        Self { ranks }
    }

    pub fn get(&self, tier: u32) -> Option<&RankDefinition> {
        self.ranks.iter().find(|r| r.tier == tier)
    }

    /// Required XP for a tier. Tiers without an entry require nothing.
    pub fn threshold_for(&self, tier: u32) -> i64 {
        self.get(tier).map(|r| r.monthly_xp).unwrap_or(0)
    }

    /// Tier given to newly discovered members
    pub fn lowest_tier(&self) -> u32 {
        self.ranks.iter().map(|r| r.tier).min().unwrap_or(0)
    }

    pub fn name_for(&self, tier: u32) -> String {
        self.get(tier)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| format!("Tier {}", tier))
    }

    /// Thresholds must not decrease as tiers go up
    pub fn validate(&self) -> crate::error::Result<()> {
        let mut sorted: Vec<&RankDefinition> = self.ranks.iter().collect();
        sorted.sort_by_key(|r| r.tier);

        for pair in sorted.windows(2) {
            if pair[0].tier == pair[1].tier {
                return Err(crate::error::BotError::ConfigValidation {
                    message: format!("rank tier {} is defined twice", pair[0].tier),
                });
            }
            if pair[1].monthly_xp < pair[0].monthly_xp {
                return Err(crate::error::BotError::ConfigValidation {
                    message: format!(
                        "rank '{}' requires less XP than lower rank '{}'",
                        pair[1].name, pair[0].name
                    ),
                });
            }
        }

        if let Some(rank) = self.ranks.iter().find(|r| r.monthly_xp < 0) {
            return Err(crate::error::BotError::ConfigValidation {
                message: format!("rank '{}' has a negative XP requirement", rank.name),
            });
        }

        Ok(())
    }
}
