use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::CommandLimit;

/// Outcome of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { retry_after: Duration },
}

/// Per-command, per-user invocation ledger.
///
/// Lives for the whole process and is never persisted, so a restart clears all
/// cooldowns. Old timestamps are only dropped when the same command and user
/// are checked again.
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Command name -> user id -> invocation times
    ledger: DashMap<String, HashMap<u64, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation at `now` if the user is under the limit.
    ///
    /// The command's entry stays locked for the whole prune-count-append
    /// sequence. Denied calls are not recorded.
    pub fn check(
        &self,
        command: &str,
        user_id: u64,
        limit: CommandLimit,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window = Duration::seconds(limit.seconds);
        let mut users = self.ledger.entry(command.to_string()).or_default();
        let stamps = users.entry(user_id).or_default();

        stamps.retain(|t| *t > now - window);

        if stamps.len() >= limit.rate {
            let oldest = stamps.iter().min().copied().unwrap_or(now);
            let retry_after = window - (now - oldest);
            debug!(
                "User {} is on cooldown for '{}' ({}s left)",
                user_id,
                command,
                retry_after.num_seconds()
            );
            return RateLimitDecision::Denied { retry_after };
        }

        stamps.push(now);
        RateLimitDecision::Allowed
    }

    /// Invocations currently retained for a user, pruned or not
    pub fn recorded(&self, command: &str, user_id: u64) -> usize {
        self.ledger
            .get(command)
            .and_then(|users| users.get(&user_id).map(|s| s.len()))
            .unwrap_or(0)
    }
}

/// Shared rate limiter type
pub type SharedRateLimiter = Arc<RateLimiter>;

/// "12 minutes and 5 seconds"
pub fn format_cooldown(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let minutes = total / 60;
    let seconds = total % 60;
    if minutes > 0 {
        format!("{} minutes and {} seconds", minutes, seconds)
    } else {
        format!("{} seconds", seconds)
    }
}
