use chrono::{DateTime, Utc};

use super::rate_limit::{format_cooldown, RateLimitDecision, RateLimiter};
use crate::config::{ClanConfig, CommandLimit};

/// Who may run a command, where, and how often
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPolicy {
    pub command: String,
    /// Any one of these Discord roles is enough. Empty means everyone.
    pub required_roles: Vec<String>,
    pub channel_id: Option<u64>,
    pub limit: Option<CommandLimit>,
}

impl CommandPolicy {
    /// Open to everyone, subject to the command's configured cooldown
    pub fn open(command: &str, config: &ClanConfig) -> Self {
        Self {
            command: command.to_string(),
            required_roles: Vec::new(),
            channel_id: None,
            limit: config.rate_limit(command),
        }
    }

    /// Officer roles only, in the command channel when one is configured
    pub fn officer(command: &str, config: &ClanConfig) -> Self {
        Self {
            command: command.to_string(),
            required_roles: config.officer_roles.clone(),
            channel_id: config.command_channel_id,
            limit: config.rate_limit(command),
        }
    }
}

/// The caller of a command, as the guards see it
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub user_id: u64,
    pub channel_id: u64,
    pub role_names: &'a [String],
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Proceed,
    Deny(String),
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    Role,
    Channel,
    RateLimit,
}

/// Guards run in this order; the rate limit comes last so that a call
/// rejected for role or channel never uses up a slot.
const PIPELINE: [Guard; 3] = [Guard::Role, Guard::Channel, Guard::RateLimit];

impl Guard {
    fn check(
        self,
        policy: &CommandPolicy,
        invocation: &Invocation<'_>,
        limiter: &RateLimiter,
    ) -> GuardOutcome {
        match self {
            Guard::Role => {
                if policy.required_roles.is_empty()
                    || policy.required_roles.iter().any(|required| {
                        invocation
                            .role_names
                            .iter()
                            .any(|held| held.eq_ignore_ascii_case(required))
                    })
                {
                    GuardOutcome::Proceed
                } else {
                    GuardOutcome::Deny(format!(
                        "You need one of these roles to use `/{}`: {}",
                        policy.command,
                        policy.required_roles.join(", ")
                    ))
                }
            }
            Guard::Channel => match policy.channel_id {
                Some(channel) if channel != invocation.channel_id => GuardOutcome::Deny(format!(
                    "`/{}` can only be used in <#{}>",
                    policy.command, channel
                )),
                _ => GuardOutcome::Proceed,
            },
            Guard::RateLimit => {
                let Some(limit) = policy.limit else {
                    return GuardOutcome::Proceed;
                };
                match limiter.check(&policy.command, invocation.user_id, limit, invocation.now) {
                    RateLimitDecision::Allowed => GuardOutcome::Proceed,
                    RateLimitDecision::Denied { retry_after } => GuardOutcome::Deny(format!(
                        "`/{}` is on cooldown. Try again in {}.",
                        policy.command,
                        format_cooldown(retry_after)
                    )),
                }
            }
        }
    }
}

/// Run every guard in order and stop at the first denial
pub fn evaluate(
    policy: &CommandPolicy,
    invocation: &Invocation<'_>,
    limiter: &RateLimiter,
) -> GuardOutcome {
    for guard in PIPELINE {
        if let GuardOutcome::Deny(reason) = guard.check(policy, invocation, limiter) {
            return GuardOutcome::Deny(reason);
        }
    }
    GuardOutcome::Proceed
}
