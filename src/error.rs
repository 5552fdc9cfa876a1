use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Failed to load config file '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Absence sheet errors
    #[error("Invalid sheet range '{range}'")]
    InvalidRange { range: String },

    #[error("Malformed value '{value}' in sheet '{sheet}' row {row}: {message}")]
    MalformedCell {
        sheet: String,
        row: usize,
        value: String,
        message: String,
    },

    // Wise Old Man errors
    #[error("Wise Old Man rate limit reached, try again later")]
    WomRateLimited,

    #[error("Wise Old Man request timed out")]
    WomTimeout,

    #[error("Wise Old Man error ({status}): {message}")]
    WomService { status: u16, message: String },

    // Directory errors
    #[error("Member not found: {nickname}")]
    MemberNotFound { nickname: String },

    #[error("Unknown rank tier: {tier}")]
    UnknownRank { tier: u32 },

    #[error("{nickname} only has {balance} ingots")]
    InsufficientIngots { nickname: String, balance: i64 },

    // Raffle errors
    #[error("No raffle is running")]
    NoActiveRaffle,

    #[error("The raffle '{name}' is still running")]
    RaffleAlreadyRunning { name: String },

    #[error("Could not fetch {source_name} roster: {message}")]
    RosterUnavailable {
        source_name: String,
        message: String,
    },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return BotError::WomTimeout;
        }
        BotError::WomService {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

use poise::serenity_prelude as serenity;
