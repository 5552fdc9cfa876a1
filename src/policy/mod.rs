pub mod guards;
pub mod rate_limit;
pub mod retry;

pub use guards::{evaluate, CommandPolicy, GuardOutcome, Invocation};
pub use rate_limit::{RateLimiter, SharedRateLimiter};
pub use retry::{retry, RetryPolicy};
