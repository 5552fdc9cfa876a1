pub mod client;
pub mod models;

pub use client::WomClient;
pub use models::{GainsRecord, GroupDetails, GroupGainsEntry, Membership, PlayerGains, OVERALL};
