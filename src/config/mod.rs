pub mod clan;
pub mod ranks;

pub use clan::{ClanConfig, CommandLimit, WomSettings};
pub use ranks::{RankDefinition, RankTable};
