pub mod guild;

pub use guild::{handle_member_add, handle_member_remove};
