pub mod absence_sheet;
pub mod member_database;
pub mod raffle;

pub use absence_sheet::{
    append_absence, read_absences, write_absences, AbsenceRecord, JsonSheetStore, SheetStore,
};
pub use member_database::{
    create_shared_member_database, MemberDatabase, MemberDirectory, SharedMemberDatabase,
};
pub use raffle::{create_shared_raffle_book, RaffleBook, SharedRaffleBook};
