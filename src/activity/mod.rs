pub mod absences;
pub mod classifier;
pub mod roster;
pub mod sweep;

pub use absences::{absentee_names, reconcile_absences};
pub use classifier::{
    check_member_activity, ActivityCheckResult, ActivityRules, ActivityStatus, MemberIdentity,
};
pub use roster::{compute_roster_diff, RosterDiff};
pub use sweep::{sort_for_report, sweep_group_activity};
