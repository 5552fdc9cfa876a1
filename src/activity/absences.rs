use std::collections::HashSet;
use tracing::{info, warn};

use crate::state::{AbsenceRecord, MemberDirectory};

/// Note left on absences that can't be tied to a member
pub const UNLINKED_NOTE: &str = "[not found in member directory]";

#[derive(Debug, Clone, Default)]
pub struct AbsenceReconciliation {
    pub records: Vec<AbsenceRecord>,
    /// Rows that need writing back
    pub changed: usize,
    pub unlinked: usize,
}

/// Refresh nicknames, backfill member links and flag rows that match nobody.
///
/// Rows are never dropped; stale ones only get [`UNLINKED_NOTE`].
pub fn reconcile_absences(
    records: Vec<AbsenceRecord>,
    directory: &dyn MemberDirectory,
) -> AbsenceReconciliation {
    let mut result = AbsenceReconciliation::default();

    for mut record in records {
        let member = record
            .member_id
            .and_then(|id| directory.get_member_by_id(id))
            .or_else(|| directory.get_member_by_nickname(&record.nickname));

        let before = record.clone();
        match member {
            Some(member) => {
                if record.member_id != Some(member.id) {
                    info!("Linked absence '{}' to member {}", record.nickname, member.id);
                    record.member_id = Some(member.id);
                }
                if record.nickname != member.nickname {
                    info!(
                        "Absence nickname '{}' refreshed to '{}'",
                        record.nickname, member.nickname
                    );
                    record.nickname = member.nickname.clone();
                }
                if record.information.contains(UNLINKED_NOTE) {
                    record.information = record
                        .information
                        .replace(UNLINKED_NOTE, "")
                        .trim()
                        .to_string();
                }
            }
            None => {
                warn!("Absence '{}' matches no member", record.nickname);
                result.unlinked += 1;
                if !record.information.contains(UNLINKED_NOTE) {
                    record.information = if record.information.is_empty() {
                        UNLINKED_NOTE.to_string()
                    } else {
                        format!("{} {}", record.information, UNLINKED_NOTE)
                    };
                }
            }
        }

        if record != before {
            result.changed += 1;
        }
        result.records.push(record);
    }

    result
}

/// Lower-cased nicknames of everyone with an absence on file
pub fn absentee_names(records: &[AbsenceRecord]) -> HashSet<String> {
    records
        .iter()
        .map(|r| r.nickname.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemberDatabase;

    fn record(member_id: Option<u64>, nickname: &str, information: &str) -> AbsenceRecord {
        AbsenceRecord {
            id: format!("id-{}", nickname),
            member_id,
            nickname: nickname.to_string(),
            date: "2026-10-01".to_string(),
            information: information.to_string(),
            comment: String::new(),
        }
    }

    #[test]
    fn test_backfills_link_and_refreshes_nickname() {
        let mut db = MemberDatabase::new();
        let alice = db.create_member("Alice", 1);
        let bob = db.create_member("Bob The Great", 1);

        let result = reconcile_absences(
            vec![
                record(None, "alice", "Holiday"),
                record(Some(bob), "Bob", ""),
            ],
            &db,
        );

        assert_eq!(result.changed, 2);
        assert_eq!(result.unlinked, 0);
        assert_eq!(result.records[0].member_id, Some(alice));
        assert_eq!(result.records[0].nickname, "Alice");
        assert_eq!(result.records[1].nickname, "Bob The Great");
    }

    #[test]
    fn test_unlinkable_rows_are_flagged_once() {
        let db = MemberDatabase::new();

        let first = reconcile_absences(vec![record(None, "Ghost", "Trip")], &db);
        assert_eq!(first.unlinked, 1);
        assert_eq!(first.changed, 1);
        assert_eq!(first.records[0].information, format!("Trip {}", UNLINKED_NOTE));

        let second = reconcile_absences(first.records, &db);
        assert_eq!(second.unlinked, 1);
        assert_eq!(second.changed, 0);
        assert_eq!(second.records.len(), 1);
    }

    #[test]
    fn test_note_removed_once_linked() {
        let mut db = MemberDatabase::new();
        db.create_member("Ghost", 1);

        let result = reconcile_absences(
            vec![record(None, "Ghost", &format!("Trip {}", UNLINKED_NOTE))],
            &db,
        );
        assert_eq!(result.records[0].information, "Trip");
        assert_eq!(result.unlinked, 0);
    }

    #[test]
    fn test_absentee_names() {
        let names = absentee_names(&[record(None, " Alice ", ""), record(None, "", "")]);
        assert_eq!(names.len(), 1);
        assert!(names.contains("alice"));
    }
}
