//! Tabular store for the absence ledger.
//!
//! Officers keep absences in a spreadsheet-like table addressed by sheet name
//! and A1 ranges (`"A2:F"`). The bot only ever touches it through
//! [`SheetStore`], so the backing store can be swapped without touching the
//! reconciliation code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BotError, Result};

/// Rows of cells, top to bottom
pub type Rows = Vec<Vec<String>>;

/// Range covering every absence row below the header
pub const ABSENCE_RANGE: &str = "A2:F";

/// Columns A..F
const ABSENCE_WIDTH: usize = 6;

/// Bulk read/write access to a named sheet
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn get_range(&self, sheet: &str, range: &str) -> Result<Rows>;
    async fn update_range(&self, sheet: &str, range: &str, rows: Rows) -> Result<()>;
}

/// A parsed A1 range. Rows and columns are zero-based; `end_row` is open when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetRange {
    pub start_col: usize,
    pub start_row: usize,
    pub end_col: usize,
    pub end_row: Option<usize>,
}

impl SheetRange {
    pub fn parse(range: &str) -> Result<Self> {
        let invalid = || BotError::InvalidRange {
            range: range.to_string(),
        };

        let (start, end) = range.split_once(':').ok_or_else(invalid)?;
        let (start_col, start_row) = parse_cell(start).ok_or_else(invalid)?;
        let (end_col, end_row) = parse_cell(end).ok_or_else(invalid)?;
        let start_row = start_row.ok_or_else(invalid)?;

        if end_col < start_col || end_row.is_some_and(|r| r < start_row) {
            return Err(invalid());
        }

        Ok(Self {
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }

    pub fn width(&self) -> usize {
        self.end_col - self.start_col + 1
    }
}

/// "B12" -> (1, Some(11)), "F" -> (5, None)
fn parse_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let cell = cell.trim();
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters
        .chars()
        .fold(0usize, |acc, c| {
            acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1)
        })
        - 1;

    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(n - 1)
    };

    Some((col, row))
}

/// Sheets stored in a single JSON file
pub struct JsonSheetStore {
    path: String,
    lock: tokio::sync::Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct SheetFile {
    sheets: HashMap<String, Rows>,
}

impl JsonSheetStore {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_file(&self) -> Result<SheetFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
                path: self.path.clone(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SheetFile::default()),
            Err(e) => Err(BotError::StateLoad {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    async fn write_file(&self, file: &SheetFile) -> Result<()> {
        let content = serde_json::to_string_pretty(file)?;
        let temp_path = format!("{}.tmp", self.path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: self.path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| BotError::StateSave {
                path: self.path.clone(),
                source: e,
            })
    }
}

#[async_trait]
impl SheetStore for JsonSheetStore {
    async fn get_range(&self, sheet: &str, range: &str) -> Result<Rows> {
        let range = SheetRange::parse(range)?;
        let _guard = self.lock.lock().await;
        let file = self.read_file().await?;

        let Some(rows) = file.sheets.get(sheet) else {
            return Ok(Vec::new());
        };

        let last = match range.end_row {
            Some(end) => (end + 1).min(rows.len()),
            None => rows.len(),
        };

        Ok(rows
            .iter()
            .take(last)
            .skip(range.start_row)
            .map(|row| {
                (range.start_col..=range.end_col)
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect())
    }

    async fn update_range(&self, sheet: &str, range: &str, rows: Rows) -> Result<()> {
        let parsed = SheetRange::parse(range)?;
        if let Some(end) = parsed.end_row {
            if rows.len() > end - parsed.start_row + 1 {
                return Err(BotError::InvalidRange {
                    range: range.to_string(),
                });
            }
        }
        if rows.iter().any(|r| r.len() > parsed.width()) {
            return Err(BotError::InvalidRange {
                range: range.to_string(),
            });
        }

        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        let target = file.sheets.entry(sheet.to_string()).or_default();

        for (offset, values) in rows.into_iter().enumerate() {
            let row_index = parsed.start_row + offset;
            if target.len() <= row_index {
                target.resize(row_index + 1, Vec::new());
            }
            let row = &mut target[row_index];
            if row.len() < parsed.start_col + values.len() {
                row.resize(parsed.start_col + values.len(), String::new());
            }
            for (col_offset, value) in values.into_iter().enumerate() {
                row[parsed.start_col + col_offset] = value;
            }
        }

        self.write_file(&file).await
    }
}

/// One row of the absence ledger
#[derive(Debug, Clone, PartialEq)]
pub struct AbsenceRecord {
    pub id: String,
    pub member_id: Option<u64>,
    pub nickname: String,
    pub date: String,
    pub information: String,
    pub comment: String,
}

impl AbsenceRecord {
    pub fn new(member_id: Option<u64>, nickname: &str, date: &str, information: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            member_id,
            nickname: nickname.to_string(),
            date: date.to_string(),
            information: information.to_string(),
            comment: String::new(),
        }
    }

    /// Parse a row. `row_number` is the 1-based sheet row, used for error messages.
    pub fn from_row(sheet: &str, row_number: usize, row: &[String]) -> Result<Self> {
        let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();

        let member_id = match cell(1) {
            s if s.is_empty() => None,
            s => Some(s.parse::<u64>().map_err(|e| BotError::MalformedCell {
                sheet: sheet.to_string(),
                row: row_number,
                value: s.clone(),
                message: e.to_string(),
            })?),
        };

        Ok(Self {
            id: cell(0),
            member_id,
            nickname: cell(2),
            date: cell(3),
            information: cell(4),
            comment: cell(5),
        })
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.member_id.map(|id| id.to_string()).unwrap_or_default(),
            self.nickname.clone(),
            self.date.clone(),
            self.information.clone(),
            self.comment.clone(),
        ]
    }
}

/// Read every absence row, skipping blank rows
pub async fn read_absences(store: &dyn SheetStore, sheet: &str) -> Result<Vec<AbsenceRecord>> {
    let rows = store.get_range(sheet, ABSENCE_RANGE).await?;
    rows.iter()
        .enumerate()
        .filter(|(_, row)| !is_blank(row))
        .map(|(i, row)| AbsenceRecord::from_row(sheet, i + 2, row))
        .collect()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Write absences back over the ledger, top to bottom.
///
/// Records are packed from the first data row, and any rows left over from
/// the previous contents are blanked.
pub async fn write_absences(
    store: &dyn SheetStore,
    sheet: &str,
    records: &[AbsenceRecord],
) -> Result<()> {
    let previous = store.get_range(sheet, ABSENCE_RANGE).await?.len();
    let mut rows: Rows = records.iter().map(|r| r.to_row()).collect();
    let width = rows.first().map_or(ABSENCE_WIDTH, |r| r.len());
    while rows.len() < previous {
        rows.push(vec![String::new(); width]);
    }
    store.update_range(sheet, ABSENCE_RANGE, rows).await
}

/// Append a single absence below the last filled row
pub async fn append_absence(
    store: &dyn SheetStore,
    sheet: &str,
    record: &AbsenceRecord,
) -> Result<()> {
    let existing = store.get_range(sheet, ABSENCE_RANGE).await?;
    let filled = existing
        .iter()
        .rposition(|row| !is_blank(row))
        .map_or(0, |i| i + 1);
    let row_number = filled + 2;
    let range = format!("A{}:F{}", row_number, row_number);
    store.update_range(sheet, &range, vec![record.to_row()]).await
}
