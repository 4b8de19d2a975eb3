//! Inventory loading and row validation.
//!
//! The inventory is a CSV export of the content inventory sheet, with two
//! extra columns holding `yes`/`no` flags for archive and delete. Columns
//! are found by header name (see [`InventoryConfig`]).
//!
//! A row whose flags are not exactly `yes` or `no` (case-insensitive,
//! surrounding whitespace ignored) is rejected as [`MalformedInput`] and
//! never reaches the pipeline. Blank flags are never defaulted.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::InventoryConfig;
use crate::models::ItemRecord;

/// A rejected inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("row {row}: column '{column}' {reason}")]
pub struct MalformedInput {
    pub row: usize,
    pub item_id: Option<String>,
    pub column: String,
    pub value: String,
    pub reason: String,
}

/// The validated contents of one inventory file.
#[derive(Debug, Default)]
pub struct Inventory {
    pub records: Vec<ItemRecord>,
    pub rejected: Vec<MalformedInput>,
}

impl Inventory {
    pub fn from_records(records: Vec<ItemRecord>) -> Self {
        Self {
            records,
            rejected: Vec::new(),
        }
    }

    /// Number of data rows read, valid or not.
    pub fn row_count(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    /// Item ids that appear on more than one valid row.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for rec in &self.records {
            *seen.entry(rec.item_id.as_str()).or_default() += 1;
        }
        let mut dups: Vec<&str> = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id)
            .collect();
        dups.sort_unstable();
        dups
    }
}

/// Why a flag value was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagError {
    Blank,
    Unrecognized,
}

/// Parse a `yes`/`no` flag.
pub fn parse_flag(value: &str) -> Result<bool, FlagError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(FlagError::Blank);
    }
    if v.eq_ignore_ascii_case("yes") {
        Ok(true)
    } else if v.eq_ignore_ascii_case("no") {
        Ok(false)
    } else {
        Err(FlagError::Unrecognized)
    }
}

pub fn load_inventory(path: &Path, columns: &InventoryConfig) -> Result<Inventory> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open inventory file: {}", path.display()))?;
    read_inventory(file, columns)
        .with_context(|| format!("Failed to read inventory file: {}", path.display()))
}

/// Read and validate every row from a CSV source.
pub fn read_inventory<R: Read>(reader: R, columns: &InventoryConfig) -> Result<Inventory> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let index = ColumnIndex::resolve(&headers, columns)?;

    let mut inventory = Inventory::default();
    for (i, result) in csv_reader.byte_records().enumerate() {
        // Header is row 1.
        let row = i + 2;
        let raw = result.with_context(|| format!("Malformed CSV at row {}", row))?;

        if raw.iter().all(|f| f.trim_ascii().is_empty()) {
            debug!(row, "skipping empty inventory row");
            continue;
        }

        let record = match csv::StringRecord::from_byte_record(raw) {
            Ok(record) => record,
            Err(e) => {
                let field = e.utf8_error().field();
                let rejected = index.undecodable(row, &headers, field, &e.into_byte_record());
                warn!(row, error = %rejected, "inventory row rejected");
                inventory.rejected.push(rejected);
                continue;
            }
        };

        match index.validate(row, &record) {
            Ok(item) => inventory.records.push(item),
            Err(rejected) => {
                warn!(row, error = %rejected, "inventory row rejected");
                inventory.rejected.push(rejected);
            }
        }
    }

    Ok(inventory)
}

struct ColumnIndex {
    id: (usize, String),
    owner: (usize, String),
    item_type: (usize, String),
    title: Option<usize>,
    archive: (usize, String),
    delete: (usize, String),
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &InventoryConfig) -> Result<Self> {
        let find = |name: &str| -> Option<usize> {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        };
        let require = |name: &str| -> Result<(usize, String)> {
            match find(name) {
                Some(i) => Ok((i, name.to_string())),
                None => bail!(
                    "Inventory header has no '{}' column (found: {})",
                    name,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ),
            }
        };

        Ok(Self {
            id: require(&columns.id_column)?,
            owner: require(&columns.owner_column)?,
            item_type: require(&columns.type_column)?,
            title: columns.title_column.as_deref().and_then(find),
            archive: require(&columns.archive_column)?,
            delete: require(&columns.delete_column)?,
        })
    }

    /// Rejection for a row whose `field` is not UTF-8. The row is never
    /// half-read, so nothing from it reaches the pipeline.
    fn undecodable(
        &self,
        row: usize,
        headers: &csv::StringRecord,
        field: usize,
        record: &csv::ByteRecord,
    ) -> MalformedInput {
        let item_id = record
            .get(self.id.0)
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        MalformedInput {
            row,
            item_id,
            column: headers.get(field).unwrap_or("?").trim().to_string(),
            value: String::from_utf8_lossy(record.get(field).unwrap_or_default()).into_owned(),
            reason: "is not valid UTF-8".to_string(),
        }
    }

    fn validate(&self, row: usize, record: &csv::StringRecord) -> Result<ItemRecord, MalformedInput> {
        let cell = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        let item_id = cell(self.id.0);
        let id_for_report = if item_id.is_empty() {
            None
        } else {
            Some(item_id.clone())
        };
        let reject = |column: &str, value: String, reason: &str| MalformedInput {
            row,
            item_id: id_for_report.clone(),
            column: column.to_string(),
            value,
            reason: reason.to_string(),
        };

        if item_id.is_empty() {
            return Err(reject(&self.id.1, item_id, "is blank"));
        }
        let owner = cell(self.owner.0);
        if owner.is_empty() {
            return Err(reject(&self.owner.1, owner, "is blank"));
        }

        let flag = |(i, name): &(usize, String)| -> Result<bool, MalformedInput> {
            let raw = cell(*i);
            parse_flag(&raw).map_err(|e| match e {
                FlagError::Blank => reject(name, raw.clone(), "is blank (expected yes or no)"),
                FlagError::Unrecognized => reject(name, raw.clone(), "must be yes or no"),
            })
        };
        let archive_requested = flag(&self.archive)?;
        let delete_requested = flag(&self.delete)?;

        let mut item = ItemRecord::new(item_id, archive_requested, delete_requested)
            .with_owner(owner)
            .with_type(cell(self.item_type.0));
        item.row = row;
        item.title = self.title.map(cell).filter(|t| !t.is_empty());
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> InventoryConfig {
        InventoryConfig::default()
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("yes"), Ok(true));
        assert_eq!(parse_flag(" YES "), Ok(true));
        assert_eq!(parse_flag("No"), Ok(false));
        assert_eq!(parse_flag(""), Err(FlagError::Blank));
        assert_eq!(parse_flag("   "), Err(FlagError::Blank));
        assert_eq!(parse_flag("y"), Err(FlagError::Unrecognized));
        assert_eq!(parse_flag("true"), Err(FlagError::Unrecognized));
    }

    #[test]
    fn test_reads_valid_rows_in_order() {
        let csv = "id,owner,type,title,archiveFlag,deleteFlag\n\
                   a1,jdoe,CSV,Parcels,yes,yes\n\
                   a2,jdoe,Web Map,,Yes,no\n";
        let inv = read_inventory(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(inv.records.len(), 2);
        assert!(inv.rejected.is_empty());

        let first = &inv.records[0];
        assert_eq!(first.row, 2);
        assert_eq!(first.item_id, "a1");
        assert_eq!(first.owner, "jdoe");
        assert_eq!(first.item_type, "CSV");
        assert_eq!(first.title.as_deref(), Some("Parcels"));
        assert!(first.archive_requested && first.delete_requested);

        let second = &inv.records[1];
        assert_eq!(second.row, 3);
        assert!(second.title.is_none());
        assert!(second.archive_requested && !second.delete_requested);
    }

    #[test]
    fn test_blank_and_garbage_flags_are_rejected() {
        let csv = "id,owner,type,archiveFlag,deleteFlag\n\
                   a1,jdoe,CSV,,no\n\
                   a2,jdoe,CSV,yes,maybe\n\
                   a3,jdoe,CSV,no,no\n";
        let inv = read_inventory(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(inv.records.len(), 1);
        assert_eq!(inv.rejected.len(), 2);

        assert_eq!(inv.rejected[0].row, 2);
        assert_eq!(inv.rejected[0].column, "archiveFlag");
        assert!(inv.rejected[0].reason.contains("blank"));

        assert_eq!(inv.rejected[1].item_id.as_deref(), Some("a2"));
        assert_eq!(inv.rejected[1].column, "deleteFlag");
        assert_eq!(inv.rejected[1].value, "maybe");
    }

    #[test]
    fn test_blank_id_is_rejected() {
        let csv = "id,owner,type,archiveFlag,deleteFlag\n ,jdoe,CSV,yes,no\n";
        let inv = read_inventory(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(inv.rejected.len(), 1);
        assert!(inv.rejected[0].item_id.is_none());
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let csv = "id,owner,type,archiveFlag\na1,jdoe,CSV,yes\n";
        let err = read_inventory(csv.as_bytes(), &columns()).unwrap_err();
        assert!(err.to_string().contains("deleteFlag"));
    }

    #[test]
    fn test_header_match_ignores_case() {
        let csv = "ID,Owner,Type,ARCHIVEFLAG,deleteflag\na1,jdoe,CSV,yes,no\n";
        let inv = read_inventory(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(inv.records.len(), 1);
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let csv = "id,owner,type,archiveFlag,deleteFlag\na1,jdoe,CSV,yes,no\n,,,,\n";
        let inv = read_inventory(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(inv.row_count(), 1);
    }

    #[test]
    fn test_non_utf8_row_is_rejected_and_reading_continues() {
        let mut csv = b"id,owner,type,archiveFlag,deleteFlag\na1,jdoe,CSV,yes,no\na2,jdoe,".to_vec();
        csv.extend_from_slice(&[0xff, 0xfe]);
        csv.extend_from_slice(b",yes,yes\na3,jdoe,PDF,no,no\n");

        let inv = read_inventory(csv.as_slice(), &columns()).unwrap();

        let ids: Vec<&str> = inv.records.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
        assert_eq!(inv.rejected.len(), 1);
        let bad = &inv.rejected[0];
        assert_eq!(bad.row, 3);
        assert_eq!(bad.column, "type");
        assert_eq!(bad.item_id.as_deref(), Some("a2"));
        assert!(bad.reason.contains("UTF-8"), "{}", bad.reason);
    }

    #[test]
    fn test_duplicate_ids() {
        let inv = Inventory::from_records(vec![
            ItemRecord::new("a", true, false),
            ItemRecord::new("b", true, false),
            ItemRecord::new("a", true, true),
        ]);
        assert_eq!(inv.duplicate_ids(), vec!["a"]);
    }
}
