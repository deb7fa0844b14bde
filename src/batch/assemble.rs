//! Result assembly: per-file records into one table.
//!
//! The assembler turns the collected task records into a polars DataFrame
//! with a `file` column plus one column per parameter result. Records are
//! not required to share the same key set — a key missing from a record
//! becomes a null cell, not an error (with uniform registration this never
//! happens, but the assembler does not depend on it).
//!
//! When additional per-file data was supplied, the table is inner-joined
//! with it on `file`: rows present on only one side are dropped.

use std::fs::File;
use std::path::Path;

use indexmap::IndexSet;
use log::debug;
use polars::prelude::*;

use crate::batch::task::TaskRecord;
use crate::core::error::BatchResult;

/// Name of the key column joining results to additional data.
pub const FILE_COLUMN: &str = "file";

/// Build the result table from collected records, merging additional data
/// if present.
pub fn assemble(
    records: Vec<TaskRecord>,
    additional_data: Option<&DataFrame>,
) -> BatchResult<DataFrame> {
    let mut keys: IndexSet<String> = IndexSet::new();
    for record in &records {
        for key in record.values.keys() {
            keys.insert(key.clone());
        }
    }

    let files: Vec<String> = records.iter().map(|r| r.file.clone()).collect();
    let mut columns: Vec<Column> = Vec::with_capacity(keys.len() + 1);
    columns.push(Series::new(FILE_COLUMN.into(), files).into());
    for key in &keys {
        let values: Vec<Option<f64>> = records
            .iter()
            .map(|r| r.values.get(key).copied())
            .collect();
        columns.push(Series::new(key.as_str().into(), values).into());
    }
    let frame = DataFrame::new(columns)?;

    match additional_data {
        Some(additional) => {
            let merged = additional
                .clone()
                .lazy()
                .join(
                    frame.lazy(),
                    [col(FILE_COLUMN)],
                    [col(FILE_COLUMN)],
                    JoinArgs::new(JoinType::Inner),
                )
                .collect()?;
            debug!(
                "merged additional data: {} result rows, {} merged rows",
                records.len(),
                merged.height()
            );
            Ok(merged)
        }
        None => Ok(frame),
    }
}

/// Read a tabular metadata file (CSV with a header row).
pub fn read_metadata_csv(path: &Path) -> BatchResult<DataFrame> {
    let file = File::open(path)?;
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(frame)
}

/// Write the result table to a CSV file, replacing any existing file.
pub fn write_csv(frame: &mut DataFrame, path: &Path) -> BatchResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(file: &str, entries: &[(&str, f64)]) -> TaskRecord {
        let mut values = IndexMap::new();
        for (key, value) in entries {
            values.insert(key.to_string(), *value);
        }
        TaskRecord {
            file: file.to_string(),
            values,
        }
    }

    #[test]
    fn test_columns_follow_first_seen_order() {
        let frame = assemble(
            vec![
                record("a.asc", &[("Sa", 1.0), ("Sq", 2.0)]),
                record("b.asc", &[("Sa", 3.0), ("Sq", 4.0)]),
            ],
            None,
        )
        .unwrap();

        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["file", "Sa", "Sq"]);
        assert_eq!(frame.height(), 2);
    }

    #[test]
    fn test_missing_keys_become_nulls() {
        let frame = assemble(
            vec![
                record("a.asc", &[("Sa", 1.0)]),
                record("b.asc", &[("Sa", 2.0), ("Sq", 5.0)]),
            ],
            None,
        )
        .unwrap();

        let sq = frame.column("Sq").unwrap().f64().unwrap();
        assert_eq!(sq.get(0), None);
        assert_eq!(sq.get(1), Some(5.0));
    }

    #[test]
    fn test_inner_join_drops_unmatched_rows_on_both_sides() {
        let additional = df![
            FILE_COLUMN => ["a.asc", "b.asc", "ghost.asc"],
            "thickness" => [10.0, 20.0, 30.0],
        ]
        .unwrap();

        let frame = assemble(
            vec![
                record("a.asc", &[("Sa", 1.0)]),
                record("b.asc", &[("Sa", 2.0)]),
                record("c.asc", &[("Sa", 3.0)]),
            ],
            Some(&additional),
        )
        .unwrap();

        // c.asc has no metadata and ghost.asc has no result: both are gone.
        assert_eq!(frame.height(), 2);
        let files: Vec<&str> = frame
            .column(FILE_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(files.contains(&"a.asc"));
        assert!(files.contains(&"b.asc"));
        assert!(frame.column("thickness").is_ok());
        assert!(frame.column("Sa").is_ok());
    }

    #[test]
    fn test_empty_record_set_yields_empty_table() {
        let frame = assemble(Vec::new(), None).unwrap();
        assert_eq!(frame.height(), 0);
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["file"]);
    }

    #[test]
    fn test_csv_round_trip_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale content that must disappear").unwrap();

        let mut frame = assemble(
            vec![record("a.asc", &[("Sa", 1.25)])],
            None,
        )
        .unwrap();
        write_csv(&mut frame, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("file,Sa"));
        assert!(!written.contains("stale"));

        let reread = read_metadata_csv(&path).unwrap();
        assert_eq!(reread.height(), 1);
    }
}
