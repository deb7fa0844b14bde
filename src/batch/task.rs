//! The per-file unit of work.
//!
//! A task owns everything about one file: it loads the data object, replays
//! the registered operations in registration order (each one sees the
//! cumulative effect of its predecessors), evaluates the registered
//! parameters against the final state, and flattens the results into one
//! record. Tasks share nothing mutable, which is what makes them safe to
//! fan out across workers.

use std::path::Path;

use indexmap::IndexMap;

use crate::core::call::{Operation, Parameter};
use crate::core::error::BatchError;
use crate::surface::Surface;

/// The flat result of processing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Filename including extension, without any directory component.
    pub file: String,
    /// One entry per scalar parameter result, or one per labeled value of a
    /// multi-valued result, in evaluation order.
    pub values: IndexMap<String, f64>,
}

/// Load one file and run the registered pipeline against it.
///
/// Deterministic for a fixed file and fixed operation/parameter sequences.
/// Any failure — load, capability, label bookkeeping — propagates to the
/// dispatcher untouched.
pub fn run_task<S: Surface>(
    path: &Path,
    operations: &[Operation],
    parameters: &[Parameter],
) -> Result<TaskRecord, BatchError> {
    let mut surface = S::load(path)?;

    for operation in operations {
        operation.execute_on(&mut surface)?;
    }

    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut values = IndexMap::new();
    for parameter in parameters {
        let columns = parameter.evaluate_on(&surface)?;
        values.extend(columns);
    }

    Ok(TaskRecord { file, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CallArgs;
    use crate::surface::Heightmap;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_grid(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        path
    }

    #[test]
    fn test_record_carries_filename_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "probe.asc", &["0 1", "2 3"]);

        let record =
            run_task::<Heightmap>(&path, &[], &[Parameter::new("Sa")]).unwrap();
        assert_eq!(record.file, "probe.asc");
        assert!(record.values.contains_key("Sa"));
    }

    #[test]
    fn test_operations_compose_before_parameters() {
        let dir = tempfile::tempdir().unwrap();
        // A tilted plane: leveling it first drives Sq to zero.
        let path = write_grid(dir.path(), "tilted.asc", &["0 1 2 3", "0 1 2 3", "0 1 2 3"]);

        let raw = run_task::<Heightmap>(&path, &[], &[Parameter::new("Sq")]).unwrap();
        let leveled = run_task::<Heightmap>(
            &path,
            &[Operation::new("level")],
            &[Parameter::new("Sq")],
        )
        .unwrap();

        assert!(raw.values["Sq"] > 0.5);
        assert!(leveled.values["Sq"] < 1e-9);
    }

    #[test]
    fn test_operation_order_is_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        // A curved profile: leveling the whole grid and leveling the
        // central crop remove different planes, so reversing the two
        // operations must change the result.
        let path = write_grid(dir.path(), "curved.asc", &["0 1 4 9", "0 1 4 9"]);

        let zoom = Operation::with_args("zoom", CallArgs::new().arg(2.0));
        let level = Operation::new("level");

        let zoom_first = run_task::<Heightmap>(
            &path,
            &[zoom.clone(), level.clone()],
            &[Parameter::new("Sq")],
        )
        .unwrap();
        let level_first = run_task::<Heightmap>(
            &path,
            &[level, zoom],
            &[Parameter::new("Sq")],
        )
        .unwrap();

        // zoom-then-level centers the cropped pair (1, 4) -> Sq = 1.5;
        // level-then-zoom crops the flat residual (-1, -1) -> Sq = 0.
        assert!((zoom_first.values["Sq"] - 1.5).abs() < 1e-9);
        assert!(level_first.values["Sq"] < 1e-9);
    }

    #[test]
    fn test_load_failure_propagates() {
        let err = run_task::<Heightmap>(
            Path::new("/nonexistent/void.asc"),
            &[],
            &[Parameter::new("Sa")],
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Load(_)));
    }

    #[test]
    fn test_duplicate_parameter_overwrites_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "dup.asc", &["0 1", "2 3"]);

        let record = run_task::<Heightmap>(
            &path,
            &[],
            &[Parameter::new("Sa"), Parameter::new("Sa")],
        )
        .unwrap();
        assert_eq!(record.values.len(), 1);
    }
}
