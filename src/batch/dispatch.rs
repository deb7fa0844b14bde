//! Task dispatch: fan the per-file work out across a worker pool, or run
//! it sequentially on the calling thread.
//!
//! Parallel dispatch submits one task per file to a rayon pool and collects
//! results over a crossbeam channel in completion order — the output carries
//! no trace of the input file order. Sequential dispatch processes the file
//! list in order and is the mode to reach for when determinism or
//! single-threaded debugging matters.
//!
//! Failure semantics are fail-fast: the first task error aborts the batch
//! and no partial result set is returned. Workers already in flight run to
//! completion (there is no cancellation path, so a loader that hangs stalls
//! the whole run), but their output is discarded.

use std::path::PathBuf;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use crate::batch::progress::ProgressTracker;
use crate::batch::task::{run_task, TaskRecord};
use crate::core::call::{Operation, Parameter};
use crate::core::error::BatchResult;
use crate::surface::Surface;

/// Run one task per file on a worker pool, collecting in completion order.
///
/// `max_threads` of zero sizes the pool to the available parallelism.
pub fn dispatch_parallel<S: Surface>(
    filepaths: &[PathBuf],
    operations: &[Operation],
    parameters: &[Parameter],
    max_threads: usize,
    tracker: &ProgressTracker,
) -> BatchResult<Vec<TaskRecord>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build()?;
    debug!(
        "dispatching {} tasks across {} workers",
        filepaths.len(),
        pool.current_num_threads()
    );

    let (sender, receiver) = crossbeam::channel::unbounded();
    pool.install(|| {
        filepaths
            .par_iter()
            .for_each_with(sender, |sender, path| {
                let started = Instant::now();
                let result = run_task::<S>(path, operations, parameters);
                match &result {
                    Ok(record) => tracker
                        .task_completed(&record.file, started.elapsed().as_millis() as u64),
                    Err(error) => tracker.report_error(
                        path.file_name().map(|n| n.to_string_lossy()).as_deref(),
                        error.to_string(),
                    ),
                }
                // The receiver is not drained until the pool finishes, so
                // this send cannot fail.
                let _ = sender.send(result);
            });
    });

    let mut records = Vec::with_capacity(filepaths.len());
    for result in receiver {
        records.push(result?);
    }
    Ok(records)
}

/// Run every task on the calling thread, in file-list order.
pub fn dispatch_sequential<S: Surface>(
    filepaths: &[PathBuf],
    operations: &[Operation],
    parameters: &[Parameter],
    tracker: &ProgressTracker,
) -> BatchResult<Vec<TaskRecord>> {
    debug!("processing {} tasks sequentially", filepaths.len());
    let mut records = Vec::with_capacity(filepaths.len());
    for path in filepaths {
        let started = Instant::now();
        match run_task::<S>(path, operations, parameters) {
            Ok(record) => {
                tracker.task_completed(&record.file, started.elapsed().as_millis() as u64);
                records.push(record);
            }
            Err(error) => {
                tracker.report_error(
                    path.file_name().map(|n| n.to_string_lossy()).as_deref(),
                    error.to_string(),
                );
                return Err(error);
            }
        }
    }
    Ok(records)
}

/// Dispatch in the requested mode.
pub fn dispatch<S: Surface>(
    filepaths: &[PathBuf],
    operations: &[Operation],
    parameters: &[Parameter],
    parallel: bool,
    max_threads: usize,
    tracker: &ProgressTracker,
) -> BatchResult<Vec<TaskRecord>> {
    tracker.start();
    let records = if parallel {
        dispatch_parallel::<S>(filepaths, operations, parameters, max_threads, tracker)
    } else {
        dispatch_sequential::<S>(filepaths, operations, parameters, tracker)
    };
    if records.is_ok() {
        tracker.complete();
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BatchError;
    use crate::surface::Heightmap;
    use std::io::Write;
    use std::path::Path;

    fn write_grid(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        path
    }

    fn fixture(dir: &Path) -> Vec<PathBuf> {
        vec![
            write_grid(dir, "a.asc", &["0 0", "0 4"]),
            write_grid(dir, "b.asc", &["1 1", "1 1"]),
            write_grid(dir, "c.asc", &["0 2", "4 6"]),
        ]
    }

    fn sorted_by_file(mut records: Vec<TaskRecord>) -> Vec<TaskRecord> {
        records.sort_by(|a, b| a.file.cmp(&b.file));
        records
    }

    #[test]
    fn test_sequential_preserves_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        let tracker = ProgressTracker::new(paths.len());
        let records =
            dispatch_sequential::<Heightmap>(&paths, &[], &[Parameter::new("Sa")], &tracker)
                .unwrap();
        let files: Vec<_> = records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["a.asc", "b.asc", "c.asc"]);
    }

    #[test]
    fn test_parallel_and_sequential_agree_up_to_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        let params = [Parameter::new("Sa"), Parameter::new("Sq")];

        let tracker = ProgressTracker::new(paths.len());
        let sequential =
            dispatch_sequential::<Heightmap>(&paths, &[], &params, &tracker).unwrap();
        let parallel =
            dispatch_parallel::<Heightmap>(&paths, &[], &params, 0, &tracker).unwrap();

        assert_eq!(sorted_by_file(sequential), sorted_by_file(parallel));
    }

    #[test]
    fn test_parallel_failure_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = fixture(dir.path());
        paths.push(dir.path().join("missing.asc"));

        let tracker = ProgressTracker::new(paths.len());
        let err =
            dispatch_parallel::<Heightmap>(&paths, &[], &[Parameter::new("Sa")], 2, &tracker)
                .unwrap_err();
        assert!(matches!(err, BatchError::Load(_)));
    }

    #[test]
    fn test_sequential_failure_stops_at_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_grid(dir.path(), "bad.asc", &["0 1", "oops"]);
        let good = write_grid(dir.path(), "good.asc", &["0 1", "2 3"]);

        let tracker = ProgressTracker::new(2);
        let err = dispatch_sequential::<Heightmap>(
            &[bad, good],
            &[],
            &[Parameter::new("Sa")],
            &tracker,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Load(_)));
    }
}
