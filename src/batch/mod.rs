//! The batch controller: a fluent front end over dispatch and assembly.
//!
//! A [`Batch`] is built around a fixed list of measurement files. Builder
//! methods do no work — each one records a deferred call and returns the
//! controller again, so pipelines read as one chain:
//!
//! ```rust,no_run
//! use topobatch::batch::Batch;
//! use topobatch::surface::Heightmap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut batch = Batch::<Heightmap>::new(["scans/a.asc", "scans/b.asc"]);
//! batch.level().zoom(2.0);
//! batch.parameter("Sa")?.parameter("Sq")?;
//! let table = batch.execute(None)?;
//! # Ok(()) }
//! ```
//!
//! Calling [`Batch::execute`] replays the recorded calls against every file
//! (in parallel by default) and returns the assembled table.

pub mod assemble;
pub mod dispatch;
pub mod progress;
pub mod task;

pub use assemble::FILE_COLUMN;
pub use progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
pub use task::TaskRecord;

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::DataFrame;

use crate::core::call::{Operation, Parameter, ParameterRequest};
use crate::core::error::{BatchResult, CapabilityError, UsageError};
use crate::core::types::CallArgs;
use crate::surface::{Axis, FillMethod, FilterKind, OutlierMethod, Surface};

/// Options for one batch execution.
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Whether to fan tasks out across a worker pool.
    pub parallel: bool,
    /// Maximum number of worker threads (0 = available parallelism).
    pub max_threads: usize,
    /// Write the assembled table to this CSV path, replacing any existing
    /// file there.
    pub save_to: Option<PathBuf>,
    /// Progress callback.
    pub progress_callback: Option<Arc<ProgressCallback>>,
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("parallel", &self.parallel)
            .field("max_threads", &self.max_threads)
            .field("save_to", &self.save_to)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_threads: 0, // Use all available
            save_to: None,
            progress_callback: None,
        }
    }
}

impl ExecuteOptions {
    /// Create options with defaults (parallel, all cores, no export).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable parallel dispatch.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set maximum worker threads.
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    /// Export the assembled table to a CSV file.
    pub fn with_save_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_to = Some(path.into());
        self
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }
}

/// Batch controller for a fixed list of measurement files.
///
/// Operation methods (`zero`, `level`, `filter`, ...) append a deferred call
/// and return `&mut Self` for chaining. Measurement parameters are
/// registered by identifier through [`Batch::parameter`] /
/// [`Batch::parameter_with`] — any identifier the data object's catalog
/// publishes is accepted, anything else fails exactly like a missing
/// capability on the data object itself. Nothing touches the filesystem
/// until [`Batch::execute`].
#[derive(Debug)]
pub struct Batch<S: Surface> {
    filepaths: Vec<PathBuf>,
    operations: Vec<Operation>,
    parameters: Vec<Parameter>,
    additional_data: Option<DataFrame>,
    _surface: PhantomData<S>,
}

impl<S: Surface> Batch<S> {
    /// Create a batch over the given measurement files.
    pub fn new<I, P>(filepaths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            filepaths: filepaths.into_iter().map(Into::into).collect(),
            operations: Vec::new(),
            parameters: Vec::new(),
            additional_data: None,
            _surface: PhantomData,
        }
    }

    /// Attach a table of additional per-file data.
    ///
    /// The table must contain a `file` column holding filenames (name plus
    /// extension, no directory) matching the result table's `file` column;
    /// the assembled table is inner-joined with it on that key.
    pub fn additional_data(&mut self, table: DataFrame) -> Result<&mut Self, UsageError> {
        if table.column(FILE_COLUMN).is_err() {
            return Err(UsageError::MissingFileColumn {
                expected: FILE_COLUMN,
                found: table
                    .get_column_names()
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
            });
        }
        self.additional_data = Some(table);
        Ok(self)
    }

    /// Attach additional per-file data from a CSV file.
    pub fn additional_data_csv(&mut self, path: impl AsRef<Path>) -> BatchResult<&mut Self> {
        let table = assemble::read_metadata_csv(path.as_ref())?;
        self.additional_data(table).map_err(Into::into)
    }

    /// The files this batch will process.
    pub fn filepaths(&self) -> &[PathBuf] {
        &self.filepaths
    }

    /// The operations registered so far, in registration order.
    pub fn registered_operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The parameters registered so far, in registration order.
    pub fn registered_parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    // ========================================================================
    // Operation registration
    // ========================================================================

    fn push_operation(&mut self, operation: Operation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    /// Register a shift of the height origin to the lowest measured point.
    pub fn zero(&mut self) -> &mut Self {
        self.push_operation(Operation::new("zero"))
    }

    /// Register removal of the mean height.
    pub fn center(&mut self) -> &mut Self {
        self.push_operation(Operation::new("center"))
    }

    /// Register subtraction of the least-squares mean plane.
    pub fn level(&mut self) -> &mut Self {
        self.push_operation(Operation::new("level"))
    }

    /// Register discarding of points below a material-ratio threshold.
    pub fn threshold(&mut self, threshold: f64) -> &mut Self {
        self.push_operation(Operation::with_args(
            "threshold",
            CallArgs::new().kwarg("threshold", threshold),
        ))
    }

    /// Register outlier removal at `n` standard deviations from the center.
    pub fn remove_outliers(&mut self, n: f64, method: OutlierMethod) -> &mut Self {
        self.push_operation(Operation::with_args(
            "remove_outliers",
            CallArgs::new().kwarg("n", n).kwarg("method", method.as_str()),
        ))
    }

    /// Register filling of non-measured points.
    pub fn fill_nonmeasured(&mut self, method: FillMethod) -> &mut Self {
        self.push_operation(Operation::with_args(
            "fill_nonmeasured",
            CallArgs::new().kwarg("method", method.as_str()),
        ))
    }

    /// Register a spatial frequency filter. `cutoff2` applies to bandpass
    /// filtering only and must exceed `cutoff`.
    pub fn filter(&mut self, kind: FilterKind, cutoff: f64, cutoff2: Option<f64>) -> &mut Self {
        self.push_operation(Operation::with_args(
            "filter",
            CallArgs::new()
                .arg(kind.as_str())
                .arg(cutoff)
                .kwarg("cutoff2", cutoff2),
        ))
    }

    /// Register a rotation by the given angle in degrees.
    pub fn rotate(&mut self, angle: f64) -> &mut Self {
        self.push_operation(Operation::with_args(
            "rotate",
            CallArgs::new().arg(angle),
        ))
    }

    /// Register alignment of the surface texture with an axis.
    pub fn align(&mut self, axis: Axis) -> &mut Self {
        self.push_operation(Operation::with_args(
            "align",
            CallArgs::new().kwarg("axis", axis.as_str()),
        ))
    }

    /// Register magnification by cropping the central region.
    pub fn zoom(&mut self, factor: f64) -> &mut Self {
        self.push_operation(Operation::with_args(
            "zoom",
            CallArgs::new().arg(factor),
        ))
    }

    // ========================================================================
    // Parameter registration
    // ========================================================================

    /// Register a measurement parameter by identifier, with default
    /// arguments.
    ///
    /// The identifier must be published by the data object's catalog; an
    /// unknown name fails with the same error shape as a missing capability
    /// on the data object itself.
    pub fn parameter(&mut self, identifier: &str) -> Result<&mut Self, CapabilityError> {
        self.parameter_with(identifier, CallArgs::new())
    }

    /// Register a measurement parameter by identifier, with arguments.
    pub fn parameter_with(
        &mut self,
        identifier: &str,
        args: CallArgs,
    ) -> Result<&mut Self, CapabilityError> {
        if !S::parameters().contains(identifier) {
            return Err(CapabilityError::Unknown {
                identifier: identifier.to_string(),
            });
        }
        self.parameters.push(Parameter::with_args(identifier, args));
        Ok(self)
    }

    /// Register measurement parameters in bulk.
    ///
    /// With `None`, every parameter the catalog publishes is registered
    /// once, in catalog order, with default arguments. With an explicit
    /// list, bare identifiers are validated against the catalog and
    /// registered with default arguments, while fully specified
    /// [`Parameter`] records are registered as given — that is the hook for
    /// custom arguments on individual parameters.
    pub fn roughness_parameters(
        &mut self,
        requests: Option<Vec<ParameterRequest>>,
    ) -> Result<&mut Self, CapabilityError> {
        match requests {
            None => {
                for identifier in S::parameters().identifiers() {
                    self.parameters.push(Parameter::new(identifier));
                }
            }
            Some(requests) => {
                for request in requests {
                    match request {
                        ParameterRequest::Identifier(identifier) => {
                            self.parameter(&identifier)?;
                        }
                        ParameterRequest::Call(call) => {
                            self.parameters.push(call);
                        }
                    }
                }
            }
        }
        Ok(self)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute the batch and return the assembled table.
    ///
    /// Fails with a usage error before any file I/O when nothing was
    /// registered. Task failures abort the whole run; no partial table is
    /// ever returned.
    pub fn execute(&self, options: Option<ExecuteOptions>) -> BatchResult<DataFrame> {
        if self.operations.is_empty() && self.parameters.is_empty() {
            return Err(UsageError::NothingRegistered.into());
        }
        let options = options.unwrap_or_default();

        let mut tracker = ProgressTracker::new(self.filepaths.len());
        if let Some(callback) = &options.progress_callback {
            tracker = tracker.with_callback(callback.clone());
        }

        let records = dispatch::dispatch::<S>(
            &self.filepaths,
            &self.operations,
            &self.parameters,
            options.parallel,
            options.max_threads,
            &tracker,
        )?;

        let mut frame = assemble::assemble(records, self.additional_data.as_ref())?;
        if let Some(path) = &options.save_to {
            assemble::write_csv(&mut frame, path)?;
        }
        Ok(frame)
    }
}
