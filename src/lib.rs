//! # Topobatch - Batch Processing of Surface Topography
//!
//! Topobatch applies a deferred sequence of surface operations and
//! roughness-parameter computations to a collection of independent
//! measurement files, fans the work out across CPU cores, and assembles the
//! numeric results into one table.
//!
//! ## Features
//!
//! - **Deferred pipelines**: builder methods record calls instead of running
//!   them; the same recorded sequence is replayed against every file
//! - **Parallel dispatch**: one task per file on a worker pool, results
//!   collected as they complete; sequential mode for determinism
//! - **Open parameter set**: measurement parameters are addressed by
//!   identifier against the data object's published catalog, so the DSL
//!   covers parameters the controller has never heard of
//! - **Tabular results**: one row per file, inner-joined with optional
//!   per-file metadata, exportable to CSV
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use topobatch::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = ["scans/a.asc", "scans/b.asc", "scans/c.asc"];
//!
//! let mut batch = Batch::<Heightmap>::new(files);
//! batch
//!     .level()
//!     .filter(FilterKind::Lowpass, 5.0, None)
//!     .align(Axis::Y);
//! batch.parameter("Sa")?.parameter("Sq")?.parameter("Sz")?;
//!
//! let table = batch.execute(Some(
//!     ExecuteOptions::new().with_save_to("results.csv"),
//! ))?;
//! println!("{table}");
//! # Ok(()) }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into three modules:
//!
//! - [`core`]: deferred call records, argument values, and error types
//! - [`surface`]: the data-object seam ([`surface::Surface`]), the published
//!   parameter catalog, and the bundled [`surface::Heightmap`] reference
//!   implementation
//! - [`batch`]: the fluent controller, the per-file task, dispatch, progress
//!   tracking, and result assembly
//!
//! ## Driving Your Own Data Objects
//!
//! Implement [`surface::Surface`] to plug in a different file format or
//! parameter set. The batch machinery only ever sees the trait: named
//! in-place operations, named measurements, and a catalog declaring every
//! parameter identifier together with the return labels of multi-valued
//! results.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod core;
pub mod surface;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use topobatch::prelude::*;
/// ```
pub mod prelude {
    // Controller and execution
    pub use crate::batch::{Batch, ExecuteOptions, FILE_COLUMN};

    // Progress
    pub use crate::batch::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};

    // Deferred calls
    pub use crate::core::call::{Operation, Parameter, ParameterRequest};
    pub use crate::core::types::{CallArgs, Value};

    // Errors
    pub use crate::core::error::{
        BatchError, BatchResult, CapabilityError, LabelError, LoadError, UsageError,
    };

    // The data-object seam
    pub use crate::surface::{
        Axis, FillMethod, FilterKind, Heightmap, Measurement, OutlierMethod, ParameterCatalog,
        ParameterSpec, Surface,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "topobatch");
    }

    #[test]
    fn test_prelude_exposes_a_working_builder() {
        let mut batch = Batch::<Heightmap>::new(Vec::<std::path::PathBuf>::new());
        batch.level().align(Axis::Y);
        assert_eq!(batch.registered_operations().len(), 2);
    }
}
