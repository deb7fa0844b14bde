//! The data-object seam: the `Surface` trait and its capability vocabulary.
//!
//! The batch machinery never manipulates topography data directly. It talks
//! to a data object through this trait: load a file, apply named in-place
//! operations, and measure named parameters. Everything else about the data
//! object — file formats, algorithms, units — stays behind the seam.

pub mod catalog;
pub mod heightmap;

pub use catalog::{ParameterCatalog, ParameterSpec};
pub use heightmap::Heightmap;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{CapabilityError, LoadError};
use crate::core::types::CallArgs;

/// The result of measuring one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// A single value, keyed by the parameter identifier alone.
    Scalar(f64),
    /// An ordered tuple of values, keyed by identifier + return label.
    Values(Vec<f64>),
}

/// A surface-topography data object that the batch harness can drive.
///
/// # Design
///
/// Capabilities are addressed by string identifier because the call sequence
/// is recorded long before any data object exists. Implementations dispatch
/// on the identifier and pull arguments out of [`CallArgs`]; an identifier
/// they do not recognize must fail with [`CapabilityError::Unknown`] so the
/// error shape matches what the batch controller raises for an unknown
/// parameter name.
///
/// Operations mutate the object through `&mut self`; there is no
/// copy-returning variant. Parameters observe the object through `&self`
/// and return a [`Measurement`].
///
/// The published parameter set must be enumerable via [`Surface::parameters`]
/// — the batch controller uses it for bulk registration, for validating
/// dynamically registered identifiers, and for resolving the return labels
/// of multi-valued results.
pub trait Surface: Sized {
    /// Load a data object from a measurement file.
    fn load(path: &Path) -> Result<Self, LoadError>;

    /// Apply a named in-place operation.
    fn apply(&mut self, identifier: &str, args: &CallArgs) -> Result<(), CapabilityError>;

    /// Measure a named parameter.
    fn measure(&self, identifier: &str, args: &CallArgs) -> Result<Measurement, CapabilityError>;

    /// The catalog of measurement parameters this data object publishes.
    fn parameters() -> &'static ParameterCatalog;
}

// ============================================================================
// Operation argument vocabulary
// ============================================================================

/// Axis selector for texture alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Horizontal axis.
    X,
    /// Vertical axis.
    Y,
}

impl Axis {
    /// Canonical string form, as stored in deferred-call arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

/// Spatial frequency filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Keep frequencies below the cutoff.
    Lowpass,
    /// Keep frequencies above the cutoff.
    Highpass,
    /// Keep frequencies between the two cutoffs.
    Bandpass,
}

impl FilterKind {
    /// Canonical string form, as stored in deferred-call arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Lowpass => "lowpass",
            FilterKind::Highpass => "highpass",
            FilterKind::Bandpass => "bandpass",
        }
    }
}

/// Center estimator used for outlier removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Distance from the mean, in standard deviations.
    Mean,
    /// Distance from the median, in standard deviations.
    Median,
}

impl OutlierMethod {
    /// Canonical string form, as stored in deferred-call arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierMethod::Mean => "mean",
            OutlierMethod::Median => "median",
        }
    }
}

/// Strategy for filling non-measured points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    /// Copy the nearest measured neighbour along the scan line.
    Nearest,
    /// Replace with the mean of all measured points.
    Mean,
}

impl FillMethod {
    /// Canonical string form, as stored in deferred-call arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            FillMethod::Nearest => "nearest",
            FillMethod::Mean => "mean",
        }
    }
}
