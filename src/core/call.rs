//! Deferred call records.
//!
//! A batch run is described long before any file is opened: each builder
//! method on the controller appends one of these records instead of doing
//! work. The records are immutable once constructed and are replayed
//! read-only against every loaded data object, so the same identifier may
//! legally appear any number of times — replay preserves registration order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{BatchError, LabelError};
use crate::core::types::{CallArgs, Value};
use crate::surface::{Measurement, Surface};

/// A recorded call to an in-place operation on the data object.
///
/// Executing an operation mutates the target surface and produces no value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    identifier: String,
    args: CallArgs,
}

impl Operation {
    /// Record an operation with no arguments.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            args: CallArgs::new(),
        }
    }

    /// Record an operation with the given arguments.
    pub fn with_args(identifier: impl Into<String>, args: CallArgs) -> Self {
        Self {
            identifier: identifier.into(),
            args,
        }
    }

    /// The capability identifier this call targets.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The recorded arguments.
    pub fn args(&self) -> &CallArgs {
        &self.args
    }

    /// Replay this call against a loaded surface, mutating it in place.
    pub fn execute_on<S: Surface>(&self, surface: &mut S) -> Result<(), BatchError> {
        surface.apply(&self.identifier, &self.args)?;
        Ok(())
    }
}

/// A recorded call to a measurement parameter on the data object.
///
/// Evaluating a parameter produces one or more named result columns. A
/// scalar result is keyed by the identifier alone; a multi-valued result is
/// keyed `"{identifier}_{label}"` using the return labels the data object's
/// catalog publishes for that identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    identifier: String,
    args: CallArgs,
}

impl Parameter {
    /// Record a parameter call with default (empty) arguments.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            args: CallArgs::new(),
        }
    }

    /// Record a parameter call with the given arguments.
    pub fn with_args(identifier: impl Into<String>, args: CallArgs) -> Self {
        Self {
            identifier: identifier.into(),
            args,
        }
    }

    /// The capability identifier this call targets.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The recorded arguments.
    pub fn args(&self) -> &CallArgs {
        &self.args
    }

    /// Convenience: append a keyword argument to the recorded call.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args = self.args.kwarg(name, value);
        self
    }

    /// Evaluate this call against a surface and build its result columns.
    ///
    /// Multi-valued results require the catalog to publish exactly one label
    /// per returned value; anything else is a setup defect that aborts the
    /// whole batch.
    pub fn evaluate_on<S: Surface>(
        &self,
        surface: &S,
    ) -> Result<IndexMap<String, f64>, BatchError> {
        let mut columns = IndexMap::new();
        match surface.measure(&self.identifier, &self.args)? {
            Measurement::Scalar(value) => {
                columns.insert(self.identifier.clone(), value);
            }
            Measurement::Values(values) => {
                let labels = S::parameters()
                    .get(&self.identifier)
                    .map(|spec| spec.labels)
                    .unwrap_or(&[]);
                if labels.is_empty() {
                    return Err(LabelError::Missing {
                        identifier: self.identifier.clone(),
                        values: values.len(),
                    }
                    .into());
                }
                if labels.len() != values.len() {
                    return Err(LabelError::CountMismatch {
                        identifier: self.identifier.clone(),
                        labels: labels.len(),
                        values: values.len(),
                    }
                    .into());
                }
                for (label, value) in labels.iter().zip(values) {
                    columns.insert(format!("{}_{}", self.identifier, label), value);
                }
            }
        }
        Ok(columns)
    }
}

/// One entry of a bulk parameter registration: either a bare identifier to
/// be registered with default arguments, or a fully specified call.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterRequest {
    /// Register the identified parameter with default arguments.
    Identifier(String),
    /// Register this exact call, arguments included.
    Call(Parameter),
}

impl From<&str> for ParameterRequest {
    fn from(identifier: &str) -> Self {
        ParameterRequest::Identifier(identifier.to_string())
    }
}

impl From<String> for ParameterRequest {
    fn from(identifier: String) -> Self {
        ParameterRequest::Identifier(identifier)
    }
}

impl From<Parameter> for ParameterRequest {
    fn from(call: Parameter) -> Self {
        ParameterRequest::Call(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CapabilityError;
    use crate::core::error::LoadError;
    use crate::surface::{ParameterCatalog, ParameterSpec};
    use once_cell::sync::Lazy;
    use std::path::Path;

    /// Minimal surface whose catalog deliberately misdeclares some
    /// parameters, to exercise the label bookkeeping.
    struct Probe {
        offset: f64,
    }

    static PROBE_CATALOG: Lazy<ParameterCatalog> = Lazy::new(|| {
        ParameterCatalog::from_specs(&[
            ParameterSpec::scalar("offset", "current offset"),
            ParameterSpec::multi("pair", &["p", "q"], "two values, two labels"),
            ParameterSpec::scalar("bare_pair", "two values, no labels"),
            ParameterSpec::multi("short_pair", &["only"], "two values, one label"),
        ])
    });

    impl Surface for Probe {
        fn load(_path: &Path) -> Result<Self, LoadError> {
            Ok(Self { offset: 0.0 })
        }

        fn apply(&mut self, identifier: &str, args: &CallArgs) -> Result<(), CapabilityError> {
            match identifier {
                "shift" => {
                    self.offset += args.float_at(0).unwrap_or(1.0);
                    Ok(())
                }
                "double" => {
                    self.offset *= 2.0;
                    Ok(())
                }
                other => Err(CapabilityError::Unknown {
                    identifier: other.to_string(),
                }),
            }
        }

        fn measure(&self, identifier: &str, _args: &CallArgs) -> Result<Measurement, CapabilityError> {
            match identifier {
                "offset" => Ok(Measurement::Scalar(self.offset)),
                "pair" | "bare_pair" | "short_pair" => {
                    Ok(Measurement::Values(vec![self.offset, -self.offset]))
                }
                other => Err(CapabilityError::Unknown {
                    identifier: other.to_string(),
                }),
            }
        }

        fn parameters() -> &'static ParameterCatalog {
            &PROBE_CATALOG
        }
    }

    #[test]
    fn test_operation_replay_mutates_in_place() {
        let mut probe = Probe { offset: 1.0 };
        Operation::with_args("shift", CallArgs::new().arg(2.0))
            .execute_on(&mut probe)
            .unwrap();
        Operation::new("double").execute_on(&mut probe).unwrap();
        assert_eq!(probe.offset, 6.0);
    }

    #[test]
    fn test_operation_order_matters() {
        // shift-then-double and double-then-shift must diverge
        let mut a = Probe { offset: 1.0 };
        Operation::new("shift").execute_on(&mut a).unwrap();
        Operation::new("double").execute_on(&mut a).unwrap();

        let mut b = Probe { offset: 1.0 };
        Operation::new("double").execute_on(&mut b).unwrap();
        Operation::new("shift").execute_on(&mut b).unwrap();

        assert_eq!(a.offset, 4.0);
        assert_eq!(b.offset, 3.0);
    }

    #[test]
    fn test_scalar_result_keyed_by_identifier() {
        let probe = Probe { offset: 2.5 };
        let columns = Parameter::new("offset").evaluate_on(&probe).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns["offset"], 2.5);
    }

    #[test]
    fn test_multi_valued_result_keyed_by_labels() {
        let probe = Probe { offset: 1.5 };
        let columns = Parameter::new("pair").evaluate_on(&probe).unwrap();
        let keys: Vec<_> = columns.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["pair_p", "pair_q"]);
        assert_eq!(columns["pair_p"], 1.5);
        assert_eq!(columns["pair_q"], -1.5);
    }

    #[test]
    fn test_multi_valued_without_labels_is_fatal() {
        let probe = Probe { offset: 1.0 };
        let err = Parameter::new("bare_pair").evaluate_on(&probe).unwrap_err();
        assert!(matches!(err, BatchError::Labels(LabelError::Missing { .. })));
    }

    #[test]
    fn test_label_count_mismatch_is_fatal() {
        let probe = Probe { offset: 1.0 };
        let err = Parameter::new("short_pair").evaluate_on(&probe).unwrap_err();
        assert!(matches!(
            err,
            BatchError::Labels(LabelError::CountMismatch {
                labels: 1,
                values: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_capability_propagates() {
        let probe = Probe { offset: 1.0 };
        let err = Parameter::new("nonsense").evaluate_on(&probe).unwrap_err();
        assert!(matches!(
            err,
            BatchError::Capability(CapabilityError::Unknown { .. })
        ));
    }

    #[test]
    fn test_parameter_request_conversions() {
        assert_eq!(
            ParameterRequest::from("Sa"),
            ParameterRequest::Identifier("Sa".to_string())
        );
        let call = Parameter::new("Vmc").kwarg("p", 5.0).kwarg("q", 95.0);
        assert!(matches!(
            ParameterRequest::from(call),
            ParameterRequest::Call(_)
        ));
    }
}
