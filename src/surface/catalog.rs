//! Parameter catalog: the published table of measurement capabilities.
//!
//! The catalog is the single lookup table the batch controller consults for
//! dynamic parameter registration and that parameter evaluation consults for
//! return labels. Keeping it explicit (instead of reflecting over methods)
//! means the set of valid identifiers is enumerable and the label metadata
//! travels with the identifier.

use indexmap::IndexMap;

/// Metadata describing one measurement parameter published by a data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Unique identifier, matching what callers register (e.g. `"Sa"`).
    pub identifier: &'static str,
    /// Ordered labels for a multi-valued result. Empty for scalar parameters.
    pub labels: &'static [&'static str],
    /// Short human-readable description.
    pub description: &'static str,
}

impl ParameterSpec {
    /// Describe a scalar parameter.
    pub const fn scalar(identifier: &'static str, description: &'static str) -> Self {
        Self {
            identifier,
            labels: &[],
            description,
        }
    }

    /// Describe a multi-valued parameter with one label per returned value.
    pub const fn multi(
        identifier: &'static str,
        labels: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        Self {
            identifier,
            labels,
            description,
        }
    }

    /// Whether this parameter returns more than one value.
    pub fn is_multi_valued(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// The enumerable set of measurement parameters a data object publishes.
///
/// The catalog maintains specs indexed by identifier in registration order.
/// It provides the lookups the batch controller needs: membership checks for
/// dynamic registration, label resolution for multi-valued results, and
/// iteration for bulk registration.
#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    entries: IndexMap<&'static str, ParameterSpec>,
}

impl ParameterCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Build a catalog from a list of specs. Later duplicates replace
    /// earlier ones.
    pub fn from_specs(specs: &[ParameterSpec]) -> Self {
        let mut catalog = Self::new();
        for spec in specs {
            catalog.register(*spec);
        }
        catalog
    }

    /// Register a parameter spec.
    pub fn register(&mut self, spec: ParameterSpec) {
        self.entries.insert(spec.identifier, spec);
    }

    /// Check if an identifier is published.
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Get the spec for an identifier.
    pub fn get(&self, identifier: &str) -> Option<&ParameterSpec> {
        self.entries.get(identifier)
    }

    /// All published identifiers in registration order.
    pub fn identifiers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// All specs in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.entries.values()
    }

    /// Number of published parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
