//! Sample and deterministic sites handed to an external inference engine.
//!
//! Sample sites are drawn from their priors. Deterministic sites are pure
//! functions of already-resolved names and must be evaluated after their
//! dependencies; [`Site::deterministic_order`] gives one valid order.

use crate::analysis::topology;
use crate::graph::parameter::Prior;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Pure function over the values of a deterministic site's dependencies,
/// in declaration order.
pub type Combinator = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SiteError {
    #[error("no value for site '{0}'")]
    MissingValue(String),
    #[error("deterministic sites form a cycle through '{0}'")]
    Cycle(String),
}

#[derive(Clone)]
pub struct DeterministicSite {
    pub dependencies: Vec<String>,
    pub combinator: Combinator,
}

impl DeterministicSite {
    pub fn new(dependencies: Vec<String>, combinator: Combinator) -> Self {
        Self { dependencies, combinator }
    }

    /// Applies the combinator to dependency values given in declaration order.
    pub fn evaluate(&self, args: &[f64]) -> f64 {
        (self.combinator)(args)
    }
}

impl fmt::Debug for DeterministicSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeterministicSite")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Site {
    pub sample: IndexMap<String, Prior>,
    pub deterministic: IndexMap<String, DeterministicSite>,
}

impl Site {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool {
        self.sample.is_empty() && self.deterministic.is_empty()
    }

    /// Merges `other` into `self`; entries of `other` win on key collision.
    pub fn merge(&mut self, other: Site) {
        self.sample.extend(other.sample);
        self.deterministic.extend(other.deterministic);
    }

    /// Deterministic site names ordered so that every site follows the
    /// deterministic sites it depends on.
    pub fn deterministic_order(&self) -> Result<Vec<String>, SiteError> {
        topology::deterministic_order(self)
    }

    /// Resolves every site from values for the sample sites.
    ///
    /// Fixed-value sample sites may be omitted from `samples`. The returned
    /// map holds sample sites first, then deterministic ones in evaluation
    /// order.
    pub fn replay(&self, samples: &IndexMap<String, f64>) -> Result<IndexMap<String, f64>, SiteError> {
        topology::replay(self, samples)
    }
}
