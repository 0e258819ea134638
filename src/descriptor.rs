//! Model metadata and the parameter taxonomy that fixes native argument order.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::kernel::{ScalarForm1d, ScalarForm2d};

/// Per-model, per-dimensionality partition of parameters into fixed and
/// polydisperse ordered lists.
///
/// Order is call-significant: the generated kernel declares its trailing
/// arguments in exactly this order, so reordering a list silently breaks the
/// native calling convention.
#[derive(Debug, Clone, Default)]
pub struct ParameterTaxonomy {
    pub fixed_1d: Vec<Arc<str>>,
    pub fixed_2d: Vec<Arc<str>>,
    pub pd_1d: Vec<Arc<str>>,
    pub pd_2d: Vec<Arc<str>>,
}

impl ParameterTaxonomy {
    /// The view for one dimensionality, as the native signature sees it.
    pub fn slice(&self, is_2d: bool) -> TaxonomySlice<'_> {
        if is_2d {
            TaxonomySlice {
                fixed: &self.fixed_2d,
                pd: &self.pd_2d,
            }
        } else {
            TaxonomySlice {
                fixed: &self.fixed_1d,
                pd: &self.pd_1d,
            }
        }
    }
}

/// One dimensionality's parameter lists. Determines the count and order of
/// the trailing argument slots of the corresponding entry point.
#[derive(Debug, Clone, Copy)]
pub struct TaxonomySlice<'a> {
    pub fixed: &'a [Arc<str>],
    pub pd: &'a [Arc<str>],
}

impl TaxonomySlice<'_> {
    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }

    pub fn pd_count(&self) -> usize {
        self.pd.len()
    }
}

/// Immutable metadata for one physical model.
///
/// Created once per model load and shared read-only by every kernel derived
/// from it. The defining `filename` names the artifact (via its stem) and
/// participates in staleness checks alongside the generated source's
/// dependencies.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub name: Arc<str>,
    /// The model's own defining file.
    pub filename: PathBuf,
    pub taxonomy: ParameterTaxonomy,
    /// Interpreted 1-D implementation, when the model declares one.
    pub iq: Option<Arc<dyn ScalarForm1d>>,
    /// Interpreted 2-D implementation, when the model declares one.
    pub iqxy: Option<Arc<dyn ScalarForm2d>>,
}

impl ModelDescriptor {
    pub fn new(
        name: impl Into<Arc<str>>,
        filename: impl Into<PathBuf>,
        taxonomy: ParameterTaxonomy,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            taxonomy,
            iq: None,
            iqxy: None,
        }
    }

    /// Declare an interpreted 1-D implementation. Models with one bind to it
    /// instead of native code.
    pub fn with_iq(mut self, form: Arc<dyn ScalarForm1d>) -> Self {
        self.iq = Some(form);
        self
    }

    /// Declare an interpreted 2-D implementation.
    pub fn with_iqxy(mut self, form: Arc<dyn ScalarForm2d>) -> Self {
        self.iqxy = Some(form);
        self
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("taxonomy", &self.taxonomy)
            .field("iq", &self.iq.is_some())
            .field("iqxy", &self.iqxy.is_some())
            .finish()
    }
}
