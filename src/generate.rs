//! Code-generation collaborator seam.
//!
//! Rendering a model's math into C source is out of scope; this module only
//! fixes the interface the build cache consumes and the deterministic entry
//! point naming the module loader resolves against.

use std::path::PathBuf;

use crate::descriptor::ModelDescriptor;
use crate::error::Result;

/// A model's full generated source text plus the files it was derived from.
///
/// The dependency list feeds staleness detection: the artifact is rebuilt
/// whenever any listed file (or the model's own defining file) is newer than
/// the artifact.
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    pub text: String,
    pub dependencies: Vec<PathBuf>,
}

/// Renders a model descriptor into compilable source.
///
/// Treated as an opaque pure function: the same descriptor must always yield
/// the same text and dependency list.
pub trait CodeGenerator {
    fn generate(&self, model: &ModelDescriptor) -> Result<GeneratedSource>;
}

/// Exported symbol name of a model's evaluation entry point.
///
/// Both the code generator and the module loader derive names through here,
/// so the two can never disagree.
pub fn kernel_name(model: &ModelDescriptor, is_2d: bool) -> String {
    if is_2d {
        format!("{}_Iqxy", model.name)
    } else {
        format!("{}_Iq", model.name)
    }
}
