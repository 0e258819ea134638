//! Runtime-compiled small-angle scattering kernels.
//!
//! A model's generated C source is compiled into a shared library at
//! runtime, cached on disk keyed by source freshness, loaded lazily, and
//! invoked through an ABI-exact argument vector assembled from the model's
//! parameter taxonomy. Models that declare an in-process implementation bind
//! to an interpreted kernel with the same contract instead.
//!
//! The evaluation flow is: resolve an artifact path from the model identity,
//! rebuild via the external toolchain when any contributing source is newer
//! than the artifact, load and resolve the 1-D/2-D entry points once, then
//! bind kernels to coordinate sets and invoke them repeatedly with varying
//! parameters.
//!
//! ```no_run
//! use std::sync::Arc;
//! use saskern::{models, BuildCache, CallParams, NativeModel, PdGrid, Toolchain};
//!
//! # fn main() -> saskern::Result<()> {
//! let cache = BuildCache::in_system_temp(Toolchain::detect());
//! let descriptor = Arc::new(models::lorentz("models/lorentz.c"));
//! let mut model = NativeModel::load(&cache, descriptor, &models::LorentzGenerator)?;
//!
//! let input = Arc::new(model.make_input(&[vec![0.05, 0.1, 0.2]])?);
//! let mut kernel = model.bind(input)?;
//! let result = kernel.invoke(&CallParams {
//!     fixed: vec![1.0, 0.001],
//!     pd: vec![PdGrid::single(50.0)],
//!     cutoff: 1e-5,
//! })?;
//! println!("{:?}", result.to_f64());
//! kernel.release();
//! model.release();
//! # Ok(())
//! # }
//! ```

pub mod build;
mod descriptor;
mod error;
mod generate;
mod input;
mod kernel;
mod model;
pub mod models;
pub mod native;

pub use build::{artifact_path, BuildCache, CompileTemplate, Platform, Toolchain, ToolchainConfig};
pub use descriptor::{ModelDescriptor, ParameterTaxonomy, TaxonomySlice};
pub use error::{KernelError, Result};
pub use generate::{kernel_name, CodeGenerator, GeneratedSource};
pub use input::{CoordVec, DType, EvaluationInput};
pub use kernel::{
    CallParams, InterpretedKernel, Kernel, NativeKernel, PdGrid, ResultBuffer, ScalarForm1d,
    ScalarForm2d,
};
pub use model::NativeModel;
pub use native::{NativeModule, Trampoline};
