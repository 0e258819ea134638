//! Model wrapper tying cached artifacts, lazy loading, and kernel binding.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::build::BuildCache;
use crate::descriptor::ModelDescriptor;
use crate::error::{KernelError, Result};
use crate::generate::CodeGenerator;
use crate::input::{DType, EvaluationInput};
use crate::kernel::{InterpretedKernel, Kernel, NativeKernel};
use crate::native::NativeModule;

/// One compiled (or compilable) model.
///
/// Construction does not load the artifact; the first bind that needs native
/// execution does. Models declaring interpreted implementations bind those
/// transparently instead, without loading anything. After `release()` no new
/// kernels can be bound.
#[derive(Debug)]
pub struct NativeModel {
    descriptor: Arc<ModelDescriptor>,
    artifact: PathBuf,
    module: Option<Arc<NativeModule>>,
    released: bool,
}

impl NativeModel {
    /// Ensure the model's artifact is built (rebuilding when stale) and wrap
    /// it. Compiled artifacts are always double precision.
    pub fn load(
        cache: &BuildCache,
        descriptor: Arc<ModelDescriptor>,
        generator: &dyn CodeGenerator,
    ) -> Result<Self> {
        let artifact = cache.ensure_built(&descriptor, generator)?;
        Ok(Self::from_artifact(artifact, descriptor))
    }

    /// Wrap an already-built artifact without consulting the cache.
    pub fn from_artifact(artifact: impl Into<PathBuf>, descriptor: Arc<ModelDescriptor>) -> Self {
        Self {
            descriptor,
            artifact: artifact.into(),
            module: None,
            released: false,
        }
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Evaluation input for this model. Double precision, matching what the
    /// compiled artifacts expect.
    pub fn make_input(&self, q_vectors: &[Vec<f64>]) -> Result<EvaluationInput> {
        EvaluationInput::new(q_vectors, DType::F64)
    }

    /// Bind a kernel to `input`.
    ///
    /// A model-declared interpreted implementation for the input's
    /// dimensionality wins over native execution; otherwise the artifact is
    /// loaded on first use and a native kernel returned.
    pub fn bind(&mut self, input: Arc<EvaluationInput>) -> Result<Box<dyn Kernel>> {
        if self.released {
            return Err(KernelError::UseAfterRelease);
        }

        if input.is_2d() {
            if let Some(form) = &self.descriptor.iqxy {
                tracing::debug!(model = %self.descriptor.name, "binding interpreted 2-D kernel");
                return Ok(Box::new(InterpretedKernel::new_2d(
                    form.clone(),
                    self.descriptor.clone(),
                    input,
                )));
            }
        } else if let Some(form) = &self.descriptor.iq {
            tracing::debug!(model = %self.descriptor.name, "binding interpreted 1-D kernel");
            return Ok(Box::new(InterpretedKernel::new_1d(
                form.clone(),
                self.descriptor.clone(),
                input,
            )));
        }

        let module = match &self.module {
            Some(module) => module.clone(),
            None => {
                let module = Arc::new(NativeModule::load(&self.artifact, &self.descriptor)?);
                self.module = Some(module.clone());
                module
            }
        };
        Ok(Box::new(NativeKernel::new(
            module,
            self.descriptor.clone(),
            input,
        )?))
    }

    /// Drop the loaded module. Kernels already bound stay valid through
    /// shared ownership; new binds are an error. Idempotent.
    pub fn release(&mut self) {
        self.module = None;
        self.released = true;
    }
}
