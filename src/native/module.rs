//! Loaded artifact handle with typed, pre-resolved entry points.

use std::path::{Path, PathBuf};

use libloading::Library;

use crate::descriptor::ModelDescriptor;
use crate::error::{KernelError, Result};
use crate::generate::kernel_name;

/// One resolved evaluation entry point together with its fixed leading
/// argument shape, validated once at load time and never re-resolved.
#[derive(Debug)]
pub struct EntryPoint {
    ptr: *const u8,
    pub symbol: String,
    pub coord_vectors: usize,
    pub fixed_count: usize,
    pub pd_count: usize,
}

impl EntryPoint {
    pub(crate) fn ptr(&self) -> *const u8 {
        self.ptr
    }
}

/// A model's artifact loaded into the process address space.
///
/// Owns the library and both resolved entry points (1-D and 2-D). The handle
/// is exclusively owned by one model wrapper; kernels keep it alive through
/// shared ownership so a released model cannot unload code still in use.
#[derive(Debug)]
pub struct NativeModule {
    _library: Library,
    path: PathBuf,
    iq: EntryPoint,
    iqxy: EntryPoint,
}

// SAFETY: the entry point addresses stay valid while the owned Library is
// loaded, and calling them mutates no state shared across threads beyond the
// buffers each call is handed.
unsafe impl Send for NativeModule {}
unsafe impl Sync for NativeModule {}

impl NativeModule {
    /// Load `path` and resolve both entry points against the model's
    /// taxonomy. A missing symbol means the artifact does not implement this
    /// model and is fatal for the model instance.
    pub fn load(path: &Path, model: &ModelDescriptor) -> Result<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| KernelError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let iq = resolve(&library, path, model, false)?;
        let iqxy = resolve(&library, path, model, true)?;
        tracing::debug!(artifact = %path.display(), model = %model.name, "kernel artifact loaded");
        Ok(Self {
            _library: library,
            path: path.to_path_buf(),
            iq,
            iqxy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, is_2d: bool) -> &EntryPoint {
        if is_2d {
            &self.iqxy
        } else {
            &self.iq
        }
    }
}

fn resolve(
    library: &Library,
    path: &Path,
    model: &ModelDescriptor,
    is_2d: bool,
) -> Result<EntryPoint> {
    let symbol = kernel_name(model, is_2d);
    let ptr = unsafe { library.get::<*const u8>(symbol.as_bytes()) }.map_err(|_| {
        KernelError::MissingSymbol {
            path: path.to_path_buf(),
            symbol: symbol.clone(),
        }
    })?;
    let slice = model.taxonomy.slice(is_2d);
    Ok(EntryPoint {
        ptr: *ptr,
        symbol,
        coord_vectors: if is_2d { 2 } else { 1 },
        fixed_count: slice.fixed_count(),
        pd_count: slice.pd_count(),
    })
}
