//! Deterministic artifact path resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Path of the compiled artifact for a model defined by `model_filename`,
/// rooted under `scratch_dir`.
///
/// Pure function of the defining filename: directory and extension are
/// stripped and the platform's shared-library suffix appended. Deterministic
/// naming is what lets the cache use plain mtime comparison instead of
/// content hashing.
pub fn artifact_path(scratch_dir: &Path, model_filename: &Path) -> PathBuf {
    let stem = model_filename.file_stem().unwrap_or(model_filename.as_os_str());
    let mut name = OsString::from(stem);
    name.push(std::env::consts::DLL_SUFFIX);
    scratch_dir.join(name)
}
