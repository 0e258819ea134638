//! Build cache keyed on filesystem modification times.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::descriptor::ModelDescriptor;
use crate::error::Result;
use crate::generate::CodeGenerator;

use super::paths::artifact_path;
use super::toolchain::Toolchain;

/// Decides whether a model's artifact needs rebuilding and orchestrates the
/// rebuild when it does.
///
/// The scratch directory is injected rather than global. Within one cache
/// builds for the same model are strictly sequential; independent processes
/// sharing a scratch directory are not coordinated and race last-writer-wins.
/// Callers needing multi-process safety must add external locking.
#[derive(Debug, Clone)]
pub struct BuildCache {
    scratch_dir: PathBuf,
    toolchain: Toolchain,
}

impl BuildCache {
    pub fn new(scratch_dir: impl Into<PathBuf>, toolchain: Toolchain) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            toolchain,
        }
    }

    /// Cache rooted in the system temp directory, matching the usual
    /// process-wide scratch convention.
    pub fn in_system_temp(toolchain: Toolchain) -> Self {
        Self::new(std::env::temp_dir(), toolchain)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Resolved artifact path for `model`, whether or not it exists yet.
    pub fn artifact_path(&self, model: &ModelDescriptor) -> PathBuf {
        artifact_path(&self.scratch_dir, &model.filename)
    }

    /// Return the artifact path, rebuilding first when the artifact is
    /// missing or older than any contributing source file.
    ///
    /// Contributing files are the generated source's dependencies plus the
    /// model's own defining file. A failed compile surfaces as an error
    /// without touching any existing artifact. The uniquely-named temp
    /// source is retained either way, so builds stay inspectable.
    pub fn ensure_built(
        &self,
        model: &ModelDescriptor,
        generator: &dyn CodeGenerator,
    ) -> Result<PathBuf> {
        let generated = generator.generate(model)?;
        let mut contributing = generated.dependencies.clone();
        contributing.push(model.filename.clone());
        let newest = newest_mtime(&contributing)?;

        let artifact = self.artifact_path(model);
        if is_stale(&artifact, newest) {
            self.build(model, &generated.text, &artifact)?;
        } else {
            tracing::debug!(artifact = %artifact.display(), "artifact up to date");
        }
        Ok(artifact)
    }

    fn build(&self, model: &ModelDescriptor, source: &str, artifact: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("sas_{}_", model.name))
            .suffix(".c")
            .tempfile_in(&self.scratch_dir)?;
        tmp.write_all(source.as_bytes())?;
        let (_file, source_path) = tmp.keep().map_err(|e| e.error)?;

        match self.toolchain.compile(&source_path, artifact) {
            Ok(()) => {
                tracing::info!(
                    model = %model.name,
                    artifact = %artifact.display(),
                    source = %source_path.display(),
                    "kernel built"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    model = %model.name,
                    source = %source_path.display(),
                    "compile failed; generated source retained"
                );
                Err(e)
            }
        }
    }
}

fn newest_mtime(files: &[PathBuf]) -> Result<SystemTime> {
    let mut newest = SystemTime::UNIX_EPOCH;
    for file in files {
        let mtime = std::fs::metadata(file)?.modified()?;
        if mtime > newest {
            newest = mtime;
        }
    }
    Ok(newest)
}

fn is_stale(artifact: &Path, newest: SystemTime) -> bool {
    match std::fs::metadata(artifact).and_then(|m| m.modified()) {
        Ok(built) => built < newest,
        // Missing or unreadable artifact: build it.
        Err(_) => true,
    }
}
