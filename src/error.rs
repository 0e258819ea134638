//! Error types for saskern.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Main error type for kernel building, loading, and invocation.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The compiler process could not be started at all.
    #[error("failed to launch compiler `{command}`: {source}")]
    CompilerSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran but exited non-zero. The generated source file is
    /// retained at `source_path` for inspection.
    #[error("compile exited with {status} (source retained at {source_path}): {stderr}")]
    CompileFailed {
        status: ExitStatus,
        source_path: PathBuf,
        stderr: String,
    },

    /// The artifact could not be loaded into the process.
    #[error("failed to load kernel artifact {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The artifact does not export an expected entry point: it does not
    /// implement this model.
    #[error("artifact {path} does not export entry point `{symbol}`")]
    MissingSymbol { path: PathBuf, symbol: String },

    /// Trampoline code generation failed.
    #[error("call trampoline codegen failed: {0}")]
    Codegen(String),

    /// Call parameters disagree with the model's parameter taxonomy.
    #[error("{what}: expected {expected}, got {actual}")]
    ArityMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A kernel or model was used after `release()`.
    #[error("kernel invoked after release")]
    UseAfterRelease,

    /// Malformed evaluation input.
    #[error("invalid evaluation input: {0}")]
    InvalidInput(String),

    /// Toolchain configuration could not be parsed.
    #[error("toolchain config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for saskern operations.
pub type Result<T> = std::result::Result<T, KernelError>;
