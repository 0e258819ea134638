//! Artifact building: path resolution, external toolchain invocation, and the
//! mtime-keyed build cache.

mod cache;
mod paths;
mod toolchain;

#[cfg(test)]
mod tests;

pub use cache::BuildCache;
pub use paths::artifact_path;
pub use toolchain::{CompileTemplate, Platform, Toolchain, ToolchainConfig};
