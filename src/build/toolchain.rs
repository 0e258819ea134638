//! External compiler invocation with platform-selected command templates.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Build-platform identity used to select a compile template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    MacOs,
    /// Windows with a native MSVC environment prepared (vcvarsall ran, so
    /// `VCINSTALLDIR` is set).
    WindowsMsvc,
    Windows,
    Unix,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            if std::env::var_os("VCINSTALLDIR").is_some() {
                Platform::WindowsMsvc
            } else {
                Platform::Windows
            }
        } else {
            Platform::Unix
        }
    }
}

/// One compiler command line. Each element may contain the `{source}` and
/// `{output}` placeholders, substituted at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileTemplate {
    pub argv: Vec<String>,
}

impl CompileTemplate {
    pub fn new(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn render(&self, source: &Path, output: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace("{source}", &source).replace("{output}", &output))
            .collect()
    }

    fn builtin(platform: Platform) -> Self {
        match platform {
            Platform::MacOs => CompileTemplate::new([
                "gcc", "-shared", "-fPIC", "-std=c99", "-O2", "-Wall", "{source}", "-o",
                "{output}", "-lm",
            ]),
            Platform::WindowsMsvc => CompileTemplate::new([
                "cl",
                "/nologo",
                "/Ox",
                "/MD",
                "/W3",
                "/GS-",
                "/DNDEBUG",
                "/Tp{source}",
                "/openmp",
                "/link",
                "/DLL",
                "/INCREMENTAL:NO",
                "/MANIFEST",
                "/OUT:{output}",
            ]),
            Platform::Windows => CompileTemplate::new([
                "gcc", "-shared", "-fPIC", "-std=c99", "-O2", "-Wall", "{source}", "-o",
                "{output}", "-lm",
            ]),
            Platform::Unix => CompileTemplate::new([
                "cc", "-shared", "-fPIC", "-std=c99", "-fopenmp", "-O2", "-Wall", "{source}",
                "-o", "{output}", "-lm",
            ]),
        }
    }
}

/// Template table, loadable from TOML so deployments can override the
/// built-in command lines without code changes.
///
/// ```
/// use saskern::ToolchainConfig;
///
/// let config = ToolchainConfig::from_toml_str(r#"
///     [templates.unix]
///     argv = ["clang", "-shared", "-fPIC", "-O2", "{source}", "-o", "{output}", "-lm"]
/// "#).unwrap();
/// assert!(config.templates.contains_key(&saskern::Platform::Unix));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub templates: HashMap<Platform, CompileTemplate>,
}

impl ToolchainConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The template for `platform`: a configured override when present,
    /// otherwise the built-in command line.
    pub fn template(&self, platform: Platform) -> CompileTemplate {
        self.templates
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| CompileTemplate::builtin(platform))
    }
}

/// Invokes one external compiler process per build.
#[derive(Debug, Clone)]
pub struct Toolchain {
    platform: Platform,
    template: CompileTemplate,
}

impl Toolchain {
    /// Toolchain for the detected platform with built-in templates.
    pub fn detect() -> Self {
        Self::from_config(&ToolchainConfig::default(), Platform::detect())
    }

    pub fn from_config(config: &ToolchainConfig, platform: Platform) -> Self {
        Self {
            platform,
            template: config.template(platform),
        }
    }

    /// Toolchain with an explicit command template.
    pub fn with_template(template: CompileTemplate) -> Self {
        Self {
            platform: Platform::detect(),
            template,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the compiler executable can be spawned at all. Useful for
    /// callers that want to fall back to interpreted evaluation up front.
    pub fn available(&self) -> bool {
        match self.template.argv.first() {
            Some(program) => Command::new(program).arg("--version").output().is_ok(),
            None => false,
        }
    }

    /// Compile `source` into the shared library at `output`.
    ///
    /// Blocks until the external process exits. Non-zero exit becomes
    /// [`KernelError::CompileFailed`] carrying the captured stderr; a process
    /// that cannot be spawned becomes [`KernelError::CompilerSpawn`]. The
    /// source file is never deleted here, so failed builds stay inspectable.
    pub fn compile(&self, source: &Path, output: &Path) -> Result<()> {
        let argv = self.template.render(source, output);
        let Some((program, args)) = argv.split_first() else {
            return Err(KernelError::CompilerSpawn {
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "empty compile template"),
            });
        };
        tracing::info!(command = %argv.join(" "), "compiling kernel");
        let out = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| KernelError::CompilerSpawn {
                command: argv.join(" "),
                source: e,
            })?;
        if out.status.success() {
            Ok(())
        } else {
            Err(KernelError::CompileFailed {
                status: out.status,
                source_path: source.to_path_buf(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            })
        }
    }
}
