//! Tests for path resolution, toolchain templates, and cache staleness.

use std::path::PathBuf;
use std::sync::Arc;

use crate::descriptor::{ModelDescriptor, ParameterTaxonomy};
use crate::error::KernelError;
use crate::generate::{CodeGenerator, GeneratedSource};

use super::{BuildCache, CompileTemplate, Platform, Toolchain, ToolchainConfig};

struct FixedSource {
    text: String,
    dependencies: Vec<PathBuf>,
}

impl CodeGenerator for FixedSource {
    fn generate(&self, _model: &ModelDescriptor) -> crate::Result<GeneratedSource> {
        Ok(GeneratedSource {
            text: self.text.clone(),
            dependencies: self.dependencies.clone(),
        })
    }
}

fn test_model(filename: &std::path::Path) -> ModelDescriptor {
    ModelDescriptor::new(
        "probe",
        filename,
        ParameterTaxonomy {
            fixed_1d: vec![Arc::from("scale"), Arc::from("background")],
            ..Default::default()
        },
    )
}

#[test]
fn test_template_render_substitutes_placeholders() {
    let template = CompileTemplate::new(["cc", "-shared", "{source}", "-o", "{output}"]);
    let argv = template.render(
        std::path::Path::new("/tmp/a.c"),
        std::path::Path::new("/tmp/a.so"),
    );
    assert_eq!(argv, vec!["cc", "-shared", "/tmp/a.c", "-o", "/tmp/a.so"]);
}

#[test]
fn test_config_override_and_builtin_fallback() {
    let config = ToolchainConfig::from_toml_str(
        r#"
        [templates.unix]
        argv = ["clang", "-shared", "{source}", "-o", "{output}"]
    "#,
    )
    .unwrap();
    assert_eq!(config.template(Platform::Unix).argv[0], "clang");
    // Platforms without an override fall back to the built-in command line.
    assert_eq!(config.template(Platform::MacOs).argv[0], "gcc");
}

#[test]
fn test_spawn_failure_is_structured() {
    let toolchain = Toolchain::with_template(CompileTemplate::new([
        "saskern-no-such-compiler",
        "{source}",
        "{output}",
    ]));
    let err = toolchain
        .compile(
            std::path::Path::new("/tmp/a.c"),
            std::path::Path::new("/tmp/a.so"),
        )
        .unwrap_err();
    assert!(matches!(err, KernelError::CompilerSpawn { .. }));
}

#[cfg(unix)]
mod unix {
    use super::*;

    /// Fake compiler: appends one line to `log` per invocation and creates
    /// the output file, standing in for a real toolchain.
    fn counting_toolchain(log: &std::path::Path) -> Toolchain {
        Toolchain::with_template(CompileTemplate::new([
            "sh".to_string(),
            "-c".to_string(),
            format!("echo compiled >> {} && : > {{output}}", log.display()),
        ]))
    }

    fn failing_toolchain(log: &std::path::Path) -> Toolchain {
        Toolchain::with_template(CompileTemplate::new([
            "sh".to_string(),
            "-c".to_string(),
            format!("echo failed >> {}; exit 1", log.display()),
        ]))
    }

    fn compile_count(log: &std::path::Path) -> usize {
        std::fs::read_to_string(log).map(|s| s.lines().count()).unwrap_or(0)
    }

    #[test]
    fn test_second_ensure_built_is_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let model_file = dir.path().join("probe.c");
        std::fs::write(&model_file, "// model\n").unwrap();
        let log = dir.path().join("compiles.log");

        let cache = BuildCache::new(dir.path(), counting_toolchain(&log));
        let model = test_model(&model_file);
        let generator = FixedSource {
            text: "void probe(void) {}\n".into(),
            dependencies: vec![],
        };

        let artifact = cache.ensure_built(&model, &generator).unwrap();
        assert!(artifact.exists());
        assert_eq!(compile_count(&log), 1);

        let again = cache.ensure_built(&model, &generator).unwrap();
        assert_eq!(again, artifact);
        assert_eq!(compile_count(&log), 1);
    }

    fn retained_sources(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.starts_with("sas_probe_") && name.ends_with(".c")
            })
            .count()
    }

    #[test]
    fn test_successful_build_retains_generated_source() {
        let dir = tempfile::tempdir().unwrap();
        let model_file = dir.path().join("probe.c");
        std::fs::write(&model_file, "// model\n").unwrap();
        let log = dir.path().join("compiles.log");

        let cache = BuildCache::new(dir.path(), counting_toolchain(&log));
        let model = test_model(&model_file);
        let generator = FixedSource {
            text: "void probe(void) {}\n".into(),
            dependencies: vec![],
        };

        cache.ensure_built(&model, &generator).unwrap();
        assert_eq!(retained_sources(dir.path()), 1);
    }

    #[test]
    fn test_touched_source_triggers_exactly_one_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let model_file = dir.path().join("probe.c");
        std::fs::write(&model_file, "// model\n").unwrap();
        let dep_file = dir.path().join("lib.c");
        std::fs::write(&dep_file, "// dep\n").unwrap();
        let log = dir.path().join("compiles.log");

        let cache = BuildCache::new(dir.path(), counting_toolchain(&log));
        let model = test_model(&model_file);
        let generator = FixedSource {
            text: "void probe(void) {}\n".into(),
            dependencies: vec![dep_file.clone()],
        };

        cache.ensure_built(&model, &generator).unwrap();
        assert_eq!(compile_count(&log), 1);

        // Coarse-mtime filesystems resolve to whole seconds.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        std::fs::write(&dep_file, "// dep touched\n").unwrap();

        cache.ensure_built(&model, &generator).unwrap();
        assert_eq!(compile_count(&log), 2);
        cache.ensure_built(&model, &generator).unwrap();
        assert_eq!(compile_count(&log), 2);
    }

    #[test]
    fn test_failed_build_retains_source_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let model_file = dir.path().join("probe.c");
        std::fs::write(&model_file, "// model\n").unwrap();
        let log = dir.path().join("compiles.log");

        let cache = BuildCache::new(dir.path(), failing_toolchain(&log));
        let model = test_model(&model_file);
        let generator = FixedSource {
            text: "this will not compile\n".into(),
            dependencies: vec![],
        };

        let err = cache.ensure_built(&model, &generator).unwrap_err();
        assert!(matches!(err, KernelError::CompileFailed { .. }));
        assert!(!cache.artifact_path(&model).exists());

        // The generated source stays on disk for inspection.
        assert!(retained_sources(dir.path()) >= 1);

        // No artifact exists, so the next call attempts the build again.
        let err = cache.ensure_built(&model, &generator).unwrap_err();
        assert!(matches!(err, KernelError::CompileFailed { .. }));
        assert_eq!(compile_count(&log), 2);
    }
}
