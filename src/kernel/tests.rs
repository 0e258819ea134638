//! Adapter contract tests: interpreted and native kernels behind the same
//! bind/invoke/release surface.

use std::sync::Arc;

use crate::build::{BuildCache, Toolchain};
use crate::error::KernelError;
use crate::model::NativeModel;
use crate::models::{lorentz, lorentz_interpreted, LorentzGenerator};

use super::{CallParams, PdGrid, ScalarForm1d};

fn lorentz_call(length: f64) -> CallParams {
    CallParams {
        fixed: vec![1.0, 0.0],
        pd: vec![PdGrid::single(length)],
        cutoff: 0.0,
    }
}

fn closed_form(q: f64, length: f64) -> f64 {
    let x = q * length;
    1.0 / (1.0 + x * x)
}

/// Interpreted model wrapper; no artifact is ever touched.
fn interpreted_model() -> NativeModel {
    NativeModel::from_artifact("unused.so", Arc::new(lorentz_interpreted("lorentz.c")))
}

// ---------------------------------------------------------------------------
// Interpreted path
// ---------------------------------------------------------------------------

#[test]
fn test_interpreted_zero_spread_matches_closed_form() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let out = kernel.invoke(&lorentz_call(50.0)).unwrap().to_f64();
    assert_eq!(out, vec![closed_form(0.2, 50.0)]);
}

#[test]
fn test_interpreted_weighted_grid() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.1, 0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let call = CallParams {
        fixed: vec![2.0, 0.25],
        pd: vec![PdGrid::new(vec![10.0, 30.0], vec![0.4, 0.6])],
        cutoff: 0.0,
    };
    let out = kernel.invoke(&call).unwrap().to_f64();

    for (i, &q) in [0.1, 0.2].iter().enumerate() {
        let mut ret = 0.0;
        let mut norm = 0.0;
        for (&v, &w) in [10.0, 30.0].iter().zip(&[0.4, 0.6]) {
            ret += w * closed_form(q, v);
            norm += w;
        }
        assert_eq!(out[i], 2.0 * ret / norm + 0.25);
    }
}

#[test]
fn test_interpreted_2d_depends_on_magnitude() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.2, 0.0], vec![0.0, 0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let out = kernel.invoke(&lorentz_call(50.0)).unwrap().to_f64();
    assert_eq!(out[0], out[1]);
    assert_eq!(out[0], closed_form(0.2, 50.0));
}

#[test]
fn test_cutoff_excludes_low_weights() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let call = CallParams {
        fixed: vec![1.0, 0.0],
        pd: vec![PdGrid::new(vec![50.0, 500.0], vec![1.0, 1e-12])],
        cutoff: 1e-6,
    };
    let out = kernel.invoke(&call).unwrap().to_f64();
    // Only the unit-weight point survives the cutoff, so normalization gives
    // the zero-spread result back.
    assert_eq!(out, vec![closed_form(0.2, 50.0)]);
}

/// Form that poisons one screening length with NaN.
struct NanAt500;

impl ScalarForm1d for NanAt500 {
    fn iq(&self, q: f64, pars: &[f64]) -> f64 {
        if pars[0] == 500.0 {
            f64::NAN
        } else {
            closed_form(q, pars[0])
        }
    }
}

#[test]
fn test_nan_evaluations_are_excluded_from_norm() {
    let descriptor = Arc::new(lorentz("lorentz.c").with_iq(Arc::new(NanAt500)));
    let mut model = NativeModel::from_artifact("unused.so", descriptor);
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let call = CallParams {
        fixed: vec![1.0, 0.0],
        pd: vec![PdGrid::new(vec![50.0, 500.0], vec![0.5, 0.5])],
        cutoff: 0.0,
    };
    let out = kernel.invoke(&call).unwrap().to_f64();
    assert_eq!(out, vec![closed_form(0.2, 50.0)]);
}

#[test]
fn test_invoke_is_deterministic() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.05, 0.1, 0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let call = CallParams {
        fixed: vec![1.5, 0.01],
        pd: vec![PdGrid::new(vec![40.0, 50.0, 60.0], vec![0.2, 0.5, 0.3])],
        cutoff: 1e-5,
    };
    let first = kernel.invoke(&call).unwrap().to_f64();
    let second = kernel.invoke(&call).unwrap().to_f64();
    assert_eq!(first, second);
}

#[test]
fn test_invoke_after_release_errors() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    kernel.release();
    kernel.release(); // idempotent
    assert!(matches!(
        kernel.invoke(&lorentz_call(50.0)).unwrap_err(),
        KernelError::UseAfterRelease
    ));
}

#[test]
fn test_bind_after_model_release_errors() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    model.release();
    model.release(); // idempotent
    assert!(matches!(
        model.bind(input).err().unwrap(),
        KernelError::UseAfterRelease
    ));
}

#[test]
fn test_interpreted_arity_mismatch() {
    let mut model = interpreted_model();
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let call = CallParams {
        fixed: vec![1.0], // missing background
        pd: vec![PdGrid::single(50.0)],
        cutoff: 0.0,
    };
    assert!(matches!(
        kernel.invoke(&call).unwrap_err(),
        KernelError::ArityMismatch { .. }
    ));
}

// ---------------------------------------------------------------------------
// Native path, end to end. Skipped when no C compiler is present.
// ---------------------------------------------------------------------------

fn native_lorentz(dir: &std::path::Path) -> Option<NativeModel> {
    let toolchain = Toolchain::detect();
    if !toolchain.available() {
        eprintln!("skipping: no C compiler available");
        return None;
    }
    let model_file = dir.join("lorentz.c");
    std::fs::write(&model_file, "// lorentz model definition\n").unwrap();
    let cache = BuildCache::new(dir, toolchain);
    let descriptor = Arc::new(lorentz(&model_file));
    Some(NativeModel::load(&cache, descriptor, &LorentzGenerator).unwrap())
}

#[test]
fn test_native_end_to_end_matches_closed_form() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut model) = native_lorentz(dir.path()) else {
        return;
    };
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();

    let out = kernel.invoke(&lorentz_call(50.0)).unwrap().to_f64();
    assert!((out[0] - closed_form(0.2, 50.0)).abs() < 1e-12);

    kernel.release();
    model.release();
}

#[test]
fn test_native_matches_interpreted() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut native) = native_lorentz(dir.path()) else {
        return;
    };
    let q = vec![0.05, 0.1, 0.2, 0.4];
    let call = CallParams {
        fixed: vec![1.5, 0.001],
        pd: vec![PdGrid::new(vec![40.0, 50.0, 60.0], vec![0.2, 0.5, 0.3])],
        cutoff: 1e-5,
    };

    let input = Arc::new(native.make_input(&[q.clone()]).unwrap());
    let mut native_kernel = native.bind(input.clone()).unwrap();
    let native_out = native_kernel.invoke(&call).unwrap().to_f64();

    let mut interpreted = interpreted_model();
    let mut interpreted_kernel = interpreted.bind(input).unwrap();
    let interpreted_out = interpreted_kernel.invoke(&call).unwrap().to_f64();

    for (n, i) in native_out.iter().zip(&interpreted_out) {
        assert!((n - i).abs() < 1e-12, "native {n} vs interpreted {i}");
    }
}

#[test]
fn test_native_2d_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut model) = native_lorentz(dir.path()) else {
        return;
    };
    let input = Arc::new(
        model
            .make_input(&[vec![0.2, 0.0], vec![0.0, 0.2]])
            .unwrap(),
    );
    let mut kernel = model.bind(input).unwrap();

    let out = kernel.invoke(&lorentz_call(50.0)).unwrap().to_f64();
    assert!((out[0] - closed_form(0.2, 50.0)).abs() < 1e-12);
    assert_eq!(out[0], out[1]);
}

#[test]
fn test_native_invoke_after_release_errors() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut model) = native_lorentz(dir.path()) else {
        return;
    };
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    let mut kernel = model.bind(input).unwrap();
    kernel.release();
    assert!(matches!(
        kernel.invoke(&lorentz_call(50.0)).unwrap_err(),
        KernelError::UseAfterRelease
    ));
}

#[test]
fn test_missing_symbol_is_fatal_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = Toolchain::detect();
    if !toolchain.available() {
        eprintln!("skipping: no C compiler available");
        return;
    }
    let model_file = dir.path().join("lorentz.c");
    std::fs::write(&model_file, "// lorentz model definition\n").unwrap();
    let cache = BuildCache::new(dir.path(), toolchain);
    let descriptor = Arc::new(lorentz(&model_file));
    let mut model = NativeModel::load(&cache, descriptor, &LorentzGenerator).unwrap();

    // The artifact implements "lorentz"; a descriptor claiming another name
    // resolves to missing symbols.
    let mut mismatched = lorentz(&model_file);
    mismatched.name = Arc::from("sphere");
    let mut wrong = NativeModel::from_artifact(model.artifact(), Arc::new(mismatched));
    let input = Arc::new(wrong.make_input(&[vec![0.2]]).unwrap());
    assert!(matches!(
        wrong.bind(input).err().unwrap(),
        KernelError::MissingSymbol { .. }
    ));

    // The correctly-named model still binds fine.
    let input = Arc::new(model.make_input(&[vec![0.2]]).unwrap());
    assert!(model.bind(input).is_ok());
}
