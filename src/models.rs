//! Illustrative model definition: a Lorentz (Ornstein-Zernike) peak with a
//! polydisperse screening length.
//!
//! Stands in for the model catalog the way one shipped model file would:
//! small enough to verify by hand, yet exercising every stage of the
//! pipeline (codegen, compile, cache, load, shape, invoke) plus the
//! interpreted substitute.
//!
//! ```text
//! I(q) = scale / (1 + (q * screening_length)^2) + background
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::descriptor::{ModelDescriptor, ParameterTaxonomy};
use crate::error::Result;
use crate::generate::{kernel_name, CodeGenerator, GeneratedSource};
use crate::kernel::{ScalarForm1d, ScalarForm2d};

/// Descriptor for the Lorentz model, compiled natively.
///
/// `filename` is the model's defining file on disk; it anchors artifact
/// naming and staleness checks.
pub fn lorentz(filename: impl Into<PathBuf>) -> ModelDescriptor {
    let fixed: Vec<Arc<str>> = vec![Arc::from("scale"), Arc::from("background")];
    let pd: Vec<Arc<str>> = vec![Arc::from("screening_length")];
    ModelDescriptor::new(
        "lorentz",
        filename,
        ParameterTaxonomy {
            fixed_1d: fixed.clone(),
            fixed_2d: fixed,
            pd_1d: pd.clone(),
            pd_2d: pd,
        },
    )
}

/// Lorentz model declaring interpreted implementations, so binds never touch
/// native code.
pub fn lorentz_interpreted(filename: impl Into<PathBuf>) -> ModelDescriptor {
    lorentz(filename)
        .with_iq(Arc::new(LorentzForm))
        .with_iqxy(Arc::new(LorentzForm))
}

/// Scalar Lorentz form shared by the 1-D and 2-D interpreted paths.
#[derive(Debug, Clone, Copy)]
pub struct LorentzForm;

impl ScalarForm1d for LorentzForm {
    fn iq(&self, q: f64, pars: &[f64]) -> f64 {
        let x = q * pars[0];
        1.0 / (1.0 + x * x)
    }
}

impl ScalarForm2d for LorentzForm {
    fn iqxy(&self, qx: f64, qy: f64, pars: &[f64]) -> f64 {
        self.iq((qx * qx + qy * qy).sqrt(), pars)
    }
}

/// Emits the Lorentz model's C source with both entry points.
#[derive(Debug, Clone, Copy)]
pub struct LorentzGenerator;

impl CodeGenerator for LorentzGenerator {
    fn generate(&self, model: &ModelDescriptor) -> Result<GeneratedSource> {
        let iq = kernel_name(model, false);
        let iqxy = kernel_name(model, true);
        let text = format!(
            r#"// Generated Lorentz kernel. Do not edit.
#include <math.h>

#if defined(_MSC_VER)
#define KERNEL __declspec(dllexport)
#else
#define KERNEL
#endif

static double lorentz_form(double q, double screening_length) {{
    const double x = q * screening_length;
    return 1.0 / (1.0 + x * x);
}}

KERNEL void {iq}(
    const double *q,
    double *result,
    const int nq,
    const double *loops,
    const double cutoff,
    const double scale,
    const double background,
    const int n_screening_length)
{{
    for (int i = 0; i < nq; i++) {{
        double ret = 0.0, norm = 0.0;
        for (int j = 0; j < n_screening_length; j++) {{
            const double screening_length = loops[2 * j];
            const double weight = loops[2 * j + 1];
            if (weight > cutoff) {{
                const double s = lorentz_form(q[i], screening_length);
                if (!isnan(s)) {{
                    ret += weight * s;
                    norm += weight;
                }}
            }}
        }}
        result[i] = scale * ret / norm + background;
    }}
}}

KERNEL void {iqxy}(
    const double *qx,
    const double *qy,
    double *result,
    const int nq,
    const double *loops,
    const double cutoff,
    const double scale,
    const double background,
    const int n_screening_length)
{{
    for (int i = 0; i < nq; i++) {{
        const double qi = sqrt(qx[i] * qx[i] + qy[i] * qy[i]);
        double ret = 0.0, norm = 0.0;
        for (int j = 0; j < n_screening_length; j++) {{
            const double screening_length = loops[2 * j];
            const double weight = loops[2 * j + 1];
            if (weight > cutoff) {{
                const double s = lorentz_form(qi, screening_length);
                if (!isnan(s)) {{
                    ret += weight * s;
                    norm += weight;
                }}
            }}
        }}
        result[i] = scale * ret / norm + background;
    }}
}}
"#
        );
        Ok(GeneratedSource {
            text,
            dependencies: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_source_names_both_entry_points() {
        let model = lorentz("lorentz.c");
        let source = LorentzGenerator.generate(&model).unwrap();
        assert!(source.text.contains("void lorentz_Iq("));
        assert!(source.text.contains("void lorentz_Iqxy("));
        assert!(source.dependencies.is_empty());
    }

    #[test]
    fn test_scalar_form() {
        let form = LorentzForm;
        let expect = 1.0 / (1.0 + (0.2_f64 * 50.0) * (0.2_f64 * 50.0));
        assert_eq!(form.iq(0.2, &[50.0]), expect);
        // 2-D form depends only on |q|.
        assert_eq!(form.iqxy(0.2, 0.0, &[50.0]), expect);
    }
}
