//! Kernel invocation adapters.
//!
//! One adapter binds one resolved evaluation function (native or
//! interpreted) to one set of evaluation coordinates, owns the reused result
//! buffer, and exposes a single operation: invoke with per-call parameters.
//! The native/interpreted choice is made once at bind time and never
//! re-checked per call.

mod interpreted;
mod native;

#[cfg(test)]
mod tests;

pub use interpreted::{InterpretedKernel, ScalarForm1d, ScalarForm2d};
pub use native::NativeKernel;

use crate::descriptor::TaxonomySlice;
use crate::error::{KernelError, Result};
use crate::input::DType;

/// One polydisperse parameter's (values, weights) grid.
#[derive(Debug, Clone)]
pub struct PdGrid {
    pub values: Vec<f64>,
    pub weights: Vec<f64>,
}

impl PdGrid {
    pub fn new(values: Vec<f64>, weights: Vec<f64>) -> Self {
        Self { values, weights }
    }

    /// Zero-spread grid: one value with unit weight.
    pub fn single(value: f64) -> Self {
        Self {
            values: vec![value],
            weights: vec![1.0],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-call parameter values.
///
/// `fixed` must match the taxonomy's fixed list in length and order; `pd`
/// must match the pd list. By generated-kernel convention `fixed[0]` is the
/// overall scale and `fixed[1]` the flat background. `cutoff` is the
/// combined-weight threshold below which polydispersity contributions are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    pub fixed: Vec<f64>,
    pub pd: Vec<PdGrid>,
    pub cutoff: f64,
}

impl CallParams {
    /// Check counts against a taxonomy slice. Disagreement is a caller
    /// contract violation, not a recoverable runtime condition.
    pub fn validate(&self, slice: &TaxonomySlice<'_>) -> Result<()> {
        if self.fixed.len() != slice.fixed_count() {
            return Err(KernelError::ArityMismatch {
                what: "fixed parameters",
                expected: slice.fixed_count(),
                actual: self.fixed.len(),
            });
        }
        if self.pd.len() != slice.pd_count() {
            return Err(KernelError::ArityMismatch {
                what: "polydisperse parameters",
                expected: slice.pd_count(),
                actual: self.pd.len(),
            });
        }
        for grid in &self.pd {
            if grid.values.len() != grid.weights.len() {
                return Err(KernelError::ArityMismatch {
                    what: "pd grid weights",
                    expected: grid.values.len(),
                    actual: grid.weights.len(),
                });
            }
        }
        Ok(())
    }
}

/// Result storage at call width, allocated once at bind and overwritten in
/// place by every invoke.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ResultBuffer {
    pub(crate) fn new(dtype: DType, nq: usize) -> Self {
        match dtype {
            DType::F32 => ResultBuffer::F32(vec![0.0; nq]),
            DType::F64 => ResultBuffer::F64(vec![0.0; nq]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResultBuffer::F32(v) => v.len(),
            ResultBuffer::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widened copy of the buffer contents.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            ResultBuffer::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ResultBuffer::F64(v) => v.clone(),
        }
    }

    pub(crate) fn set(&mut self, i: usize, value: f64) {
        match self {
            ResultBuffer::F32(v) => v[i] = value as f32,
            ResultBuffer::F64(v) => v[i] = value,
        }
    }

    pub(crate) fn as_mut_ptr_word(&mut self) -> u64 {
        match self {
            ResultBuffer::F32(v) => v.as_mut_ptr() as u64,
            ResultBuffer::F64(v) => v.as_mut_ptr() as u64,
        }
    }
}

/// Bind-once, invoke-many, release-explicitly adapter contract. Native and
/// interpreted kernels are interchangeable behind it.
pub trait Kernel {
    /// Evaluate with the given parameters and return the result buffer.
    ///
    /// The buffer is reused: contents are only valid until the next invoke.
    fn invoke(&mut self, call: &CallParams) -> Result<&ResultBuffer>;

    /// Idempotent. Invoking after release is an error; releasing an adapter
    /// with no underlying resource is a deliberate no-op.
    fn release(&mut self);
}
