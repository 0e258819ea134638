//! Pure-interpreted kernel adapter.
//!
//! Models that declare an in-process implementation bind to this instead of
//! native code; the external contract (bind once, invoke many, release) is
//! identical. The weighted polydispersity loop mirrors the generated kernel
//! bodies: combined weights at or below the cutoff are skipped, NaN
//! evaluations are excluded from the normalization, and the final value is
//! `scale * ret / norm + background`.

use std::sync::Arc;

use crate::descriptor::ModelDescriptor;
use crate::error::{KernelError, Result};
use crate::input::EvaluationInput;

use super::{CallParams, Kernel, PdGrid, ResultBuffer};

/// Model-declared scalar 1-D form: I(q) for one coordinate and one draw of
/// the model parameters (fixed values beyond scale/background in taxonomy
/// order, then the current pd values in taxonomy order).
pub trait ScalarForm1d: Send + Sync {
    fn iq(&self, q: f64, pars: &[f64]) -> f64;
}

/// Model-declared scalar 2-D form.
pub trait ScalarForm2d: Send + Sync {
    fn iqxy(&self, qx: f64, qy: f64, pars: &[f64]) -> f64;
}

#[derive(Clone)]
enum Form {
    OneD(Arc<dyn ScalarForm1d>),
    TwoD(Arc<dyn ScalarForm2d>),
}

/// Kernel adapter evaluating a scalar form in-process.
pub struct InterpretedKernel {
    form: Form,
    descriptor: Arc<ModelDescriptor>,
    input: Arc<EvaluationInput>,
    /// Coordinates widened once at bind time.
    coords: Vec<Vec<f64>>,
    buffer: Option<ResultBuffer>,
}

impl InterpretedKernel {
    pub fn new_1d(
        form: Arc<dyn ScalarForm1d>,
        descriptor: Arc<ModelDescriptor>,
        input: Arc<EvaluationInput>,
    ) -> Self {
        Self::new(Form::OneD(form), descriptor, input)
    }

    pub fn new_2d(
        form: Arc<dyn ScalarForm2d>,
        descriptor: Arc<ModelDescriptor>,
        input: Arc<EvaluationInput>,
    ) -> Self {
        Self::new(Form::TwoD(form), descriptor, input)
    }

    fn new(form: Form, descriptor: Arc<ModelDescriptor>, input: Arc<EvaluationInput>) -> Self {
        let coords = input.coords().iter().map(|c| c.to_f64_vec()).collect();
        let buffer = ResultBuffer::new(input.dtype(), input.nq());
        Self {
            form,
            descriptor,
            input,
            coords,
            buffer: Some(buffer),
        }
    }
}

impl Kernel for InterpretedKernel {
    fn invoke(&mut self, call: &CallParams) -> Result<&ResultBuffer> {
        let Some(mut buffer) = self.buffer.take() else {
            return Err(KernelError::UseAfterRelease);
        };
        let slice = self.descriptor.taxonomy.slice(self.input.is_2d());
        if let Err(e) = call.validate(&slice) {
            self.buffer = Some(buffer);
            return Err(e);
        }

        // Generated-kernel convention: scale and background lead the fixed
        // list and are folded in after normalization.
        let scale = call.fixed.first().copied().unwrap_or(1.0);
        let background = call.fixed.get(1).copied().unwrap_or(0.0);
        let extra_fixed: &[f64] = call.fixed.get(2..).unwrap_or(&[]);

        let form = self.form.clone();
        let coords = &self.coords;
        let mut pars = Vec::with_capacity(extra_fixed.len() + call.pd.len());

        for i in 0..self.input.nq() {
            let eval = |pars: &[f64]| match &form {
                Form::OneD(f) => f.iq(coords[0][i], pars),
                Form::TwoD(f) => f.iqxy(coords[0][i], coords[1][i], pars),
            };

            let value = if call.pd.is_empty() {
                pars.clear();
                pars.extend_from_slice(extra_fixed);
                scale * eval(&pars) + background
            } else {
                let mut ret = 0.0;
                let mut norm = 0.0;
                for_each_grid_point(&call.pd, &mut |pd_values, weight| {
                    if weight > call.cutoff {
                        pars.clear();
                        pars.extend_from_slice(extra_fixed);
                        pars.extend_from_slice(pd_values);
                        let s = eval(&pars);
                        if !s.is_nan() {
                            ret += weight * s;
                            norm += weight;
                        }
                    }
                });
                scale * ret / norm + background
            };
            buffer.set(i, value);
        }

        Ok(self.buffer.insert(buffer))
    }

    fn release(&mut self) {
        self.buffer = None;
    }
}

/// Walk the cartesian product of all pd grids, last parameter fastest,
/// yielding the current value draw and the combined weight.
fn for_each_grid_point(pd: &[PdGrid], f: &mut dyn FnMut(&[f64], f64)) {
    if pd.iter().any(PdGrid::is_empty) {
        return;
    }
    let mut idx = vec![0usize; pd.len()];
    let mut values = vec![0.0; pd.len()];
    loop {
        let mut weight = 1.0;
        for (k, grid) in pd.iter().enumerate() {
            values[k] = grid.values[idx[k]];
            weight *= grid.weights[idx[k]];
        }
        f(&values, weight);

        let mut k = pd.len();
        loop {
            if k == 0 {
                return;
            }
            k -= 1;
            idx[k] += 1;
            if idx[k] < pd[k].len() {
                break;
            }
            idx[k] = 0;
        }
    }
}
