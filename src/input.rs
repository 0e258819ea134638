//! Evaluation inputs: coordinate vectors held at call precision.

use crate::error::{KernelError, Result};

/// Numeric width of one evaluation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    F64,
}

/// One coordinate vector stored at call width. The raw buffer pointer feeds a
/// leading argument slot of the native call.
#[derive(Debug, Clone)]
pub enum CoordVec {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl CoordVec {
    pub fn len(&self) -> usize {
        match self {
            CoordVec::F32(v) => v.len(),
            CoordVec::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widened copy for interpreted evaluation.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            CoordVec::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            CoordVec::F64(v) => v.clone(),
        }
    }

    pub(crate) fn as_ptr_word(&self) -> u64 {
        match self {
            CoordVec::F32(v) => v.as_ptr() as u64,
            CoordVec::F64(v) => v.as_ptr() as u64,
        }
    }
}

/// An immutable set of evaluation coordinates plus a dtype.
///
/// Created once per session and reused across many parameter evaluations.
/// One vector means 1-D evaluation over `q`, two vectors mean 2-D over
/// `(qx, qy)`. The buffers are never mutated after construction, so pointers
/// handed to native code stay valid for the input's lifetime.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    coords: Vec<CoordVec>,
    dtype: DType,
    nq: usize,
}

impl EvaluationInput {
    pub fn new(q_vectors: &[Vec<f64>], dtype: DType) -> Result<Self> {
        if q_vectors.is_empty() || q_vectors.len() > 2 {
            return Err(KernelError::InvalidInput(format!(
                "expected 1 or 2 coordinate vectors, got {}",
                q_vectors.len()
            )));
        }
        let nq = q_vectors[0].len();
        if q_vectors.iter().any(|v| v.len() != nq) {
            return Err(KernelError::InvalidInput(
                "coordinate vectors have unequal lengths".into(),
            ));
        }
        let coords = q_vectors
            .iter()
            .map(|v| match dtype {
                DType::F32 => CoordVec::F32(v.iter().map(|&x| x as f32).collect()),
                DType::F64 => CoordVec::F64(v.clone()),
            })
            .collect();
        Ok(Self { coords, dtype, nq })
    }

    pub fn is_2d(&self) -> bool {
        self.coords.len() == 2
    }

    pub fn nq(&self) -> usize {
        self.nq
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn coords(&self) -> &[CoordVec] {
        &self.coords
    }

    /// Raw buffer addresses of the coordinate vectors, in declared order.
    pub(crate) fn coord_ptr_words(&self) -> Vec<u64> {
        self.coords.iter().map(CoordVec::as_ptr_word).collect()
    }
}
