//! ABI argument shaping.
//!
//! Assembles exactly the ordered argument vector a generated entry point
//! declares:
//!
//! ```text
//! [q_ptr(s)..., result_ptr, nq, loops_ptr, cutoff, fixed..., loop_len...]
//! ```
//!
//! Argument count and order are fully determined by the taxonomy slice;
//! repeated calls with the same model and dimensionality only vary values.

use crate::descriptor::TaxonomySlice;
use crate::error::Result;
use crate::input::{DType, EvaluationInput};
use crate::kernel::{CallParams, PdGrid};

/// Packed argument slots, one 8-byte word per argument with the value stored
/// at the slot's start (little-endian packing, matching the trampoline's
/// typed loads).
#[derive(Debug, Default)]
pub struct ArgPack {
    words: Vec<u64>,
}

impl ArgPack {
    fn with_capacity(n: usize) -> Self {
        Self {
            words: Vec::with_capacity(n),
        }
    }

    pub fn push_ptr(&mut self, addr: u64) {
        self.words.push(addr);
    }

    pub fn push_i32(&mut self, v: i32) {
        self.words.push(v as u32 as u64);
    }

    pub fn push_u32(&mut self, v: u32) {
        self.words.push(v as u64);
    }

    pub fn push_f32(&mut self, v: f32) {
        self.words.push(v.to_bits() as u64);
    }

    pub fn push_f64(&mut self, v: f64) {
        self.words.push(v.to_bits());
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub(crate) fn as_ptr(&self) -> *const u64 {
        self.words.as_ptr()
    }

    #[cfg(test)]
    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }
}

/// Flattened polydispersity loop data at call width. Must stay alive while
/// the native call runs, since the pack only holds its address.
#[derive(Debug)]
pub enum LoopBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl LoopBuffer {
    fn as_ptr_word(&self) -> u64 {
        match self {
            LoopBuffer::F32(v) => v.as_ptr() as u64,
            LoopBuffer::F64(v) => v.as_ptr() as u64,
        }
    }
}

/// A fully shaped call: the packed slots plus ownership of the loop buffer
/// they point into.
#[derive(Debug)]
pub struct ShapedArgs {
    pack: ArgPack,
    _loops: LoopBuffer,
}

impl ShapedArgs {
    pub fn pack(&self) -> &ArgPack {
        &self.pack
    }
}

/// Shape one call against a taxonomy slice.
///
/// Fixed scalars and the cutoff are cast to the call width; pd grids are
/// flattened into the interleaved loop buffer; grid lengths become the
/// trailing unsigned slots. Count disagreements with the taxonomy are caller
/// contract violations and fail here, never silently truncated or padded.
pub fn shape(
    call: &CallParams,
    slice: &TaxonomySlice<'_>,
    input: &EvaluationInput,
    result_ptr: u64,
) -> Result<ShapedArgs> {
    call.validate(slice)?;

    let dtype = input.dtype();
    let loops = flatten_loops(&call.pd, dtype);

    let coord_ptrs = input.coord_ptr_words();
    let mut pack = ArgPack::with_capacity(coord_ptrs.len() + 4 + call.fixed.len() + call.pd.len());
    for addr in coord_ptrs {
        pack.push_ptr(addr);
    }
    pack.push_ptr(result_ptr);
    pack.push_i32(input.nq() as i32);
    pack.push_ptr(loops.as_ptr_word());
    match dtype {
        DType::F32 => pack.push_f32(call.cutoff as f32),
        DType::F64 => pack.push_f64(call.cutoff),
    }
    for &p in &call.fixed {
        match dtype {
            DType::F32 => pack.push_f32(p as f32),
            DType::F64 => pack.push_f64(p),
        }
    }
    for grid in &call.pd {
        pack.push_u32(grid.len() as u32);
    }

    Ok(ShapedArgs {
        pack,
        _loops: loops,
    })
}

/// Stack every pd grid and interleave value with weight per loop index, one
/// parameter after another in declaration order: `[v0, w0, v1, w1, ...]`.
/// This is the layout the generated loop bodies index with `loops[2*i]` and
/// `loops[2*i + 1]`.
pub(crate) fn flatten_loops(pd: &[PdGrid], dtype: DType) -> LoopBuffer {
    let total: usize = pd.iter().map(PdGrid::len).sum();
    match dtype {
        DType::F64 => {
            let mut out = Vec::with_capacity(total * 2);
            for grid in pd {
                for (&v, &w) in grid.values.iter().zip(&grid.weights) {
                    out.push(v);
                    out.push(w);
                }
            }
            LoopBuffer::F64(out)
        }
        DType::F32 => {
            let mut out = Vec::with_capacity(total * 2);
            for grid in pd {
                for (&v, &w) in grid.values.iter().zip(&grid.weights) {
                    out.push(v as f32);
                    out.push(w as f32);
                }
            }
            LoopBuffer::F32(out)
        }
    }
}
