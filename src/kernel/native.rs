//! Kernel adapter backed by a compiled artifact.

use std::sync::Arc;

use crate::descriptor::ModelDescriptor;
use crate::error::{KernelError, Result};
use crate::input::EvaluationInput;
use crate::native::{shape, NativeModule, Trampoline};

use super::{CallParams, Kernel, ResultBuffer};

/// Callable kernel bound to one entry point of a loaded artifact and one set
/// of evaluation coordinates.
///
/// The trampoline is compiled once at bind time from the taxonomy slice and
/// the input's dtype; per call only values vary. The shared [`NativeModule`]
/// keeps the library mapped for as long as any kernel still references it.
pub struct NativeKernel {
    module: Arc<NativeModule>,
    entry_ptr: *const u8,
    trampoline: Trampoline,
    descriptor: Arc<ModelDescriptor>,
    input: Arc<EvaluationInput>,
    is_2d: bool,
    buffer: Option<ResultBuffer>,
}

impl NativeKernel {
    pub fn new(
        module: Arc<NativeModule>,
        descriptor: Arc<ModelDescriptor>,
        input: Arc<EvaluationInput>,
    ) -> Result<Self> {
        let is_2d = input.is_2d();
        let entry = module.entry(is_2d);
        let entry_ptr = entry.ptr();
        let trampoline = Trampoline::for_kernel(
            entry.coord_vectors,
            entry.fixed_count,
            entry.pd_count,
            input.dtype(),
        )?;
        let buffer = ResultBuffer::new(input.dtype(), input.nq());
        Ok(Self {
            module,
            entry_ptr,
            trampoline,
            descriptor,
            input,
            is_2d,
            buffer: Some(buffer),
        })
    }

    pub fn module(&self) -> &Arc<NativeModule> {
        &self.module
    }
}

impl Kernel for NativeKernel {
    fn invoke(&mut self, call: &CallParams) -> Result<&ResultBuffer> {
        let Some(mut buffer) = self.buffer.take() else {
            return Err(KernelError::UseAfterRelease);
        };
        let slice = self.descriptor.taxonomy.slice(self.is_2d);
        let shaped = match shape(call, &slice, &self.input, buffer.as_mut_ptr_word()) {
            Ok(shaped) => shaped,
            Err(e) => {
                self.buffer = Some(buffer);
                return Err(e);
            }
        };
        // SAFETY: the trampoline's slot layout and the shaped pack both
        // derive from the same taxonomy slice and input; the coordinate,
        // loop, and result buffers are owned by self/shaped for the duration
        // of the call.
        unsafe { self.trampoline.call(self.entry_ptr, shaped.pack()) };
        Ok(self.buffer.insert(buffer))
    }

    fn release(&mut self) {
        self.buffer = None;
    }
}
