//! Runtime-shaped native calls.
//!
//! A generated kernel's signature varies per model (fixed and pd counts) and
//! per call width, so there is no Rust `fn` type to transmute a resolved
//! symbol to. Instead a small caller is JIT-compiled once per bound kernel:
//! it reads each argument out of a packed 8-byte-slot buffer with the exact
//! declared type and `call_indirect`s the kernel pointer.
//!
//! # Calling Convention
//!
//! The compiled caller has the fixed shape `fn(kernel: ptr, args: ptr)`.
//! Slot `i` of `args` holds argument `i`'s value at the slot's start, so the
//! caller compiles to one typed load per argument followed by the indirect
//! call. Slot packing assumes little-endian targets, which covers everything
//! cranelift-jit runs on.

use cranelift_codegen::ir::{types, AbiParam, Function, InstBuilder, MemFlags, Signature, Type, UserFuncName};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};

use crate::error::{KernelError, Result};
use crate::input::DType;

use super::args::ArgPack;

/// Declared type of one native argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Ptr,
    I32,
    F32,
    F64,
}

/// A compiled caller bound to one argument-slot layout. Owns the cranelift
/// module (code memory) holding the generated caller.
pub struct Trampoline {
    _module: JITModule,
    ptr: *const u8,
    slots: Vec<AbiType>,
}

// SAFETY: the JITModule owns the code memory; ptr stays valid for the
// module's lifetime and the generated code holds no mutable state.
unsafe impl Send for Trampoline {}
unsafe impl Sync for Trampoline {}

impl Trampoline {
    /// Caller for a kernel entry point with `coord_vectors` leading
    /// coordinate pointers, `fixed_count` scalar slots at `dtype` width, and
    /// `pd_count` trailing loop-length slots.
    pub fn for_kernel(
        coord_vectors: usize,
        fixed_count: usize,
        pd_count: usize,
        dtype: DType,
    ) -> Result<Self> {
        let scalar = match dtype {
            DType::F32 => AbiType::F32,
            DType::F64 => AbiType::F64,
        };
        let mut slots = Vec::with_capacity(coord_vectors + 4 + fixed_count + pd_count);
        slots.extend(std::iter::repeat(AbiType::Ptr).take(coord_vectors));
        slots.push(AbiType::Ptr); // result
        slots.push(AbiType::I32); // nq
        slots.push(AbiType::Ptr); // loops
        slots.push(scalar); // cutoff
        slots.extend(std::iter::repeat(scalar).take(fixed_count));
        slots.extend(std::iter::repeat(AbiType::I32).take(pd_count));

        let (module, ptr) = build_caller(&slots)?;
        Ok(Self {
            _module: module,
            ptr,
            slots,
        })
    }

    pub fn slots(&self) -> &[AbiType] {
        &self.slots
    }

    /// Invoke `kernel` with the packed arguments.
    ///
    /// # Safety
    ///
    /// `kernel` must point at a function whose declared signature matches
    /// `slots()` exactly, and every pointer slot in `args` must stay valid
    /// for the duration of the call.
    pub unsafe fn call(&self, kernel: *const u8, args: &ArgPack) {
        debug_assert_eq!(args.len(), self.slots.len());
        let f: unsafe extern "C" fn(*const u8, *const u64) = std::mem::transmute(self.ptr);
        f(kernel, args.as_ptr());
    }
}

fn codegen_err(e: impl std::fmt::Display) -> KernelError {
    KernelError::Codegen(e.to_string())
}

fn make_jit_module() -> Result<JITModule> {
    let mut flag_builder = settings::builder();
    flag_builder
        .set("use_colocated_libcalls", "false")
        .map_err(codegen_err)?;
    flag_builder.set("is_pic", "false").map_err(codegen_err)?;
    let isa_builder = cranelift_native::builder().map_err(codegen_err)?;
    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(codegen_err)?;
    let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
    Ok(JITModule::new(builder))
}

fn clif_type(slot: AbiType, ptr_type: Type) -> Type {
    match slot {
        AbiType::Ptr => ptr_type,
        AbiType::I32 => types::I32,
        AbiType::F32 => types::F32,
        AbiType::F64 => types::F64,
    }
}

fn build_caller(slots: &[AbiType]) -> Result<(JITModule, *const u8)> {
    let mut module = make_jit_module()?;
    let ptr_type = module.target_config().pointer_type();
    let call_conv = module.isa().default_call_conv();

    let mut kernel_sig = Signature::new(call_conv);
    for &slot in slots {
        kernel_sig.params.push(AbiParam::new(clif_type(slot, ptr_type)));
    }

    let mut sig = Signature::new(call_conv);
    sig.params.push(AbiParam::new(ptr_type)); // kernel pointer
    sig.params.push(AbiParam::new(ptr_type)); // packed argument slots

    let func_id = module
        .declare_function("kernel_call", Linkage::Local, &sig)
        .map_err(codegen_err)?;
    let mut func = Function::with_name_signature(UserFuncName::user(0, 0), sig);
    let mut func_ctx = FunctionBuilderContext::new();

    {
        let mut builder = FunctionBuilder::new(&mut func, &mut func_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let kernel_ptr = builder.block_params(entry)[0];
        let args_ptr = builder.block_params(entry)[1];

        // One typed load per 8-byte slot, in declared argument order.
        let flags = MemFlags::trusted();
        let mut args = Vec::with_capacity(slots.len());
        for (i, &slot) in slots.iter().enumerate() {
            let offset = (i as i32) * 8;
            args.push(
                builder
                    .ins()
                    .load(clif_type(slot, ptr_type), flags, args_ptr, offset),
            );
        }

        let sig_ref = builder.import_signature(kernel_sig);
        builder.ins().call_indirect(sig_ref, kernel_ptr, &args);
        builder.ins().return_(&[]);
        builder.finalize();
    }

    let mut ctx = Context::for_function(func);
    module.define_function(func_id, &mut ctx).map_err(codegen_err)?;
    module.clear_context(&mut ctx);
    module.finalize_definitions().map_err(codegen_err)?;

    let ptr = module.get_finalized_function(func_id);
    Ok((module, ptr))
}
