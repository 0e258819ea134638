//! Native artifact loading and ABI-exact invocation.
//!
//! All raw-pointer and numeric-width handling is confined to this module:
//! [`args`] packs the ordered argument vector, [`trampoline`] materializes
//! the matching call signature, and [`module`] owns the loaded library and
//! its resolved entry points. Everything outside manipulates typed values.

mod args;
mod module;
mod trampoline;


pub use args::{shape, ArgPack, ShapedArgs};
pub use module::{EntryPoint, NativeModule};
pub use trampoline::{AbiType, Trampoline};
