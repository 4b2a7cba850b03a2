//! `JitInst` record model and pure ARM64 instruction encoder.
//!
//! This crate has no opinion on memory protection, symbol resolution, or
//! process execution — see `fasterbasic-jit` for that. It only turns a
//! `&[JitInst]` stream into code/data bytes plus the relocation tables a
//! linker needs, per spec.md §3–§4.3 and §6–§7.

mod encode;
mod error;
mod inst;
mod module;
mod regs;

pub use encode::{
    encode_adr, encode_add_sub_imm, encode_b, encode_bitmask_immediate, encode_one, NeonArrangement, Words,
};
pub use error::EncodeError;
pub use inst::{Collector, InstKind, JitInst};
pub use module::{
    CodeOffset, DataSymRefSlot, Diagnostic, ExtCall, JitModule, LoadAddrReloc, Severity, SourceMapEntry,
};
pub use regs::{gpr_encoding, is_vreg, vreg, vreg_index, Cls, Cond, ShiftType, SymType, REG_FP, REG_IP0, REG_IP1, REG_LR, REG_SP, VREG_BASE};
