//! W^X memory regions, symbol linking, and signal-guarded execution for
//! FasterBASIC's in-process ARM64 JIT (spec.md §4.4–§4.6).

mod error;
mod link;
mod memory;
mod session;

pub use error::JitError;
pub use link::{Diagnostic, InternalLocation, LinkResult, LinkStats, Linker, Severity, SymbolSource, SymbolTable};
pub use memory::JitMemoryRegion;
pub use session::{ExecResult, Session};
