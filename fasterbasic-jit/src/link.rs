//! The JIT linker (spec.md §4.5): copies an encoded [`fasterbasic_jit_backend::JitModule`]
//! into a [`JitMemoryRegion`], resolves external symbols, builds a
//! trampoline/trap-stub island, and patches every call site and
//! relocation before the region is ever allowed to become executable.

use std::collections::HashMap;
use std::ffi::CString;

use fasterbasic_jit_backend::{Diagnostic as EncodeDiagnostic, JitModule, Severity as EncodeSeverity};
use log::{debug, warn};

use crate::error::JitError;
use crate::memory::JitMemoryRegion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolSource {
    Internal,
    JumpTable,
    Dlsym,
    Unresolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinkStats {
    pub ext_calls_resolved_internal: usize,
    pub ext_calls_resolved_jump_table: usize,
    pub ext_calls_resolved_dlsym: usize,
    pub ext_calls_unresolved: usize,
    pub trampolines_built: usize,
    pub trap_stubs_built: usize,
    pub adrp_relocs_patched: usize,
    pub data_sym_refs_patched: usize,
}

#[derive(Debug)]
pub struct LinkResult {
    pub stats: LinkStats,
    pub diagnostics: Vec<Diagnostic>,
    pub entry_offset: u32,
}

impl LinkResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Where a data or function symbol lives before linking: `Code` offsets
/// are region-local into the code buffer, `Data` offsets into the data
/// buffer — both get turned into absolute addresses once the region is
/// allocated.
#[derive(Clone, Copy, Debug)]
pub enum InternalLocation {
    Code(u32),
    Data(u32),
}

#[derive(Default)]
pub struct SymbolTable {
    internal: HashMap<String, InternalLocation>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn define_code(&mut self, name: impl Into<String>, code_offset: u32) {
        self.internal.insert(name.into(), InternalLocation::Code(code_offset));
    }

    pub fn define_data(&mut self, name: impl Into<String>, data_offset: u32) {
        self.internal.insert(name.into(), InternalLocation::Data(data_offset));
    }
}

/// Strip mach-O's conventional single leading underscore, used only as a
/// resolution fallback (spec.md §6 "Runtime symbol ABI").
fn strip_underscore(name: &str) -> &str {
    name.strip_prefix('_').unwrap_or(name)
}

fn resolve_via_dlsym(name: &str) -> Option<u64> {
    let try_one = |candidate: &str| -> Option<u64> {
        let c_name = CString::new(candidate).ok()?;
        let ptr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c_name.as_ptr()) };
        if ptr.is_null() {
            None
        } else {
            Some(ptr as u64)
        }
    };
    try_one(name).or_else(|| {
        let prefixed = format!("_{}", name);
        try_one(&prefixed)
    })
}

pub struct Linker<'a> {
    symbols: &'a SymbolTable,
    jump_table: Option<&'a HashMap<String, u64>>,
}

impl<'a> Linker<'a> {
    pub fn new(symbols: &'a SymbolTable, jump_table: Option<&'a HashMap<String, u64>>) -> Linker<'a> {
        Linker { symbols, jump_table }
    }

    fn resolve(&self, region: &JitMemoryRegion, name: &str) -> (Option<u64>, SymbolSource) {
        if let Some(loc) = self.symbols.internal.get(name).or_else(|| self.symbols.internal.get(strip_underscore(name))) {
            let addr = match *loc {
                InternalLocation::Code(off) => region.code_base_addr() + off as u64,
                InternalLocation::Data(off) => region.data_base_addr() + off as u64,
            };
            return (Some(addr), SymbolSource::Internal);
        }
        if let Some(table) = self.jump_table {
            if let Some(&addr) = table.get(name) {
                return (Some(addr), SymbolSource::JumpTable);
            }
        }
        if let Some(addr) = resolve_via_dlsym(name) {
            return (Some(addr), SymbolSource::Dlsym);
        }
        (None, SymbolSource::Unresolved)
    }

    /// Runs the eight-step procedure of spec.md §4.5, leaving `region` in
    /// R+W state regardless of outcome — callers use [`link_and_finalize`]
    /// to also flip it to R+X.
    pub fn link(&self, module: &JitModule, region: &mut JitMemoryRegion) -> Result<LinkResult, JitError> {
        let mut diagnostics = Vec::new();
        let mut stats = LinkStats::default();

        // Step 1: copy code + data.
        region.write_code(&module.code)?;
        region.write_data(&module.data)?;

        // Step 2: data relocations come straight from the module — it
        // already tracked `load_addr_relocs` while encoding.

        // Step 3: resolve every unique external symbol once.
        let mut resolutions: HashMap<&str, (Option<u64>, SymbolSource)> = HashMap::new();
        for call in &module.ext_calls {
            resolutions.entry(call.sym_name.as_str()).or_insert_with(|| self.resolve(region, &call.sym_name));
        }

        // Step 4: build the trampoline island.
        let mut stub_offsets: HashMap<&str, u32> = HashMap::new();
        for (name, (addr, source)) in &resolutions {
            match (addr, source) {
                (Some(addr), SymbolSource::Internal) => {
                    // Internal symbols are branched to directly; no stub needed.
                    let _ = addr;
                }
                (Some(addr), _) => {
                    let stub = region.write_trampoline(*addr)?;
                    stub_offsets.insert(name, stub);
                    stats.trampolines_built += 1;
                }
                (None, _) => {
                    let stub = region.write_trap_stub()?;
                    stub_offsets.insert(name, stub);
                    stats.trap_stubs_built += 1;
                    diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        message: format!("external symbol `{}` is unresolved; calls land on a trap stub", name),
                    });
                    warn!("unresolved external symbol `{}`", name);
                }
            }
        }

        // Step 5: patch every call site.
        for call in &module.ext_calls {
            let (addr, source) = resolutions[call.sym_name.as_str()];
            match source {
                SymbolSource::Internal => {
                    if let Some(InternalLocation::Code(target_off)) = self
                        .symbols
                        .internal
                        .get(call.sym_name.as_str())
                        .or_else(|| self.symbols.internal.get(strip_underscore(&call.sym_name)))
                    {
                        region.patch_bl_to_trampoline(call.code_offset, *target_off)?;
                        stats.ext_calls_resolved_internal += 1;
                    }
                }
                SymbolSource::JumpTable => {
                    let stub = stub_offsets[call.sym_name.as_str()];
                    region.patch_bl_to_trampoline(call.code_offset, stub)?;
                    stats.ext_calls_resolved_jump_table += 1;
                }
                SymbolSource::Dlsym => {
                    let stub = stub_offsets[call.sym_name.as_str()];
                    region.patch_bl_to_trampoline(call.code_offset, stub)?;
                    stats.ext_calls_resolved_dlsym += 1;
                }
                SymbolSource::Unresolved => {
                    let stub = stub_offsets[call.sym_name.as_str()];
                    region.patch_bl_to_trampoline(call.code_offset, stub)?;
                    stats.ext_calls_unresolved += 1;
                }
            }
            let _ = addr;
        }

        // Step 6: patch ADRP+ADD pairs.
        for reloc in &module.load_addr_relocs {
            let (addr, source) = self.resolve(region, &reloc.sym_name);
            match addr {
                Some(addr) => {
                    region.patch_adrp_add(reloc.code_offset, addr.wrapping_add(reloc.addend as u64))?;
                    stats.adrp_relocs_patched += 1;
                }
                None => {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        message: format!("cannot resolve data symbol `{}` for LOAD_ADDR", reloc.sym_name),
                    });
                }
            }
            let _ = source;
        }

        // Step 7: patch DATA_SYMREF slots.
        for slot in &module.data_sym_refs {
            let (addr, _source) = self.resolve(region, &slot.sym_name);
            match addr {
                Some(addr) => {
                    let value = addr.wrapping_add(slot.addend as u64);
                    region.patch_data(slot.data_offset, &value.to_le_bytes())?;
                    stats.data_sym_refs_patched += 1;
                }
                None => {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        message: format!("cannot resolve data symbol `{}` for DATA_SYMREF", slot.sym_name),
                    });
                }
            }
        }

        for d in &module.diagnostics {
            diagnostics.push(Diagnostic {
                severity: match d.severity {
                    EncodeSeverity::Error => Severity::Error,
                    EncodeSeverity::Warning => Severity::Warning,
                },
                message: format_encode_diag(d),
            });
        }

        debug!(
            "link complete: {} internal, {} jump-table, {} dlsym, {} unresolved, {} trampolines, {} trap stubs",
            stats.ext_calls_resolved_internal,
            stats.ext_calls_resolved_jump_table,
            stats.ext_calls_resolved_dlsym,
            stats.ext_calls_unresolved,
            stats.trampolines_built,
            stats.trap_stubs_built,
        );

        Ok(LinkResult { stats, diagnostics, entry_offset: 0 })
    }

    /// [`Self::link`], then [`JitMemoryRegion::make_executable`] iff there
    /// were zero error diagnostics.
    pub fn link_and_finalize(&self, module: &JitModule, region: &mut JitMemoryRegion) -> Result<LinkResult, JitError> {
        let result = self.link(module, region)?;
        if result.has_errors() {
            return Err(JitError::LinkFailed(result.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()));
        }
        region.make_executable()?;
        Ok(result)
    }
}

fn format_encode_diag(d: &EncodeDiagnostic) -> String {
    match d.code_offset {
        Some(off) => format!("encoder: {} @ code offset {:#06x}", d.message, off),
        None => format!("encoder: {}", d.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fasterbasic_jit_backend::JitInst;

    #[test]
    fn unresolved_external_symbol_gets_a_trap_stub_not_a_null_branch() {
        let insts = vec![JitInst::call_ext("definitely_not_a_real_symbol_xyz")];
        let mut module = JitModule::new();
        module.encode_program(&insts);

        let symbols = SymbolTable::new();
        let linker = Linker::new(&symbols, None);
        let mut region = JitMemoryRegion::allocate(4096, 4096).unwrap();
        let result = linker.link(&module, &mut region).unwrap();

        assert_eq!(result.stats.ext_calls_unresolved, 1);
        assert_eq!(result.stats.trap_stubs_built, 1);
        assert!(result.diagnostics.iter().any(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn internal_symbol_call_is_patched_directly_without_a_trampoline() {
        let insts = vec![JitInst::call_ext("my_internal_fn")];
        let mut module = JitModule::new();
        module.encode_program(&insts);

        let mut symbols = SymbolTable::new();
        symbols.define_code("my_internal_fn", 0);
        let linker = Linker::new(&symbols, None);
        let mut region = JitMemoryRegion::allocate(4096, 4096).unwrap();
        let result = linker.link(&module, &mut region).unwrap();

        assert_eq!(result.stats.ext_calls_resolved_internal, 1);
        assert_eq!(result.stats.trampolines_built, 0);
        assert!(!result.has_errors());
    }

    #[test]
    fn link_and_finalize_refuses_to_make_executable_when_errors_remain() {
        let insts = vec![JitInst::data_symref("missing_symbol", 0)];
        let mut module = JitModule::new();
        module.encode_program(&insts);

        let symbols = SymbolTable::new();
        let linker = Linker::new(&symbols, None);
        let mut region = JitMemoryRegion::allocate(4096, 4096).unwrap();
        let result = linker.link_and_finalize(&module, &mut region);

        assert!(result.is_err());
        assert!(!region.is_executable());
    }
}
