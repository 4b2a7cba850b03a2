//! [`JitModule`]: drives [`crate::encode::encode_one`] over a full
//! instruction stream, resolving labels with a two-pass fixup scheme and
//! collecting everything downstream (`fasterbasic-jit`'s linker) needs to
//! finish the job. Modeled on the teacher's `cranelift-codegen`
//! `MachBuffer` — one linear code buffer, a side table of branch fixups
//! applied in a second pass once every label's offset is known.

use std::fmt;

use crate::encode::{self, Words};
use crate::error::EncodeError;
use crate::inst::{InstKind, JitInst};

pub type CodeOffset = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub code_offset: Option<CodeOffset>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code_offset {
            Some(off) => write!(f, "[{:?} @ {:#06x}] {}", self.severity, off, self.message),
            None => write!(f, "[{:?}] {}", self.severity, self.message),
        }
    }
}

/// A not-yet-resolved branch: the word was emitted as a placeholder because
/// its target label's offset wasn't known yet. `resolve` patches it in once
/// every label in the stream has an offset.
#[derive(Clone, Copy, Debug)]
struct Fixup {
    code_offset: CodeOffset,
    target_id: u32,
    kind: InstKind,
    cond: u8,
    rn_or_rt: i32,
    bit: u8,
}

/// A `CALL_EXT` site: the linker resolves `sym_name` to an address (internal
/// table, then jump table, then `dlsym`) and either patches the `BL` target
/// directly or routes it through a trampoline (spec.md §4.5).
#[derive(Clone, Debug)]
pub struct ExtCall {
    pub code_offset: CodeOffset,
    pub sym_name: String,
}

/// A `LOAD_ADDR` site: two code words (ADRP + ADD) the linker patches once
/// it knows `sym_name`'s final address.
#[derive(Clone, Debug)]
pub struct LoadAddrReloc {
    pub code_offset: CodeOffset,
    pub sym_name: String,
    pub addend: i64,
}

/// A `DATA_SYMREF` slot: 8 zero bytes in the data buffer the linker fills
/// with a relocated absolute address.
#[derive(Clone, Debug)]
pub struct DataSymRefSlot {
    pub data_offset: u32,
    pub sym_name: String,
    pub addend: i64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SourceMapEntry {
    pub code_offset: CodeOffset,
    pub line: u32,
    pub col: u32,
}

/// The fully encoded, not-yet-linked program: a code buffer, a data
/// buffer, and every relocation/bookkeeping table the linker needs.
/// `code_len`/`data_len` only ever grow while encoding runs (spec.md §4.2
/// invariant).
#[derive(Default)]
pub struct JitModule {
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub labels: std::collections::HashMap<u32, CodeOffset>,
    pub ext_calls: Vec<ExtCall>,
    pub load_addr_relocs: Vec<LoadAddrReloc>,
    pub data_sym_refs: Vec<DataSymRefSlot>,
    pub source_map: Vec<SourceMapEntry>,
    pub diagnostics: Vec<Diagnostic>,
    /// Count of forward-branch fixups successfully patched by
    /// [`JitModule::resolve_fixups`] (spec.md §3: "counters (instructions
    /// emitted, labels, fixups resolved, etc.)").
    pub fixups_resolved: u64,
    fixups: Vec<Fixup>,
}

impl JitModule {
    pub fn new() -> JitModule {
        JitModule::default()
    }

    pub fn code_len(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn data_len(&self) -> u32 {
        self.data.len() as u32
    }

    fn push_word(&mut self, word: u32) -> CodeOffset {
        let offset = self.code_len();
        self.code.extend_from_slice(&word.to_le_bytes());
        offset
    }

    fn push_zero_data(&mut self, n: usize) -> u32 {
        let offset = self.data_len();
        self.data.extend(std::iter::repeat(0u8).take(n));
        offset
    }

    fn diag(&mut self, severity: Severity, code_offset: Option<CodeOffset>, message: String) {
        self.diagnostics.push(Diagnostic { severity, message, code_offset });
    }

    /// Encode a full instruction stream. Best-effort: an encoding failure
    /// on one instruction is recorded as an error [`Diagnostic`] and
    /// encoding continues with the next instruction, so a single run
    /// surfaces every problem rather than stopping at the first.
    pub fn encode_program(&mut self, insts: &[JitInst]) {
        for inst in insts {
            self.encode_inst(inst);
        }
        self.resolve_fixups();
    }

    fn encode_inst(&mut self, inst: &JitInst) {
        let kind = match inst.kind() {
            Some(k) => k,
            None => {
                self.diag(Severity::Error, Some(self.code_len()), format!("{}", EncodeError::UnknownKind(inst.kind)));
                return;
            }
        };

        match kind {
            InstKind::Label => {
                self.labels.insert(inst.target_id, self.code_len());
                return;
            }
            InstKind::FuncBegin | InstKind::FuncEnd | InstKind::Nop | InstKind::Comment => return,
            InstKind::DbgLoc => {
                self.source_map.push(SourceMapEntry {
                    code_offset: self.code_len(),
                    line: inst.rd as u32,
                    col: inst.rn as u32,
                });
                return;
            }
            InstKind::DataWord => {
                let off = self.push_zero_data(4);
                self.data[off as usize..off as usize + 4].copy_from_slice(&(inst.imm as i32).to_le_bytes());
                return;
            }
            InstKind::DataQuad => {
                let off = self.push_zero_data(8);
                self.data[off as usize..off as usize + 8].copy_from_slice(&inst.imm.to_le_bytes());
                return;
            }
            InstKind::DataSymRef => {
                let off = self.push_zero_data(8);
                self.data_sym_refs.push(DataSymRefSlot {
                    data_offset: off,
                    sym_name: inst.sym_name_str().to_string(),
                    addend: inst.imm,
                });
                return;
            }
            _ => {}
        }

        if is_branch_kind(kind) {
            self.encode_branch(inst, kind);
            return;
        }

        if kind == InstKind::CallExt {
            let code_offset = self.code_len();
            self.ext_calls.push(ExtCall { code_offset, sym_name: inst.sym_name_str().to_string() });
            self.push_word(0); // placeholder BL, patched by the linker
            return;
        }

        if kind == InstKind::LoadAddr {
            let code_offset = self.code_len();
            self.load_addr_relocs.push(LoadAddrReloc {
                code_offset,
                sym_name: inst.sym_name_str().to_string(),
                addend: inst.imm,
            });
        }

        match encode::encode_one(inst, 0) {
            Ok(words) => self.push_words(words),
            Err(e) => {
                let off = self.code_len();
                self.diag(Severity::Error, Some(off), e.to_string());
            }
        }
    }

    fn push_words(&mut self, words: Words) {
        for w in words {
            self.push_word(w);
        }
    }

    fn encode_branch(&mut self, inst: &JitInst, kind: InstKind) {
        let code_offset = self.code_len();
        if let Some(&target_offset) = self.labels.get(&inst.target_id) {
            let delta_words = (target_offset as i64 - code_offset as i64) / 4;
            match encode::encode_one(inst, delta_words) {
                Ok(words) => {
                    self.push_words(words);
                    return;
                }
                Err(e) => {
                    self.diag(Severity::Error, Some(code_offset), e.to_string());
                    return;
                }
            }
        }

        // Forward reference: emit a placeholder and fix it up once every
        // label in the stream has an offset.
        self.fixups.push(Fixup {
            code_offset,
            target_id: inst.target_id,
            kind,
            cond: inst.cond,
            rn_or_rt: inst.rn,
            bit: inst.imm as u8,
        });
        match kind.code_word_count() {
            1 => {
                self.push_word(0);
            }
            n => {
                for _ in 0..n {
                    self.push_word(0);
                }
            }
        }
    }

    fn resolve_fixups(&mut self) {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in fixups {
            let target_offset = match self.labels.get(&fixup.target_id) {
                Some(&off) => off,
                None => {
                    self.diag(
                        Severity::Error,
                        Some(fixup.code_offset),
                        EncodeError::UnresolvedLabel(fixup.target_id).to_string(),
                    );
                    continue;
                }
            };
            let delta_words = (target_offset as i64 - fixup.code_offset as i64) / 4;
            let word = match fixup.kind {
                InstKind::B => encode::encode_b(false, delta_words),
                InstKind::Bl => encode::encode_b(true, delta_words),
                InstKind::BCond => encode::encode_bcond(fixup.cond, delta_words),
                InstKind::Cbz => encode::encode_cbz(true, false, reg_or_zero(fixup.rn_or_rt), delta_words),
                InstKind::Cbnz => encode::encode_cbz(true, true, reg_or_zero(fixup.rn_or_rt), delta_words),
                InstKind::Tbz => encode::encode_tbz(false, reg_or_zero(fixup.rn_or_rt), fixup.bit, delta_words),
                InstKind::Tbnz => encode::encode_tbz(true, reg_or_zero(fixup.rn_or_rt), fixup.bit, delta_words),
                _ => unreachable!("only branch kinds are ever queued as fixups"),
            };
            match word {
                Ok(w) => {
                    let off = fixup.code_offset as usize;
                    self.code[off..off + 4].copy_from_slice(&w.to_le_bytes());
                    self.fixups_resolved += 1;
                }
                Err(e) => self.diag(Severity::Error, Some(fixup.code_offset), e.to_string()),
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

fn reg_or_zero(id: i32) -> u8 {
    crate::regs::gpr_encoding(id).unwrap_or(0)
}

fn is_branch_kind(kind: InstKind) -> bool {
    matches!(
        kind,
        InstKind::B | InstKind::Bl | InstKind::BCond | InstKind::Cbz | InstKind::Cbnz | InstKind::Tbz | InstKind::Tbnz
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::Cls;

    #[test]
    fn forward_branch_fixup_resolves_to_the_correct_delta() {
        // B -> L99, NOP, LABEL L99: the branch should resolve to +2 words.
        let insts = vec![JitInst::branch(99), JitInst::new(InstKind::RealNop), JitInst::label(99)];
        let mut module = JitModule::new();
        module.encode_program(&insts);
        assert!(!module.has_errors(), "{:?}", module.diagnostics);
        let word = u32::from_le_bytes(module.code[0..4].try_into().unwrap());
        assert_eq!(word & 0x3ff_ffff, 2);
    }

    #[test]
    fn backward_branch_resolves_immediately_without_a_fixup() {
        let insts = vec![JitInst::label(1), JitInst::new(InstKind::RealNop), JitInst::branch(1)];
        let mut module = JitModule::new();
        module.encode_program(&insts);
        assert!(!module.has_errors());
        let word = u32::from_le_bytes(module.code[4..8].try_into().unwrap());
        assert_eq!(word & 0x3ff_ffff, (-1i32 as u32) & 0x3ff_ffff);
        assert_eq!(module.fixups_resolved, 0, "a backward branch never goes through the fixup table");
    }

    #[test]
    fn resolve_fixups_counts_exactly_one_patched_forward_branch() {
        let insts = vec![JitInst::branch(99), JitInst::new(InstKind::RealNop), JitInst::label(99)];
        let mut module = JitModule::new();
        module.encode_program(&insts);
        assert!(!module.has_errors());
        assert_eq!(module.fixups_resolved, 1);
    }

    #[test]
    fn unresolved_label_produces_an_error_diagnostic_not_a_panic() {
        let insts = vec![JitInst::branch(42)];
        let mut module = JitModule::new();
        module.encode_program(&insts);
        assert!(module.has_errors());
    }

    #[test]
    fn call_ext_is_recorded_for_the_linker_and_reserves_one_word() {
        let insts = vec![JitInst::call_ext("puts")];
        let mut module = JitModule::new();
        module.encode_program(&insts);
        assert_eq!(module.ext_calls.len(), 1);
        assert_eq!(module.ext_calls[0].sym_name, "puts");
        assert_eq!(module.code_len(), 4);
    }

    #[test]
    fn data_symref_reserves_eight_zero_bytes_and_records_the_slot() {
        let insts = vec![JitInst::data_symref("table", 4)];
        let mut module = JitModule::new();
        module.encode_program(&insts);
        assert_eq!(module.data_len(), 8);
        assert_eq!(module.data_sym_refs.len(), 1);
        assert_eq!(module.data_sym_refs[0].addend, 4);
    }

    #[test]
    fn code_and_data_lengths_only_grow() {
        let insts = vec![
            JitInst::alu_rrr(InstKind::AluAddRRR, Cls::L, 0, 1, 2),
            JitInst::data_symref("x", 0),
            JitInst::alu_rrr(InstKind::AluSubRRR, Cls::L, 0, 1, 2),
        ];
        let mut module = JitModule::new();
        let mut last_code = 0;
        let mut last_data = 0;
        for inst in &insts {
            module.encode_inst(inst);
            assert!(module.code_len() >= last_code);
            assert!(module.data_len() >= last_data);
            last_code = module.code_len();
            last_data = module.data_len();
        }
    }
}
