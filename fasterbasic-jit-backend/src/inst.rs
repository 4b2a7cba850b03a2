//! The `JitInst` record (spec.md §3, §6): a flat, ABI-stable instruction
//! description produced by the (external) QBE backend's final lowering
//! stage and consumed read-only by the encoder in [`crate::encode`].

use crate::regs::{Cls, Cond, ShiftType, SymType};

/// One virtual instruction, exactly 128 bytes, fields at the fixed byte
/// offsets spec.md §6 specifies as part of the producer/encoder contract.
/// `_reserved` exists purely to push `sym_name` out to offset 48 — the
/// producer pads here for alignment, and we preserve the gap rather than
/// silently repacking the struct.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitInst {
    pub kind: u16,
    pub cls: u8,
    pub cond: u8,
    pub shift_type: u8,
    pub sym_type: u8,
    pub is_float: u8,
    pub _padding: u8,
    pub rd: i32,
    pub rn: i32,
    pub rm: i32,
    pub ra: i32,
    pub imm: i64,
    pub imm2: i64,
    pub target_id: u32,
    pub _reserved: u32,
    pub sym_name: [u8; 80],
}

const _: () = assert!(std::mem::size_of::<JitInst>() == 128, "JitInst must stay 128 bytes per spec.md §6");

/// The instruction kind tag. Spans every family spec.md §4.2 names:
/// ALU-rrr/rri/shifted, move-wide, FP, FP-int conversions, extensions,
/// compare, conditional-set, memory load/store(-pair), branches,
/// PC-relative, LOAD_ADDR, stack manipulation, special, NEON vector, data
/// directives, and the bookkeeping-only pseudo-kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum InstKind {
    // ALU, register operands (rd = op(rn, rm))
    AluAddRRR = 0,
    AluSubRRR = 1,
    AluAndRRR = 2,
    AluOrrRRR = 3,
    AluEorRRR = 4,
    AluMul = 5,
    AluSdiv = 6,
    AluUdiv = 7,
    // ALU, immediate operand (rd = op(rn, imm))
    AluAddRRI = 8,
    AluSubRRI = 9,
    AluAndRRI = 10,
    AluOrrRRI = 11,
    AluEorRRI = 12,
    // shifted-ALU: register operand pre-shifted by shift_type/imm2
    AluAddShifted = 13,
    AluSubShifted = 14,
    // move-wide
    MovZ = 15,
    MovN = 16,
    MovK = 17,
    // FP, register operands
    FAddRRR = 18,
    FSubRRR = 19,
    FMulRRR = 20,
    FDivRRR = 21,
    // FP <-> int conversions
    Scvtf = 22,
    Ucvtf = 23,
    Fcvtzs = 24,
    Fcvtzu = 25,
    // extensions
    Sxtb = 26,
    Sxth = 27,
    Sxtw = 28,
    Uxtb = 29,
    Uxth = 30,
    // compare
    Cmp = 31,
    Cmn = 32,
    Fcmpe = 33,
    // conditional-set
    CSet = 34,
    // memory load/store
    Ldr = 35,
    Str = 36,
    // memory load/store pair
    Ldp = 37,
    Stp = 38,
    // branches
    B = 39,
    Bl = 40,
    BCond = 41,
    Cbz = 42,
    Cbnz = 43,
    Tbz = 44,
    Tbnz = 45,
    // PC-relative
    Adr = 46,
    // LOAD_ADDR (ADRP + ADD pair, two code words)
    LoadAddr = 47,
    // stack manipulation
    StackAdjust = 48,
    // special
    Ret = 49,
    Brk = 50,
    RealNop = 51,
    // NEON vector (fixed V28/V29/V30 staging per spec.md §4.3, §9)
    NeonFaddVec = 52,
    NeonAddv = 53,
    // data directives (write into the data buffer, not the code buffer)
    DataWord = 54,
    DataQuad = 55,
    // DATA_SYMREF: an 8-byte data slot the linker fills with an absolute
    // address (spec.md §4.3) — distinct from DataQuad, which writes a
    // literal constant rather than a relocated symbol address.
    DataSymRef = 56,
    // CALL_EXT pseudo: BL to an external symbol, resolved by the linker
    CallExt = 57,
    // bookkeeping pseudo-kinds: emit no machine code
    Label = 58,
    FuncBegin = 59,
    FuncEnd = 60,
    DbgLoc = 61,
    Nop = 62,
    Comment = 63,
}

impl InstKind {
    pub fn from_u16(raw: u16) -> Option<InstKind> {
        use InstKind::*;
        const TABLE: &[InstKind] = &[
            AluAddRRR, AluSubRRR, AluAndRRR, AluOrrRRR, AluEorRRR, AluMul, AluSdiv, AluUdiv,
            AluAddRRI, AluSubRRI, AluAndRRI, AluOrrRRI, AluEorRRI, AluAddShifted, AluSubShifted,
            MovZ, MovN, MovK, FAddRRR, FSubRRR, FMulRRR, FDivRRR, Scvtf, Ucvtf, Fcvtzs, Fcvtzu,
            Sxtb, Sxth, Sxtw, Uxtb, Uxth, Cmp, Cmn, Fcmpe, CSet, Ldr, Str, Ldp, Stp, B, Bl, BCond,
            Cbz, Cbnz, Tbz, Tbnz, Adr, LoadAddr, StackAdjust, Ret, Brk, RealNop, NeonFaddVec,
            NeonAddv, DataWord, DataQuad, DataSymRef, CallExt, Label, FuncBegin, FuncEnd, DbgLoc,
            Nop, Comment,
        ];
        TABLE.get(raw as usize).copied()
    }

    /// `true` for the bookkeeping-only pseudo-kinds that the encoder must
    /// never hand to a real per-opcode encoder function.
    pub fn is_pseudo(self) -> bool {
        matches!(
            self,
            InstKind::Label
                | InstKind::FuncBegin
                | InstKind::FuncEnd
                | InstKind::DbgLoc
                | InstKind::Nop
                | InstKind::Comment
        )
    }

    /// How many code words this kind emits, used by the linker (spec.md
    /// §4.5 step 2) to walk the instruction stream when `load_addr_relocs`
    /// must be recomputed rather than trusted from the module.
    pub fn code_word_count(self) -> u32 {
        match self {
            k if k.is_pseudo() => 0,
            InstKind::LoadAddr => 2,
            InstKind::DataWord | InstKind::DataQuad | InstKind::DataSymRef => 0,
            _ => 1,
        }
    }
}

fn name_bytes(name: &str) -> [u8; 80] {
    let mut buf = [0u8; 80];
    let bytes = name.as_bytes();
    let n = bytes.len().min(79); // always leave room for the NUL terminator
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

impl JitInst {
    /// A fully zeroed record with the given kind; callers then set only
    /// the fields that kind actually uses. Mirrors the teacher's per-family
    /// constructor functions (`isa/aarch64/inst/mod.rs`) rather than one
    /// do-everything struct literal at every call site.
    pub fn new(kind: InstKind) -> JitInst {
        JitInst {
            kind: kind as u16,
            cls: Cls::L as u8,
            cond: Cond::Al as u8,
            shift_type: ShiftType::Lsl as u8,
            sym_type: SymType::None as u8,
            is_float: 0,
            _padding: 0,
            rd: -1,
            rn: -1,
            rm: -1,
            ra: -1,
            imm: 0,
            imm2: 0,
            target_id: 0,
            _reserved: 0,
            sym_name: [0u8; 80],
        }
    }

    pub fn alu_rrr(kind: InstKind, cls: Cls, rd: i32, rn: i32, rm: i32) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rd = rd;
        inst.rn = rn;
        inst.rm = rm;
        inst
    }

    pub fn alu_rri(kind: InstKind, cls: Cls, rd: i32, rn: i32, imm: i64) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rd = rd;
        inst.rn = rn;
        inst.imm = imm;
        inst
    }

    pub fn alu_shifted(
        kind: InstKind,
        cls: Cls,
        rd: i32,
        rn: i32,
        rm: i32,
        shift: ShiftType,
        amount: i64,
    ) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rd = rd;
        inst.rn = rn;
        inst.rm = rm;
        inst.shift_type = shift as u8;
        inst.imm2 = amount;
        inst
    }

    pub fn move_wide(kind: InstKind, cls: Cls, rd: i32, imm16: u16, shift: u8) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rd = rd;
        inst.imm = imm16 as i64;
        inst.imm2 = shift as i64;
        inst
    }

    pub fn fp_rrr(kind: InstKind, cls: Cls, rd: i32, rn: i32, rm: i32) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.is_float = 1;
        inst.rd = rd;
        inst.rn = rn;
        inst.rm = rm;
        inst
    }

    pub fn compare(kind: InstKind, cls: Cls, rn: i32, rm: i32) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rn = rn;
        inst.rm = rm;
        inst
    }

    pub fn cset(cls: Cls, rd: i32, cond: Cond) -> JitInst {
        let mut inst = JitInst::new(InstKind::CSet);
        inst.cls = cls as u8;
        inst.rd = rd;
        inst.cond = cond as u8;
        inst
    }

    pub fn mem(kind: InstKind, cls: Cls, rt: i32, rn: i32, offset: i64) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rd = rt;
        inst.rn = rn;
        inst.imm = offset;
        inst
    }

    pub fn mem_pair(kind: InstKind, cls: Cls, rt: i32, rt2: i32, rn: i32, offset: i64) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rd = rt;
        inst.ra = rt2;
        inst.rn = rn;
        inst.imm = offset;
        inst
    }

    pub fn branch(target_id: u32) -> JitInst {
        let mut inst = JitInst::new(InstKind::B);
        inst.target_id = target_id;
        inst
    }

    pub fn branch_cond(cond: Cond, target_id: u32) -> JitInst {
        let mut inst = JitInst::new(InstKind::BCond);
        inst.cond = cond as u8;
        inst.target_id = target_id;
        inst
    }

    pub fn compare_and_branch(kind: InstKind, cls: Cls, rt: i32, target_id: u32) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.cls = cls as u8;
        inst.rn = rt;
        inst.target_id = target_id;
        inst
    }

    pub fn test_and_branch(kind: InstKind, rt: i32, bit: u8, target_id: u32) -> JitInst {
        let mut inst = JitInst::new(kind);
        inst.rn = rt;
        inst.imm = bit as i64;
        inst.target_id = target_id;
        inst
    }

    pub fn call_ext(sym_name: &str) -> JitInst {
        let mut inst = JitInst::new(InstKind::CallExt);
        inst.sym_type = SymType::Func as u8;
        inst.sym_name = name_bytes(sym_name);
        inst
    }

    pub fn load_addr(rd: i32, sym_name: &str, addend: i64) -> JitInst {
        let mut inst = JitInst::new(InstKind::LoadAddr);
        inst.rd = rd;
        inst.imm = addend;
        inst.sym_type = SymType::Data as u8;
        inst.sym_name = name_bytes(sym_name);
        inst
    }

    pub fn data_symref(sym_name: &str, addend: i64) -> JitInst {
        let mut inst = JitInst::new(InstKind::DataSymRef);
        inst.imm = addend;
        inst.sym_type = SymType::Data as u8;
        inst.sym_name = name_bytes(sym_name);
        inst
    }

    pub fn stack_adjust(delta: i64) -> JitInst {
        let mut inst = JitInst::new(InstKind::StackAdjust);
        inst.imm = delta;
        inst
    }

    pub fn label(target_id: u32) -> JitInst {
        let mut inst = JitInst::new(InstKind::Label);
        inst.target_id = target_id;
        inst
    }

    pub fn dbg_loc(line: u32, col: u32) -> JitInst {
        let mut inst = JitInst::new(InstKind::DbgLoc);
        inst.rd = line as i32;
        inst.rn = col as i32;
        inst
    }

    pub fn kind(&self) -> Option<InstKind> {
        InstKind::from_u16(self.kind)
    }

    pub fn sym_name_str(&self) -> &str {
        let nul = self.sym_name.iter().position(|&b| b == 0).unwrap_or(80);
        std::str::from_utf8(&self.sym_name[..nul]).unwrap_or("")
    }
}

/// What the (external) QBE backend appends instructions into. This repo
/// only needs a `Vec`-backed implementation for tests; a real backend
/// would implement this trait directly over its own buffer, mirroring
/// `cranelift-codegen::binemit::CodeSink`.
pub trait Collector {
    fn push(&mut self, inst: JitInst);
}

impl Collector for Vec<JitInst> {
    fn push(&mut self, inst: JitInst) {
        Vec::push(self, inst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jit_inst_is_exactly_128_bytes() {
        assert_eq!(std::mem::size_of::<JitInst>(), 128);
    }

    #[test]
    fn sym_name_round_trips_through_the_fixed_buffer() {
        let inst = JitInst::call_ext("printf");
        assert_eq!(inst.sym_name_str(), "printf");
    }

    #[test]
    fn kind_round_trips_through_the_raw_u16_tag() {
        let inst = JitInst::branch(7);
        assert_eq!(inst.kind(), Some(InstKind::B));
        assert_eq!(inst.target_id, 7);
    }
}
