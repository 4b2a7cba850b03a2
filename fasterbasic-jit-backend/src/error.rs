/// Encoding-time error taxonomy (spec.md §7 "Encoding failure"). Each is
/// captured as a [`crate::module::Diagnostic`] rather than aborting the
/// pass — the encoder is best-effort so one run surfaces every error.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid register id {0}")]
    InvalidRegister(i32),
    #[error("immediate {value} out of range for this encoding (max {max})")]
    ImmediateOutOfRange { value: i64, max: i64 },
    #[error("branch offset {0} words exceeds the encodable range")]
    BranchOutOfRange(i64),
    #[error("value {0:#x} is not encodable as an ARM64 logical bitmask immediate")]
    NotABitmaskImmediate(u64),
    #[error("unknown instruction kind tag {0}")]
    UnknownKind(u16),
    #[error("label {0} referenced by a fixup was never defined")]
    UnresolvedLabel(u32),
}
