/// Errors from the memory-region/linker layer (spec.md §7 "Linking
/// failure"). Encoding-time problems live one layer down in
/// `fasterbasic_jit_backend::EncodeError` and arrive here only as
/// already-collected [`crate::link::Diagnostic`]s.
#[derive(Debug, thiserror::Error)]
pub enum JitError {
    #[error("failed to allocate a {0}-byte memory region: {1}")]
    Allocate(usize, region::Error),
    #[error("failed to change memory protection: {0}")]
    Protect(region::Error),
    #[error("code region is not writable (already made executable)")]
    NotWritable,
    #[error("write of {len} bytes at offset {offset} would overflow the {capacity}-byte region")]
    Overflow { offset: usize, len: usize, capacity: usize },
    #[error("linking failed with {0} error diagnostic(s); refusing to make the region executable")]
    LinkFailed(usize),
    #[error("code region was never made executable")]
    NotExecutable,
    #[error("failed to install a signal handler: {0}")]
    SignalSetup(#[from] std::io::Error),
}
