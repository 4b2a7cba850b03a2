/// The optimizer's only failure mode (spec.md §4.1 Failure model): an
/// allocation failure encountered while building a replacement node. Kept
/// as a real, propagated error rather than a panic so callers embedding
/// this pass in a larger pipeline can report it like any other compiler
/// error, even though in practice Rust's global allocator aborts rather
/// than returning `Err` on exhaustion.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("allocation failed while rewriting the AST")]
    Alloc,
}
