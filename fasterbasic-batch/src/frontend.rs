//! The boundary with everything spec.md §1 treats as an external
//! collaborator: lexer, parser, semantic analyzer, CFG builder, and the
//! QBE IL emitter/backend. The harness only needs two seams into that
//! black box — before the optimizer and after it — so the `Frontend`
//! trait is exactly that two-method cut, not a reimplementation of any of
//! those stages.

use bumpalo::Bump;
use fasterbasic_ast::{Program, StepDirections, SymbolTable};
use fasterbasic_jit_backend::JitInst;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FrontendError(pub String);

/// Implemented by the (out-of-scope) lexer/parser/semantic-analyzer for
/// the "source text in, AST + symbol table out" half, and by the (also
/// out-of-scope) CFG builder + IL emitter + QBE backend for the "optimized
/// AST in, JitInst stream out" half. The AST Optimizer itself runs in
/// between these two calls, inside the harness, since it *is* in scope.
pub trait Frontend {
    fn parse_and_analyze(&self, source: &str, arena: &Bump) -> Result<(Program, SymbolTable), FrontendError>;

    fn lower_to_jit_insts(&self, program: &Program, steps: &StepDirections, arena: &Bump) -> Result<Vec<JitInst>, FrontendError>;
}

/// A minimal stand-in `Frontend` used by this crate's own tests and as a
/// smoke-test default: every program lowers to a single `RET`, regardless
/// of its statements. Exercising the harness end-to-end does not require a
/// real BASIC compiler front half, just something that satisfies the trait.
pub struct StubFrontend;

impl Frontend for StubFrontend {
    fn parse_and_analyze(&self, _source: &str, _arena: &Bump) -> Result<(Program, SymbolTable), FrontendError> {
        Ok((Program::default(), SymbolTable::new()))
    }

    fn lower_to_jit_insts(&self, _program: &Program, _steps: &StepDirections, _arena: &Bump) -> Result<Vec<JitInst>, FrontendError> {
        Ok(vec![JitInst::new(fasterbasic_jit_backend::InstKind::Ret)])
    }
}
