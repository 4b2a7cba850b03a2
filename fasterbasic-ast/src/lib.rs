//! Contract types shared between the (external) FasterBASIC parser /
//! semantic analyzer and this repo's AST optimizer and codegen. Nothing in
//! this crate implements lexing, parsing, or semantic analysis — it only
//! defines the shapes those stages hand off.

mod expr;
mod loc;
mod step;
mod stmt;
mod symbols;
mod value;

pub use expr::{BinOp, Expr, TypeHint, UnOp};
pub use loc::SourceLoc;
pub use step::{StepDirection, StepDirections};
pub use stmt::{DoLoopKind, ElseIf, ForStmt, Program, Stmt};
pub use symbols::SymbolTable;
pub use value::{ConstKind, ConstValue};
