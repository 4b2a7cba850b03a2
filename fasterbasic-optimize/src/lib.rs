//! The AST optimizer: a single bottom-up recursive walk over the parsed
//! program applying the fourteen local rewrites enumerated in spec.md §4.1
//! (constant folding and propagation, string/algebraic/boolean identities,
//! strength reduction, dead branch/loop elimination, IIF simplification,
//! and FOR step-direction tagging).
//!
//! The walk is read-only with respect to the symbol table: CONST bindings
//! must already be resolved by the semantic analyzer before this pass runs.

mod builtins;
mod error;
mod fold;
mod rewrite;
mod stats;

pub use error::OptimizeError;
pub use stats::OptimizerStats;

use fasterbasic_ast::{Program, StepDirections, SymbolTable};
use rewrite::Optimizer;

/// Everything the optimizer learned while rewriting `program`: how many of
/// each transformation fired, and the FOR step-direction classification
/// codegen needs for loop-exit comparisons (spec.md §4.1 item 13).
#[derive(Clone, Debug, Default)]
pub struct OptimizeOutcome {
    pub stats: OptimizerStats,
    pub step_directions: StepDirections,
}

/// Rewrite `program` in place. `symbols` supplies the CONST bindings this
/// pass propagates into `Var` references; it is never mutated here.
///
/// The only failure mode is an allocation failure while building a
/// replacement node (spec.md §4.1 Failure model); everything else is
/// infallible, including inputs with nothing left to fold.
pub fn optimize(
    program: &mut Program,
    symbols: &SymbolTable,
) -> Result<OptimizeOutcome, OptimizeError> {
    let mut optimizer = Optimizer::new(symbols);
    optimizer.run(program);
    let (stats, step_directions) = optimizer.into_parts();
    log::debug!(
        "optimizer rewrote {} node(s) across {} statement(s)",
        stats.total(),
        program.statements.len()
    );
    Ok(OptimizeOutcome {
        stats,
        step_directions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fasterbasic_ast::{BinOp, ConstValue, Expr, SourceLoc, Stmt};

    fn loc() -> SourceLoc {
        SourceLoc::synthetic()
    }

    fn expr_stmt(expr: Expr) -> Stmt {
        Stmt::Expr { loc: loc(), expr }
    }

    fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            loc: loc(),
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn run(mut program: Program, symbols: &SymbolTable) -> (Program, OptimizeOutcome) {
        let outcome = optimize(&mut program, symbols).expect("optimize never fails here");
        (program, outcome)
    }

    #[test]
    fn constant_folding_reduces_a_nested_arithmetic_expression() {
        // (2 + 3) * 4 -> 20
        let inner = bin(BinOp::Add, Expr::integer(loc(), 2), Expr::integer(loc(), 3));
        let program = Program {
            statements: vec![expr_stmt(bin(BinOp::Mul, inner, Expr::integer(loc(), 4)))],
        };
        let symbols = SymbolTable::default();
        let (program, outcome) = run(program, &symbols);

        match &program.statements[0] {
            Stmt::Expr { expr, .. } => {
                assert_eq!(expr.as_const(), Some(ConstValue::Integer(20)));
            }
            _ => panic!("expected an expression statement"),
        }
        assert_eq!(outcome.stats.constants_folded, 2);
    }

    #[test]
    fn const_propagation_composes_with_constant_folding() {
        // CONST X = 10 -> X + 5 folds to 15, counting both transformations.
        let mut symbols = SymbolTable::default();
        symbols.define_const("X", ConstValue::Integer(10));
        let program = Program {
            statements: vec![expr_stmt(bin(
                BinOp::Add,
                Expr::Var {
                    loc: loc(),
                    name: "X".into(),
                    type_hint: Default::default(),
                },
                Expr::integer(loc(), 5),
            ))],
        };
        let (program, outcome) = run(program, &symbols);

        match &program.statements[0] {
            Stmt::Expr { expr, .. } => {
                assert_eq!(expr.as_const(), Some(ConstValue::Integer(15)));
            }
            _ => panic!("expected an expression statement"),
        }
        assert_eq!(outcome.stats.constants_propagated, 1);
        assert_eq!(outcome.stats.constants_folded, 1);
    }

    #[test]
    fn division_by_an_exact_reciprocal_constant_becomes_a_multiply() {
        let var = || Expr::Var {
            loc: loc(),
            name: "X".into(),
            type_hint: Default::default(),
        };
        let symbols = SymbolTable::default();

        let folds = Program {
            statements: vec![expr_stmt(bin(BinOp::Div, var(), Expr::number(loc(), 4.0)))],
        };
        let (folds, outcome) = run(folds, &symbols);
        match &folds.statements[0] {
            Stmt::Expr {
                expr: Expr::Binary { op, rhs, .. },
                ..
            } => {
                assert_eq!(*op, BinOp::Mul);
                assert_eq!(rhs.as_const(), Some(ConstValue::Double(0.25)));
            }
            other => panic!("expected x * 0.25, got {other:?}"),
        }
        assert_eq!(outcome.stats.div_to_mul, 1);

        let unchanged = Program {
            statements: vec![expr_stmt(bin(BinOp::Div, var(), Expr::number(loc(), 3.0)))],
        };
        let (unchanged, outcome) = run(unchanged, &symbols);
        match &unchanged.statements[0] {
            Stmt::Expr {
                expr: Expr::Binary { op, .. },
                ..
            } => assert_eq!(*op, BinOp::Div),
            other => panic!("expected x / 3.0 to survive unchanged, got {other:?}"),
        }
        assert_eq!(outcome.stats.div_to_mul, 0);
    }

    #[test]
    fn mod_by_a_power_of_two_becomes_and() {
        let var = || Expr::Var {
            loc: loc(),
            name: "X".into(),
            type_hint: Default::default(),
        };
        let symbols = SymbolTable::default();

        let (rewritten, outcome) = run(
            Program {
                statements: vec![expr_stmt(bin(BinOp::Mod, var(), Expr::integer(loc(), 8)))],
            },
            &symbols,
        );
        match &rewritten.statements[0] {
            Stmt::Expr {
                expr: Expr::Binary { op, rhs, .. },
                ..
            } => {
                assert_eq!(*op, BinOp::And);
                assert_eq!(rhs.as_const(), Some(ConstValue::Integer(7)));
            }
            other => panic!("expected x AND 7, got {other:?}"),
        }
        assert_eq!(outcome.stats.mod_to_and, 1);

        let (unchanged, outcome) = run(
            Program {
                statements: vec![expr_stmt(bin(BinOp::Mod, var(), Expr::integer(loc(), 7)))],
            },
            &symbols,
        );
        match &unchanged.statements[0] {
            Stmt::Expr {
                expr: Expr::Binary { op, .. },
                ..
            } => assert_eq!(*op, BinOp::Mod),
            other => panic!("expected x MOD 7 to survive unchanged, got {other:?}"),
        }
        assert_eq!(outcome.stats.mod_to_and, 0);
    }

    #[test]
    fn a_while_loop_with_a_constant_false_condition_is_eliminated() {
        let symbols = SymbolTable::default();
        let program = Program {
            statements: vec![Stmt::While {
                loc: loc(),
                cond: Expr::integer(loc(), 0),
                body: vec![expr_stmt(Expr::integer(loc(), 1))],
            }],
        };
        let (program, outcome) = run(program, &symbols);
        assert!(matches!(program.statements[0], Stmt::Remark { .. }));
        assert_eq!(outcome.stats.dead_loops, 1);
    }

    #[test]
    fn a_false_if_with_only_an_else_branch_collapses_in_one_pass() {
        let symbols = SymbolTable::default();
        let program = Program {
            statements: vec![Stmt::If {
                loc: loc(),
                cond: Expr::integer(loc(), 0),
                then_branch: vec![expr_stmt(Expr::integer(loc(), 1))],
                elseifs: vec![],
                else_branch: Some(vec![expr_stmt(Expr::integer(loc(), 2))]),
            }],
        };
        let (once, outcome_once) = run(program, &symbols);
        assert!(matches!(once.statements[0], Stmt::Block { .. }));
        assert_eq!(outcome_once.stats.dead_branches, 1);

        let (twice, outcome_twice) = run(once.clone(), &symbols);
        assert_eq!(once, twice);
        assert_eq!(outcome_twice.stats.total(), 0);
    }

    #[test]
    fn optimizing_an_already_optimized_program_changes_nothing_further() {
        let mut symbols = SymbolTable::default();
        symbols.define_const("X", ConstValue::Integer(10));
        let program = Program {
            statements: vec![
                expr_stmt(bin(
                    BinOp::Add,
                    Expr::Var {
                        loc: loc(),
                        name: "X".into(),
                        type_hint: Default::default(),
                    },
                    Expr::integer(loc(), 5),
                )),
                Stmt::While {
                    loc: loc(),
                    cond: Expr::integer(loc(), 0),
                    body: vec![],
                },
            ],
        };
        let (once, _) = run(program, &symbols);
        let (twice, outcome_twice) = run(once.clone(), &symbols);
        assert_eq!(once, twice);
        assert_eq!(outcome_twice.stats.total(), 0);
    }
}
