use fasterbasic_ast::{
    BinOp, ConstValue, DoLoopKind, ElseIf, Expr, ForStmt, Program, SourceLoc, StepDirection,
    StepDirections, Stmt, SymbolTable, UnOp,
};

use crate::builtins::fold_builtin;
use crate::fold::{fold_binary_numeric, fold_not};
use crate::stats::OptimizerStats;

/// Carries the read-only symbol table and the per-pass mutable state
/// (counters, the FOR step-direction map) through the single recursive
/// walk described in spec.md §4.1.
pub struct Optimizer<'a> {
    symbols: &'a SymbolTable,
    stats: OptimizerStats,
    steps: StepDirections,
}

impl<'a> Optimizer<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Optimizer<'a> {
        Optimizer {
            symbols,
            stats: OptimizerStats::new(),
            steps: StepDirections::new(),
        }
    }

    pub fn run(&mut self, program: &mut Program) {
        self.rewrite_stmts(&mut program.statements);
    }

    pub fn into_parts(self) -> (OptimizerStats, StepDirections) {
        (self.stats, self.steps)
    }

    fn rewrite_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        for stmt in stmts.iter_mut() {
            self.rewrite_stmt(stmt);
        }
    }

    fn rewrite_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr { expr, .. } => self.rewrite_expr(expr),
            Stmt::Let { target, value, .. } => {
                self.rewrite_expr(target);
                self.rewrite_expr(value);
            }
            Stmt::If { .. } => self.rewrite_if(stmt),
            Stmt::While { cond, body, .. } => {
                self.rewrite_expr(cond);
                self.rewrite_stmts(body);
                if let Some(false) = truthy(cond) {
                    self.stats.dead_loops += 1;
                    *stmt = Stmt::remark(stmt.loc(), "WHILE condition is always false");
                }
                // WHILE-true (infinite) is intentionally left alone.
            }
            Stmt::DoLoop {
                kind, cond, body, ..
            } => {
                self.rewrite_expr(cond);
                self.rewrite_stmts(body);
                let eliminate = match (*kind, truthy(cond)) {
                    (DoLoopKind::PreWhile, Some(false)) => true,
                    (DoLoopKind::PreUntil, Some(true)) => true,
                    _ => false,
                };
                if eliminate {
                    self.stats.dead_loops += 1;
                    *stmt = Stmt::remark(stmt.loc(), "loop body is never reached");
                }
            }
            Stmt::For(for_stmt) => self.rewrite_for(for_stmt),
            Stmt::Remark { .. } => {}
            Stmt::Block { body, .. } => self.rewrite_stmts(body),
        }
    }

    fn rewrite_if(&mut self, stmt: &mut Stmt) {
        let Stmt::If {
            loc,
            cond,
            then_branch,
            elseifs,
            else_branch,
        } = stmt
        else {
            unreachable!("rewrite_if called on a non-If statement")
        };

        self.rewrite_expr(cond);
        self.rewrite_stmts(then_branch);
        for arm in elseifs.iter_mut() {
            self.rewrite_expr(&mut arm.cond);
            self.rewrite_stmts(&mut arm.body);
        }
        if let Some(else_body) = else_branch {
            self.rewrite_stmts(else_body);
        }

        let truth = match truthy(cond) {
            Some(truth) => truth,
            None => return,
        };

        // Pull everything out by value so the reassignment of `*stmt`
        // below doesn't race the borrows destructured above.
        let loc = *loc;
        let then_branch = std::mem::take(then_branch);
        let mut elseifs = std::mem::take(elseifs);
        let else_branch = else_branch.take();

        self.stats.dead_branches += 1;
        if truth {
            *stmt = Stmt::Block {
                loc,
                body: then_branch,
            };
        } else if !elseifs.is_empty() {
            let ElseIf {
                cond: promoted_cond,
                body: promoted_body,
            } = elseifs.remove(0);
            *stmt = Stmt::If {
                loc,
                cond: promoted_cond,
                then_branch: promoted_body,
                elseifs,
                else_branch,
            };
        } else if let Some(else_body) = else_branch {
            *stmt = Stmt::Block {
                loc,
                body: else_body,
            };
        } else {
            *stmt = Stmt::remark(loc, "IF condition is always false");
        }
    }

    fn rewrite_for(&mut self, for_stmt: &mut ForStmt) {
        self.rewrite_expr(&mut for_stmt.start);
        self.rewrite_expr(&mut for_stmt.stop);
        if let Some(step) = &mut for_stmt.step {
            self.rewrite_expr(step);
        }
        self.rewrite_stmts(&mut for_stmt.body);

        let direction = match &for_stmt.step {
            None => StepDirection::Positive,
            Some(step_expr) => match step_expr.as_const().and_then(|c| c.as_f64()) {
                Some(v) if v > 0.0 => StepDirection::Positive,
                Some(v) if v < 0.0 => StepDirection::Negative,
                Some(_) => StepDirection::Zero,
                None => StepDirection::Unknown,
            },
        };
        self.steps.set(&for_stmt.var, direction);
        self.stats.for_steps_tagged += 1;
    }

    fn rewrite_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::NumberLit { .. } | Expr::StringLit { .. } => {}
            Expr::Var { name, loc, .. } => {
                if let Some(value) = self.symbols.lookup_const(name) {
                    self.stats.constants_propagated += 1;
                    *expr = literal_from_const(*loc, value.clone());
                }
            }
            Expr::Binary { op, lhs, rhs, loc } => {
                self.rewrite_expr(lhs);
                self.rewrite_expr(rhs);
                if let Some(rewritten) = self.try_rewrite_binary(*op, lhs, rhs, *loc) {
                    *expr = rewritten;
                }
            }
            Expr::Unary { op, operand, loc } => {
                self.rewrite_expr(operand);
                if let Some(rewritten) = self.try_rewrite_unary(*op, operand, *loc) {
                    *expr = rewritten;
                }
            }
            Expr::Call { name, args, loc } => {
                for arg in args.iter_mut() {
                    self.rewrite_expr(arg);
                }
                if let Some(rewritten) = self.try_fold_call(name, args, *loc) {
                    *expr = rewritten;
                }
            }
            Expr::MethodCall { receiver, args, .. } => {
                self.rewrite_expr(receiver);
                for arg in args.iter_mut() {
                    self.rewrite_expr(arg);
                }
            }
            Expr::Member { receiver, .. } => self.rewrite_expr(receiver),
            Expr::ArrayAccess { array, index, .. } => {
                self.rewrite_expr(array);
                self.rewrite_expr(index);
            }
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.rewrite_expr(cond);
                self.rewrite_expr(then_branch);
                self.rewrite_expr(else_branch);
                if let Some(truth) = truthy(cond) {
                    self.stats.iif_simplified += 1;
                    *expr = if truth {
                        (**then_branch).clone()
                    } else {
                        (**else_branch).clone()
                    };
                }
            }
            Expr::Spawn { call, .. } => self.rewrite_expr(call),
            Expr::Await { value, .. } => self.rewrite_expr(value),
        }
    }

    fn try_rewrite_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        loc: SourceLoc,
    ) -> Option<Expr> {
        let lhs_const = lhs.as_const();
        let rhs_const = rhs.as_const();

        if let (Some(lc), Some(rc)) = (&lhs_const, &rhs_const) {
            if matches!(op, BinOp::Add | BinOp::Concat) && lc.is_string() && rc.is_string() {
                let mut s = lc.as_str().unwrap().to_string();
                s.push_str(rc.as_str().unwrap());
                self.stats.strings_folded += 1;
                return Some(Expr::string(loc, s));
            }
            if lc.is_numeric() && rc.is_numeric() {
                if let Some(folded) = fold_binary_numeric(op, lc, rc) {
                    self.stats.constants_folded += 1;
                    return Some(literal_from_const(loc, folded));
                }
                // Division/modulo by zero, or a non-finite result: leave
                // the tree unchanged, per spec.md §4.1 item 1.
                return None;
            }
        }

        if matches!(op, BinOp::Add | BinOp::Concat) {
            if let Expr::StringLit { value, .. } = lhs {
                if value.is_empty() && rhs.is_string_typed() {
                    self.stats.strings_folded += 1;
                    return Some(rhs.clone());
                }
            }
            if let Expr::StringLit { value, .. } = rhs {
                if value.is_empty() && lhs.is_string_typed() {
                    self.stats.strings_folded += 1;
                    return Some(lhs.clone());
                }
            }
        }

        if op == BinOp::Pow {
            if let Some(n) = rhs_const.as_ref().and_then(|c| c.as_f64()) {
                if n == 2.0 {
                    self.stats.pow_reduced += 1;
                    return Some(mul(lhs.clone(), lhs.clone(), loc));
                }
                if n == 3.0 {
                    self.stats.pow_reduced += 1;
                    return Some(mul(mul(lhs.clone(), lhs.clone(), loc), lhs.clone(), loc));
                }
                if n == -1.0 {
                    self.stats.pow_reduced += 1;
                    return Some(bin(BinOp::Div, Expr::integer(loc, 1), lhs.clone(), loc));
                }
            }
        }

        if let Some(rc) = rhs_const.as_ref().and_then(|c| c.as_f64()) {
            match op {
                BinOp::Add if rc == 0.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(lhs.clone());
                }
                BinOp::Sub if rc == 0.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(lhs.clone());
                }
                BinOp::Mul if rc == 0.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(literal_from_const(loc, rhs_const.clone().unwrap()));
                }
                BinOp::Mul if rc == 1.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(lhs.clone());
                }
                BinOp::Mul if rc == -1.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(neg(lhs.clone(), loc));
                }
                BinOp::Div if rc == 1.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(lhs.clone());
                }
                BinOp::Pow if rc == 0.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(Expr::integer(loc, 1));
                }
                BinOp::Pow if rc == 1.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(lhs.clone());
                }
                _ => {}
            }
        }
        if let Some(lc) = lhs_const.as_ref().and_then(|c| c.as_f64()) {
            match op {
                BinOp::Add if lc == 0.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(rhs.clone());
                }
                BinOp::Mul if lc == 0.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(literal_from_const(loc, lhs_const.clone().unwrap()));
                }
                BinOp::Mul if lc == 1.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(rhs.clone());
                }
                BinOp::Mul if lc == -1.0 => {
                    self.stats.algebraic_identities += 1;
                    return Some(neg(rhs.clone(), loc));
                }
                _ => {}
            }
        }

        if op == BinOp::Div {
            if let Some(c) = rhs_const.as_ref().and_then(|c| c.as_f64()) {
                if c != 0.0 && c.abs() != 1.0 {
                    let recip = 1.0 / c;
                    if recip * c == 1.0 {
                        self.stats.div_to_mul += 1;
                        return Some(mul(lhs.clone(), Expr::number(loc, recip), loc));
                    }
                }
            }
        }

        if op == BinOp::Mod {
            if let Some(ConstValue::Integer(c)) = &rhs_const {
                if *c > 0 && (*c & (*c - 1)) == 0 {
                    self.stats.mod_to_and += 1;
                    return Some(bin(
                        BinOp::And,
                        lhs.clone(),
                        Expr::integer(loc, c - 1),
                        loc,
                    ));
                }
            }
        }

        if op == BinOp::And || op == BinOp::Or {
            let rhs_i = rhs_const.as_ref().and_then(|c| c.as_i64_truncating());
            let lhs_i = lhs_const.as_ref().and_then(|c| c.as_i64_truncating());
            if op == BinOp::And {
                if rhs_i == Some(0) || lhs_i == Some(0) {
                    self.stats.bool_identities += 1;
                    return Some(Expr::integer(loc, 0));
                }
                if rhs_i == Some(-1) {
                    self.stats.bool_identities += 1;
                    return Some(lhs.clone());
                }
                if lhs_i == Some(-1) {
                    self.stats.bool_identities += 1;
                    return Some(rhs.clone());
                }
            } else {
                if rhs_i == Some(0) {
                    self.stats.bool_identities += 1;
                    return Some(lhs.clone());
                }
                if lhs_i == Some(0) {
                    self.stats.bool_identities += 1;
                    return Some(rhs.clone());
                }
                if rhs_i == Some(-1) || lhs_i == Some(-1) {
                    self.stats.bool_identities += 1;
                    return Some(Expr::integer(loc, -1));
                }
            }
        }

        None
    }

    fn try_rewrite_unary(&mut self, op: UnOp, operand: &Expr, loc: SourceLoc) -> Option<Expr> {
        match op {
            UnOp::Neg => {
                if let Expr::Unary {
                    op: UnOp::Neg,
                    operand: inner,
                    ..
                } = operand
                {
                    self.stats.double_negations += 1;
                    return Some((**inner).clone());
                }
                None
            }
            UnOp::Not => {
                if let Expr::Unary {
                    op: UnOp::Not,
                    operand: inner,
                    ..
                } = operand
                {
                    self.stats.double_negations += 1;
                    return Some((**inner).clone());
                }
                if let Some(value) = operand.as_const() {
                    if value.is_numeric() {
                        if let Some(folded) = fold_not(&value) {
                            self.stats.constants_folded += 1;
                            return Some(literal_from_const(loc, folded));
                        }
                    }
                }
                None
            }
        }
    }

    fn try_fold_call(&mut self, name: &str, args: &[Expr], loc: SourceLoc) -> Option<Expr> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(arg.as_const()?);
        }
        let folded = fold_builtin(name, &values)?;
        self.stats.builtins_folded += 1;
        Some(literal_from_const(loc, folded))
    }
}

/// `None` when `cond` doesn't fold to a constant; `Some(truth)` otherwise,
/// where truth follows the "nonzero is true" convention used throughout
/// spec.md (comparisons yield exactly 0.0/1.0, and any nonzero numeric
/// literal is truthy for IF/WHILE/IIF purposes).
fn truthy(expr: &Expr) -> Option<bool> {
    let value = expr.as_const()?;
    match value {
        ConstValue::Integer(i) => Some(i != 0),
        ConstValue::Double(d) => Some(d != 0.0),
        ConstValue::Str(_) => None,
    }
}

fn literal_from_const(loc: SourceLoc, value: ConstValue) -> Expr {
    match value {
        ConstValue::Str(s) => Expr::string(loc, s),
        other => Expr::NumberLit { loc, value: other },
    }
}

fn bin(op: BinOp, lhs: Expr, rhs: Expr, loc: SourceLoc) -> Expr {
    Expr::Binary {
        loc,
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn mul(lhs: Expr, rhs: Expr, loc: SourceLoc) -> Expr {
    bin(BinOp::Mul, lhs, rhs, loc)
}

fn neg(operand: Expr, loc: SourceLoc) -> Expr {
    Expr::Unary {
        loc,
        op: UnOp::Neg,
        operand: Box::new(operand),
    }
}
