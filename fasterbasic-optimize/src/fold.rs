//! Host-evaluation helpers for spec.md §4.1 item 1 (numeric constant
//! folding) and item 6 (NOT as bitwise complement). Comparisons are
//! handled by [`fold_binary_numeric`] too, returning exactly `0.0`/`1.0`.

use fasterbasic_ast::{BinOp, ConstValue};

fn is_integer_op(op: BinOp) -> bool {
    matches!(op, BinOp::IDiv | BinOp::Mod | BinOp::And | BinOp::Or | BinOp::Xor)
}

fn is_comparison(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
    )
}

/// Fold a binary numeric op over two constants, per spec.md §4.1 item 1 and
/// §8's invariant: "unless the result is NaN/∞, do not fold." Returns
/// `None` when the op shouldn't be folded for these operands (division or
/// modulo by zero, or a non-finite result).
pub fn fold_binary_numeric(op: BinOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    if is_integer_op(op) {
        let a = lhs.as_i64_truncating()?;
        let b = rhs.as_i64_truncating()?;
        let result = match op {
            BinOp::IDiv => {
                if b == 0 {
                    return None;
                }
                a.wrapping_div(b)
            }
            BinOp::Mod => {
                if b == 0 {
                    return None;
                }
                a.wrapping_rem(b)
            }
            BinOp::And => a & b,
            BinOp::Or => a | b,
            BinOp::Xor => a ^ b,
            _ => unreachable!(),
        };
        return Some(ConstValue::Integer(result));
    }

    let a = lhs.as_f64()?;
    let b = rhs.as_f64()?;

    if is_comparison(op) {
        let truth = match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!(),
        };
        return Some(ConstValue::Double(if truth { 1.0 } else { 0.0 }));
    }

    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        BinOp::Pow => a.powf(b),
        _ => return None,
    };

    if result.is_nan() || result.is_infinite() {
        return None;
    }

    Some(to_matching_kind(result, lhs, rhs))
}

/// Keep an integer result integer when both inputs were integers, so a
/// fold doesn't silently widen `2 + 3` into a double literal.
fn to_matching_kind(result: f64, lhs: &ConstValue, rhs: &ConstValue) -> ConstValue {
    let both_integer = matches!(lhs, ConstValue::Integer(_)) && matches!(rhs, ConstValue::Integer(_));
    if both_integer && result.fract() == 0.0 && result.abs() < (i64::MAX as f64) {
        ConstValue::Integer(result as i64)
    } else {
        ConstValue::Double(result)
    }
}

/// `NOT` is specified as bitwise complement of the 64-bit-cast integer,
/// even in boolean contexts (spec.md §4.1 item 6, §9 Open Questions).
pub fn fold_not(value: &ConstValue) -> Option<ConstValue> {
    let i = value.as_i64_truncating()?;
    Some(ConstValue::Integer(!i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_folds_to_host_evaluation() {
        let result = fold_binary_numeric(
            BinOp::Add,
            &ConstValue::Integer(2),
            &ConstValue::Integer(3),
        );
        assert_eq!(result, Some(ConstValue::Integer(5)));
    }

    #[test]
    fn div_by_zero_does_not_fold() {
        assert_eq!(
            fold_binary_numeric(BinOp::Div, &ConstValue::Double(1.0), &ConstValue::Double(0.0)),
            None
        );
    }

    #[test]
    fn mod_by_zero_does_not_fold() {
        assert_eq!(
            fold_binary_numeric(BinOp::Mod, &ConstValue::Integer(7), &ConstValue::Integer(0)),
            None
        );
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(
            fold_binary_numeric(BinOp::Lt, &ConstValue::Integer(1), &ConstValue::Integer(2)),
            Some(ConstValue::Double(1.0))
        );
        assert_eq!(
            fold_binary_numeric(BinOp::Gt, &ConstValue::Integer(1), &ConstValue::Integer(2)),
            Some(ConstValue::Double(0.0))
        );
    }

    #[test]
    fn not_is_bitwise_complement() {
        assert_eq!(fold_not(&ConstValue::Integer(0)), Some(ConstValue::Integer(-1)));
    }
}
