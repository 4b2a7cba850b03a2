//! Constant folding for the pure built-in functions named in spec.md §4.1
//! item 14. Each helper takes already-evaluated constant arguments and
//! returns `None` when the spec says "do not fold" for that input rather
//! than guessing at a value.

use fasterbasic_ast::ConstValue;

/// Attempt to fold a call to `name` given constant `args`. Returns `None`
/// when `name` isn't one of the pure built-ins this pass knows, the arity
/// doesn't match, or the specific input is one the spec excludes from
/// folding.
pub fn fold_builtin(name: &str, args: &[ConstValue]) -> Option<ConstValue> {
    match name.to_ascii_uppercase().as_str() {
        "LEN" => len(args),
        "ASC" => asc(args),
        "CHR$" => chr(args),
        "UCASE$" => case_fold(args, str::to_ascii_uppercase),
        "LCASE$" => case_fold(args, str::to_ascii_lowercase),
        "TRIM$" => trim(args, true, true),
        "LTRIM$" => trim(args, true, false),
        "RTRIM$" => trim(args, false, true),
        "VAL" => val(args),
        "STR$" => str_dollar(args),
        "SPACE$" => space(args),
        "LEFT$" => left(args),
        "RIGHT$" => right(args),
        "INSTR" => instr(args),
        "STRING$" => string_dollar(args),
        "MID$" => mid(args),
        _ => None,
    }
}

fn one_str(args: &[ConstValue]) -> Option<&str> {
    match args {
        [ConstValue::Str(s)] => Some(s.as_str()),
        _ => None,
    }
}

fn len(args: &[ConstValue]) -> Option<ConstValue> {
    one_str(args).map(|s| ConstValue::Integer(s.chars().count() as i64))
}

fn asc(args: &[ConstValue]) -> Option<ConstValue> {
    let s = one_str(args)?;
    // Undefined on empty input: do not fold, per spec.md item 14.
    let c = s.chars().next()?;
    Some(ConstValue::Integer(c as i64))
}

fn chr(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Integer(code)] if (0..=127).contains(code) => {
            Some(ConstValue::Str((*code as u8 as char).to_string()))
        }
        _ => None,
    }
}

fn case_fold(args: &[ConstValue], f: fn(&str) -> String) -> Option<ConstValue> {
    one_str(args).map(|s| ConstValue::Str(f(s)))
}

fn trim(args: &[ConstValue], left: bool, right: bool) -> Option<ConstValue> {
    let s = one_str(args)?;
    let mut out = s;
    if left {
        out = out.trim_start_matches(' ');
    }
    if right {
        out = out.trim_end_matches(' ');
    }
    Some(ConstValue::Str(out.to_string()))
}

fn val(args: &[ConstValue]) -> Option<ConstValue> {
    let s = one_str(args)?;
    // "must parse cleanly": no partial-prefix BASIC-style leniency here.
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(ConstValue::Integer(i));
    }
    trimmed.parse::<f64>().ok().map(ConstValue::Double)
}

fn str_dollar(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Integer(i)] => Some(ConstValue::Str(i.to_string())),
        // Fold only when the double is an exact integer, per spec.md item 14.
        [ConstValue::Double(d)] if d.fract() == 0.0 && d.is_finite() => {
            Some(ConstValue::Str((*d as i64).to_string()))
        }
        _ => None,
    }
}

fn space(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Integer(n)] if (0..=256).contains(n) => {
            Some(ConstValue::Str(" ".repeat(*n as usize)))
        }
        _ => None,
    }
}

fn left(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Str(s), ConstValue::Integer(n)] => {
            if *n < 0 {
                return None;
            }
            let chars: Vec<char> = s.chars().collect();
            let take = (*n as usize).min(chars.len());
            Some(ConstValue::Str(chars[..take].iter().collect()))
        }
        _ => None,
    }
}

fn right(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Str(s), ConstValue::Integer(n)] => {
            if *n < 0 {
                return None;
            }
            let chars: Vec<char> = s.chars().collect();
            let take = (*n as usize).min(chars.len());
            let start = chars.len() - take;
            Some(ConstValue::Str(chars[start..].iter().collect()))
        }
        _ => None,
    }
}

fn instr(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Str(haystack), ConstValue::Str(needle)] => {
            let found = find_1based(haystack, needle, 1);
            Some(ConstValue::Integer(found))
        }
        [ConstValue::Integer(start), ConstValue::Str(haystack), ConstValue::Str(needle)] => {
            if *start < 1 {
                return None;
            }
            Some(ConstValue::Integer(find_1based(haystack, needle, *start as usize)))
        }
        _ => None,
    }
}

fn find_1based(haystack: &str, needle: &str, start: usize) -> i64 {
    let chars: Vec<char> = haystack.chars().collect();
    if start > chars.len() + 1 {
        return 0;
    }
    let from: String = chars[start - 1..].iter().collect();
    match from.find(needle) {
        Some(byte_idx) => {
            let char_idx = from[..byte_idx].chars().count();
            (start + char_idx) as i64
        }
        None => 0,
    }
}

fn string_dollar(args: &[ConstValue]) -> Option<ConstValue> {
    let (count, fill) = match args {
        [ConstValue::Integer(n), ConstValue::Integer(code)] => {
            if !(0..=255).contains(code) {
                return None;
            }
            (*n, *code as u8 as char)
        }
        [ConstValue::Integer(n), ConstValue::Str(s)] => (*n, s.chars().next()?),
        _ => return None,
    };
    if !(0..=256).contains(&count) {
        return None;
    }
    Some(ConstValue::Str(fill.to_string().repeat(count as usize)))
}

fn mid(args: &[ConstValue]) -> Option<ConstValue> {
    match args {
        [ConstValue::Str(s), ConstValue::Integer(start)] => mid_impl(s, *start, None),
        [ConstValue::Str(s), ConstValue::Integer(start), ConstValue::Integer(len)] => {
            mid_impl(s, *start, Some(*len))
        }
        _ => None,
    }
}

fn mid_impl(s: &str, start: i64, len: Option<i64>) -> Option<ConstValue> {
    if start < 1 {
        return None;
    }
    if let Some(len) = len {
        if len < 0 {
            return None;
        }
    }
    let chars: Vec<char> = s.chars().collect();
    let start0 = (start as usize) - 1;
    if start0 >= chars.len() {
        return Some(ConstValue::Str(String::new()));
    }
    let available = chars.len() - start0;
    let take = match len {
        Some(len) => (len as usize).min(available),
        None => available,
    };
    Some(ConstValue::Str(chars[start0..start0 + take].iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_chars() {
        assert_eq!(
            fold_builtin("LEN", &[ConstValue::Str("hello".into())]),
            Some(ConstValue::Integer(5))
        );
    }

    #[test]
    fn asc_empty_does_not_fold() {
        assert_eq!(fold_builtin("ASC", &[ConstValue::Str(String::new())]), None);
    }

    #[test]
    fn chr_out_of_range_does_not_fold() {
        assert_eq!(fold_builtin("CHR$", &[ConstValue::Integer(200)]), None);
    }

    #[test]
    fn mid_start_past_end_is_empty() {
        assert_eq!(
            fold_builtin(
                "MID$",
                &[ConstValue::Str("abc".into()), ConstValue::Integer(10)]
            ),
            Some(ConstValue::Str(String::new()))
        );
    }

    #[test]
    fn instr_is_one_based_and_zero_when_missing() {
        assert_eq!(
            fold_builtin(
                "INSTR",
                &[ConstValue::Str("abcabc".into()), ConstValue::Str("cab".into())]
            ),
            Some(ConstValue::Integer(3))
        );
        assert_eq!(
            fold_builtin(
                "INSTR",
                &[ConstValue::Str("abc".into()), ConstValue::Str("z".into())]
            ),
            Some(ConstValue::Integer(0))
        );
    }

    #[test]
    fn str_dollar_only_folds_exact_integers() {
        assert_eq!(
            fold_builtin("STR$", &[ConstValue::Double(3.0)]),
            Some(ConstValue::Str("3".into()))
        );
        assert_eq!(fold_builtin("STR$", &[ConstValue::Double(3.5)]), None);
    }
}
