use std::fmt;

/// A compile-time constant value, shared by numeric-literal AST nodes and
/// symbol-table CONST records.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Integer(i64),
    Double(f64),
    Str(String),
}

impl ConstValue {
    /// `true` for the two numeric variants.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ConstValue::Integer(_) | ConstValue::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ConstValue::Str(_))
    }

    /// Widen to `f64` for folding arithmetic that isn't integer-only.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstValue::Integer(i) => Some(*i as f64),
            ConstValue::Double(d) => Some(*d),
            ConstValue::Str(_) => None,
        }
    }

    /// Cast to `i64` the way integer-typed ops do: truncating through a
    /// 64-bit signed cast, per spec.md item 1.
    pub fn as_i64_truncating(&self) -> Option<i64> {
        match self {
            ConstValue::Integer(i) => Some(*i),
            ConstValue::Double(d) => Some(*d as i64),
            ConstValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstValue::Integer(i) => write!(f, "{i}"),
            ConstValue::Double(d) => write!(f, "{d}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// The kind tag stored alongside a symbol-table constant record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstKind {
    Integer,
    Double,
    Str,
}

impl ConstValue {
    pub fn kind(&self) -> ConstKind {
        match self {
            ConstValue::Integer(_) => ConstKind::Integer,
            ConstValue::Double(_) => ConstKind::Double,
            ConstValue::Str(_) => ConstKind::Str,
        }
    }
}
