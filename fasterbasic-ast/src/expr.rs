use crate::loc::SourceLoc;
use crate::value::ConstValue;

/// Binary operators recognized by the optimizer. Mirrors the surface
/// grammar's operator set; anything the parser can produce that isn't
/// handled by a specific fold is left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat, // `&`, kept distinct from `+` which is overloaded for strings
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Static, source-level hint about whether an expression's static type is
/// known to be string-valued. Populated by the semantic analyzer (external
/// collaborator) on variable and call nodes; the optimizer consults it but
/// never computes it from scratch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TypeHint {
    #[default]
    Unknown,
    String,
    Numeric,
}

/// An expression node. The optimizer rewrites this tree bottom-up; a
/// rewrite either aliases an existing child (no allocation) or builds a
/// fresh node (one allocation per fold).
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    NumberLit {
        loc: SourceLoc,
        value: ConstValue, // always Integer or Double
    },
    StringLit {
        loc: SourceLoc,
        value: String,
    },
    Var {
        loc: SourceLoc,
        name: String,
        type_hint: TypeHint,
    },
    Binary {
        loc: SourceLoc,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        loc: SourceLoc,
        op: UnOp,
        operand: Box<Expr>,
    },
    Call {
        loc: SourceLoc,
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        loc: SourceLoc,
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Member {
        loc: SourceLoc,
        receiver: Box<Expr>,
        name: String,
    },
    ArrayAccess {
        loc: SourceLoc,
        array: Box<Expr>,
        index: Box<Expr>,
    },
    /// `IIF(cond, then, else)`.
    Conditional {
        loc: SourceLoc,
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Spawn {
        loc: SourceLoc,
        call: Box<Expr>,
    },
    Await {
        loc: SourceLoc,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Expr::NumberLit { loc, .. }
            | Expr::StringLit { loc, .. }
            | Expr::Var { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::MethodCall { loc, .. }
            | Expr::Member { loc, .. }
            | Expr::ArrayAccess { loc, .. }
            | Expr::Conditional { loc, .. }
            | Expr::Spawn { loc, .. }
            | Expr::Await { loc, .. } => *loc,
        }
    }

    pub fn number(loc: SourceLoc, value: f64) -> Expr {
        Expr::NumberLit {
            loc,
            value: ConstValue::Double(value),
        }
    }

    pub fn integer(loc: SourceLoc, value: i64) -> Expr {
        Expr::NumberLit {
            loc,
            value: ConstValue::Integer(value),
        }
    }

    pub fn string(loc: SourceLoc, value: impl Into<String>) -> Expr {
        Expr::StringLit {
            loc,
            value: value.into(),
        }
    }

    /// The constant value of this node if it is a bare literal or the
    /// unary negation of one — the two forms spec.md's folding rules treat
    /// as "compile-time constants".
    pub fn as_const(&self) -> Option<ConstValue> {
        match self {
            Expr::NumberLit { value, .. } => Some(value.clone()),
            Expr::StringLit { value, .. } => Some(ConstValue::Str(value.clone())),
            Expr::Unary {
                op: UnOp::Neg,
                operand,
                ..
            } => match operand.as_const()? {
                ConstValue::Integer(i) => Some(ConstValue::Integer(i.wrapping_neg())),
                ConstValue::Double(d) => Some(ConstValue::Double(-d)),
                ConstValue::Str(_) => None,
            },
            _ => None,
        }
    }

    /// Conservative "this expression is statically known to be string-typed"
    /// check backing the `+`/`&` string-concat identities (spec.md item 3).
    pub fn is_string_typed(&self) -> bool {
        match self {
            Expr::StringLit { .. } => true,
            Expr::Var { name, type_hint, .. } => {
                *type_hint == TypeHint::String || name.ends_with('$')
            }
            Expr::Call { name, .. } => name.ends_with('$'),
            Expr::MethodCall { name, .. } | Expr::Member { name, .. } => name.ends_with('$'),
            Expr::ArrayAccess { array, .. } => array.is_string_typed(),
            Expr::Conditional {
                then_branch,
                else_branch,
                ..
            } => then_branch.is_string_typed() || else_branch.is_string_typed(),
            Expr::Binary {
                op: BinOp::Add | BinOp::Concat,
                lhs,
                rhs,
                ..
            } => lhs.is_string_typed() || rhs.is_string_typed(),
            _ => false,
        }
    }
}
