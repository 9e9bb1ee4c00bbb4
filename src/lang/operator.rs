use serde::{Deserialize, Serialize};

/// Operator symbols understood by the runtime precedence reducer.
///
/// Besides the arithmetic, relational and logical operators this includes the
/// structural pseudo-operators `(` / `)` and the two sentinels that only steer
/// the reducer and never compute a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // relational
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,

    // logic
    And,
    Or,

    // unary
    Not,
    Neg,
    Pos,

    // structural
    LParen,
    RParen,

    /// Forces reduction of every pending operator down to the nearest barrier.
    EndOfExpression,

    /// Barrier separating a call's argument evaluation from the enclosing
    /// expression. Popped by the callee's `Return`.
    PrepareCall,
}

/// Binary operators in scan order: two-character symbols first so that
/// `<=` is never read as `<` followed by `=`.
pub const BINARY_OPERATORS: [(&str, Operator); 13] = [
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    ("<=", Operator::Le),
    (">=", Operator::Ge),
    ("&&", Operator::And),
    ("||", Operator::Or),
    ("<", Operator::Lt),
    (">", Operator::Gt),
    ("+", Operator::Add),
    ("-", Operator::Sub),
    ("*", Operator::Mul),
    ("/", Operator::Div),
    ("%", Operator::Mod),
];

impl Operator {
    /// Binding strength; higher binds tighter.
    pub fn priority(self) -> i32 {
        match self {
            Operator::Not | Operator::Neg | Operator::Pos => 30,
            Operator::Mul | Operator::Div | Operator::Mod => 20,
            Operator::Add | Operator::Sub => 10,
            Operator::Eq
            | Operator::Ne
            | Operator::Le
            | Operator::Ge
            | Operator::Lt
            | Operator::Gt => 5,
            Operator::And => 4,
            Operator::Or => 3,
            Operator::EndOfExpression => 0,
            Operator::LParen | Operator::RParen => -1,
            Operator::PrepareCall => -10,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Not | Operator::Neg | Operator::Pos)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::Le | Operator::Ge | Operator::Lt | Operator::Gt
        )
    }

    /// Barriers are never reduced by an incoming operator.
    pub fn is_barrier(self) -> bool {
        matches!(self, Operator::LParen | Operator::PrepareCall)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
            Operator::Neg => "Unary-",
            Operator::Pos => "Unary+",
            Operator::LParen => "(",
            Operator::RParen => ")",
            Operator::EndOfExpression => "EndOfExpression",
            Operator::PrepareCall => "PrepareCall",
        }
    }

    /// Maps a prefix symbol (`!`, `-`, `+`) to its unary operator.
    pub fn unary_from_char(ch: char) -> Option<Operator> {
        match ch {
            '!' => Some(Operator::Not),
            '-' => Some(Operator::Neg),
            '+' => Some(Operator::Pos),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
