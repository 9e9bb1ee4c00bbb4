/// Number of characters of source shown on each side of an error offset.
pub const CONTEXT_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileErrorKind {
    /// A specific token or construct was required here
    #[error("expected {0}")]
    Expected(String),

    #[error("expected end of input")]
    ExpectedEnd,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unknown escape sequence: \\{0}")]
    InvalidEscape(char),

    #[error("invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("undeclared variable: {0}")]
    UndeclaredVariable(String),

    #[error("undeclared function: {0}")]
    UndeclaredFunction(String),

    #[error("duplicate function: {0}")]
    DuplicateFunction(String),

    #[error("duplicate parameter '{name}' in function '{function}'")]
    DuplicateParameter { function: String, name: String },

    #[error("duplicate local variable '{name}' in function '{function}'")]
    DuplicateLocal { function: String, name: String },

    #[error("'{0}' is a reserved word")]
    ReservedWord(String),

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Source text surrounding an error offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub before: String,
    pub after: String,
    /// The offset was at the end of input; `before` holds the trailing text.
    pub at_end: bool,
}

impl SourceContext {
    /// Capture up to [`CONTEXT_CHARS`] characters on each side of `position`.
    ///
    /// `position` is a byte offset; it is clamped to the source and moved back
    /// to the nearest character boundary.
    pub fn capture(source: &str, position: usize) -> Self {
        let mut position = position.min(source.len());
        while !source.is_char_boundary(position) {
            position -= 1;
        }

        let (head, tail) = source.split_at(position);
        let before: String = {
            let skip = head.chars().count().saturating_sub(CONTEXT_CHARS);
            head.chars().skip(skip).collect()
        };
        let after: String = tail.chars().take(CONTEXT_CHARS).collect();

        SourceContext {
            before,
            after,
            at_end: tail.is_empty(),
        }
    }
}

/// A compilation failure: what went wrong and the byte offset where it was
/// detected. Compilation stops at the first error.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub position: usize,
    pub context: SourceContext,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, source: &str, position: usize) -> Self {
        CompileError {
            kind,
            position,
            context: SourceContext::capture(source, position),
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "compile error at byte {}: {}",
            self.position, self.kind
        )?;
        if self.context.at_end {
            write!(f, "\n  at end of input: {}", self.context.before)
        } else {
            write!(
                f,
                "\n  near: {}<<HERE>>{}",
                self.context.before, self.context.after
            )
        }
    }
}

impl std::error::Error for CompileError {}
