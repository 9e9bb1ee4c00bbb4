use crate::bytecode::compile_error::{CompileError, CompileErrorKind};
use crate::lang::operator::{BINARY_OPERATORS, Operator};
use crate::lang::value::Value;

pub const KEYWORDS: [&str; 8] = [
    "var", "function", "return", "if", "else", "while", "true", "false",
];

const SINGLE_LINE_COMMENT: &str = "//";

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Identifier characters. Digits are allowed in first position too.
pub fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// On-demand scanner driven by the compiler.
///
/// There is no token stream: the compiler asks for the construct it expects
/// next and the scanner either consumes it or leaves the position untouched.
/// Blanks and `//` comments are skipped before every construct. Positions
/// are byte offsets into the source.
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner { source, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Backtrack to a position previously returned by [`Scanner::position`].
    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn error(&self, kind: CompileErrorKind) -> CompileError {
        self.error_at(kind, self.pos)
    }

    pub fn error_at(&self, kind: CompileErrorKind, pos: usize) -> CompileError {
        CompileError::new(kind, self.source, pos)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub fn skip_blanks(&mut self) {
        loop {
            while let Some(' ' | '\t' | '\r' | '\n') = self.current() {
                self.advance();
            }

            if !self.rest().starts_with(SINGLE_LINE_COMMENT) {
                break;
            }
            while let Some(ch) = self.advance() {
                if ch == '\n' {
                    break;
                }
            }
        }
    }

    /// True when only blanks and comments remain.
    pub fn at_end(&mut self) -> bool {
        self.skip_blanks();
        self.pos == self.source.len()
    }

    pub fn parse_char(&mut self, symbol: char) -> bool {
        self.skip_blanks();
        if self.current() == Some(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `word` only if it is not the prefix of a longer identifier,
    /// so `var1` is never read as `var` followed by `1`.
    pub fn parse_keyword(&mut self, word: &str) -> bool {
        self.skip_blanks();
        let rest = self.rest();
        if !rest.starts_with(word) {
            return false;
        }
        match rest[word.len()..].chars().next() {
            Some(ch) if is_ident_char(ch) => false,
            _ => {
                self.pos += word.len();
                true
            }
        }
    }

    /// Read `[A-Za-z0-9_]+`. Keywords are returned like any other word; the
    /// caller decides whether they are acceptable.
    pub fn parse_identifier(&mut self) -> Option<&'a str> {
        self.skip_blanks();
        let start = self.pos;
        while let Some(ch) = self.current() {
            if !is_ident_char(ch) {
                break;
            }
            self.advance();
        }
        if self.pos == start {
            None
        } else {
            Some(&self.source[start..self.pos])
        }
    }

    pub fn parse_binary_operator(&mut self) -> Option<Operator> {
        self.skip_blanks();
        let rest = self.rest();
        let (symbol, op) = BINARY_OPERATORS
            .iter()
            .find(|(symbol, _)| rest.starts_with(symbol))?;
        self.pos += symbol.len();
        Some(*op)
    }

    /// `!`, `-` or `+` in operand position.
    pub fn parse_unary_operator(&mut self) -> Option<Operator> {
        self.skip_blanks();
        let op = Operator::unary_from_char(self.current()?)?;
        self.advance();
        Some(op)
    }

    /// Read `'...'` (with `\n \t \r \\ \'` escapes) or raw `@'...'`.
    ///
    /// Returns `Ok(None)` without consuming anything if no string starts here.
    pub fn read_string(&mut self) -> Result<Option<String>, CompileError> {
        self.skip_blanks();
        let start = self.pos;

        let raw = match self.current() {
            Some('@') => {
                self.advance();
                if self.current() != Some('\'') {
                    return Err(self.error(CompileErrorKind::Expected(
                        "' after @".to_string(),
                    )));
                }
                true
            }
            Some('\'') => false,
            _ => return Ok(None),
        };
        self.advance(); // opening quote

        let mut string = String::new();
        loop {
            match self.advance() {
                Some('\'') => return Ok(Some(string)),
                Some('\\') if !raw => {
                    let escape_pos = self.pos;
                    match self.advance() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some('\'') => string.push('\''),
                        Some(ch) => {
                            return Err(
                                self.error_at(CompileErrorKind::InvalidEscape(ch), escape_pos)
                            );
                        }
                        None => {
                            return Err(
                                self.error_at(CompileErrorKind::UnterminatedString, start)
                            );
                        }
                    }
                }
                Some(ch) => string.push(ch),
                None => {
                    return Err(self.error_at(CompileErrorKind::UnterminatedString, start));
                }
            }
        }
    }

    /// Read an int or double literal: `digits [. digits] [(e|E) [+|-] digits]`.
    ///
    /// At least one mantissa digit is required. A `.` or exponent makes the
    /// literal a double. If the literal runs straight into a letter, `_` or
    /// `.`, nothing is consumed and `Ok(None)` is returned, leaving the text to
    /// be read as an identifier (`24x`, `1_2`).
    pub fn read_number(&mut self) -> Result<Option<Value>, CompileError> {
        self.skip_blanks();
        let start = self.pos;
        let bytes = self.source.as_bytes();
        let digits_from = |mut i: usize| {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            i
        };

        let mut end = digits_from(start);
        let mut mantissa_digits = end - start;
        let mut is_double = false;

        if bytes.get(end) == Some(&b'.') {
            is_double = true;
            let frac_start = end + 1;
            end = digits_from(frac_start);
            mantissa_digits += end - frac_start;
        }

        if mantissa_digits == 0 {
            return Ok(None);
        }

        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp_start = end + 1;
            if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
                exp_start += 1;
            }
            let exp_end = digits_from(exp_start);
            if exp_end == exp_start {
                // `5e` / `5ex`: not a number, maybe an identifier
                return Ok(None);
            }
            is_double = true;
            end = exp_end;
        }

        if let Some(&next) = bytes.get(end) {
            if next.is_ascii_alphabetic() || next == b'_' || next == b'.' {
                return Ok(None);
            }
        }

        let text = &self.source[start..end];
        let value = if is_double {
            text.parse::<f64>().map(Value::Double).ok()
        } else {
            text.parse::<i64>().map(Value::Int).ok()
        };

        match value {
            Some(value) => {
                self.pos = end;
                Ok(Some(value))
            }
            None => Err(self.error_at(CompileErrorKind::InvalidNumber(text.to_string()), start)),
        }
    }
}
