use std::convert::TryFrom;
use std::error::Error;
use std::fmt::{self, Display};

use sheetgraph_common::ExcelErrorKind;

/// Operator associativity, used by the parser's precedence climbing.
#[derive(Debug, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl TokenizerError {
    fn at(pos: usize, message: impl Into<String>) -> Self {
        TokenizerError {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError: {} at byte {}", self.message, self.pos)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Whole input that did not start with `=`.
    Literal,
    Operand,
    /// `NAME(` opening a call; the matching `)` is a `Func` closer.
    Func,
    Array,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
    Row,
}

/// A token in a formula, with its byte span in the source.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {:?} {:?}>", self.token_type, self.subtype, self.value)
    }
}

impl Token {
    fn new(source: &str, token_type: TokenType, subtype: TokenSubType, start: usize, end: usize) -> Self {
        Token {
            value: source[start..end].to_string(),
            token_type,
            subtype,
            start,
            end,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::OpPostfix
        )
    }

    /// Binding power and associativity. Prefix signs bind tightest.
    pub fn get_precedence(&self) -> Option<(u8, Associativity)> {
        if self.token_type == TokenType::OpPrefix {
            return Some((7, Associativity::Right));
        }
        let precedence = match self.value.as_str() {
            "%" => 6,
            "^" => 5,
            "*" | "/" => 4,
            "+" | "-" => 3,
            "&" => 2,
            "=" | "<" | ">" | "<=" | ">=" | "<>" => 1,
            _ => return None,
        };
        Some((precedence, Associativity::Left))
    }
}

/// Classify a bare word: boolean, number or reference.
fn word_subtype(word: &str) -> TokenSubType {
    if word.eq_ignore_ascii_case("TRUE") || word.eq_ignore_ascii_case("FALSE") {
        TokenSubType::Logical
    } else if word.parse::<f64>().is_ok() {
        TokenSubType::Number
    } else {
        TokenSubType::Range
    }
}

/// `1.5E` so far, so a following sign belongs to the exponent.
fn ends_in_exponent_marker(word: &[u8]) -> bool {
    let Some((&last, body)) = word.split_last() else {
        return false;
    };
    if !matches!(last, b'E' | b'e') || !body.first().is_some_and(u8::is_ascii_digit) {
        return false;
    }
    let mut dots = 0;
    body.iter().all(|&b| match b {
        b'0'..=b'9' => true,
        b'.' => {
            dots += 1;
            dots == 1
        }
        _ => false,
    })
}

fn ends_word(b: u8) -> bool {
    matches!(
        b,
        b',' | b';'
            | b'('
            | b')'
            | b'{'
            | b'}'
            | b'"'
            | b' '
            | b'\t'
            | b'\n'
            | b'\r'
            | b'+'
            | b'-'
            | b'*'
            | b'/'
            | b'^'
            | b'&'
            | b'='
            | b'<'
            | b'>'
            | b'%'
    )
}

/// Splits a formula into tokens.
///
/// Input that does not start with `=` becomes a single `Literal` token.
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
}

impl Tokenizer {
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let items = if formula.is_empty() {
            Vec::new()
        } else if formula.starts_with('=') {
            Lexer::new(formula).run()?
        } else {
            vec![Token::new(
                formula,
                TokenType::Literal,
                TokenSubType::None,
                0,
                formula.len(),
            )]
        };
        Ok(Tokenizer {
            formula: formula.to_string(),
            items,
        })
    }

    /// Reconstruct the formula from the tokens.
    pub fn render(&self) -> String {
        match self.items.first() {
            None => String::new(),
            Some(t) if t.token_type == TokenType::Literal => t.value.clone(),
            Some(_) => {
                let body: String = self.items.iter().map(|t| t.value.as_str()).collect();
                format!("={body}")
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.formula
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    items: Vec<Token>,
    /// Token types of the openers still waiting for a closer.
    open: Vec<TokenType>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 1,
            items: Vec::with_capacity(src.len() / 2),
            open: Vec::new(),
        }
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.src.as_bytes().get(at).copied()
    }

    fn push(&mut self, token_type: TokenType, subtype: TokenSubType, start: usize, end: usize) {
        self.items
            .push(Token::new(self.src, token_type, subtype, start, end));
        self.pos = end;
    }

    fn run(mut self) -> Result<Vec<Token>, TokenizerError> {
        while let Some(b) = self.byte(self.pos) {
            let at = self.pos;
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.whitespace(),
                b'"' => self.text()?,
                b'#' => self.error_literal(at)?,
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'<' | b'>' | b'%' => self.operator(),
                b'(' => {
                    self.open.push(TokenType::Paren);
                    self.push(TokenType::Paren, TokenSubType::Open, at, at + 1);
                }
                b'{' => {
                    self.open.push(TokenType::Array);
                    self.push(TokenType::Array, TokenSubType::Open, at, at + 1);
                }
                b')' | b'}' => self.close(b)?,
                b',' => self.push(TokenType::Sep, TokenSubType::Arg, at, at + 1),
                b';' => self.push(TokenType::Sep, TokenSubType::Row, at, at + 1),
                _ => self.word()?,
            }
        }
        if !self.open.is_empty() {
            return Err(TokenizerError::at(
                self.pos,
                "Unmatched opening parenthesis or bracket",
            ));
        }
        Ok(self.items)
    }

    fn whitespace(&mut self) {
        let start = self.pos;
        let mut end = start;
        while matches!(self.byte(end), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            end += 1;
        }
        self.push(TokenType::Whitespace, TokenSubType::None, start, end);
    }

    /// End of a `delim`-quoted run starting at `start`; a doubled delimiter
    /// is an escaped one.
    fn quoted_end(&self, start: usize, delim: u8) -> Option<usize> {
        let mut i = start + 1;
        while let Some(b) = self.byte(i) {
            if b == delim {
                if self.byte(i + 1) == Some(delim) {
                    i += 2;
                    continue;
                }
                return Some(i + 1);
            }
            i += 1;
        }
        None
    }

    fn text(&mut self) -> Result<(), TokenizerError> {
        let start = self.pos;
        let end = self
            .quoted_end(start, b'"')
            .ok_or_else(|| TokenizerError::at(self.src.len(), "Reached end of formula while parsing string"))?;
        self.push(TokenType::Operand, TokenSubType::Text, start, end);
        Ok(())
    }

    /// An error code such as `#DIV/0!` at `self.pos`. `start` may be earlier
    /// when a sheet prefix (`Sheet1!#REF!`) is part of the token.
    fn error_literal(&mut self, start: usize) -> Result<(), TokenizerError> {
        let rest = &self.src[self.pos..];
        let code = ExcelErrorKind::ALL
            .into_iter()
            .map(|k| k.code())
            .find(|code| rest.get(..code.len()).is_some_and(|s| s.eq_ignore_ascii_case(code)))
            .ok_or_else(|| TokenizerError::at(self.pos, format!("Invalid error code at position {}", self.pos)))?;
        self.push(TokenType::Operand, TokenSubType::Error, start, self.pos + code.len());
        Ok(())
    }

    fn operator(&mut self) {
        let at = self.pos;
        if let Some(pair) = self.src.get(at..at + 2) {
            if matches!(pair, "<=" | ">=" | "<>") {
                self.push(TokenType::OpInfix, TokenSubType::None, at, at + 2);
                return;
            }
        }
        let token_type = match self.src.as_bytes()[at] {
            b'%' => TokenType::OpPostfix,
            b'+' | b'-' if !self.after_value() => TokenType::OpPrefix,
            _ => TokenType::OpInfix,
        };
        self.push(token_type, TokenSubType::None, at, at + 1);
    }

    /// Whether the last significant token ends a value, making a following
    /// sign infix.
    fn after_value(&self) -> bool {
        self.items
            .iter()
            .rev()
            .find(|t| t.token_type != TokenType::Whitespace)
            .is_some_and(|t| {
                t.token_type == TokenType::Operand
                    || t.token_type == TokenType::OpPostfix
                    || t.subtype == TokenSubType::Close
            })
    }

    fn close(&mut self, b: u8) -> Result<(), TokenizerError> {
        let at = self.pos;
        let opener = self
            .open
            .pop()
            .ok_or_else(|| TokenizerError::at(at, format!("No matching opener for closer at position {at}")))?;
        if (opener == TokenType::Array) != (b == b'}') {
            return Err(TokenizerError::at(at, "Mismatched ( and { pair"));
        }
        self.push(opener, TokenSubType::Close, at, at + 1);
        Ok(())
    }

    /// A reference, number, boolean or function name. Quoted sheet names
    /// and exponent signs stay inside the word.
    fn word(&mut self) -> Result<(), TokenizerError> {
        let start = self.pos;
        let mut end = start;
        while let Some(b) = self.byte(end) {
            match b {
                b'\'' => {
                    end = self.quoted_end(end, b'\'').ok_or_else(|| {
                        TokenizerError::at(self.src.len(), "Reached end of formula while parsing sheet name")
                    })?;
                }
                b'#' if end > start && self.byte(end - 1) == Some(b'!') => {
                    self.pos = end;
                    return self.error_literal(start);
                }
                b'(' if end > start => {
                    self.open.push(TokenType::Func);
                    self.push(TokenType::Func, TokenSubType::Open, start, end + 1);
                    return Ok(());
                }
                b'+' | b'-' if ends_in_exponent_marker(&self.src.as_bytes()[start..end]) => end += 1,
                _ if ends_word(b) => break,
                _ => end += 1,
            }
        }
        let subtype = word_subtype(&self.src[start..end]);
        self.push(TokenType::Operand, subtype, start, end);
        Ok(())
    }
}
