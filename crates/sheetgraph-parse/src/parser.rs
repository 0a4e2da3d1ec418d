use crate::tokenizer::{Associativity, Token, TokenSubType, TokenType, TokenizerError};
use crate::{ParsingError, Tokenizer};
use sheetgraph_common::{ExcelError, ExcelErrorKind, LiteralValue};

use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{self, Display};

/// A custom error type for the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

// Column lookup table for common columns (A-ZZ = 702 columns)
static COLUMN_LOOKUP: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = Vec::with_capacity(702);
    for c in b'A'..=b'Z' {
        cols.push(String::from(c as char));
    }
    for c1 in b'A'..=b'Z' {
        for c2 in b'A'..=b'Z' {
            cols.push(format!("{}{}", c1 as char, c2 as char));
        }
    }
    cols
});

/// One end of a range reference. A missing row makes a whole-column bound,
/// a missing column a whole-row bound. Indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeBound {
    pub row: Option<u32>,
    pub col: Option<u32>,
    pub row_abs: bool,
    pub col_abs: bool,
}

/// A parsed reference. Rows and columns are 1-based, as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Cell {
        sheet: Option<String>,
        row: u32,
        col: u32,
        row_abs: bool,
        col_abs: bool,
    },
    Range {
        sheet: Option<String>,
        start: RangeBound,
        end: RangeBound,
    },
    NamedRange(String),
}

impl ReferenceType {
    /// Create a reference from a string: `A1`, `$B$2`, `A:C`, `2:5`, `Sheet1!A1:B2`.
    /// Anything that is not a cell or range is treated as a name.
    pub fn from_string(reference: &str) -> Result<Self, ParsingError> {
        let (sheet, ref_part) = Self::extract_sheet_name(reference);

        if ref_part.contains(':') {
            Self::parse_range_reference(&ref_part, sheet)
        } else {
            match Self::parse_cell_reference(&ref_part) {
                Ok(bound) => Ok(ReferenceType::Cell {
                    sheet,
                    row: bound.row.unwrap_or(1),
                    col: bound.col.unwrap_or(1),
                    row_abs: bound.row_abs,
                    col_abs: bound.col_abs,
                }),
                Err(_) if sheet.is_none() && Self::is_name(&ref_part) => {
                    Ok(ReferenceType::NamedRange(reference.to_string()))
                }
                Err(e) => Err(e),
            }
        }
    }

    /// Identifiers are names unless they have the letters-then-digits shape of
    /// a cell address (`A0`, `XFE1` are bad cells, not names).
    fn is_name(s: &str) -> bool {
        let body = s.trim_start_matches('$');
        let letters = body.bytes().take_while(u8::is_ascii_alphabetic).count();
        let rest = body[letters..].trim_start_matches('$');
        if letters > 0 && !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let mut chars = s.chars();
        matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    }

    fn parse_range_reference(reference: &str, sheet: Option<String>) -> Result<Self, ParsingError> {
        let mut parts = reference.splitn(2, ':');
        let start = parts.next().unwrap_or_default();
        let end = parts
            .next()
            .ok_or_else(|| ParsingError::InvalidReference(format!("Invalid range: {reference}")))?;

        let start = Self::parse_range_part(start)?;
        let end = Self::parse_range_part(end)?;

        // A1:B, A:1 and friends mix incompatible shapes.
        let same_shape = start.row.is_some() == end.row.is_some()
            && start.col.is_some() == end.col.is_some();
        if !same_shape {
            return Err(ParsingError::InvalidReference(format!(
                "Invalid range: {reference}"
            )));
        }

        Ok(ReferenceType::Range { sheet, start, end })
    }

    /// Parse one side of a range: a cell, a column (`$C`) or a row (`$4`).
    fn parse_range_part(part: &str) -> Result<RangeBound, ParsingError> {
        if let Ok(bound) = Self::parse_cell_reference(part) {
            return Ok(bound);
        }

        let (abs, body) = match part.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, part),
        };

        if !body.is_empty() && body.bytes().all(|b| b.is_ascii_alphabetic()) {
            let col = Self::column_to_number(body)?;
            return Ok(RangeBound {
                row: None,
                col: Some(col),
                row_abs: false,
                col_abs: abs,
            });
        }

        if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
            let row = body
                .parse::<u32>()
                .ok()
                .filter(|r| *r > 0)
                .ok_or_else(|| ParsingError::InvalidReference(format!("Invalid row: {body}")))?;
            return Ok(RangeBound {
                row: Some(row),
                col: None,
                row_abs: abs,
                col_abs: false,
            });
        }

        Err(ParsingError::InvalidReference(format!(
            "Invalid range part: {part}"
        )))
    }

    /// Parse a cell reference like "$A1" into a fully specified bound.
    fn parse_cell_reference(reference: &str) -> Result<RangeBound, ParsingError> {
        let bytes = reference.as_bytes();
        let mut i = 0;

        let col_abs = i < bytes.len() && bytes[i] == b'$';
        if col_abs {
            i += 1;
        }

        let col_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }

        if i == col_start {
            return Err(ParsingError::InvalidReference(format!(
                "Invalid cell reference: {reference}"
            )));
        }

        let col = Self::column_to_number(&reference[col_start..i])?;

        let row_abs = i < bytes.len() && bytes[i] == b'$';
        if row_abs {
            i += 1;
        }

        let row_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }

        if i == row_start || i != bytes.len() {
            return Err(ParsingError::InvalidReference(format!(
                "Invalid cell reference: {reference}"
            )));
        }

        let row_str = &reference[row_start..i];
        let row = row_str
            .parse::<u32>()
            .ok()
            .filter(|r| *r > 0)
            .ok_or_else(|| ParsingError::InvalidReference(format!("Invalid row: {row_str}")))?;

        Ok(RangeBound {
            row: Some(row),
            col: Some(col),
            row_abs,
            col_abs,
        })
    }

    /// Convert a column letter (e.g., "A", "BC") to a 1-based column number.
    pub fn column_to_number(column: &str) -> Result<u32, ParsingError> {
        let bytes = column.as_bytes();

        // XFD = 16384 is the widest sheet; anything longer is not a column.
        if bytes.is_empty() || bytes.len() > 3 {
            return Err(ParsingError::InvalidReference(format!(
                "Invalid column: {column}"
            )));
        }

        let mut result = 0u32;
        for &b in bytes {
            if !b.is_ascii_alphabetic() {
                return Err(ParsingError::InvalidReference(format!(
                    "Invalid column: {column}"
                )));
            }
            result = result * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u32;
        }

        Ok(result)
    }

    /// Convert a 1-based column number to letters.
    pub fn number_to_column(mut num: u32) -> String {
        if num > 0 && num <= 702 {
            return COLUMN_LOOKUP[(num - 1) as usize].clone();
        }

        let mut result = String::with_capacity(3);
        while num > 0 {
            num -= 1;
            result.insert(0, ((num % 26) as u8 + b'A') as char);
            num /= 26;
        }
        result
    }

    /// Split `Sheet!Ref` / `'Quoted Sheet'!Ref`. Doubled quotes inside a
    /// quoted name are unescaped.
    fn extract_sheet_name(reference: &str) -> (Option<String>, String) {
        if let Some(rest) = reference.strip_prefix('\'') {
            let bytes = rest.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        i += 2;
                        continue;
                    }
                    if i + 1 < bytes.len() && bytes[i + 1] == b'!' {
                        let sheet = rest[..i].replace("''", "'");
                        return (Some(sheet), rest[i + 2..].to_string());
                    }
                }
                i += 1;
            }
        }

        match reference.rfind('!') {
            Some(i) if i > 0 => (
                Some(reference[..i].to_string()),
                reference[i + 1..].to_string(),
            ),
            _ => (None, reference.to_string()),
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            ReferenceType::Cell { sheet, .. } | ReferenceType::Range { sheet, .. } => {
                sheet.as_deref()
            }
            ReferenceType::NamedRange(_) => None,
        }
    }
}

impl Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn dollar(abs: bool) -> &'static str {
            if abs { "$" } else { "" }
        }
        fn bound(b: &RangeBound) -> String {
            let mut s = String::new();
            if let Some(col) = b.col {
                s.push_str(dollar(b.col_abs));
                s.push_str(&ReferenceType::number_to_column(col));
            }
            if let Some(row) = b.row {
                s.push_str(dollar(b.row_abs));
                s.push_str(&row.to_string());
            }
            s
        }

        if let Some(sheet) = self.sheet() {
            write!(f, "{}!", quote_sheet_name(sheet))?;
        }
        match self {
            ReferenceType::Cell {
                row,
                col,
                row_abs,
                col_abs,
                ..
            } => write!(
                f,
                "{}{}{}{}",
                dollar(*col_abs),
                Self::number_to_column(*col),
                dollar(*row_abs),
                row
            ),
            ReferenceType::Range { start, end, .. } => {
                write!(f, "{}:{}", bound(start), bound(end))
            }
            ReferenceType::NamedRange(name) => write!(f, "{name}"),
        }
    }
}

/// Quote a sheet name when it would not survive tokenizing bare.
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && ReferenceType::parse_cell_reference(name).is_err();
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// The different types of AST nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(LiteralValue),
    Reference {
        original: String,
        reference: ReferenceType,
    },
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
    Array(Vec<Vec<ASTNode>>),
}

impl Display for ASTNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ASTNodeType::Literal(value) => write!(f, "Literal({value})"),
            ASTNodeType::Reference { reference, .. } => write!(f, "Reference({reference})"),
            ASTNodeType::UnaryOp { op, expr } => write!(f, "UnaryOp({op}, {expr})"),
            ASTNodeType::BinaryOp { op, left, right } => {
                write!(f, "BinaryOp({op}, {left}, {right})")
            }
            ASTNodeType::Function { name, args } => {
                write!(f, "Function({name}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                write!(f, ")")
            }
            ASTNodeType::Array(rows) => write!(f, "Array({} rows)", rows.len()),
        }
    }
}

/// An AST node represents a parsed formula element.
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub source_token: Option<Token>,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType, source_token: Option<Token>) -> Self {
        ASTNode {
            node_type,
            source_token,
        }
    }

    /// All references in the tree, in source order.
    pub fn get_dependencies(&self) -> Vec<&ReferenceType> {
        let mut dependencies = Vec::new();
        self.collect_dependencies(&mut dependencies);
        dependencies
    }

    fn collect_dependencies<'a>(&'a self, dependencies: &mut Vec<&'a ReferenceType>) {
        match &self.node_type {
            ASTNodeType::Reference { reference, .. } => dependencies.push(reference),
            ASTNodeType::UnaryOp { expr, .. } => expr.collect_dependencies(dependencies),
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.collect_dependencies(dependencies);
                right.collect_dependencies(dependencies);
            }
            ASTNodeType::Function { args, .. } => {
                for arg in args {
                    arg.collect_dependencies(dependencies);
                }
            }
            ASTNodeType::Array(rows) => {
                for node in rows.iter().flatten() {
                    node.collect_dependencies(dependencies);
                }
            }
            ASTNodeType::Literal(_) => {}
        }
    }
}

impl Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_type)
    }
}

/// A recursive-descent parser over tokenizer output.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, include_whitespace: bool) -> Self {
        let filtered_tokens = if include_whitespace {
            tokens
        } else {
            tokens
                .into_iter()
                .filter(|t| t.token_type != TokenType::Whitespace)
                .collect()
        };
        Parser {
            tokens: filtered_tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<ASTNode, ParserError> {
        if self.tokens.is_empty() {
            return Err(ParserError {
                message: "No tokens to parse".to_string(),
                position: None,
            });
        }

        // Input without a leading '=' is plain text.
        if self.tokens[0].token_type == TokenType::Literal {
            let token = self.tokens[0].clone();
            return Ok(ASTNode::new(
                ASTNodeType::Literal(LiteralValue::Text(token.value.clone())),
                Some(token),
            ));
        }

        let ast = self.parse_expression()?;
        if self.position < self.tokens.len() {
            return Err(ParserError {
                message: format!("Unexpected token: {}", self.tokens[self.position]),
                position: Some(self.tokens[self.position].start),
            });
        }
        Ok(ast)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn error_here(&self, message: impl Into<String>) -> ParserError {
        ParserError {
            message: message.into(),
            position: self.peek().map(|t| t.start),
        }
    }

    fn parse_expression(&mut self) -> Result<ASTNode, ParserError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<ASTNode, ParserError> {
        let mut left = self.parse_unary_op()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpInfix {
                break;
            }

            let (precedence, associativity) =
                token.get_precedence().unwrap_or((0, Associativity::Left));
            if precedence < min_precedence {
                break;
            }

            let op_token = token.clone();
            self.position += 1;

            let next_min_precedence = if associativity == Associativity::Left {
                precedence + 1
            } else {
                precedence
            };

            let right = self.parse_binary_op(next_min_precedence)?;
            left = ASTNode::new(
                ASTNodeType::BinaryOp {
                    op: op_token.value.clone(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(op_token),
            );
        }

        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<ASTNode, ParserError> {
        if let Some(token) = self.peek() {
            if token.token_type == TokenType::OpPrefix {
                let op_token = token.clone();
                self.position += 1;
                let expr = self.parse_unary_op()?;
                return Ok(ASTNode::new(
                    ASTNodeType::UnaryOp {
                        op: op_token.value.clone(),
                        expr: Box::new(expr),
                    },
                    Some(op_token),
                ));
            }
        }
        self.parse_postfix_op()
    }

    fn parse_postfix_op(&mut self) -> Result<ASTNode, ParserError> {
        let mut expr = self.parse_primary()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpPostfix {
                break;
            }
            let op_token = token.clone();
            self.position += 1;
            expr = ASTNode::new(
                ASTNodeType::UnaryOp {
                    op: op_token.value.clone(),
                    expr: Box::new(expr),
                },
                Some(op_token),
            );
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ASTNode, ParserError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_here("Unexpected end of formula"));
        };

        match (token.token_type, token.subtype) {
            (TokenType::Operand, _) => {
                self.position += 1;
                self.parse_operand(token)
            }
            (TokenType::Func, TokenSubType::Open) => {
                self.position += 1;
                self.parse_function(token)
            }
            (TokenType::Paren, TokenSubType::Open) => {
                self.position += 1;
                let expr = self.parse_expression()?;
                match self.peek() {
                    Some(t) if t.token_type == TokenType::Paren && t.subtype == TokenSubType::Close => {
                        self.position += 1;
                        Ok(expr)
                    }
                    _ => Err(self.error_here("Expected closing parenthesis")),
                }
            }
            (TokenType::Array, TokenSubType::Open) => {
                self.position += 1;
                self.parse_array()
            }
            _ => Err(self.error_here(format!("Unexpected token: {token}"))),
        }
    }

    fn parse_operand(&mut self, token: Token) -> Result<ASTNode, ParserError> {
        let node_type = match token.subtype {
            TokenSubType::Number => {
                let value = token.value.parse::<f64>().map_err(|_| ParserError {
                    message: format!("Invalid number: {}", token.value),
                    position: Some(token.start),
                })?;
                ASTNodeType::Literal(LiteralValue::Number(value))
            }
            TokenSubType::Text => {
                let inner = &token.value[1..token.value.len() - 1];
                ASTNodeType::Literal(LiteralValue::Text(inner.replace("\"\"", "\"")))
            }
            TokenSubType::Logical => {
                ASTNodeType::Literal(LiteralValue::Boolean(token.value.eq_ignore_ascii_case("TRUE")))
            }
            TokenSubType::Error => {
                // `Sheet1!#REF!` carries its sheet prefix
                let code = token.value.find('#').map_or("", |i| &token.value[i..]);
                let kind = ExcelErrorKind::from_code(code).ok_or_else(|| ParserError {
                    message: format!("Unknown error literal: {}", token.value),
                    position: Some(token.start),
                })?;
                ASTNodeType::Literal(LiteralValue::Error(ExcelError::new(kind)))
            }
            TokenSubType::Range => {
                let reference =
                    ReferenceType::from_string(&token.value).map_err(|e| ParserError {
                        message: format!("Invalid reference '{}': {}", token.value, e),
                        position: Some(token.start),
                    })?;
                ASTNodeType::Reference {
                    original: token.value.clone(),
                    reference,
                }
            }
            _ => {
                return Err(ParserError {
                    message: format!("Unexpected operand subtype: {:?}", token.subtype),
                    position: Some(token.start),
                });
            }
        };
        Ok(ASTNode::new(node_type, Some(token)))
    }

    fn parse_function(&mut self, func_token: Token) -> Result<ASTNode, ParserError> {
        let name = func_token.value[..func_token.value.len() - 1].to_ascii_uppercase();
        let args = self.parse_function_arguments()?;
        Ok(ASTNode::new(
            ASTNodeType::Function { name, args },
            Some(func_token),
        ))
    }

    fn at_func_close(&self) -> bool {
        matches!(self.peek(), Some(t) if t.token_type == TokenType::Func && t.subtype == TokenSubType::Close)
    }

    fn at_arg_sep(&self) -> bool {
        matches!(self.peek(), Some(t) if t.token_type == TokenType::Sep && t.subtype == TokenSubType::Arg)
    }

    /// Omitted arguments (`IF(A1,,2)`) become `Literal(Empty)`.
    fn parse_function_arguments(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut args = Vec::new();

        if self.at_func_close() {
            self.position += 1;
            return Ok(args);
        }

        loop {
            if self.at_arg_sep() || self.at_func_close() {
                args.push(ASTNode::new(ASTNodeType::Literal(LiteralValue::Empty), None));
            } else {
                args.push(self.parse_expression()?);
            }

            if self.at_arg_sep() {
                self.position += 1;
            } else if self.at_func_close() {
                self.position += 1;
                return Ok(args);
            } else {
                return Err(self.error_here("Expected ',' or ')' in function arguments"));
            }
        }
    }

    fn parse_array(&mut self) -> Result<ASTNode, ParserError> {
        let mut rows = Vec::new();
        let mut current_row = vec![self.parse_expression()?];

        loop {
            let Some(token) = self.peek() else {
                return Err(self.error_here("Unterminated array literal"));
            };
            match (token.token_type, token.subtype) {
                (TokenType::Sep, TokenSubType::Arg) => {
                    self.position += 1;
                    current_row.push(self.parse_expression()?);
                }
                (TokenType::Sep, TokenSubType::Row) => {
                    self.position += 1;
                    rows.push(std::mem::take(&mut current_row));
                    current_row.push(self.parse_expression()?);
                }
                (TokenType::Array, TokenSubType::Close) => {
                    self.position += 1;
                    rows.push(current_row);
                    break;
                }
                _ => return Err(self.error_here(format!("Unexpected token in array: {token}"))),
            }
        }

        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(self.error_here("Array rows must have the same length"));
        }
        Ok(ASTNode::new(ASTNodeType::Array(rows), None))
    }
}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: Some(err.pos),
        }
    }
}

/// Tokenize and parse a formula (`=` prefixed) into an AST.
pub fn parse<T: AsRef<str>>(formula: T) -> Result<ASTNode, ParserError> {
    let tokens = Tokenizer::new(formula.as_ref())?.items;
    Parser::new(tokens, false).parse()
}
