pub mod parser;
pub mod tokenizer;
pub mod types;

pub use parser::{ASTNode, ASTNodeType, ParserError, RangeBound, ReferenceType, parse, quote_sheet_name};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
pub use types::ParsingError;

// Re-export common types
pub use sheetgraph_common::{ExcelError, ExcelErrorKind, LiteralValue};
