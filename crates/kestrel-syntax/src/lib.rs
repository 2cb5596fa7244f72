//! Front end of the Kestrel compiler: lexing, parsing, scopes and the
//! symbol table.

pub mod ast;
pub mod cst;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod semantic_tokens;
pub mod symbols;
pub mod token;

pub use cst::{SyntaxElement, SyntaxKind, SyntaxNode};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Reporter, TraceStatus};
pub use error::SyntaxError;
pub use lexer::lex;
pub use parser::{SyntaxTree, parse};
pub use semantic_tokens::provide_semantic_tokens;
pub use token::{Token, TokenKind, Type};
