use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Type,
    Id,
    String,
    Int,
    Bool,
    Print,
    While,
    If,
    Eof,
    Assign,
    Equality,
    Op,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
}

impl TokenKind {
    /// Tokens that may begin a `Statement`.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Print
                | TokenKind::Id
                | TokenKind::Type
                | TokenKind::While
                | TokenKind::If
                | TokenKind::OpenBracket
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Type => "type",
            TokenKind::Id => "identifier",
            TokenKind::String => "string literal",
            TokenKind::Int => "digit",
            TokenKind::Bool => "boolean literal",
            TokenKind::Print => "print",
            TokenKind::While => "while",
            TokenKind::If => "if",
            TokenKind::Eof => "$",
            TokenKind::Assign => "=",
            TokenKind::Equality => "==",
            TokenKind::Op => "operator",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenBracket => "{",
            TokenKind::CloseBracket => "}",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The three value types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    String,
    Boolean,
}

impl Type {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "int" => Some(Type::Int),
            "string" => Some(Type::String),
            "boolean" => Some(Type::Boolean),
            _ => None,
        }
    }

    /// Ints and booleans live in fixed low memory, strings on the heap.
    pub fn is_static(self) -> bool {
        !matches!(self, Type::String)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::Boolean => f.write_str("boolean"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
}

impl Op {
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Op::Add),
            '-' => Some(Op::Sub),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Add => f.write_str("+"),
            Op::Sub => f.write_str("-"),
        }
    }
}

/// Literal payload carried by `INT`, `STRING` and `BOOL` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Int(u8),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Str(s) => write!(f, "\"{s}\""),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            value: None,
            line,
            column,
        }
    }

    pub fn literal(
        kind: TokenKind,
        text: impl Into<String>,
        value: Literal,
        line: usize,
        column: usize,
    ) -> Self {
        Token {
            value: Some(value),
            ..Token::new(kind, text, line, column)
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Length of the lexeme in characters, used for editor ranges.
    pub fn width(&self) -> usize {
        self.text.chars().count()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12} {:<10} line {}", format!("{:?}", self.kind), self.text, self.line)
    }
}
