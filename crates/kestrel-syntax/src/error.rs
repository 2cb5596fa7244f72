/// Failure of a front-end stage. Individual problems have already been
/// handed to the `Reporter`, only the tally travels back to the caller.
#[derive(thiserror::Error, miette::Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("lexing failed with {0} error(s)")]
    #[diagnostic(code(kestrel::lex), help("fix the invalid tokens listed above"))]
    Lex(usize),
    #[error("parsing failed with {0} error(s)")]
    #[diagnostic(
        code(kestrel::parse),
        help("the program must be a single statement, usually a {{ }} block, followed by `$`")
    )]
    Parse(usize),
}

/// Problems found while scanning a single line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum LexIssue {
    #[error("invalid token '{0}'")]
    InvalidToken(String),
    #[error("integer literal '{0}' does not fit in one byte")]
    IntegerOutOfRange(String),
    #[error("unterminated string starting with '{0}'")]
    UnterminatedString(String),
}

/// Problems found while parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseIssue {
    #[error("token mismatch, expecting '{expected}' but found '{found}'")]
    Mismatch { expected: String, found: String },
    #[error("invalid statement '{0}', expecting print, while, if, an identifier, a type or {{")]
    InvalidStatement(String),
    #[error("invalid expression '{0}', expecting a digit, string, boolean or identifier")]
    InvalidExpression(String),
    #[error("statements must be in a StatementList, wrap the program in {{ }}")]
    Unwrapped,
    #[error("redeclaration of '{name}', first declared on line {first}")]
    Redeclared { name: String, first: usize },
    #[error("undeclared variable '{0}'")]
    Undeclared(String),
    #[error("variable '{name}' in scope {scope} is never initialized, defaulting to {default}")]
    Uninitialized { name: String, scope: usize, default: String },
    #[error("variable '{name}' in scope {scope} is declared but never used")]
    Unused { name: String, scope: usize },
}
