//! Diagnostics and the `Reporter` every stage talks to.
//!
//! Stages never print. They hand errors, warnings and trace events to a
//! `Reporter`, and the driver decides what to do with them.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    // lexer
    InvalidToken,
    IntegerOutOfRange,
    UnterminatedString,
    MissingEof,
    ContentAfterEof,
    // parser
    TokenMismatch,
    InvalidStatement,
    InvalidExpression,
    UnwrappedStatements,
    RedeclaredVariable,
    UndeclaredVariable,
    UninitializedVariable,
    UnusedVariable,
    // semantic analysis
    AssignmentTypeMismatch,
    PrintTypeMismatch,
    ComparisonTypeMismatch,
    UnsupportedSubtraction,
    // code generation
    OutOfMemory,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::InvalidToken => "lex::invalid-token",
            DiagnosticKind::IntegerOutOfRange => "lex::integer-out-of-range",
            DiagnosticKind::UnterminatedString => "lex::unterminated-string",
            DiagnosticKind::MissingEof => "lex::missing-eof",
            DiagnosticKind::ContentAfterEof => "lex::content-after-eof",
            DiagnosticKind::TokenMismatch => "parse::token-mismatch",
            DiagnosticKind::InvalidStatement => "parse::invalid-statement",
            DiagnosticKind::InvalidExpression => "parse::invalid-expression",
            DiagnosticKind::UnwrappedStatements => "parse::unwrapped-statements",
            DiagnosticKind::RedeclaredVariable => "parse::redeclared-variable",
            DiagnosticKind::UndeclaredVariable => "parse::undeclared-variable",
            DiagnosticKind::UninitializedVariable => "parse::uninitialized-variable",
            DiagnosticKind::UnusedVariable => "parse::unused-variable",
            DiagnosticKind::AssignmentTypeMismatch => "semantic::assignment-type-mismatch",
            DiagnosticKind::PrintTypeMismatch => "semantic::print-type-mismatch",
            DiagnosticKind::ComparisonTypeMismatch => "semantic::comparison-type-mismatch",
            DiagnosticKind::UnsupportedSubtraction => "semantic::unsupported-subtraction",
            DiagnosticKind::OutOfMemory => "codegen::out-of-memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl fmt::Display) -> Self {
        Diagnostic {
            kind,
            line: None,
            message: message.to_string(),
        }
    }

    pub fn at(kind: DiagnosticKind, line: usize, message: impl fmt::Display) -> Self {
        Diagnostic {
            line: Some(line),
            ..Diagnostic::new(kind, message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Info,
    Success,
    Failure,
}

pub trait Reporter {
    fn report_error(&mut self, diagnostic: Diagnostic);

    fn report_warning(&mut self, diagnostic: Diagnostic);

    fn report_trace(&mut self, message: &str, status: TraceStatus);
}

/// Collects everything it is told, in order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub trace: Vec<(String, TraceStatus)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors_of(&self, kind: DiagnosticKind) -> usize {
        self.errors.iter().filter(|d| d.kind == kind).count()
    }

    pub fn warnings_of(&self, kind: DiagnosticKind) -> usize {
        self.warnings.iter().filter(|d| d.kind == kind).count()
    }

    /// Errors and warnings merged, sorted by line.
    pub fn all(&self) -> Vec<(&Diagnostic, bool)> {
        let mut all: Vec<_> = self
            .errors
            .iter()
            .map(|d| (d, true))
            .chain(self.warnings.iter().map(|d| (d, false)))
            .collect();
        all.sort_by_key(|(d, _)| d.line.unwrap_or(usize::MAX));
        all
    }
}

impl Reporter for Diagnostics {
    fn report_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    fn report_warning(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic);
    }

    fn report_trace(&mut self, message: &str, status: TraceStatus) {
        self.trace.push((message.to_owned(), status));
    }
}

/// Forwards to an inner reporter while counting what passes through.
pub struct Tally<'r> {
    inner: &'r mut dyn Reporter,
    pub errors: usize,
    pub warnings: usize,
}

impl<'r> Tally<'r> {
    pub fn new(inner: &'r mut dyn Reporter) -> Self {
        Tally {
            inner,
            errors: 0,
            warnings: 0,
        }
    }

    pub fn error(&mut self, diagnostic: Diagnostic) {
        self.errors += 1;
        self.inner.report_error(diagnostic);
    }

    pub fn warning(&mut self, diagnostic: Diagnostic) {
        self.warnings += 1;
        self.inner.report_warning(diagnostic);
    }

    pub fn trace(&mut self, message: impl AsRef<str>) {
        self.inner.report_trace(message.as_ref(), TraceStatus::Info);
    }

    pub fn success(&mut self, message: impl AsRef<str>) {
        self.inner.report_trace(message.as_ref(), TraceStatus::Success);
    }

    pub fn failure(&mut self, message: impl AsRef<str>) {
        self.inner.report_trace(message.as_ref(), TraceStatus::Failure);
    }
}

/// Lets stages nest: a stage's own tally can wrap a driver's tally.
impl Reporter for Tally<'_> {
    fn report_error(&mut self, diagnostic: Diagnostic) {
        self.error(diagnostic);
    }

    fn report_warning(&mut self, diagnostic: Diagnostic) {
        self.warning(diagnostic);
    }

    fn report_trace(&mut self, message: &str, status: TraceStatus) {
        self.inner.report_trace(message, status);
    }
}
