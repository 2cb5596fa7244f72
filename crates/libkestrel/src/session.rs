//! One compilation, start to finish.

use kestrel_syntax::diagnostics::{Reporter, Tally};
use kestrel_syntax::{SyntaxTree, Token, lex, parse};

use crate::bytecode::ByteCode;
use crate::codegen::generate;
use crate::error::{CompileError, Stage};
use crate::semantic::check_semantics;

/// Everything a compilation produced, including the partial artifacts of a
/// failed one.
#[derive(Debug)]
pub struct CompilationResult {
    pub byte_code: Option<ByteCode>,
    pub succeeded: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub failed_stage: Option<Stage>,
    pub error: Option<CompileError>,
    pub tokens: Vec<Token>,
    pub syntax: Option<SyntaxTree>,
}

/// Owns the artifacts of a single compile. A new session is made for every
/// call, nothing is shared between compiles.
#[derive(Debug, Default)]
pub struct CompilationSession {
    tokens: Vec<Token>,
    syntax: Option<SyntaxTree>,
    byte_code: Option<ByteCode>,
}

impl CompilationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the stages in order, stopping at the first that fails.
    pub fn run(&mut self, source: &str, reporter: &mut dyn Reporter) -> Result<(), CompileError> {
        let _span = tracing::info_span!("compile", bytes = source.len()).entered();

        self.tokens = lex(source, reporter)?;
        let syntax = parse(&self.tokens, reporter)?;
        let syntax = self.syntax.insert(syntax);
        check_semantics(&syntax.ast, &syntax.symbols, reporter)?;
        self.byte_code = Some(generate(&syntax.ast, &syntax.symbols, reporter)?);
        Ok(())
    }
}

pub fn compile(source: &str, reporter: &mut dyn Reporter) -> CompilationResult {
    let mut tally = Tally::new(reporter);
    let mut session = CompilationSession::new();
    let outcome = session.run(source, &mut tally);

    match &outcome {
        Ok(()) => tracing::info!(warnings = tally.warnings, "compilation succeeded"),
        Err(err) => {
            tracing::info!(errors = tally.errors, stage = ?err.stage(), "compilation failed: {err}")
        }
    }

    CompilationResult {
        byte_code: session.byte_code,
        succeeded: outcome.is_ok(),
        error_count: tally.errors,
        warning_count: tally.warnings,
        failed_stage: outcome.as_ref().err().map(CompileError::stage),
        error: outcome.err(),
        tokens: session.tokens,
        syntax: session.syntax,
    }
}

#[cfg(test)]
mod tests {
    use kestrel_syntax::diagnostics::Diagnostics;

    use super::*;

    #[test]
    fn test_stops_at_first_failing_stage() {
        let mut diagnostics = Diagnostics::new();
        let result = compile("{ int a a = \"no\" print(a) } $", &mut diagnostics);
        assert!(!result.succeeded);
        assert_eq!(result.failed_stage, Some(Stage::Semantic));
        assert!(result.byte_code.is_none());
        assert!(result.syntax.is_some());
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn test_counts_warnings_of_a_successful_compile() {
        let mut diagnostics = Diagnostics::new();
        let result = compile("{ int a }", &mut diagnostics);
        assert!(result.succeeded);
        // missing `$`, uninitialized, unused
        assert_eq!(result.warning_count, 3);
        assert_eq!(diagnostics.warnings.len(), 3);
        assert!(result.byte_code.is_some());
    }

    #[test]
    fn test_lex_failure_keeps_no_tokens() {
        let mut diagnostics = Diagnostics::new();
        let result = compile("{ int # } $", &mut diagnostics);
        assert_eq!(result.failed_stage, Some(Stage::Lex));
        assert!(result.tokens.is_empty());
        assert!(matches!(result.error, Some(CompileError::Syntax(_))));
    }
}
