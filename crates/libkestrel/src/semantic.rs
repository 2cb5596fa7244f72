//! Type checking over the AST.

use kestrel_syntax::ast::{Block, Expr, Operand, Program, Stmt};
use kestrel_syntax::diagnostics::{Diagnostic, DiagnosticKind, Reporter, Tally};
use kestrel_syntax::symbols::SymbolTable;
use kestrel_syntax::token::{Op, Type};

use crate::error::SemanticError;

/// Check `program` against the declared types in `symbols`. The table is
/// only read.
pub fn check_semantics(
    program: &Program,
    symbols: &SymbolTable,
    reporter: &mut dyn Reporter,
) -> Result<(), SemanticError> {
    let mut checker = Checker {
        symbols,
        tally: Tally::new(reporter),
    };
    checker.tally.trace("Checking types...");
    checker.stmt(&program.body);

    let errors = checker.tally.errors;
    tracing::debug!(errors, "semantic analysis finished");
    if errors > 0 {
        checker.tally.failure("Semantic analysis failed!");
        return Err(SemanticError(errors));
    }
    checker.tally.success("Semantic analysis successful!");
    Ok(())
}

/// The type of `expr`, or `None` for an integer expression mixing in
/// non-integer operands.
pub fn infer(expr: &Expr, symbols: &SymbolTable) -> Option<Type> {
    match expr {
        Expr::IntLiteral(_) => Some(Type::Int),
        Expr::StringLiteral(_) => Some(Type::String),
        Expr::BoolLiteral(_) | Expr::Equality { .. } => Some(Type::Boolean),
        Expr::Ident(ident) => symbols.get(ident.symbol?).map(|e| e.ty),
        Expr::IntExpr { .. } => expr
            .int_operands()
            .iter()
            .all(|(_, operand)| match operand {
                Operand::Digit(_) => true,
                Operand::Ident(ident) => ident
                    .symbol
                    .and_then(|s| symbols.get(s))
                    .is_some_and(|e| e.ty == Type::Int),
                Operand::Other(other) => infer(other, symbols) == Some(Type::Int),
            })
            .then_some(Type::Int),
    }
}

fn describe(ty: Option<Type>) -> String {
    ty.map_or_else(|| "a mixed expression".to_owned(), |t| format!("{t}"))
}

struct Checker<'a, 'r> {
    symbols: &'a SymbolTable,
    tally: Tally<'r>,
}

impl Checker<'_, '_> {
    fn error(&mut self, kind: DiagnosticKind, line: usize, message: String) {
        self.tally.error(Diagnostic::at(kind, line, message));
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.block(block),
            Stmt::VarDecl { .. } => {}
            Stmt::Assign { target, value, line } => {
                self.expr(value, *line);
                let declared = target.symbol.and_then(|s| self.symbols.get(s));
                let Some(expected) = declared.map(|e| e.ty) else {
                    return;
                };
                let found = infer(value, self.symbols);
                if found != Some(expected) {
                    self.error(
                        DiagnosticKind::AssignmentTypeMismatch,
                        *line,
                        format!(
                            "type mismatch, cannot assign {} to '{}' of type {expected}",
                            describe(found),
                            target.name
                        ),
                    );
                } else {
                    self.tally.trace(format!("Assignment to '{}' is type correct", target.name));
                }
            }
            Stmt::Print { expr, line } => {
                self.expr(expr, *line);
                if matches!(expr, Expr::IntExpr { .. }) && infer(expr, self.symbols).is_none() {
                    self.error(
                        DiagnosticKind::PrintTypeMismatch,
                        *line,
                        format!(
                            "type mismatch, cannot print '{expr}', every operand of an int \
                             expression must be an int"
                        ),
                    );
                }
            }
            Stmt::While { cond, body, line } | Stmt::If { cond, body, line } => {
                self.expr(cond, *line);
                self.block(body);
            }
        }
    }

    fn block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn expr(&mut self, expr: &Expr, line: usize) {
        match expr {
            Expr::IntExpr { .. } => {
                for (op, operand) in expr.int_operands() {
                    match operand {
                        Operand::Ident(ident) if op == Op::Sub => self.error(
                            DiagnosticKind::UnsupportedSubtraction,
                            line,
                            format!(
                                "cannot subtract variable '{}', only digits can be subtracted",
                                ident.name
                            ),
                        ),
                        Operand::Other(other) => self.expr(other, line),
                        _ => {}
                    }
                }
            }
            Expr::Equality { lhs, rhs } => {
                self.expr(lhs, line);
                self.expr(rhs, line);
                let (left, right) = (infer(lhs, self.symbols), infer(rhs, self.symbols));
                if left != right || left.is_none() {
                    self.error(
                        DiagnosticKind::ComparisonTypeMismatch,
                        line,
                        format!(
                            "type mismatch, cannot compare {} with {}",
                            describe(left),
                            describe(right)
                        ),
                    );
                } else if left == Some(Type::String) {
                    self.error(
                        DiagnosticKind::ComparisonTypeMismatch,
                        line,
                        format!(
                            "cannot compare strings in '{expr}', only ints and booleans are \
                             comparable"
                        ),
                    );
                }
            }
            Expr::IntLiteral(_)
            | Expr::StringLiteral(_)
            | Expr::BoolLiteral(_)
            | Expr::Ident(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use kestrel_syntax::diagnostics::Diagnostics;
    use kestrel_syntax::{lex, parse};

    use super::*;

    fn check(source: &str) -> (Result<(), SemanticError>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(source, &mut diagnostics).unwrap();
        let tree = parse(&tokens, &mut diagnostics).unwrap();
        let result = check_semantics(&tree.ast, &tree.symbols, &mut diagnostics);
        (result, diagnostics)
    }

    #[test]
    fn test_well_typed_program() {
        let (result, diagnostics) = check(
            "{ int a boolean b string s a = 1 + 2 + a b = (a == 3) \
             s = \"hi\" print(s) print(b) } $",
        );
        assert_eq!(result, Ok(()));
        assert!(diagnostics.errors.is_empty());
    }

    #[test]
    fn test_assignment_mismatch_is_reported_once() {
        let (result, diagnostics) = check("{ int a a = \"hello\" print(a) } $");
        assert_eq!(result, Err(SemanticError(1)));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::AssignmentTypeMismatch), 1);
        assert_eq!(diagnostics.errors[0].line, Some(1));
    }

    #[test]
    fn test_mixed_int_expression() {
        let (result, diagnostics) = check("{ string s s = \"x\" print(1 + s) } $");
        assert_eq!(result, Err(SemanticError(1)));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::PrintTypeMismatch), 1);
    }

    #[test]
    fn test_comparisons() {
        let (result, diagnostics) = check("{ int a a = 1 if (a == true) { print(a) } } $");
        assert_eq!(result, Err(SemanticError(1)));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::ComparisonTypeMismatch), 1);

        let (result, _) = check("{ if (\"a\" == \"a\") { print(1) } } $");
        assert_eq!(result, Err(SemanticError(1)));

        let (result, _) = check("{ if ((1 == 1) == true) { print(1) } } $");
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_subtracting_a_variable() {
        let (result, diagnostics) = check("{ int a a = 5 print(9 - a) print(9 - 4) } $");
        assert_eq!(result, Err(SemanticError(1)));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::UnsupportedSubtraction), 1);
    }
}
