//! Recursive-descent parser.
//!
//! One method per production. The parser builds the concrete syntax tree,
//! the abstract syntax tree and the symbol table in a single walk.
//!
//! ```text
//! Program       := Statement EOF
//! Statement     := Print | Assignment | VarDecl | While | If | "{" StatementList "}"
//! Print         := "print" "(" Expr ")"
//! Assignment    := Id "=" Expr
//! VarDecl       := Type Id
//! While         := "while" BooleanExpr "{" StatementList "}"
//! If            := "if" BooleanExpr "{" StatementList "}"
//! StatementList := Statement StatementList | ε
//! Expr          := IntExpr | StringExpr | BooleanExpr | Id
//! IntExpr       := digit Op Expr | digit
//! BooleanExpr   := "(" Expr "==" Expr ")" | boolLiteral
//! ```
//!
//! Errors never abort the walk. A mismatched token is reported and skipped,
//! so every problem in the program is found in one pass. If anything was
//! reported the partial trees and table are dropped.

use crate::ast::{Block, Expr, Ident, Program, Stmt};
use crate::cst::{CstBuilder, SyntaxKind, SyntaxNode};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Reporter, Tally};
use crate::error::{ParseIssue, SyntaxError};
use crate::lexer::op_of;
use crate::scope::ScopeManager;
use crate::symbols::{SymbolId, SymbolTable, Value};
use crate::token::{Literal, Token, TokenKind, Type};

/// Everything a successful parse produces.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub ast: Program,
    pub cst: SyntaxNode,
    pub symbols: SymbolTable,
}

pub fn parse(tokens: &[Token], reporter: &mut dyn Reporter) -> Result<SyntaxTree, SyntaxError> {
    let mut parser = Parser::new(tokens, reporter);
    parser.tally.trace("Parsing token stream...");
    let body = parser.program();
    parser.finish(body)
}

struct Parser<'t, 'r> {
    tokens: &'t [Token],
    cursor: usize,
    eof: Token,
    tally: Tally<'r>,
    cst: CstBuilder,
    scopes: ScopeManager,
    symbols: SymbolTable,
}

impl<'t, 'r> Parser<'t, 'r> {
    fn new(tokens: &'t [Token], reporter: &'r mut dyn Reporter) -> Self {
        let eof = tokens.last().map_or_else(
            || Token::new(TokenKind::Eof, "$", 1, 0),
            |t| Token::new(TokenKind::Eof, "$", t.line, t.column),
        );
        Parser {
            tokens,
            cursor: 0,
            eof,
            tally: Tally::new(reporter),
            cst: CstBuilder::new(SyntaxKind::Program),
            scopes: ScopeManager::new(),
            symbols: SymbolTable::new(),
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or(&self.eof)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().is(kind)
    }

    /// Move to the next token. The cursor never moves past `EOF`.
    fn advance(&mut self) {
        if !self.at(TokenKind::Eof) && self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
    }

    /// Consume a token of `kind`. On a mismatch the error is reported and the
    /// offending token is skipped anyway.
    fn match_token(&mut self, kind: TokenKind) -> Option<Token> {
        let token = self.current().clone();
        self.tally.trace(format!("Expecting token '{kind}'..."));
        self.advance();
        if token.kind == kind {
            self.tally.success(format!("Found token '{kind}'"));
            self.cst.token(token.clone());
            Some(token)
        } else {
            self.tally.failure(format!("'{kind}' not found"));
            self.error(
                DiagnosticKind::TokenMismatch,
                token.line,
                ParseIssue::Mismatch {
                    expected: kind.to_string(),
                    found: token.text,
                },
            );
            None
        }
    }

    fn error(&mut self, kind: DiagnosticKind, line: usize, issue: ParseIssue) {
        self.tally.error(Diagnostic::at(kind, line, issue));
    }

    fn program(&mut self) -> Option<Stmt> {
        let body = self.statement();

        if self.current().kind.starts_statement() {
            let line = self.current().line;
            self.error(DiagnosticKind::UnwrappedStatements, line, ParseIssue::Unwrapped);
            while !self.at(TokenKind::Eof) {
                self.advance();
            }
        }

        self.match_token(TokenKind::Eof);
        body
    }

    fn statement(&mut self) -> Option<Stmt> {
        self.cst.start_node(SyntaxKind::Statement);
        let stmt = match self.current().kind {
            TokenKind::Print => self.print(),
            TokenKind::Id => self.assignment(),
            TokenKind::Type => self.var_decl(),
            TokenKind::While => self.while_loop(),
            TokenKind::If => self.if_statement(),
            TokenKind::OpenBracket => self.block().map(Stmt::Block),
            _ => {
                let token = self.current().clone();
                let issue = ParseIssue::InvalidStatement(token.text);
                self.error(DiagnosticKind::InvalidStatement, token.line, issue);
                self.advance();
                None
            }
        };
        self.cst.finish_node();
        stmt
    }

    fn block(&mut self) -> Option<Block> {
        let open = self.match_token(TokenKind::OpenBracket);
        let scope = self.scopes.enter_scope();
        self.tally.trace(format!("Entered scope {scope}"));

        self.cst.start_node(SyntaxKind::StatementList);
        let stmts = self.statement_list();
        self.cst.finish_node();

        let close = self.match_token(TokenKind::CloseBracket);
        let back = self.scopes.leave_scope();
        self.tally.trace(format!("Left scope {scope}, back in scope {back}"));

        open.and(close).map(|_| Block { scope, stmts })
    }

    fn statement_list(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            let token = self.current();
            if token.kind.starts_statement() {
                stmts.extend(self.statement());
            } else if matches!(token.kind, TokenKind::CloseBracket | TokenKind::Eof) {
                // ε
                break;
            } else {
                let token = token.clone();
                let issue = ParseIssue::InvalidStatement(token.text);
                self.error(DiagnosticKind::InvalidStatement, token.line, issue);
                self.advance();
            }
        }
        stmts
    }

    fn print(&mut self) -> Option<Stmt> {
        self.cst.start_node(SyntaxKind::Print);
        let line = self.current().line;
        let keyword = self.match_token(TokenKind::Print);
        let open = self.match_token(TokenKind::OpenParen);
        let expr = self.expr();
        let close = self.match_token(TokenKind::CloseParen);
        self.cst.finish_node();

        keyword.and(open).and(close)?;
        Some(Stmt::Print { expr: expr?, line })
    }

    fn assignment(&mut self) -> Option<Stmt> {
        self.cst.start_node(SyntaxKind::Assignment);
        let line = self.current().line;
        let target = self.id_token();
        let symbol = target.as_ref().and_then(|t| self.resolve(t));
        let assign = self.match_token(TokenKind::Assign);
        let value = self.expr();
        self.cst.finish_node();

        if let (Some(symbol), Some(value)) = (symbol, value.as_ref()) {
            let value = self.value_of(value);
            self.tally.trace(format!(
                "Assigned {} to '{}'",
                self.symbols.describe(&value),
                target.as_ref().map_or("", |t| t.text.as_str())
            ));
            self.symbols.assign(symbol, value);
        }

        let target = target?;
        assign?;
        Some(Stmt::Assign {
            target: Ident {
                name: target.text,
                symbol,
                line: target.line,
            },
            value: value?,
            line,
        })
    }

    fn var_decl(&mut self) -> Option<Stmt> {
        self.cst.start_node(SyntaxKind::VarDecl);
        let ty = self.match_token(TokenKind::Type);
        let id = self.id_token();
        self.cst.finish_node();

        let ty = Type::from_keyword(&ty?.text)?;
        let id = id?;
        let scope = self.scopes.current_scope();
        let symbol = match self.symbols.declare(&id.text, ty, id.line, scope) {
            Ok(symbol) => {
                self.tally.trace(format!(
                    "Added identifier '{}' to the symbol table in scope {scope}",
                    id.text
                ));
                symbol
            }
            Err(existing) => {
                let first = self.symbols.get(existing).map_or(id.line, |e| e.line);
                self.error(
                    DiagnosticKind::RedeclaredVariable,
                    id.line,
                    ParseIssue::Redeclared {
                        name: id.text.clone(),
                        first,
                    },
                );
                existing
            }
        };

        Some(Stmt::VarDecl {
            ty,
            ident: Ident {
                name: id.text,
                symbol: Some(symbol),
                line: id.line,
            },
        })
    }

    fn while_loop(&mut self) -> Option<Stmt> {
        self.cst.start_node(SyntaxKind::While);
        let line = self.current().line;
        let keyword = self.match_token(TokenKind::While);
        let cond = self.boolean_expr();
        let body = self.block();
        self.cst.finish_node();

        keyword?;
        Some(Stmt::While {
            cond: cond?,
            body: body?,
            line,
        })
    }

    fn if_statement(&mut self) -> Option<Stmt> {
        self.cst.start_node(SyntaxKind::If);
        let line = self.current().line;
        let keyword = self.match_token(TokenKind::If);
        let cond = self.boolean_expr();
        let body = self.block();
        self.cst.finish_node();

        keyword?;
        Some(Stmt::If {
            cond: cond?,
            body: body?,
            line,
        })
    }

    fn expr(&mut self) -> Option<Expr> {
        self.cst.start_node(SyntaxKind::Expr);
        let expr = match self.current().kind {
            TokenKind::Int => self.int_expr(),
            TokenKind::String => self.string_expr(),
            TokenKind::OpenParen | TokenKind::Bool => self.boolean_expr(),
            TokenKind::Id => self.id_read(),
            _ => {
                let token = self.current().clone();
                let issue = ParseIssue::InvalidExpression(token.text);
                self.error(DiagnosticKind::InvalidExpression, token.line, issue);
                self.advance();
                None
            }
        };
        self.cst.finish_node();
        expr
    }

    fn int_expr(&mut self) -> Option<Expr> {
        self.cst.start_node(SyntaxKind::IntExpr);
        let digit = self.match_token(TokenKind::Int).and_then(|t| match t.value {
            Some(Literal::Int(n)) => Some(n),
            _ => None,
        });
        let tail = if self.at(TokenKind::Op) {
            let op = self.match_token(TokenKind::Op).and_then(|t| op_of(&t));
            let rhs = self.expr();
            Some((op, rhs))
        } else {
            None
        };
        self.cst.finish_node();

        let lhs = digit?;
        match tail {
            None => Some(Expr::IntLiteral(lhs)),
            Some((op, rhs)) => Some(Expr::IntExpr {
                lhs,
                op: op?,
                rhs: Box::new(rhs?),
            }),
        }
    }

    fn string_expr(&mut self) -> Option<Expr> {
        self.cst.start_node(SyntaxKind::StringExpr);
        let token = self.match_token(TokenKind::String);
        self.cst.finish_node();

        match token?.value {
            Some(Literal::Str(s)) => Some(Expr::StringLiteral(s)),
            _ => None,
        }
    }

    fn boolean_expr(&mut self) -> Option<Expr> {
        self.cst.start_node(SyntaxKind::BooleanExpr);
        let expr = if self.at(TokenKind::Bool) {
            self.match_token(TokenKind::Bool).and_then(|t| match t.value {
                Some(Literal::Bool(b)) => Some(Expr::BoolLiteral(b)),
                _ => None,
            })
        } else {
            let open = self.match_token(TokenKind::OpenParen);
            let lhs = self.expr();
            let equality = self.match_token(TokenKind::Equality);
            let rhs = self.expr();
            let close = self.match_token(TokenKind::CloseParen);
            match (open, lhs, equality, rhs, close) {
                (Some(_), Some(lhs), Some(_), Some(rhs), Some(_)) => Some(Expr::Equality {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }),
                _ => None,
            }
        };
        self.cst.finish_node();
        expr
    }

    /// An identifier read as a value, which counts as a use.
    fn id_read(&mut self) -> Option<Expr> {
        let token = self.id_token()?;
        let symbol = self.resolve(&token);
        if let Some(symbol) = symbol {
            self.symbols.mark_used(symbol);
        }
        Some(Expr::Ident(Ident {
            name: token.text,
            symbol,
            line: token.line,
        }))
    }

    fn id_token(&mut self) -> Option<Token> {
        self.cst.start_node(SyntaxKind::Id);
        let token = self.match_token(TokenKind::Id);
        self.cst.finish_node();
        token
    }

    /// Look `token` up through the scope chain, reporting it if undeclared.
    fn resolve(&mut self, token: &Token) -> Option<SymbolId> {
        let scope = self.scopes.current_scope();
        let symbol = self.symbols.lookup(&token.text, self.scopes.chain(scope));
        if symbol.is_none() {
            self.error(
                DiagnosticKind::UndeclaredVariable,
                token.line,
                ParseIssue::Undeclared(token.text.clone()),
            );
        }
        symbol
    }

    fn value_of(&self, expr: &Expr) -> Value {
        match expr {
            Expr::IntLiteral(n) => Value::Int(*n),
            Expr::StringLiteral(s) => Value::Str(s.clone()),
            Expr::BoolLiteral(b) => Value::Bool(*b),
            Expr::Ident(Ident {
                symbol: Some(symbol), ..
            }) => Value::Alias(*symbol),
            other => Value::Expr(other.to_string()),
        }
    }

    fn finish(mut self, body: Option<Stmt>) -> Result<SyntaxTree, SyntaxError> {
        let errors = self.tally.errors;
        tracing::debug!(errors, symbols = self.symbols.len(), "parsing finished");

        let body = match body {
            Some(body) if errors == 0 => body,
            _ => {
                self.tally.failure("Parse failed!");
                return Err(SyntaxError::Parse(errors.max(1)));
            }
        };

        let scopes = std::mem::take(&mut self.scopes);
        self.symbols.set_parents(scopes.into_parents());
        tracing::debug!(scopes = self.symbols.scope_count(), "scope tree recorded");
        self.check_liveness();
        self.tally.success("Parse successful!");

        Ok(SyntaxTree {
            ast: Program { body },
            cst: self.cst.finish(),
            symbols: self.symbols,
        })
    }

    /// Post-parse sweeps over the whole table: default the uninitialized,
    /// then warn about the unused.
    fn check_liveness(&mut self) {
        for symbol in self.symbols.apply_defaults() {
            let Some(entry) = self.symbols.get(symbol) else {
                continue;
            };
            let default = entry
                .value
                .as_ref()
                .map(|v| self.symbols.describe(v))
                .unwrap_or_default();
            let diagnostic = Diagnostic::at(
                DiagnosticKind::UninitializedVariable,
                entry.line,
                ParseIssue::Uninitialized {
                    name: entry.name.clone(),
                    scope: entry.scope.0,
                    default: default.clone(),
                },
            );
            let trace = format!(
                "Initialized identifier '{}' to default {} value {default}",
                entry.name, entry.ty
            );
            self.tally.warning(diagnostic);
            self.tally.trace(trace);
        }

        let unused: Vec<_> = self.symbols.unused().collect();
        for symbol in unused {
            if let Some(entry) = self.symbols.get(symbol) {
                let diagnostic = Diagnostic::at(
                    DiagnosticKind::UnusedVariable,
                    entry.line,
                    ParseIssue::Unused {
                        name: entry.name.clone(),
                        scope: entry.scope.0,
                    },
                );
                self.tally.warning(diagnostic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::lex;
    use crate::scope::ScopeId;

    fn parse_source(source: &str) -> (Result<SyntaxTree, SyntaxError>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(source, &mut diagnostics).unwrap();
        let result = parse(&tokens, &mut diagnostics);
        (result, diagnostics)
    }

    #[test]
    fn test_parse_block_builds_ast_and_table() {
        let (result, diagnostics) = parse_source("{\n int a\n a = 1 + 2\n print(a)\n} $");
        let tree = result.unwrap();
        assert!(diagnostics.errors.is_empty());
        assert!(diagnostics.warnings.is_empty());

        let Stmt::Block(block) = &tree.ast.body else {
            panic!("expected a block");
        };
        assert_eq!(block.scope, ScopeId(1));
        assert_eq!(block.stmts.len(), 3);

        let (_, entry) = tree.symbols.iter().next().unwrap();
        assert_eq!(entry.name, "a");
        assert_eq!(entry.ty, Type::Int);
        assert_eq!(entry.scope, ScopeId(1));
        assert_eq!(entry.value, Some(Value::Expr("1 + 2".into())));
        assert!(entry.is_used);
        assert_eq!(tree.symbols.parent_of(ScopeId(1)), Some(ScopeId(0)));
    }

    #[test]
    fn test_cst_keeps_every_token() {
        let (result, _) = parse_source("{ print(\"hi\") } $");
        let tree = result.unwrap();
        let texts: Vec<_> = tree.cst.leaves().iter().map(|t| t.text.clone()).collect();
        assert_eq!(texts, vec!["{", "print", "(", "\"hi\"", ")", "}", "$"]);
        assert_eq!(tree.cst.kind, SyntaxKind::Program);
    }

    #[test]
    fn test_redeclaration_reports_once_and_keeps_first() {
        let (result, diagnostics) = parse_source("{\n int a\n string a\n} $");
        assert_eq!(result.unwrap_err(), SyntaxError::Parse(1));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::RedeclaredVariable), 1);
        assert_eq!(diagnostics.errors[0].line, Some(3));
    }

    #[test]
    fn test_redeclaration_entry_survives() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("{ int a string a } $", &mut diagnostics).unwrap();
        let mut parser = Parser::new(&tokens, &mut diagnostics);
        parser.program();
        let (_, entry) = parser.symbols.iter().next().unwrap();
        assert_eq!((entry.ty, entry.line), (Type::Int, 1));
        assert_eq!(parser.symbols.len(), 1);
    }

    #[test]
    fn test_shadowing_creates_distinct_entries() {
        let (result, diagnostics) =
            parse_source("{ int a a = 1 { int a a = 2 print(a) } print(a) } $");
        let tree = result.unwrap();
        assert!(diagnostics.errors.is_empty());
        let entries: Vec<_> = tree
            .symbols
            .iter()
            .map(|(_, e)| (e.scope.0, e.value.clone()))
            .collect();
        assert_eq!(entries, vec![(1, Some(Value::Int(1))), (2, Some(Value::Int(2)))]);
    }

    #[test]
    fn test_undeclared_assignment() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("{ int a b = 5 } $", &mut diagnostics).unwrap();
        let mut parser = Parser::new(&tokens, &mut diagnostics);
        parser.program();
        assert_eq!(parser.tally.errors, 1);
        assert!(parser.symbols.iter().all(|(_, e)| e.value.is_none()));
        drop(parser);
        assert_eq!(diagnostics.errors_of(DiagnosticKind::UndeclaredVariable), 1);
    }

    #[test]
    fn test_uninitialized_variable_is_defaulted() {
        let (result, diagnostics) = parse_source("{ int x print(x) } $");
        let tree = result.unwrap();
        assert_eq!(diagnostics.warnings_of(DiagnosticKind::UninitializedVariable), 1);
        assert_eq!(diagnostics.warnings_of(DiagnosticKind::UnusedVariable), 0);
        let (_, entry) = tree.symbols.iter().next().unwrap();
        assert_eq!(entry.value, Some(Value::Int(0)));
        assert_eq!(tree.symbols.describe(entry.value.as_ref().unwrap()), "0");
    }

    #[test]
    fn test_assigned_but_never_read_is_unused() {
        let (result, diagnostics) = parse_source("{ int a a = 3 string s } $");
        result.unwrap();
        assert_eq!(diagnostics.warnings_of(DiagnosticKind::UnusedVariable), 2);
        assert_eq!(diagnostics.warnings_of(DiagnosticKind::UninitializedVariable), 1);
    }

    #[test]
    fn test_unwrapped_statements() {
        let (result, diagnostics) = parse_source("int a a = 1 $");
        assert_eq!(result.unwrap_err(), SyntaxError::Parse(1));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::UnwrappedStatements), 1);
    }

    #[test]
    fn test_mismatch_recovers_and_collects() {
        let (result, diagnostics) = parse_source("{ print(1 } while (a == ) { } $");
        assert!(result.is_err());
        assert!(diagnostics.errors_of(DiagnosticKind::TokenMismatch) >= 1);
        assert!(diagnostics.errors_of(DiagnosticKind::InvalidExpression) >= 1);
    }

    #[test]
    fn test_while_and_if() {
        let (result, diagnostics) =
            parse_source("{ int a a = 5 while (a == 5) { a = 1 } if true { print(\"x\") } } $");
        let tree = result.unwrap();
        assert!(diagnostics.errors.is_empty());
        let Stmt::Block(block) = &tree.ast.body else {
            panic!("expected a block");
        };
        assert!(matches!(
            &block.stmts[2],
            Stmt::While { cond: Expr::Equality { .. }, body, .. } if body.scope == ScopeId(2)
        ));
        assert!(matches!(
            &block.stmts[3],
            Stmt::If { cond: Expr::BoolLiteral(true), body, .. } if body.scope == ScopeId(3)
        ));
    }

    #[test]
    fn test_successful_parse_records_scope_parents() {
        let (result, diagnostics) = parse_source("{ int a a = 1 { { print(a) } } } $");
        let tree = result.unwrap();
        assert!(diagnostics.errors.is_empty());
        assert_eq!(tree.symbols.scope_count(), 4);
        assert_eq!(tree.symbols.parent_of(ScopeId(3)), Some(ScopeId(2)));
        assert_eq!(tree.symbols.parent_of(ScopeId(1)), Some(ScopeId(0)));
        assert_eq!(tree.symbols.parent_of(ScopeId(0)), None);
    }

    #[test]
    fn test_single_statement_program() {
        let (result, _) = parse_source("print(2 + 3) $");
        let tree = result.unwrap();
        assert!(matches!(tree.ast.body, Stmt::Print { expr: Expr::IntExpr { lhs: 2, .. }, .. }));
        assert_eq!(tree.symbols.scope_count(), 1);
    }
}
