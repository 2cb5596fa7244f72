//! Abstract syntax tree.
//!
//! Built once by the parser and read-only afterwards. Identifier references
//! point at their symbol table entry by `SymbolId`; they never own it.

use std::fmt;

use crate::scope::ScopeId;
use crate::symbols::SymbolId;
use crate::token::{Op, Type};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub body: Stmt,
}

/// A `{ }` statement list together with the scope it opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub scope: ScopeId,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block(Block),
    VarDecl { ty: Type, ident: Ident },
    Assign { target: Ident, value: Expr, line: usize },
    Print { expr: Expr, line: usize },
    While { cond: Expr, body: Block, line: usize },
    If { cond: Expr, body: Block, line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    /// `None` only while parsing an undeclared name; a successful parse
    /// never hands out an unbound identifier.
    pub symbol: Option<SymbolId>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    IntLiteral(u8),
    StringLiteral(String),
    BoolLiteral(bool),
    Ident(Ident),
    /// `digit op Expr`
    IntExpr { lhs: u8, op: Op, rhs: Box<Expr> },
    /// `( Expr == Expr )`
    Equality { lhs: Box<Expr>, rhs: Box<Expr> },
}

/// One term of a flattened integer expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand<'a> {
    Digit(u8),
    Ident(&'a Ident),
    Other(&'a Expr),
}

impl Expr {
    /// Flatten a right-nested `IntExpr` into signed terms evaluated left to
    /// right. The first term is always added.
    pub fn int_operands(&self) -> Vec<(Op, Operand<'_>)> {
        let mut terms = Vec::new();
        let mut sign = Op::Add;
        let mut current = self;
        loop {
            match current {
                Expr::IntExpr { lhs, op, rhs } => {
                    terms.push((sign, Operand::Digit(*lhs)));
                    sign = *op;
                    current = rhs;
                }
                Expr::IntLiteral(n) => {
                    terms.push((sign, Operand::Digit(*n)));
                    break;
                }
                Expr::Ident(ident) => {
                    terms.push((sign, Operand::Ident(ident)));
                    break;
                }
                other => {
                    terms.push((sign, Operand::Other(other)));
                    break;
                }
            }
        }
        terms
    }

    /// Whether `symbol` is read anywhere inside this expression.
    pub fn reads(&self, symbol: SymbolId) -> bool {
        match self {
            Expr::Ident(ident) => ident.symbol == Some(symbol),
            Expr::IntExpr { rhs, .. } => rhs.reads(symbol),
            Expr::Equality { lhs, rhs } => lhs.reads(symbol) || rhs.reads(symbol),
            Expr::IntLiteral(_) | Expr::StringLiteral(_) | Expr::BoolLiteral(_) => false,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Expr::IntExpr { .. } | Expr::Equality { .. })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLiteral(n) => write!(f, "{n}"),
            Expr::StringLiteral(s) => write!(f, "\"{s}\""),
            Expr::BoolLiteral(b) => write!(f, "{b}"),
            Expr::Ident(ident) => f.write_str(&ident.name),
            Expr::IntExpr { lhs, op, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Expr::Equality { lhs, rhs } => write!(f, "({lhs} == {rhs})"),
        }
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    write!(f, "{}", "-".repeat(depth))
}

impl Stmt {
    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        indent(f, depth)?;
        match self {
            Stmt::Block(block) => block.write_tree(f, depth),
            Stmt::VarDecl { ty, ident } => {
                writeln!(f, "<VarDecl {ty}>")?;
                indent(f, depth + 1)?;
                writeln!(f, "[{}]", ident.name)
            }
            Stmt::Assign { target, value, .. } => {
                writeln!(f, "<Assign>")?;
                indent(f, depth + 1)?;
                writeln!(f, "[{}]", target.name)?;
                value.write_tree(f, depth + 1)
            }
            Stmt::Print { expr, .. } => {
                writeln!(f, "<Print>")?;
                expr.write_tree(f, depth + 1)
            }
            Stmt::While { cond, body, .. } | Stmt::If { cond, body, .. } => {
                let name = if matches!(self, Stmt::While { .. }) { "While" } else { "If" };
                writeln!(f, "<{name}>")?;
                cond.write_tree(f, depth + 1)?;
                indent(f, depth + 1)?;
                body.write_tree(f, depth + 1)
            }
        }
    }
}

impl Block {
    /// Expects the caller to have written the indentation already.
    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "<StatementList scope {}>", self.scope)?;
        for stmt in &self.stmts {
            stmt.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl Expr {
    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        indent(f, depth)?;
        match self {
            Expr::IntExpr { lhs, op, rhs } => {
                writeln!(f, "<IntExpr {op}>")?;
                indent(f, depth + 1)?;
                writeln!(f, "[{lhs}]")?;
                rhs.write_tree(f, depth + 1)
            }
            Expr::Equality { lhs, rhs } => {
                writeln!(f, "<Equality>")?;
                lhs.write_tree(f, depth + 1)?;
                rhs.write_tree(f, depth + 1)
            }
            leaf => writeln!(f, "[{leaf}]"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Program>")?;
        self.body.write_tree(f, 1)
    }
}
