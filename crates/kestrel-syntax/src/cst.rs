use std::fmt;

use crate::token::Token;

/// Non-terminals of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Program,
    Statement,
    StatementList,
    Print,
    Assignment,
    VarDecl,
    While,
    If,
    Expr,
    IntExpr,
    StringExpr,
    BooleanExpr,
    Id,
}

#[derive(Debug, Clone)]
pub enum SyntaxElement {
    Token(Token),
    Node(SyntaxNode),
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub children: Vec<SyntaxElement>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, children: Vec<SyntaxElement>) -> Self {
        SyntaxNode { kind, children }
    }

    /// Every token under this node, in source order.
    #[cfg(test)]
    pub(crate) fn leaves(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    #[cfg(test)]
    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Token>) {
        for child in &self.children {
            match child {
                SyntaxElement::Token(tok) => out.push(tok),
                SyntaxElement::Node(node) => node.collect_leaves(out),
            }
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}<{:?}>", "-".repeat(depth), self.kind)?;
        for child in &self.children {
            match child {
                SyntaxElement::Token(tok) => {
                    writeln!(f, "{}[{}]", "-".repeat(depth + 1), tok.text)?
                }
                SyntaxElement::Node(node) => node.write_indented(f, depth + 1)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Builds a `SyntaxNode` tree from `start_node` / `token` / `finish_node`
/// calls made in parse order.
#[derive(Debug)]
pub struct CstBuilder {
    stack: Vec<(SyntaxKind, Vec<SyntaxElement>)>,
}

impl CstBuilder {
    pub fn new(root: SyntaxKind) -> Self {
        CstBuilder {
            stack: vec![(root, Vec::new())],
        }
    }

    pub fn start_node(&mut self, kind: SyntaxKind) {
        self.stack.push((kind, Vec::new()));
    }

    pub fn token(&mut self, token: Token) {
        if let Some((_, children)) = self.stack.last_mut() {
            children.push(SyntaxElement::Token(token));
        }
    }

    pub fn finish_node(&mut self) {
        // the root is only closed by `finish`
        if self.stack.len() < 2 {
            return;
        }
        if let Some((kind, children)) = self.stack.pop() {
            self.push_element(SyntaxElement::Node(SyntaxNode::new(kind, children)));
        }
    }

    fn push_element(&mut self, element: SyntaxElement) {
        if let Some((_, children)) = self.stack.last_mut() {
            children.push(element);
        }
    }

    /// Close any nodes left open and return the root.
    pub fn finish(mut self) -> SyntaxNode {
        while self.stack.len() > 1 {
            self.finish_node();
        }
        let (kind, children) = self
            .stack
            .pop()
            .unwrap_or((SyntaxKind::Program, Vec::new()));
        SyntaxNode::new(kind, children)
    }
}
