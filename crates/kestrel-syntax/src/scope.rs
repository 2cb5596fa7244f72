use std::fmt;

use serde::Serialize;

/// Identifier of a lexical scope. `0` is the outer program scope, every
/// `{ }` block gets the next unused number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks the stack of open scopes while the parser walks the braces.
#[derive(Debug, Clone)]
pub struct ScopeManager {
    /// `parents[id]` is the scope that was current when `id` was opened.
    parents: Vec<Option<ScopeId>>,
    stack: Vec<ScopeId>,
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeManager {
    pub fn new() -> Self {
        ScopeManager {
            parents: vec![None],
            stack: vec![ScopeId::ROOT],
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId::ROOT)
    }

    pub fn enter_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let scope = ScopeId(self.parents.len());
        self.parents.push(Some(parent));
        self.stack.push(scope);
        scope
    }

    /// Pop back to the enclosing scope. The program scope is never popped.
    pub fn leave_scope(&mut self) -> ScopeId {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self.current_scope()
    }

    pub fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.parents.get(scope.0).copied().flatten()
    }

    /// `scope` followed by each of its ancestors up to the program scope.
    pub fn chain(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |s| self.parent_of(*s))
    }

    pub fn into_parents(self) -> Vec<Option<ScopeId>> {
        self.parents
    }
}
