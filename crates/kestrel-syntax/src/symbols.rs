//! Scope-keyed symbol table.

use std::collections::{HashMap, HashSet};
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::scope::ScopeId;
use crate::token::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub usize);

/// The last value assigned to a variable, as far as the parser can tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Int(u8),
    Str(String),
    Bool(bool),
    /// Assigned from another variable.
    Alias(SymbolId),
    /// Assigned a compound expression, kept as source text.
    Expr(String),
}

impl Value {
    pub fn default_for(ty: Type) -> Self {
        match ty {
            Type::Int => Value::Int(0),
            Type::String => Value::Str(String::new()),
            Type::Boolean => Value::Bool(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub ty: Type,
    pub line: usize,
    pub scope: ScopeId,
    pub value: Option<Value>,
    pub is_used: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    entries: Vec<Entry>,
    #[serde(skip)]
    index: HashMap<(ScopeId, String), SymbolId>,
    parents: Vec<Option<ScopeId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` in `scope`. If the name already exists in that exact
    /// scope the existing entry is left alone and returned as the error.
    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        line: usize,
        scope: ScopeId,
    ) -> Result<SymbolId, SymbolId> {
        if let Some(existing) = self.index.get(&(scope, name.to_owned())) {
            return Err(*existing);
        }
        let id = SymbolId(self.entries.len());
        self.entries.push(Entry {
            name: name.to_owned(),
            ty,
            line,
            scope,
            value: None,
            is_used: false,
        });
        self.index.insert((scope, name.to_owned()), id);
        Ok(id)
    }

    /// Find `name` in the first scope of `chain` that declares it.
    pub fn lookup(&self, name: &str, chain: impl IntoIterator<Item = ScopeId>) -> Option<SymbolId> {
        chain
            .into_iter()
            .find_map(|scope| self.index.get(&(scope, name.to_owned())).copied())
    }

    pub fn get(&self, id: SymbolId) -> Option<&Entry> {
        self.entries.get(id.0)
    }

    pub fn assign(&mut self, id: SymbolId, value: Value) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.value = Some(value);
        }
    }

    pub fn mark_used(&mut self, id: SymbolId) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.is_used = true;
        }
    }

    /// Follow alias links until a concrete value is reached. Returns `None`
    /// for an unset value or a cycle.
    pub fn resolve(&self, id: SymbolId) -> Option<&Value> {
        let mut visited = HashSet::new();
        self.resolve_guarded(id, &mut visited)
    }

    fn resolve_guarded(&self, id: SymbolId, visited: &mut HashSet<SymbolId>) -> Option<&Value> {
        if !visited.insert(id) {
            return None;
        }
        match self.get(id)?.value.as_ref()? {
            Value::Alias(target) => self.resolve_guarded(*target, visited),
            value => Some(value),
        }
    }

    /// Give every entry without a value its type's default. Returns the
    /// entries that were defaulted.
    pub fn apply_defaults(&mut self) -> Vec<SymbolId> {
        let mut defaulted = Vec::new();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.value.is_none() {
                entry.value = Some(Value::default_for(entry.ty));
                defaulted.push(SymbolId(index));
            }
        }
        defaulted
    }

    pub fn unused(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.iter().filter(|(_, e)| !e.is_used).map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Entry)> {
        self.entries.iter().enumerate().map(|(i, e)| (SymbolId(i), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_parents(&mut self, parents: Vec<Option<ScopeId>>) {
        self.parents = parents;
    }

    pub fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.parents.get(scope.0).copied().flatten()
    }

    pub fn scope_count(&self) -> usize {
        self.parents.len()
    }

    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Int(n) => n.to_string(),
            Value::Str(s) => format!("\"{s}\""),
            Value::Bool(b) => b.to_string(),
            Value::Alias(target) => {
                let name = self.get(*target).map_or("?", |e| e.name.as_str());
                match self.resolve(*target) {
                    Some(value) => format!("{name} ({})", self.describe(value)),
                    None => name.to_owned(),
                }
            }
            Value::Expr(text) => text.clone(),
        }
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:<8} {:>5} {:>6} {:>5}  {:<5} value",
            "name", "type", "scope", "parent", "line", "used"
        )?;
        let rows = self
            .entries
            .iter()
            .sorted_by_key(|e| (e.scope, e.line))
            .map(|e| {
                let parent = self
                    .parent_of(e.scope)
                    .map_or_else(|| "-".to_owned(), |p| p.to_string());
                let value = e
                    .value
                    .as_ref()
                    .map_or_else(|| "-".to_owned(), |v| self.describe(v));
                format!(
                    "{:<10} {:<8} {:>5} {:>6} {:>5}  {:<5} {}",
                    e.name, e.ty, e.scope, parent, e.line, e.is_used, value
                )
            })
            .join("\n");
        f.write_str(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeclaration_keeps_first_entry() {
        let mut table = SymbolTable::new();
        let first = table.declare("a", Type::Int, 1, ScopeId(1)).unwrap();
        assert_eq!(table.declare("a", Type::String, 4, ScopeId(1)), Err(first));

        let entry = table.get(first).unwrap();
        assert_eq!((entry.ty, entry.line), (Type::Int, 1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_prefers_nearest_scope() {
        let mut table = SymbolTable::new();
        let outer = table.declare("a", Type::Int, 1, ScopeId(1)).unwrap();
        let inner = table.declare("a", Type::Int, 2, ScopeId(2)).unwrap();

        assert_eq!(table.lookup("a", [ScopeId(2), ScopeId(1), ScopeId(0)]), Some(inner));
        assert_eq!(table.lookup("a", [ScopeId(1), ScopeId(0)]), Some(outer));
        assert_eq!(table.lookup("b", [ScopeId(2), ScopeId(1), ScopeId(0)]), None);
    }

    #[test]
    fn test_resolve_follows_aliases_and_stops_on_cycles() {
        let mut table = SymbolTable::new();
        let a = table.declare("a", Type::Int, 1, ScopeId(1)).unwrap();
        let b = table.declare("b", Type::Int, 2, ScopeId(1)).unwrap();
        let c = table.declare("c", Type::Int, 3, ScopeId(1)).unwrap();
        table.assign(a, Value::Int(7));
        table.assign(b, Value::Alias(a));
        table.assign(c, Value::Alias(b));
        assert_eq!(table.resolve(c), Some(&Value::Int(7)));

        assert_eq!(table.describe(&Value::Alias(b)), "b (7)");

        table.assign(a, Value::Alias(c));
        assert_eq!(table.resolve(c), None);
        assert_eq!(table.describe(&Value::Alias(b)), "b");
    }

    #[test]
    fn test_defaults_and_unused() {
        let mut table = SymbolTable::new();
        let x = table.declare("x", Type::Int, 1, ScopeId(1)).unwrap();
        let s = table.declare("s", Type::String, 2, ScopeId(1)).unwrap();
        let b = table.declare("b", Type::Boolean, 3, ScopeId(1)).unwrap();
        table.assign(s, Value::Str("hi".into()));
        table.mark_used(s);

        assert_eq!(table.apply_defaults(), vec![x, b]);
        assert_eq!(table.get(x).unwrap().value, Some(Value::Int(0)));
        assert_eq!(table.get(b).unwrap().value, Some(Value::Bool(false)));
        assert_eq!(table.unused().collect::<Vec<_>>(), vec![x, b]);
    }
}
