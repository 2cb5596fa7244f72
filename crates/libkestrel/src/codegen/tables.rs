//! Reference and jump tables kept while emitting code.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use kestrel_syntax::scope::ScopeId;
use kestrel_syntax::symbols::{Entry, SymbolId};
use kestrel_syntax::token::Type;

use crate::bytecode::{JumpKey, RefKey};
use crate::isa::MEMORY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Offset into the static area, starting at 1. Resolved once the code
    /// length is known.
    Static { offset: usize },
    /// Fixed region packed down from the top of memory.
    Heap { address: u8, capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub key: RefKey,
    pub name: String,
    /// `None` for scratch cells.
    pub ty: Option<Type>,
    pub scope: Option<ScopeId>,
    pub location: Location,
}

#[derive(Debug, Default, Clone)]
pub struct ReferenceTable {
    entries: Vec<RefEntry>,
    by_symbol: HashMap<SymbolId, RefKey>,
    scratch: HashMap<usize, RefKey>,
    statics: usize,
    heap_used: usize,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The placeholder of a static variable, allocated on first reference.
    pub fn static_for(&mut self, symbol: SymbolId, entry: &Entry) -> RefKey {
        if let Some(key) = self.by_symbol.get(&symbol) {
            return *key;
        }
        let key = self.push_static(entry.name.clone(), Some(entry.ty), Some(entry.scope));
        self.by_symbol.insert(symbol, key);
        key
    }

    /// Scratch cell for intermediate results at expression nesting `depth`.
    pub fn scratch(&mut self, depth: usize) -> RefKey {
        if let Some(key) = self.scratch.get(&depth) {
            return *key;
        }
        let key = self.push_static(format!("temp{depth}"), None, None);
        self.scratch.insert(depth, key);
        key
    }

    fn push_static(&mut self, name: String, ty: Option<Type>, scope: Option<ScopeId>) -> RefKey {
        self.statics += 1;
        let key = RefKey(self.entries.len());
        self.entries.push(RefEntry {
            key,
            name,
            ty,
            scope,
            location: Location::Static { offset: self.statics },
        });
        key
    }

    /// The heap address of a string variable. The region is reserved on
    /// first use; `None` once the heap would run past address 0.
    pub fn heap_for(
        &mut self,
        symbol: SymbolId,
        entry: &Entry,
        capacity: usize,
    ) -> Option<(u8, usize)> {
        if let Some(key) = self.by_symbol.get(&symbol) {
            return match self.entries.get(key.0)?.location {
                Location::Heap { address, capacity } => Some((address, capacity)),
                Location::Static { .. } => None,
            };
        }
        if self.heap_used + capacity > MEMORY_SIZE {
            return None;
        }
        self.heap_used += capacity;
        let address = u8::try_from(MEMORY_SIZE - self.heap_used).ok()?;

        let key = RefKey(self.entries.len());
        self.entries.push(RefEntry {
            key,
            name: entry.name.clone(),
            ty: Some(entry.ty),
            scope: Some(entry.scope),
            location: Location::Heap { address, capacity },
        });
        self.by_symbol.insert(symbol, key);
        Some((address, capacity))
    }

    pub fn get(&self, key: RefKey) -> Option<&RefEntry> {
        self.entries.get(key.0)
    }

    pub fn static_count(&self) -> usize {
        self.statics
    }

    /// Lowest address used by the heap.
    pub fn heap_bottom(&self) -> usize {
        MEMORY_SIZE - self.heap_used
    }
}

impl fmt::Display for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self
            .entries
            .iter()
            .map(|e| {
                let ty = e.ty.map_or_else(|| "-".to_owned(), |t| t.to_string());
                let scope = e.scope.map_or_else(|| "-".to_owned(), |s| s.to_string());
                let location = match e.location {
                    Location::Static { offset } => format!("+{offset}"),
                    Location::Heap { address, capacity } => {
                        format!("{address:02X} ({capacity} bytes)")
                    }
                };
                format!("{:<4} {:<8} {:<8} {:>5}  {}", e.key, e.name, ty, scope, location)
            })
            .join("\n");
        f.write_str(&rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpEntry {
    /// Program counter after the branch operand has been read.
    pub origin: usize,
    pub destination: Option<usize>,
}

#[derive(Debug, Default, Clone)]
pub struct JumpTable {
    entries: Vec<JumpEntry>,
}

impl JumpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a forward jump whose operand sits at `operand_index`.
    pub fn open(&mut self, operand_index: usize) -> JumpKey {
        self.entries.push(JumpEntry {
            origin: operand_index + 1,
            destination: None,
        });
        JumpKey(self.entries.len() - 1)
    }

    pub fn land(&mut self, key: JumpKey, destination: usize) {
        if let Some(entry) = self.entries.get_mut(key.0) {
            entry.destination = Some(destination);
        }
    }

    pub fn get(&self, key: JumpKey) -> Option<&JumpEntry> {
        self.entries.get(key.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
