//! Lexically scoped symbol table.
//!
//! One table with a stack of scopes and enter/exit operations. Lookup
//! walks from the innermost scope outward. Bindings are allocated in
//! the arena, so references to a symbol stay valid after its scope
//! exits; exiting only makes the names invisible to later lookups.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::types::Type;

/// A name binding. Globals are referenced by name in generated code;
/// locals get a virtual-variable id from the code generator.
#[derive(Debug)]
pub struct Symbol<'a> {
    pub name: &'a str,
    pub ty: &'a Type<'a>,
    pub scope_level: u32,
    pub is_global: bool,
    pub var_id: Option<u32>,
}

pub struct SymbolTable<'a> {
    arena: &'a Arena,
    scopes: Vec<HashMap<&'a str, &'a Symbol<'a>>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(arena: &'a Arena) -> SymbolTable<'a> {
        SymbolTable {
            arena,
            scopes: vec![HashMap::new()],
        }
    }

    /// Current scope level; 0 is the translation-unit scope.
    pub fn level(&self) -> u32 {
        self.scopes.len() as u32 - 1
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Leave the current scope. The bindings stay alive in the arena;
    /// only the visibility is dropped.
    pub fn exit_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot exit the global scope");
        self.scopes.pop();
    }

    /// Add a binding in the current scope. Returns `None` if the name
    /// is already bound at this level, letting the caller report a
    /// redefinition.
    pub fn define(
        &mut self,
        name: &'a str,
        ty: &'a Type<'a>,
        var_id: Option<u32>,
    ) -> Option<&'a Symbol<'a>> {
        let level = self.level();
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.contains_key(name) {
            return None;
        }
        let symbol = self.arena.alloc(Symbol {
            name,
            ty,
            scope_level: level,
            is_global: level == 0,
            var_id,
        });
        scope.insert(name, symbol);
        Some(symbol)
    }

    /// Look a name up, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&'a Symbol<'a>> {
        for scope in self.scopes.iter().rev() {
            if let Some(&symbol) = scope.get(name) {
                return Some(symbol);
            }
        }
        None
    }

    /// Look a name up in the current scope only.
    pub fn lookup_current(&self, name: &str) -> Option<&'a Symbol<'a>> {
        self.scopes
            .last()
            .and_then(|scope| scope.get(name))
            .copied()
    }
}
