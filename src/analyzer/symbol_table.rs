use std::collections::HashMap;

use tracing::trace;

use crate::parser::Type;

/// Lexical nesting level; 0 is the global scope.
pub type ScopeId = usize;

/// What kind of declaration introduced a symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Param,
    Fun { params: Vec<Type> },
}

/// Where a symbol was declared. Kept by value so entries never borrow the
/// tree they describe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclRef {
    pub kind: DeclKind,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub scope: ScopeId,
    pub slot: usize,
    pub decl: DeclRef,
}

impl Symbol {
    pub fn is_function(&self) -> bool {
        matches!(self.decl.kind, DeclKind::Fun { .. })
    }
}

/// Scoped name table: a hash map from name to a chain of entries, newest
/// last.
///
/// Entries are purged as soon as their scope closes, so as long as scopes are
/// opened and closed in LIFO order the newest entry of a chain is always the
/// innermost visible declaration.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    table: HashMap<String, Vec<Symbol>>,
    /// Names inserted into each scope, indexed by scope id.
    scopes: Vec<Vec<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry unconditionally. Callers check for redeclaration with
    /// [`SymbolTable::lookup_in_scope`] first.
    pub fn insert(&mut self, name: &str, ty: Type, scope: ScopeId, slot: usize, decl: DeclRef) {
        trace!(symbol = name, %ty, scope, slot, "insert symbol");
        let symbol = Symbol {
            name: name.to_string(),
            ty,
            scope,
            slot,
            decl,
        };
        self.table.entry(name.to_string()).or_default().push(symbol);

        if self.scopes.len() <= scope {
            self.scopes.resize_with(scope + 1, Vec::new);
        }
        self.scopes[scope].push(name.to_string());
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.table.get(name)?.last()
    }

    pub fn lookup_in_scope(&self, name: &str, scope: ScopeId) -> Option<&Symbol> {
        self.table
            .get(name)?
            .iter()
            .rev()
            .find(|s| s.scope == scope)
    }

    /// Drops every entry declared in `scope`, touching only the chains of
    /// names that scope declared.
    pub fn delete_scope(&mut self, scope: ScopeId) {
        let Some(names) = self.scopes.get_mut(scope) else {
            return;
        };
        for name in std::mem::take(names) {
            let Some(chain) = self.table.get_mut(&name) else {
                continue;
            };
            chain.retain(|s| s.scope != scope);
            if chain.is_empty() {
                self.table.remove(&name);
            }
        }
    }

    pub fn reset(&mut self) {
        self.table.clear();
        self.scopes.clear();
    }

    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(line: usize) -> DeclRef {
        DeclRef {
            kind: DeclKind::Var,
            line,
        }
    }

    #[test]
    fn innermost_declaration_wins() {
        let mut table = SymbolTable::new();
        table.insert("x", Type::Int, 0, 0, var(1));
        table.insert("x", Type::Void, 1, 0, var(2));

        assert_eq!(table.lookup("x").map(|s| s.scope), Some(1));
        assert_eq!(table.lookup_in_scope("x", 0).map(|s| s.ty), Some(Type::Int));
    }

    #[test]
    fn delete_scope_uncovers_outer_entry() {
        let mut table = SymbolTable::new();
        table.insert("x", Type::Int, 0, 0, var(1));
        table.insert("x", Type::Int, 1, 0, var(2));
        table.insert("y", Type::Int, 1, 1, var(3));

        table.delete_scope(1);

        assert_eq!(table.lookup("x").map(|s| s.scope), Some(0));
        assert!(table.lookup("y").is_none());
        assert!(table.lookup_in_scope("x", 1).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut table = SymbolTable::new();
        table.insert("f", Type::Int, 0, 0, var(1));
        table.reset();

        assert!(table.is_empty());
        assert!(table.lookup("f").is_none());
    }

    #[test]
    fn delete_scope_leaves_other_scopes_alone() {
        let mut table = SymbolTable::new();
        table.insert("a", Type::Int, 0, 0, var(1));
        table.insert("b", Type::Int, 2, 0, var(2));
        table.delete_scope(1);
        table.insert("c", Type::Int, 1, 0, var(3));

        table.delete_scope(1);
        table.delete_scope(5);

        assert!(table.lookup("a").is_some());
        assert!(table.lookup("b").is_some());
        assert!(table.lookup("c").is_none());
        assert_eq!(table.len(), 2);
    }
}
