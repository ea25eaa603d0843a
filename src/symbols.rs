use crate::ast::Type;
use crate::error::Pos;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Function { params: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Variable type, or a function's inferred return type.
    pub ty: Type,
    pub depth: usize,
    pub kind: SymbolKind,
    pub pos: Pos,
    /// Name the variable is stored under in generated code.
    pub storage: String,
}

impl Symbol {
    pub fn variable(name: &str, ty: Type, pos: Pos) -> Self {
        Symbol {
            name: name.to_string(),
            ty,
            depth: 0,
            kind: SymbolKind::Variable,
            pos,
            storage: name.to_string(),
        }
    }

    pub fn function(name: &str, params: Vec<String>, pos: Pos) -> Self {
        Symbol {
            name: name.to_string(),
            ty: Type::Unknown,
            depth: 0,
            kind: SymbolKind::Function { params },
            pos,
            storage: name.to_string(),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }

    pub fn arity(&self) -> usize {
        match &self.kind {
            SymbolKind::Function { params } => params.len(),
            SymbolKind::Variable => 0,
        }
    }
}

/// A scope containing symbols
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub symbols: HashMap<String, Symbol>,
}

/// Stack of scopes; the last one is current.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Starts with the global scope pushed.
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::default()],
        }
    }

    /// Depth of the current scope; the global scope is 0.
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
        trace!(depth = self.depth(), "entered scope");
    }

    /// Pops the current scope. Its symbols become unreachable.
    pub fn exit_scope(&mut self) -> Option<Scope> {
        let scope = self.scopes.pop();
        if let Some(scope) = &scope {
            trace!(symbols = scope.symbols.len(), remaining = self.scopes.len(), "left scope");
        }
        scope
    }

    /// Declares into the current scope. On a same-scope clash the existing
    /// symbol is returned and nothing changes.
    pub fn declare(&mut self, mut symbol: Symbol) -> Result<(), &Symbol> {
        let depth = self.depth();
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if scope.symbols.contains_key(&symbol.name) {
            return Err(&scope.symbols[&symbol.name]);
        }
        symbol.depth = depth;
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Innermost-first lookup.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.symbols.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.symbols.get_mut(name))
    }

    /// A symbol declared at exactly `depth`, ignoring shadowing above it.
    pub fn get_at_mut(&mut self, depth: usize, name: &str) -> Option<&mut Symbol> {
        self.scopes.get_mut(depth)?.symbols.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: Type) -> Symbol {
        Symbol::variable(name, ty, Pos::new(1, 1))
    }

    #[test]
    fn starts_with_global_scope() {
        let table = SymbolTable::new();
        assert_eq!(table.depth(), 0);
        assert!(table.lookup("anything").is_none());
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.declare(var("x", Type::Integer)).is_ok());
        let existing = table.declare(var("x", Type::String)).unwrap_err();
        assert_eq!(existing.ty, Type::Integer);
        assert_eq!(table.lookup("x").unwrap().ty, Type::Integer);
    }

    #[test]
    fn inner_scope_shadows_and_is_discarded() {
        let mut table = SymbolTable::new();
        table.declare(var("x", Type::Integer)).unwrap();
        table.enter_scope();
        table.declare(var("x", Type::String)).unwrap();
        table.declare(var("local", Type::Float)).unwrap();
        assert_eq!(table.lookup("x").unwrap().ty, Type::String);
        assert_eq!(table.lookup("x").unwrap().depth, 1);

        let popped = table.exit_scope().unwrap();
        assert_eq!(popped.symbols.len(), 2);
        assert_eq!(table.lookup("x").unwrap().ty, Type::Integer);
        assert!(table.lookup("local").is_none());
    }

    #[test]
    fn lookup_walks_outward() {
        let mut table = SymbolTable::new();
        table
            .declare(Symbol::function("f", vec!["a".into(), "b".into()], Pos::new(1, 1)))
            .unwrap();
        table.enter_scope();
        table.enter_scope();
        let f = table.lookup("f").unwrap();
        assert!(f.is_function());
        assert_eq!(f.arity(), 2);
        assert_eq!(f.depth, 0);
    }

    #[test]
    fn get_at_ignores_shadowing() {
        let mut table = SymbolTable::new();
        table.declare(Symbol::function("f", vec![], Pos::new(1, 1))).unwrap();
        table.enter_scope();
        table.declare(var("f", Type::String)).unwrap();
        table.get_at_mut(0, "f").unwrap().ty = Type::Float;
        assert_eq!(table.lookup("f").unwrap().ty, Type::String);
        table.exit_scope();
        assert_eq!(table.lookup("f").unwrap().ty, Type::Float);
    }
}
