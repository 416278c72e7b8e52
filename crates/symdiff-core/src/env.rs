//! Scoped variable environments
//!
//! Both environments are stacks of scopes; lookups walk from the innermost
//! scope outwards, declarations always land in the innermost scope.

use crate::types::Type;
use crate::value::Value;
use crate::{Result, SymdiffError};
use std::collections::HashMap;

/// Identifier -> declared type, used by type checking
pub type CompileEnvironment = ScopeStack<Type>;

/// Identifier -> runtime value, used by evaluation and reduction
pub type ExecutionEnvironment = ScopeStack<Value>;

#[derive(Debug, Clone)]
struct Scope<T> {
    bindings: HashMap<String, T>,
}

impl<T> Scope<T> {
    fn new() -> Self {
        Scope {
            bindings: HashMap::new(),
        }
    }
}

/// A stack of nested scopes; the bottom (global) scope always exists
#[derive(Debug, Clone)]
pub struct ScopeStack<T> {
    scopes: Vec<Scope<T>>,
}

impl<T> ScopeStack<T> {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) -> usize {
        self.scopes.push(Scope::new());
        self.scopes.len() - 1
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() == 1 {
            log::warn!("pop_scope called on the global scope; ignoring");
            return;
        }
        self.scopes.pop();
    }

    /// Number of active scopes, including the global one.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `name` in the innermost scope.
    pub fn declare(&mut self, name: impl Into<String>, value: T) -> Result<()> {
        let name = name.into();
        let current = self.scopes.len() - 1;
        let scope = &mut self.scopes[current];
        if scope.bindings.contains_key(&name) {
            return Err(SymdiffError::AlreadyDeclaredVariable(name));
        }
        scope.bindings.insert(name, value);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&T> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
            .ok_or_else(|| SymdiffError::UndeclaredVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.bindings.contains_key(name))
    }

    /// Run `f` inside a fresh scope. The scope is popped even when `f` fails.
    pub fn with_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved_len = self.scopes.len();
        self.push_scope();
        let result = f(self);
        while self.scopes.len() > saved_len {
            self.pop_scope();
        }
        result
    }
}

impl<T> Default for ScopeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}
