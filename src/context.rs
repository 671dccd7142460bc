use std::collections::HashMap;

use crate::value::Value;

/// One name-to-value binding table.
///
/// Host data of any shape enters through `serde_json`, so by the time a
/// scope exists its container is always a string-keyed map.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: HashMap<String, Value>) -> Self {
        Self { bindings }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// An ordered stack of scopes resolved innermost-first.
///
/// The environment's globals form the outermost scope, the render context
/// the next one; `for` bodies push and pop their own scopes, and `set`
/// binds into whichever scope is innermost at that point.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Walk the stack from innermost to outermost.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Bind into the innermost scope.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.bind(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with_root() -> ScopeStack {
        let mut root = Scope::new();
        root.bind("name", Value::Str("Alice".to_string()));
        root.bind("count", Value::Int(3));
        let mut stack = ScopeStack::new();
        stack.push(root);
        stack
    }

    #[test]
    fn lookup_in_root_scope() {
        let stack = stack_with_root();
        assert_eq!(
            stack.lookup("name"),
            Some(&Value::Str("Alice".to_string()))
        );
        assert_eq!(stack.lookup("missing"), None);
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut stack = stack_with_root();
        let mut inner = Scope::new();
        inner.bind("name", Value::Str("Bob".to_string()));
        stack.push(inner);
        assert_eq!(stack.lookup("name"), Some(&Value::Str("Bob".to_string())));
        // outer bindings stay visible through the inner scope
        assert_eq!(stack.lookup("count"), Some(&Value::Int(3)));
        stack.pop();
        assert_eq!(
            stack.lookup("name"),
            Some(&Value::Str("Alice".to_string()))
        );
    }

    #[test]
    fn bind_targets_innermost_scope() {
        let mut stack = stack_with_root();
        stack.push(Scope::new());
        stack.bind("local", Value::Int(1));
        assert_eq!(stack.lookup("local"), Some(&Value::Int(1)));
        stack.pop();
        assert_eq!(stack.lookup("local"), None);
    }
}
