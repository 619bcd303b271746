use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A chain of variable tables: function locals, enclosing functions, module
/// globals. Cloning shares the table.
#[derive(Clone, Default)]
pub struct Scope(Rc<ScopeInner>);

#[derive(Default)]
struct ScopeInner {
    vars: RefCell<IndexMap<String, Value>>,
    parent: Option<Scope>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Scope(Rc::new(ScopeInner {
            vars: RefCell::new(IndexMap::new()),
            parent: Some(self.clone()),
        }))
    }

    /// Look a name up through the enclosing scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(v) = current.0.vars.borrow().get(name) {
                return Some(v.clone());
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.0.vars.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.vars.borrow_mut().insert(name.into(), value);
    }

    /// Copy of the names bound directly in this scope.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.0.vars.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_reads_parent_and_shadows_locally() {
        let globals = Scope::new();
        globals.set("x", Value::Int(1));
        let local = globals.child();
        assert_eq!(local.get("x"), Some(Value::Int(1)));
        local.set("x", Value::Int(2));
        assert_eq!(local.get("x"), Some(Value::Int(2)));
        assert_eq!(globals.get("x"), Some(Value::Int(1)));
        assert_eq!(local.get_local("y"), None);
        assert_eq!(local.snapshot().len(), 1);
    }
}
