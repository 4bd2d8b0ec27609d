use crate::error::VineError;
use crate::interpreter::value::Value;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Clone)]
enum Binding {
    Value(Value),
    // lookups of this name continue in the linked module environment
    Link(Rc<Environment>),
}

/// A lexical scope. Children hold their parent; the chain is only ever walked upwards.
#[derive(Default)]
pub struct Environment {
    parent: Option<Rc<Environment>>,
    values: RefCell<HashMap<String, Binding>>,
    statics: RefCell<HashSet<String>>,
    exposed: RefCell<HashSet<String>>,
    aliases: RefCell<HashMap<String, String>>, // local name -> name inside the linked module
    // a module rarely has more than a couple of wildcard imports
    wildcards: RefCell<SmallVec<[Rc<Environment>; 2]>>,
    file_path: RefCell<Option<PathBuf>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.values.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("file_path", &self.file_path.borrow())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A module root bound to `file_path`, used to resolve relative imports.
    pub fn new_root(file_path: Option<PathBuf>) -> Self {
        Self {
            file_path: RefCell::new(file_path),
            ..Self::default()
        }
    }

    pub fn new_with_enclosing(parent: Rc<Environment>) -> Self {
        let file_path = parent.file_path();
        Self {
            parent: Some(parent),
            file_path: RefCell::new(file_path),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.file_path.borrow().clone()
    }

    pub fn set_file_path(&self, path: impl AsRef<Path>) {
        *self.file_path.borrow_mut() = Some(path.as_ref().to_path_buf());
    }

    /// Binds `name` here. Shadowing a parent binding is fine; redeclaring in this scope is not.
    pub fn declare(&self, name: &str, value: Value, is_static: bool) -> Result<(), VineError> {
        let mut values = self.values.borrow_mut();
        if values.contains_key(name) {
            return Err(VineError::interpreter(format!(
                "'{}' is already declared",
                name
            )));
        }
        values.insert(name.to_string(), Binding::Value(value));
        if is_static {
            self.statics.borrow_mut().insert(name.to_string());
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Value, VineError> {
        let binding = self.values.borrow().get(name).cloned();
        match binding {
            Some(Binding::Value(value)) => return Ok(value),
            Some(Binding::Link(module)) => {
                let remote = self.aliases.borrow().get(name).cloned();
                return module.get(remote.as_deref().unwrap_or(name));
            }
            None => {}
        }

        let wildcard = self
            .wildcards
            .borrow()
            .iter()
            .find(|module| module.exposes(name))
            .cloned();
        if let Some(module) = wildcard {
            return module.get(name);
        }

        match &self.parent {
            Some(parent) => parent.get(name),
            None => Err(VineError::not_declared(name)),
        }
    }

    pub fn set(&self, name: &str, value: Value) -> Result<(), VineError> {
        if !self.values.borrow().contains_key(name) {
            return match &self.parent {
                Some(parent) => parent.set(name, value),
                None => Err(VineError::not_declared(name)),
            };
        }
        if self.statics.borrow().contains(name) {
            return Err(VineError::interpreter(format!(
                "Cannot assign to constant '{}'",
                name
            )));
        }

        let mut values = self.values.borrow_mut();
        match values.get_mut(name) {
            Some(Binding::Link(_)) => Err(VineError::interpreter(format!(
                "'{}' is imported and cannot be reassigned",
                name
            ))),
            Some(slot) => {
                *slot = Binding::Value(value);
                Ok(())
            }
            None => Err(VineError::not_declared(name)),
        }
    }

    pub fn delete(&self, name: &str) -> Result<(), VineError> {
        if self.values.borrow().contains_key(name) {
            if self.statics.borrow().contains(name) {
                return Err(VineError::interpreter(format!(
                    "Cannot delete constant '{}'",
                    name
                )));
            }
            self.values.borrow_mut().remove(name);
            self.exposed.borrow_mut().remove(name);
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.delete(name),
            None => Err(VineError::not_declared(name)),
        }
    }

    /// `"*"` makes every exposed name of `module` visible here; any other name becomes a link.
    pub fn link(&self, name: &str, module: Rc<Environment>) -> Result<(), VineError> {
        if name == "*" {
            self.wildcards.borrow_mut().push(module);
            return Ok(());
        }
        let mut values = self.values.borrow_mut();
        if values.contains_key(name) {
            return Err(VineError::interpreter(format!(
                "'{}' is already declared",
                name
            )));
        }
        values.insert(name.to_string(), Binding::Link(module));
        Ok(())
    }

    pub fn set_alias(&self, local: &str, remote: &str) {
        self.aliases
            .borrow_mut()
            .insert(local.to_string(), remote.to_string());
    }

    pub fn expose(&self, name: &str) {
        self.exposed.borrow_mut().insert(name.to_string());
    }

    pub fn exposes(&self, name: &str) -> bool {
        self.exposed.borrow().contains(name)
    }

    pub fn exposed_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.exposed.borrow().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn is_static(&self, name: &str) -> bool {
        self.statics.borrow().contains(name)
    }

    /// Plain values bound directly in this scope, sorted by name. Links are skipped.
    pub fn local_values(&self) -> Vec<(String, Value)> {
        let mut locals: Vec<(String, Value)> = self
            .values
            .borrow()
            .iter()
            .filter_map(|(name, binding)| match binding {
                Binding::Value(value) => Some((name.clone(), value.clone())),
                Binding::Link(_) => None,
            })
            .collect();
        locals.sort_by(|a, b| a.0.cmp(&b.0));
        locals
    }

    /// Every name reachable from this scope, nearest first.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.borrow().keys().cloned().collect();
        for module in self.wildcards.borrow().iter() {
            names.extend(module.exposed_names());
        }
        if let Some(parent) = &self.parent {
            names.extend(parent.visible_names());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn child_sees_parent_and_may_shadow() {
        let root = Rc::new(Environment::new());
        root.declare("a", Value::Num(1.0), false).unwrap();
        let child = Environment::new_with_enclosing(root.clone());
        assert_eq!(child.get("a").unwrap(), Value::Num(1.0));
        child.declare("a", Value::Num(2.0), false).unwrap();
        assert_eq!(child.get("a").unwrap(), Value::Num(2.0));
        assert_eq!(root.get("a").unwrap(), Value::Num(1.0));
    }

    #[test]
    fn redeclaring_in_same_scope_fails() {
        let env = Environment::new();
        env.declare("a", Value::Nil, false).unwrap();
        assert!(env.declare("a", Value::Nil, false).is_err());
    }

    #[test]
    fn set_writes_through_to_owner() {
        let root = Rc::new(Environment::new());
        root.declare("count", Value::Num(0.0), false).unwrap();
        let child = Environment::new_with_enclosing(root.clone());
        child.set("count", Value::Num(5.0)).unwrap();
        assert_eq!(root.get("count").unwrap(), Value::Num(5.0));
    }

    #[test]
    fn statics_reject_set_and_delete() {
        let env = Environment::new();
        env.declare("k", Value::Num(1.0), true).unwrap();
        assert!(env.set("k", Value::Num(2.0)).is_err());
        assert!(env.delete("k").is_err());
        assert_eq!(env.get("k").unwrap(), Value::Num(1.0));
    }

    #[test]
    fn missing_name_is_not_declared() {
        let root = Rc::new(Environment::new());
        let child = Environment::new_with_enclosing(root);
        let err = child.get("ghost").unwrap_err();
        assert_eq!(err.kind, ErrorKind::VariableNotFound);
        assert_eq!(child.set("ghost", Value::Nil).unwrap_err().kind, ErrorKind::VariableNotFound);
    }

    #[test]
    fn wildcard_link_only_sees_exposed_names() {
        let module = Rc::new(Environment::new());
        module.declare("public", Value::Num(1.0), false).unwrap();
        module.declare("private", Value::Num(2.0), false).unwrap();
        module.expose("public");

        let importer = Environment::new();
        importer.link("*", module).unwrap();
        assert_eq!(importer.get("public").unwrap(), Value::Num(1.0));
        assert!(importer.get("private").is_err());
    }

    #[test]
    fn aliased_link_resolves_remote_name() {
        let module = Rc::new(Environment::new());
        module.declare("original", Value::str("hi"), false).unwrap();

        let importer = Environment::new();
        importer.link("renamed", module).unwrap();
        importer.set_alias("renamed", "original");
        assert_eq!(importer.get("renamed").unwrap(), Value::str("hi"));
        assert!(importer.get("original").is_err());
    }

    #[test]
    fn file_path_is_inherited() {
        let root = Rc::new(Environment::new_root(Some(PathBuf::from("/tmp/main.vine"))));
        let child = Environment::new_with_enclosing(root);
        assert_eq!(child.file_path(), Some(PathBuf::from("/tmp/main.vine")));
    }
}
