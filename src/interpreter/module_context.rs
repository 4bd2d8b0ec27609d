use crate::error::VineError;
use crate::interpreter::environment::Environment;
use crate::interpreter::native_function::global_module;
use crate::interpreter::stdlib::{date_module, io_module, path_module};
use crate::interpreter::value::Value;
use crate::scanner::token::TokenType;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub type ModuleBuilder = fn() -> HashMap<String, Value>;

/// Built-in modules reachable through `use "<prefix><name>"`, keyed without the prefix.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleBuilder>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `global`, `io`, `path` and `date`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("global", global_module);
        registry.register("io", io_module);
        registry.register("path", path_module);
        registry.register("date", date_module);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, builder: ModuleBuilder) {
        self.modules.insert(name.into(), builder);
    }

    pub fn build(&self, name: &str) -> Option<HashMap<String, Value>> {
        self.modules.get(name).map(|builder| builder())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Cache key for an evaluated module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKey {
    Builtin(String),
    File(PathBuf),
}

impl ModuleKey {
    fn describe(&self) -> String {
        match self {
            ModuleKey::Builtin(name) => name.clone(),
            ModuleKey::File(path) => path.display().to_string(),
        }
    }
}

/// State shared by every `use` in one interpreter: evaluated modules and the chain of modules
/// currently being evaluated.
pub struct ModuleContext {
    pub keywords: HashMap<String, TokenType>,
    cache: HashMap<ModuleKey, Rc<Environment>>,
    loading: HashSet<ModuleKey>,
}

impl ModuleContext {
    pub fn new(keywords: HashMap<String, TokenType>) -> Self {
        Self {
            keywords,
            cache: HashMap::new(),
            loading: HashSet::new(),
        }
    }

    pub fn cached(&self, key: &ModuleKey) -> Option<Rc<Environment>> {
        self.cache.get(key).cloned()
    }

    /// Marks `key` as in progress. Fails when it already is, which means the import graph has
    /// a cycle.
    pub fn begin_loading(&mut self, key: &ModuleKey) -> Result<(), VineError> {
        if !self.loading.insert(key.clone()) {
            return Err(VineError::interpreter(format!(
                "Cyclic import of '{}'",
                key.describe()
            )));
        }
        Ok(())
    }

    pub fn finish_loading(&mut self, key: ModuleKey, module: Rc<Environment>) {
        self.loading.remove(&key);
        self.cache.insert(key, module);
    }

    pub fn abandon(&mut self, key: &ModuleKey) {
        self.loading.remove(key);
    }

    pub fn is_loading(&self, path: &Path) -> bool {
        self.loading.contains(&ModuleKey::File(path.to_path_buf()))
    }
}
