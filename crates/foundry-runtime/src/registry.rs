//! Per-runner module registration: external-function factories and named
//! value getter/setter pairs, looked up by `(module, name)` from `VARIABLE`,
//! `ASSIGNMENT`, and `FUNCTION` AST nodes.

use std::collections::HashMap;

use foundry_core::Value;

use crate::effect::ScriptEffect;
use crate::external::ExternalFunction;

pub type Getter = Box<dyn Fn() -> Result<Value, ScriptEffect> + Send + Sync>;
pub type Setter = Box<dyn Fn(&Value) -> Result<(), ScriptEffect> + Send + Sync>;
pub type ValueFn = Box<dyn Fn(&HashMap<String, Value>) -> Result<Value, ScriptEffect> + Send + Sync>;
pub type HandlerFactory = Box<dyn Fn() -> Box<dyn ExternalFunction> + Send + Sync>;

/// A module's catalogue of callable functions and gettable/settable values.
/// A fresh handler instance is created per `FUNCTION` frame entry — factories
/// are never called more than once per frame (see `tscript/runner.py`'s
/// `function_map[module][name]()` convention).
pub trait ModuleRegistry: Send + Sync {
    fn has_function(&self, name: &str) -> bool;
    /// `true` if this function resolves to a handler object (`call_external`),
    /// `false` if it resolves to an immediate value (`call_value`).
    fn is_external(&self, name: &str) -> bool;
    fn call_value(&self, name: &str, params: &HashMap<String, Value>) -> Option<Result<Value, ScriptEffect>>;
    fn call_external(&self, name: &str) -> Option<Box<dyn ExternalFunction>>;
    fn getter(&self, name: &str) -> Option<&Getter>;
    fn setter(&self, name: &str) -> Option<&Setter>;
}

enum FunctionEntry {
    Value(ValueFn),
    External(HandlerFactory),
}

/// A straightforward map-backed `ModuleRegistry`, sufficient for both
/// builtins and hand-registered subcontractor modules.
#[derive(Default)]
pub struct StaticModule {
    functions: HashMap<String, FunctionEntry>,
    getters: HashMap<String, Getter>,
    setters: HashMap<String, Setter>,
}

impl StaticModule {
    pub fn new() -> Self {
        StaticModule::default()
    }

    pub fn with_value_fn(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&HashMap<String, Value>) -> Result<Value, ScriptEffect> + Send + Sync + 'static,
    ) -> Self {
        self.functions.insert(name.into(), FunctionEntry::Value(Box::new(f)));
        self
    }

    pub fn with_external_fn(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn ExternalFunction> + Send + Sync + 'static,
    ) -> Self {
        self.functions.insert(name.into(), FunctionEntry::External(Box::new(factory)));
        self
    }

    pub fn with_getter(mut self, name: impl Into<String>, f: impl Fn() -> Result<Value, ScriptEffect> + Send + Sync + 'static) -> Self {
        self.getters.insert(name.into(), Box::new(f));
        self
    }

    pub fn with_setter(mut self, name: impl Into<String>, f: impl Fn(&Value) -> Result<(), ScriptEffect> + Send + Sync + 'static) -> Self {
        self.setters.insert(name.into(), Box::new(f));
        self
    }
}

impl ModuleRegistry for StaticModule {
    fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn is_external(&self, name: &str) -> bool {
        matches!(self.functions.get(name), Some(FunctionEntry::External(_)))
    }

    fn call_value(&self, name: &str, params: &HashMap<String, Value>) -> Option<Result<Value, ScriptEffect>> {
        match self.functions.get(name)? {
            FunctionEntry::Value(f) => Some(f(params)),
            FunctionEntry::External(_) => None,
        }
    }

    fn call_external(&self, name: &str) -> Option<Box<dyn ExternalFunction>> {
        match self.functions.get(name)? {
            FunctionEntry::External(factory) => Some(factory()),
            FunctionEntry::Value(_) => None,
        }
    }

    fn getter(&self, name: &str) -> Option<&Getter> {
        self.getters.get(name)
    }

    fn setter(&self, name: &str) -> Option<&Setter> {
        self.setters.get(name)
    }
}

/// The per-runner catalogue: module name → registry, plus the builtin table
/// that is always present under the `<builtin>` pseudo-module.
pub struct Registry {
    modules: HashMap<String, Box<dyn ModuleRegistry>>,
}

pub const BUILTIN_MODULE: &str = "<builtin>";

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut modules: HashMap<String, Box<dyn ModuleRegistry>> = HashMap::new();
        modules.insert(BUILTIN_MODULE.to_string(), Box::new(crate::builtins::builtin_module()));
        Registry { modules }
    }

    pub fn register(&mut self, name: impl Into<String>, module: impl ModuleRegistry + 'static) {
        self.modules.insert(name.into(), Box::new(module));
    }

    pub fn module(&self, name: &str) -> Option<&dyn ModuleRegistry> {
        self.modules.get(name).map(|b| b.as_ref())
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().filter(|m| m.as_str() != BUILTIN_MODULE).cloned().collect()
    }
}
