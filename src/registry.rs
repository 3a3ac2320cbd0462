use crate::error::LoadError;
use crate::figure::FigureRef;
use crate::shapes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Zero-argument constructor for one figure type.
pub type Factory = fn() -> FigureRef;

static TYPE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$").unwrap()
});

static BUILTIN: Lazy<TypeRegistry> = Lazy::new(|| {
    let mut registry = TypeRegistry::new();
    shapes::register(&mut registry);
    registry
});

/// Maps persisted type names to factories.
///
/// Resolution is a plain lookup: names never reach anything that could evaluate
/// them, and a name that was not registered cannot be constructed.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    factories: HashMap<String, Factory>,
    aliases: HashMap<String, String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in figure type.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Returns the factory previously registered under `name`, if any.
    pub fn register(&mut self, name: &str, factory: Factory) -> Option<Factory> {
        self.aliases.remove(name);
        self.factories.insert(name.to_string(), factory)
    }

    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), LoadError> {
        let canonical = self.canonical(target)?.to_string();
        self.aliases.insert(alias.to_string(), canonical);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.canonical(name).is_ok()
    }

    pub fn lookup(&self, name: &str) -> Result<Factory, LoadError> {
        let canonical = self.canonical(name)?;
        self.factories
            .get(canonical)
            .copied()
            .ok_or_else(|| LoadError::UnknownType(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .factories
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    fn canonical<'a>(&'a self, name: &'a str) -> Result<&'a str, LoadError> {
        if !TYPE_NAME_RE.is_match(name) {
            return Err(LoadError::UnknownType(name.to_string()));
        }
        if self.factories.contains_key(name) {
            return Ok(name);
        }
        self.aliases
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| LoadError::UnknownType(name.to_string()))
    }
}
