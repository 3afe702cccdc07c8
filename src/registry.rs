//! Process-wide mapping from class name to parsed class. Classes live for
//! the life of the registry; instances hold non-owning-style shared refs
//! back to them.
use std::collections::HashMap;
use std::rc::Rc;

use crate::class::Class;

/// Name-keyed table of loaded classes.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, Rc<Class>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a class by the name it was registered under.
    pub fn get(&self, name: &str) -> Option<Rc<Class>> {
        self.classes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Registers a class under its own name. A later registration with the
    /// same name is ignored; the first class keeps its identity.
    pub fn insert(&mut self, class: Rc<Class>) {
        self.classes
            .entry(class.name().to_owned())
            .or_insert(class);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
