//! Scope chains binding expressions evaluate against.
//!
//! A [`Context`] is one layer of variables with an optional parent. Lookups
//! walk outward until a layer defines the name. Every write made through a
//! layer is recorded in the [`Journal`] shared by the whole chain, which the
//! engine drains at the start of each flush to find the watchers to re-run.

use crate::evaluator::EvalError;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use ulid::Ulid;

pub type Context = Rc<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(Ulid);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JournalId(Ulid);

/// A variable written since the journal was last drained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Change {
    pub scope: ScopeId,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct Drained {
    pub changes: Vec<Change>,
    /// A layer gained a variable it did not have before.
    pub structural: bool,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.structural
    }
}

#[derive(Debug)]
pub struct Journal {
    id: JournalId,
    changes: RefCell<IndexSet<Change>>,
    structural: Cell<bool>,
}

impl Journal {
    fn new() -> Self {
        Self {
            id: JournalId(Ulid::new()),
            changes: RefCell::default(),
            structural: Cell::new(false),
        }
    }

    pub fn id(&self) -> JournalId {
        self.id
    }

    pub fn record(&self, scope: ScopeId, name: &str) {
        self.changes.borrow_mut().insert(Change {
            scope,
            name: name.to_owned(),
        });
    }

    pub fn mark_structural(&self) {
        self.structural.set(true);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.borrow().is_empty() && !self.structural.get()
    }

    pub fn drain(&self) -> Drained {
        Drained {
            changes: self.changes.take().into_iter().collect(),
            structural: self.structural.replace(false),
        }
    }
}

pub struct Scope {
    id: ScopeId,
    variables: RefCell<IndexMap<String, Value>>,
    parent: Option<Context>,
    journal: Rc<Journal>,
}

impl Scope {
    /// Creates a root context with its own journal.
    pub fn root() -> Context {
        Self::with_variables(Vec::<(String, Value)>::new())
    }

    pub fn with_variables<K: Into<String>>(
        variables: impl IntoIterator<Item = (K, Value)>,
    ) -> Context {
        Rc::new(Self {
            id: ScopeId(Ulid::new()),
            variables: RefCell::new(
                variables
                    .into_iter()
                    .map(|(name, value)| (name.into(), value))
                    .collect(),
            ),
            parent: None,
            journal: Rc::new(Journal::new()),
        })
    }

    /// Creates a layer on top of `self` sharing its journal.
    /// The initial variables are not journaled.
    pub fn child<K: Into<String>>(
        self: &Rc<Self>,
        variables: impl IntoIterator<Item = (K, Value)>,
    ) -> Context {
        Rc::new(Self {
            id: ScopeId(Ulid::new()),
            variables: RefCell::new(
                variables
                    .into_iter()
                    .map(|(name, value)| (name.into(), value))
                    .collect(),
            ),
            parent: Some(self.clone()),
            journal: self.journal.clone(),
        })
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent(&self) -> Option<&Context> {
        self.parent.as_ref()
    }

    pub fn journal(&self) -> &Rc<Journal> {
        &self.journal
    }

    pub fn own_names(&self) -> Vec<String> {
        self.variables.borrow().keys().cloned().collect()
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.variables.borrow().get(name).cloned()
    }

    /// Nearest layer defining `name`, starting with `self`.
    pub fn defining_layer(&self, name: &str) -> Option<&Scope> {
        let mut scope = self;
        loop {
            if scope.has_own(name) {
                return Some(scope);
            }
            scope = scope.parent.as_deref()?;
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.defining_layer(name)?.get_own(name)
    }

    /// Overwrites `name` in the layer that defines it.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
        let scope = self
            .defining_layer(name)
            .ok_or_else(|| EvalError::Reference(name.to_owned()))?;
        scope.write(name, value);
        Ok(())
    }

    /// Writes `name` into this layer, shadowing any outer definition.
    pub fn define(&self, name: &str, value: Value) {
        self.write(name, value);
    }

    /// Assigns where `name` is already defined, otherwise defines it here.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.defining_layer(name) {
            Some(scope) => scope.write(name, value),
            None => self.write(name, value),
        }
    }

    fn write(&self, name: &str, value: Value) {
        let previous = self.variables.borrow_mut().insert(name.to_owned(), value);
        if previous.is_none() {
            self.journal.mark_structural();
        }
        self.journal.record(self.id, name);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("names", &self.own_names())
            .field("parent", &self.parent.as_ref().map(|parent| parent.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_walks_the_chain() {
        let root = Scope::with_variables([("title", Value::from("root")), ("count", 1.into())]);
        let item = root.child([("title", Value::from("item"))]);

        assert_eq!(item.get("title").unwrap().to_string(), "item");
        assert_eq!(item.get("count").unwrap().to_string(), "1");
        assert!(item.get("missing").is_none());
        assert_eq!(item.defining_layer("count").unwrap().id(), root.id());
    }

    #[test]
    fn test_assign_writes_the_defining_layer() {
        let root = Scope::with_variables([("count", Value::from(1))]);
        let item = root.child(Vec::<(String, Value)>::new());
        root.journal().drain();

        item.assign("count", 2.into()).unwrap();
        assert!(!item.has_own("count"));
        assert_eq!(root.get("count").unwrap().to_string(), "2");

        let drained = root.journal().drain();
        assert_eq!(
            drained.changes,
            vec![Change {
                scope: root.id(),
                name: "count".to_owned()
            }]
        );
        assert!(!drained.structural);
        assert!(root.journal().is_empty());
    }

    #[test]
    fn test_assign_to_undefined_name_fails() {
        let root = Scope::root();
        assert_eq!(
            root.assign("nope", Value::Null),
            Err(EvalError::Reference("nope".to_owned()))
        );
    }

    #[test]
    fn test_new_names_are_structural() {
        let root = Scope::root();
        root.set("fresh", 1);
        assert!(root.journal().drain().structural);
        root.set("fresh", 2);
        assert!(!root.journal().drain().structural);
    }

    #[test]
    fn test_child_shares_journal() {
        let root = Scope::root();
        let item = root.child([("item", Value::Null)]);
        assert!(Rc::ptr_eq(root.journal(), item.journal()));
        assert!(root.journal().is_empty());
    }
}
