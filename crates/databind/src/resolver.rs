use crate::context::Scope;
use indexmap::IndexSet;

const RESERVED: [&str; 6] = ["true", "false", "null", "undefined", "this", "typeof"];

/// Variable names visible from a context, nearest layer first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names(IndexSet<String>);

impl Names {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Names {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Collects every identifier-shaped name reachable through the scope chain.
/// A name shadowed by a nearer layer appears once, at the nearer position.
pub fn resolve(context: &Scope) -> Names {
    let mut names = IndexSet::new();
    let mut scope = Some(context);
    while let Some(layer) = scope {
        for name in layer.own_names() {
            if is_identifier(&name) && !names.contains(&name) {
                names.insert(name);
            }
        }
        scope = layer.parent().map(|parent| parent.as_ref());
    }
    Names(names)
}

/// Whether `name` can appear as a free variable in a binding expression.
pub fn is_identifier(name: &str) -> bool {
    let mut characters = name.chars();
    let Some(first) = characters.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && characters.all(|character| {
            character.is_ascii_alphanumeric() || character == '_' || character == '$'
        })
        && !RESERVED.contains(&name)
}
