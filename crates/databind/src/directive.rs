//! Recognizes binding markers in an element's dataset.
//!
//! | marker          | kind    | target           |
//! |-----------------|---------|------------------|
//! | `when`          | gate    |                  |
//! | `each` (+`key`) | repeat  |                  |
//! | `onClick`       | event   | `click`          |
//! | `attrAriaLabel` | attr    | `aria-label`     |
//! | `propValue`     | prop    | `value`          |

use databind_scene::Filter;
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    When,
    Each,
    Event,
    Attr,
    Prop,
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::When => "when",
            Self::Each => "each",
            Self::Event => "on",
            Self::Attr => "attr",
            Self::Prop => "prop",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// The dataset key the directive came from.
    pub marker: String,
    pub expression: String,
    /// Event type, attribute name or property name.
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Gate(Directive),
    Repeat {
        each: Directive,
        key: Option<String>,
    },
    Bindings(Vec<Directive>),
}

impl Classification {
    /// Gates and repeats own their subtree, so the walk must not enter it.
    pub fn filter(&self) -> Filter {
        match self {
            Self::Gate(_) | Self::Repeat { .. } => Filter::Prune,
            Self::Bindings(_) => Filter::Accept,
        }
    }
}

/// Splits a dataset key into its kind and target.
/// A prefix only counts when an uppercase letter follows it.
pub fn parse_marker(marker: &str) -> Option<(DirectiveKind, Option<String>)> {
    match marker {
        "when" => return Some((DirectiveKind::When, None)),
        "each" => return Some((DirectiveKind::Each, None)),
        _ => {}
    }
    let (kind, rest) = [
        ("on", DirectiveKind::Event),
        ("attr", DirectiveKind::Attr),
        ("prop", DirectiveKind::Prop),
    ]
    .into_iter()
    .find_map(|(prefix, kind)| Some((kind, marker.strip_prefix(prefix)?)))?;
    if !rest.starts_with(|character: char| character.is_ascii_uppercase()) {
        return None;
    }
    let target = match kind {
        DirectiveKind::Event => rest.to_lowercase(),
        DirectiveKind::Attr => kebab_case(rest),
        _ => lower_first(rest),
    };
    Some((kind, Some(target)))
}

/// `AriaLabel` -> `aria-label`
fn kebab_case(name: &str) -> String {
    let mut kebab = String::with_capacity(name.len() + 4);
    for (index, character) in name.chars().enumerate() {
        if character.is_ascii_uppercase() {
            if index > 0 {
                kebab.push('-');
            }
            kebab.push(character.to_ascii_lowercase());
        } else {
            kebab.push(character);
        }
    }
    kebab
}

fn lower_first(name: &str) -> String {
    let mut characters = name.chars();
    characters
        .next()
        .map(|first| first.to_ascii_lowercase().to_string() + characters.as_str())
        .unwrap_or_default()
}

/// Classifies an element by its dataset. `None` means the element carries
/// no directives. `when` takes precedence over `each`.
pub fn classify(dataset: &IndexMap<String, String>) -> Option<Classification> {
    if let Some(expression) = dataset.get("when") {
        return Some(Classification::Gate(Directive {
            kind: DirectiveKind::When,
            marker: "when".to_owned(),
            expression: expression.clone(),
            target: None,
        }));
    }
    if let Some(expression) = dataset.get("each") {
        return Some(Classification::Repeat {
            each: Directive {
                kind: DirectiveKind::Each,
                marker: "each".to_owned(),
                expression: expression.clone(),
                target: None,
            },
            key: dataset.get("key").cloned(),
        });
    }
    let bindings = dataset
        .iter()
        .filter_map(|(marker, expression)| {
            let (kind, target) = parse_marker(marker)?;
            Some(Directive {
                kind,
                marker: marker.clone(),
                expression: expression.clone(),
                target,
            })
        })
        .collect::<Vec<_>>();
    (!bindings.is_empty()).then_some(Classification::Bindings(bindings))
}

/// Markers on a gated or repeated element that will not run on their own.
pub fn shadowed_markers(dataset: &IndexMap<String, String>) -> Vec<String> {
    let controlling = if dataset.contains_key("when") {
        "when"
    } else if dataset.contains_key("each") {
        "each"
    } else {
        return Vec::new();
    };
    dataset
        .keys()
        .filter(|marker| marker.as_str() != controlling && marker.as_str() != "key")
        .filter(|marker| parse_marker(marker).is_some())
        .cloned()
        .collect()
}
