use crate::directive::{Directive, DirectiveKind};
use crate::value::Value;
use databind_scene::{Document, NodeId};

/// Writes an `attr*` or `prop*` result, skipping unchanged values.
pub(super) fn apply_binding(
    document: &mut Document,
    node: NodeId,
    directive: &Directive,
    previous: Option<&Value>,
    value: &Value,
) {
    if previous.is_some_and(|previous| previous.same_value(value)) {
        return;
    }
    let Some(target) = directive.target.as_deref() else {
        return;
    };
    match directive.kind {
        DirectiveKind::Attr => write_attribute(document, node, target, value),
        DirectiveKind::Prop => document.set_property(node, target, value.to_property()),
        DirectiveKind::When | DirectiveKind::Each | DirectiveKind::Event => {}
    }
}

/// `false`, `null` and `undefined` remove the attribute, `true` sets it empty.
fn write_attribute(document: &mut Document, node: NodeId, name: &str, value: &Value) {
    match value {
        Value::Bool(false) | Value::Null | Value::Undefined => document.remove_attribute(node, name),
        Value::Bool(true) => document.set_attribute(node, name, ""),
        other => document.set_attribute(node, name, other.to_string()),
    }
}
