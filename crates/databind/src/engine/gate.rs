use super::Engine;
use super::render::{Content, Materialized};
use crate::context::Context;
use crate::value::Value;
use crate::watcher::TemplateId;
use databind_scene::Document;

/// `when`: content is stamped while the result is truthy.
pub(crate) struct Gate {
    pub content: Content,
    pub attached: Option<Materialized>,
}

impl Gate {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            attached: None,
        }
    }
}

impl Engine {
    pub(super) fn render_gate(
        &mut self,
        document: &mut Document,
        template: TemplateId,
        gate: &mut Gate,
        context: &Context,
        value: &Value,
    ) {
        match (value.is_truthy(), gate.attached.is_some()) {
            (true, false) => {
                let region = gate.content.region;
                let attached = self.materialize(
                    document,
                    template,
                    region,
                    region.anchor,
                    &gate.content.roots,
                    context,
                );
                gate.attached = Some(attached);
            }
            (false, true) => {
                if let Some(attached) = gate.attached.take() {
                    self.unmount(document, attached);
                }
            }
            _ => {}
        }
    }
}
