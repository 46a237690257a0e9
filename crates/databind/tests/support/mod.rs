//! Shared fixture for engine tests: a document, an engine bound to one
//! template and a clock advanced one frame at a time.

#![allow(dead_code)]

use databind::{Context, Engine, EngineConfig, TemplateId, Value};
use databind_scene::{Document, El, Filter, NodeId};
use std::time::Duration;

/// A little more than one 60Hz frame.
pub const FRAME: Duration = Duration::from_millis(17);

pub struct Fixture {
    pub document: Document,
    pub engine: Engine,
    pub context: Context,
    pub root: NodeId,
    pub template: TemplateId,
    pub now: Duration,
}

impl Fixture {
    pub fn new(el: El, context: Context) -> Self {
        Self::with_config(el, context, EngineConfig::default())
    }

    pub fn with_config(el: El, context: Context, config: EngineConfig) -> Self {
        let mut document = Document::new();
        let root = document.build(el);
        let mut engine = Engine::new(config);
        let template = engine.apply(&mut document, root, context.clone());
        Self {
            document,
            engine,
            context,
            root,
            template,
            now: Duration::ZERO,
        }
    }

    /// Advances the clock by one frame and ticks.
    pub fn frame(&mut self) -> usize {
        self.now += FRAME;
        self.engine.tick(&mut self.document, self.now)
    }

    pub fn tick_at(&mut self, now: Duration) -> usize {
        self.now = now;
        self.engine.tick(&mut self.document, now)
    }

    pub fn dispatch(&mut self, target: NodeId, event_type: &str, event: Value) -> usize {
        self.engine
            .dispatch_event(&mut self.document, target, event_type, event)
    }

    pub fn click(&mut self, target: NodeId) -> usize {
        self.dispatch(target, "click", Value::Undefined)
    }

    /// First element under the root (inclusive) whose `id` attribute matches.
    pub fn by_id(&self, id: &str) -> NodeId {
        self.document
            .walk(self.root, |_, _| Filter::Accept)
            .find(|node| self.document.attribute(*node, "id") == Some(id))
            .unwrap_or_else(|| panic!("no element with id `{id}`"))
    }

    pub fn all_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.document
            .walk(self.root, |_, _| Filter::Accept)
            .filter(|node| self.document.tag(*node) == Some(tag))
            .collect()
    }

    /// Text of every element with the given tag, in document order.
    pub fn texts(&self, tag: &str) -> Vec<String> {
        self.all_by_tag(tag)
            .into_iter()
            .map(|node| self.document.text_content(node))
            .collect()
    }

    pub fn text(&self, id: &str) -> String {
        self.document.text_content(self.by_id(id))
    }

    pub fn html(&self) -> String {
        self.document.outer_html(self.root)
    }
}
