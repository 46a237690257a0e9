//! Watchers: one per directive instance, stored in a generational arena.
//!
//! A watcher remembers where it lives (node and scope), how to evaluate
//! (its compiled expression, built lazily) and what it rendered last.
//! Handles are never reused: removing a watcher bumps its slot generation,
//! so a stale [`WatcherId`] simply resolves to nothing.

use crate::compiler::CompiledExpression;
use crate::context::Context;
use crate::directive::Directive;
use crate::engine::Render;
use crate::value::Value;
use databind_scene::NodeId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId {
    index: u32,
    generation: u32,
}

impl WatcherId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "w{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub(crate) u32);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "template#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherState {
    /// Created, expression not compiled yet.
    Uncompiled,
    /// Result applied, nothing observed since.
    Clean,
    /// Waiting for the next flush.
    Dirty,
    /// Removed; the handle is stale.
    Disposed,
}

pub struct Watcher {
    pub(crate) template: TemplateId,
    pub(crate) node: NodeId,
    pub(crate) directive: Directive,
    pub(crate) context: Context,
    pub(crate) compiled: Option<CompiledExpression>,
    pub(crate) previous: Option<Value>,
    pub(crate) state: WatcherState,
    /// Discovery order; flushes run watchers in ascending sequence.
    pub(crate) sequence: u64,
    pub(crate) render: Render,
}

impl Watcher {
    pub fn template(&self) -> TemplateId {
        self.template
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn compiled(&self) -> Option<&CompiledExpression> {
        self.compiled.as_ref()
    }

    /// Last result applied to the document.
    pub fn previous(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("template", &self.template)
            .field("node", &self.node)
            .field("marker", &self.directive.marker)
            .field("expression", &self.directive.expression)
            .field("state", &self.state)
            .field("sequence", &self.sequence)
            .finish()
    }
}

struct Slot {
    generation: u32,
    watcher: Option<Watcher>,
}

#[derive(Default)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    next_sequence: u64,
}

impl Registry {
    pub fn create(
        &mut self,
        template: TemplateId,
        node: NodeId,
        directive: Directive,
        context: Context,
        render: Render,
    ) -> WatcherId {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let watcher = Watcher {
            template,
            node,
            directive,
            context,
            compiled: None,
            previous: None,
            state: WatcherState::Uncompiled,
            sequence,
            render,
        };
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.watcher = Some(watcher);
            WatcherId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                watcher: Some(watcher),
            });
            WatcherId {
                index,
                generation: 0,
            }
        }
    }

    pub fn get(&self, id: WatcherId) -> Option<&Watcher> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)?
            .watcher
            .as_ref()
    }

    pub fn get_mut(&mut self, id: WatcherId) -> Option<&mut Watcher> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?
            .watcher
            .as_mut()
    }

    pub fn contains(&self, id: WatcherId) -> bool {
        self.get(id).is_some()
    }

    pub fn state(&self, id: WatcherId) -> WatcherState {
        self.get(id)
            .map_or(WatcherState::Disposed, |watcher| watcher.state)
    }

    /// Takes the watcher out and retires its handle.
    pub fn remove(&mut self, id: WatcherId) -> Option<Watcher> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let watcher = slot.watcher.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(watcher)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn ids(&self) -> impl Iterator<Item = WatcherId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.watcher.as_ref().map(|_| WatcherId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Scope;
    use crate::directive::DirectiveKind;
    use databind_scene::Document;

    fn directive() -> Directive {
        Directive {
            kind: DirectiveKind::Prop,
            marker: "propId".to_owned(),
            expression: "id".to_owned(),
            target: Some("id".to_owned()),
        }
    }

    fn create(registry: &mut Registry, node: NodeId) -> WatcherId {
        registry.create(TemplateId(0), node, directive(), Scope::root(), Render::Binding)
    }

    #[test]
    fn test_stale_handles_resolve_to_nothing() {
        let mut document = Document::new();
        let node = document.create_element("div");
        let mut registry = Registry::default();

        let first = create(&mut registry, node);
        assert_eq!(registry.state(first), WatcherState::Uncompiled);
        assert!(registry.remove(first).is_some());
        assert_eq!(registry.state(first), WatcherState::Disposed);

        let second = create(&mut registry, node);
        assert_eq!(second.index(), first.index());
        assert_ne!(second, first);
        assert!(registry.get(first).is_none());
        assert!(registry.remove(first).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sequence_follows_creation_order() {
        let mut document = Document::new();
        let node = document.create_element("div");
        let mut registry = Registry::default();
        let a = create(&mut registry, node);
        let b = create(&mut registry, node);
        registry.remove(a);
        let c = create(&mut registry, node);

        let sequence = |id| registry.get(id).map(Watcher::sequence);
        assert!(sequence(b) < sequence(c));
        assert_eq!(registry.ids().count(), 2);
    }
}
