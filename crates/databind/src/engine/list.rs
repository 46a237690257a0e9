//! `each`: keyed reconciliation of a stamped list.
//!
//! Instances are matched to items by key (the item's identity unless a
//! `key` expression is given). Repeated keys are told apart by how many
//! times the key occurred before, so `[a, a]` keeps two instances. Matched
//! instances keep their nodes and watchers; only those out of place move.

use super::Engine;
use super::render::{Content, Materialized};
use crate::compiler::{CompiledExpression, Dependency};
use crate::context::Context;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::value::{ItemKey, Value};
use crate::watcher::TemplateId;
use databind_scene::{Document, NodeId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::rc::Rc;

pub(crate) struct List {
    pub content: Content,
    pub key: Option<CompiledExpression>,
    pub instances: Vec<Instance>,
}

impl List {
    pub fn new(content: Content, key: Option<CompiledExpression>) -> Self {
        Self {
            content,
            key,
            instances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct InstanceKey {
    key: ItemKey,
    occurrence: usize,
}

pub(crate) struct Instance {
    key: InstanceKey,
    item: Value,
    index: usize,
    scope: Context,
    pub materialized: Materialized,
}

enum Placement {
    Kept(Instance),
    New {
        key: InstanceKey,
        item: Value,
        index: usize,
    },
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn render_list(
        &mut self,
        document: &mut Document,
        template: TemplateId,
        node: NodeId,
        list: &mut List,
        context: &Context,
        previous: Option<&Value>,
        value: &Value,
    ) {
        if previous.is_some_and(|previous| previous.same_value(value)) {
            return;
        }
        let items = match value {
            Value::List(items) => items.clone(),
            other => {
                let found = match other {
                    Value::Null => "null",
                    other => other.type_of(),
                };
                self.diagnostics.report(Diagnostic::new(
                    DiagnosticKind::Reconcile,
                    node,
                    "each",
                    format!("expected a list, got {found}; rendering nothing"),
                ));
                Rc::default()
            }
        };

        let keys = self.instance_keys(node, list.key.as_ref(), &items);
        let mut previous_instances = list
            .instances
            .drain(..)
            .map(|instance| (instance.key.clone(), instance))
            .collect::<IndexMap<_, _>>();

        let mut placements = Vec::with_capacity(items.len());
        let mut changed = Vec::new();
        for (index, (key, item)) in keys.into_iter().zip(items.iter()).enumerate() {
            match previous_instances.swap_remove(&key) {
                Some(mut instance) => {
                    self.update_instance(&mut instance, item, index, &mut changed);
                    placements.push(Placement::Kept(instance));
                }
                None => placements.push(Placement::New {
                    key,
                    item: item.clone(),
                    index,
                }),
            }
        }

        let removed = previous_instances.len();
        for (_, instance) in previous_instances {
            self.unmount(document, instance.materialized);
        }

        let region = list.content.region;
        let mut cursor = region.anchor;
        let mut created = 0;
        let mut moved = 0;
        for placement in placements {
            let instance = match placement {
                Placement::Kept(instance) => {
                    let extent = self.extent(&instance.materialized);
                    if let Some(first) = extent.first() {
                        if region.first_after(document, cursor) != Some(*first) {
                            let mut after = cursor;
                            for node in &extent {
                                document.insert_after(region.parent, after, *node);
                                after = Some(*node);
                            }
                            moved += 1;
                        }
                    }
                    instance
                }
                Placement::New { key, item, index } => {
                    let scope = context.child([
                        (self.config.item_name.clone(), item.clone()),
                        (self.config.index_name.clone(), Value::from(index)),
                    ]);
                    let materialized = self.materialize(
                        document,
                        template,
                        region,
                        cursor,
                        &list.content.roots,
                        &scope,
                    );
                    created += 1;
                    Instance {
                        key,
                        item,
                        index,
                        scope,
                        materialized,
                    }
                }
            };
            if let Some(last) = self.extent(&instance.materialized).last() {
                cursor = Some(*last);
            }
            list.instances.push(instance);
        }
        let refreshed = self.refresh_instances(document, &changed);
        log::debug!(
            "reconciled {node}: {} item(s), {created} created, {moved} moved, {removed} removed, {refreshed} refreshed",
            list.instances.len()
        );
    }

    fn instance_keys(
        &mut self,
        node: NodeId,
        key: Option<&CompiledExpression>,
        items: &[Value],
    ) -> Vec<InstanceKey> {
        let mut occurrences = FxHashMap::<ItemKey, usize>::default();
        let mut duplicated = None;
        let keys = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let key = match key {
                    None => item.item_key(),
                    Some(key) => match key.call(&[item.clone(), Value::from(index)]) {
                        Ok(key) => key.item_key(),
                        Err(error) => {
                            self.diagnostics.report(Diagnostic::new(
                                DiagnosticKind::Evaluate,
                                node,
                                "key",
                                error.to_string(),
                            ));
                            item.item_key()
                        }
                    },
                };
                let occurrence = occurrences.entry(key.clone()).or_default();
                if *occurrence > 0 && duplicated.is_none() {
                    duplicated = Some(key.clone());
                }
                *occurrence += 1;
                InstanceKey {
                    key,
                    occurrence: *occurrence - 1,
                }
            })
            .collect();
        if let (Some(_), Some(duplicated)) = (key, duplicated) {
            self.diagnostics.report(Diagnostic::new(
                DiagnosticKind::Reconcile,
                node,
                "key",
                format!("duplicate key {duplicated}; instances are matched by occurrence"),
            ));
        }
        keys
    }

    /// Writes a changed item or index into the instance scope and records
    /// which names changed.
    fn update_instance(
        &self,
        instance: &mut Instance,
        item: &Value,
        index: usize,
        changed: &mut Vec<Dependency>,
    ) {
        if !instance.item.same_value(item) {
            instance.scope.define(&self.config.item_name, item.clone());
            instance.item = item.clone();
            changed.push(Dependency {
                scope: instance.scope.id(),
                name: self.config.item_name.clone(),
            });
        }
        if instance.index != index {
            instance
                .scope
                .define(&self.config.index_name, Value::from(index));
            instance.index = index;
            changed.push(Dependency {
                scope: instance.scope.id(),
                name: self.config.index_name.clone(),
            });
        }
    }

    /// Reruns, in discovery order, the watchers reading a changed item or
    /// index, so kept instances render in the same flush as new ones.
    fn refresh_instances(&mut self, document: &mut Document, changed: &[Dependency]) -> usize {
        let mut stale = changed
            .iter()
            .filter_map(|dependency| self.dependents.get(dependency))
            .flatten()
            .filter_map(|id| Some((self.registry.get(*id)?.sequence, *id)))
            .collect::<Vec<_>>();
        stale.sort_unstable();
        stale.dedup();
        let mut refreshed = 0;
        for (_, id) in stale {
            // An earlier refresh may have closed a gate holding this one.
            if !self.registry.contains(id) {
                continue;
            }
            self.run(document, id);
            refreshed += 1;
        }
        refreshed
    }
}
