//! The engine: binds templates to contexts and keeps them rendered.
//!
//! [`Engine::apply`] scans a root for directives, creates one watcher per
//! directive and renders everything once. Afterwards the host drives it:
//! context writes land in a journal, [`Engine::tick`] drains the journal,
//! invalidates the watchers that read what changed and, at most once per
//! frame, re-evaluates them in discovery order. Events go through
//! [`Engine::dispatch_event`].

use crate::compiler::{CompileError, CompiledExpression, Compiler, Dependency};
use crate::config::EngineConfig;
use crate::context::{Context, Journal, JournalId};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::directive::{Classification, Directive, DirectiveKind, shadowed_markers};
use crate::evaluator::EvalError;
use crate::resolver::resolve;
use crate::scheduler::RenderScheduler;
use crate::value::Value;
use crate::walker::{DirectiveNode, scan};
use crate::watcher::{Registry, TemplateId, Watcher, WatcherId, WatcherState};
use databind_scene::{Document, ListenerId, NodeId};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

mod binding;
mod gate;
mod list;
mod render;

use gate::Gate;
use list::List;
pub(crate) use render::Render;
use render::{Content, Region};

/// Distinguishes listener handles of engines sharing a document.
static NEXT_ENGINE: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatcherError {
    #[error("watcher {0} is disposed")]
    Disposed(WatcherId),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Evaluate(#[from] EvalError),
}

struct Mount {
    root: NodeId,
    context: Context,
    watchers: Vec<WatcherId>,
}

/// Watchers evaluating against contexts that share one journal.
struct Members {
    journal: Rc<Journal>,
    watchers: IndexSet<WatcherId>,
}

pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    scheduler: RenderScheduler,
    compiler: Compiler,
    templates: IndexMap<TemplateId, Mount>,
    next_template: u32,
    dependents: FxHashMap<Dependency, SmallVec<[WatcherId; 4]>>,
    members: FxHashMap<JournalId, Members>,
    listeners: FxHashMap<ListenerId, WatcherId>,
    listener_prefix: u64,
    next_listener: u32,
    diagnostics: Diagnostics,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let engine = NEXT_ENGINE.fetch_add(1, Ordering::Relaxed);
        Self {
            diagnostics: Diagnostics::new(config.diagnostic_limit),
            scheduler: RenderScheduler::new(config.frame_interval()),
            config,
            registry: Registry::default(),
            compiler: Compiler::default(),
            templates: IndexMap::new(),
            next_template: 0,
            dependents: FxHashMap::default(),
            members: FxHashMap::default(),
            listeners: FxHashMap::default(),
            listener_prefix: u64::from(engine) << 32,
            next_listener: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Binds the subtree at `root` (inclusive) to `context` and renders it.
    pub fn apply(&mut self, document: &mut Document, root: NodeId, context: Context) -> TemplateId {
        let template = TemplateId(self.next_template);
        self.next_template += 1;
        self.track(&context);
        let watchers = self.mount(document, template, &[root], &context);
        log::debug!(
            "applied {template} at {root} with {} top-level watcher(s)",
            watchers.len()
        );
        self.templates.insert(
            template,
            Mount {
                root,
                context,
                watchers,
            },
        );
        template
    }

    pub fn template_root(&self, template: TemplateId) -> Option<NodeId> {
        self.templates.get(&template).map(|mount| mount.root)
    }

    pub fn template_context(&self, template: TemplateId) -> Option<&Context> {
        self.templates.get(&template).map(|mount| &mount.context)
    }

    /// Disposes every watcher of the template and everything it stamped.
    pub fn teardown(&mut self, document: &mut Document, template: TemplateId) -> bool {
        let Some(mount) = self.templates.shift_remove(&template) else {
            return false;
        };
        for watcher in mount.watchers {
            self.dispose(document, watcher);
        }
        let journal = mount.context.journal().id();
        let still_used = self
            .templates
            .values()
            .any(|mount| mount.context.journal().id() == journal);
        if !still_used
            && self
                .members
                .get(&journal)
                .is_some_and(|members| members.watchers.is_empty())
        {
            self.members.remove(&journal);
        }
        log::debug!("tore down {template}");
        true
    }

    /// Drains context changes and, if a frame is due at `now`, flushes.
    /// Returns the number of watchers evaluated.
    pub fn tick(&mut self, document: &mut Document, now: Duration) -> usize {
        self.collect_changes();
        if !self.scheduler.has_pending() || !self.scheduler.frame_due(now) {
            return 0;
        }
        self.scheduler.mark_frame(now);
        self.run_batch(document)
    }

    /// Drains context changes and flushes immediately, ignoring frame timing.
    pub fn flush(&mut self, document: &mut Document) -> usize {
        self.collect_changes();
        self.run_batch(document)
    }

    /// Whether a [`tick`](Self::tick) would have anything to do.
    pub fn needs_frame(&self) -> bool {
        self.scheduler.has_pending()
            || self
                .members
                .values()
                .any(|members| !members.journal.is_empty())
    }

    /// Queues a watcher for the next flush. Event watchers never queue.
    pub fn invalidate(&mut self, id: WatcherId) -> bool {
        let Some(watcher) = self.registry.get_mut(id) else {
            return false;
        };
        if matches!(watcher.render, Render::Listener { .. }) {
            return false;
        }
        match watcher.state {
            WatcherState::Clean => watcher.state = WatcherState::Dirty,
            WatcherState::Uncompiled => {}
            WatcherState::Dirty | WatcherState::Disposed => return false,
        }
        let sequence = watcher.sequence;
        self.scheduler.schedule(id, sequence)
    }

    /// Runs the watcher's expression without applying the result.
    /// Compiles first if needed.
    pub fn evaluate(&mut self, id: WatcherId) -> Result<Value, WatcherError> {
        self.evaluate_with(id, &[])
    }

    /// Removes the watcher, its listener and everything it stamped.
    pub fn dispose(&mut self, document: &mut Document, id: WatcherId) -> bool {
        self.scheduler.cancel(id);
        let Some(watcher) = self.registry.remove(id) else {
            return false;
        };
        self.unregister(id, &watcher);
        if let Some(members) = self.members.get_mut(&watcher.context.journal().id()) {
            members.watchers.swap_remove(&id);
        }
        match watcher.render {
            Render::Binding => {}
            Render::Listener { listener, .. } => {
                self.listeners.remove(&listener);
                document.remove_event_listener(watcher.node, listener);
            }
            Render::Gate(gate) => {
                if let Some(attached) = gate.attached {
                    self.unmount(document, attached);
                }
                gate.content.release(document);
            }
            Render::List(list) => {
                for instance in list.instances {
                    self.unmount(document, instance.materialized);
                }
                list.content.release(document);
            }
        }
        true
    }

    /// Delivers an event to `target` and its ancestors, running every
    /// handler registered for `event_type`. After each handler, all
    /// watchers sharing its context journal are invalidated.
    pub fn dispatch_event(
        &mut self,
        document: &mut Document,
        target: NodeId,
        event_type: &str,
        event: Value,
    ) -> usize {
        let mut handled = 0;
        let mut current = Some(target);
        while let Some(node) = current {
            for listener in document.event_listeners(node, event_type) {
                let Some(id) = self.listeners.get(&listener).copied() else {
                    continue;
                };
                let Some(journal) = self
                    .registry
                    .get(id)
                    .map(|watcher| watcher.context.journal().id())
                else {
                    continue;
                };
                match self.evaluate_with(id, std::slice::from_ref(&event)) {
                    Ok(_) => {}
                    Err(WatcherError::Disposed(_)) => continue,
                    Err(WatcherError::Compile(error)) => {
                        self.report(id, DiagnosticKind::Compile, error.to_string());
                        self.dispose(document, id);
                        continue;
                    }
                    Err(WatcherError::Evaluate(error)) => {
                        self.report(id, DiagnosticKind::Evaluate, error.to_string());
                    }
                }
                handled += 1;
                self.digest(journal);
            }
            current = document.parent(node);
        }
        handled
    }

    pub fn watcher(&self, id: WatcherId) -> Option<&Watcher> {
        self.registry.get(id)
    }

    pub fn watcher_state(&self, id: WatcherId) -> WatcherState {
        self.registry.state(id)
    }

    pub fn live_watchers(&self) -> usize {
        self.registry.len()
    }

    /// Live watchers attached to `node`, in discovery order.
    pub fn watchers_on(&self, node: NodeId) -> Vec<WatcherId> {
        let mut watchers = self
            .registry
            .ids()
            .filter_map(|id| {
                let watcher = self.registry.get(id)?;
                (watcher.node == node).then_some((watcher.sequence, id))
            })
            .collect::<Vec<_>>();
        watchers.sort_unstable();
        watchers.into_iter().map(|(_, id)| id).collect()
    }

    pub fn is_pending(&self, id: WatcherId) -> bool {
        self.scheduler.is_pending(id)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.records()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    /// Diagnostics discarded since the last drain because the store was full.
    pub fn dropped_diagnostics(&self) -> usize {
        self.diagnostics.dropped()
    }

    /// Scans `roots`, creates their watchers and renders them in discovery order.
    fn mount(
        &mut self,
        document: &mut Document,
        template: TemplateId,
        roots: &[NodeId],
        context: &Context,
    ) -> Vec<WatcherId> {
        let found = roots
            .iter()
            .flat_map(|root| scan(document, *root))
            .collect::<Vec<_>>();
        let mut created = Vec::new();
        for directive_node in found {
            self.setup(document, template, directive_node, context, &mut created);
        }
        for id in &created {
            self.initialize(document, *id);
        }
        created
    }

    fn setup(
        &mut self,
        document: &mut Document,
        template: TemplateId,
        found: DirectiveNode,
        context: &Context,
        created: &mut Vec<WatcherId>,
    ) {
        let DirectiveNode {
            node,
            ephemeral,
            classification,
        } = found;
        match classification {
            Classification::Bindings(directives) => {
                for directive in directives {
                    let render = match directive.kind {
                        DirectiveKind::Event => Render::Listener {
                            event_type: directive.target.clone().unwrap_or_default(),
                            listener: self.next_listener_id(),
                        },
                        _ => Render::Binding,
                    };
                    created.push(self.create_watcher(template, node, directive, context, render));
                }
            }
            Classification::Gate(when) => {
                self.report_shadowed(document, node);
                let Some(content) = self.take_content(document, node, ephemeral, &when) else {
                    return;
                };
                let render = Render::Gate(Gate::new(content));
                created.push(self.create_watcher(template, node, when, context, render));
            }
            Classification::Repeat { each, key } => {
                self.report_shadowed(document, node);
                let Some(content) = self.take_content(document, node, ephemeral, &each) else {
                    return;
                };
                let key = key.and_then(|source| self.compile_key(node, &source, context));
                let render = Render::List(List::new(content, key));
                created.push(self.create_watcher(template, node, each, context, render));
            }
        }
    }

    fn take_content(
        &mut self,
        document: &mut Document,
        node: NodeId,
        ephemeral: bool,
        directive: &Directive,
    ) -> Option<Content> {
        if !ephemeral {
            return Some(Content {
                region: Region {
                    parent: node,
                    anchor: None,
                },
                roots: document.detach_children(node),
                owned: true,
            });
        }
        let Some(parent) = document.parent(node) else {
            self.diagnostics.report(Diagnostic::new(
                DiagnosticKind::Classify,
                node,
                directive.marker.as_str(),
                "template has no parent to render into",
            ));
            return None;
        };
        Some(Content {
            region: Region {
                parent,
                anchor: Some(node),
            },
            roots: document.template_content(node).to_vec(),
            owned: false,
        })
    }

    fn report_shadowed(&mut self, document: &Document, node: NodeId) {
        for marker in shadowed_markers(&document.dataset(node)) {
            if marker == "each" {
                self.diagnostics.report(Diagnostic::new(
                    DiagnosticKind::Classify,
                    node,
                    "each",
                    "ignored, `when` takes precedence on the same element",
                ));
            } else {
                log::debug!("{node}: data marker `{marker}` is shadowed by its gate");
            }
        }
    }

    fn compile_key(
        &mut self,
        node: NodeId,
        source: &str,
        context: &Context,
    ) -> Option<CompiledExpression> {
        let extras = [
            self.config.item_name.as_str(),
            self.config.index_name.as_str(),
        ];
        match self
            .compiler
            .compile(source, context, &resolve(context), &extras)
        {
            Ok(compiled) => Some(compiled),
            Err(error) => {
                self.diagnostics.report(Diagnostic::new(
                    DiagnosticKind::Compile,
                    node,
                    "key",
                    format!("{error}; falling back to item identity"),
                ));
                None
            }
        }
    }

    fn next_listener_id(&mut self) -> ListenerId {
        let listener = ListenerId(self.listener_prefix | u64::from(self.next_listener));
        self.next_listener = self.next_listener.wrapping_add(1);
        listener
    }

    fn track(&mut self, context: &Context) -> JournalId {
        let journal = context.journal();
        self.members
            .entry(journal.id())
            .or_insert_with(|| Members {
                journal: journal.clone(),
                watchers: IndexSet::new(),
            });
        journal.id()
    }

    fn create_watcher(
        &mut self,
        template: TemplateId,
        node: NodeId,
        directive: Directive,
        context: &Context,
        render: Render,
    ) -> WatcherId {
        let journal = self.track(context);
        let listener = match &render {
            Render::Listener { listener, .. } => Some(*listener),
            _ => None,
        };
        let id = self
            .registry
            .create(template, node, directive, context.clone(), render);
        if let Some(members) = self.members.get_mut(&journal) {
            members.watchers.insert(id);
        }
        if let Some(listener) = listener {
            self.listeners.insert(listener, id);
        }
        id
    }

    fn initialize(&mut self, document: &mut Document, id: WatcherId) {
        let Some(watcher) = self.registry.get(id) else {
            return;
        };
        let subscription = match &watcher.render {
            Render::Listener {
                event_type,
                listener,
            } => Some((watcher.node, event_type.clone(), *listener)),
            _ => None,
        };
        let Some((node, event_type, listener)) = subscription else {
            self.run(document, id);
            return;
        };
        match self.compile_watcher(id) {
            Ok(()) => {
                document.add_event_listener(node, event_type, listener);
                if let Some(watcher) = self.registry.get_mut(id) {
                    watcher.state = WatcherState::Clean;
                }
            }
            Err(error) => {
                self.report(id, DiagnosticKind::Compile, error.to_string());
                self.dispose(document, id);
            }
        }
    }

    fn compile_watcher(&mut self, id: WatcherId) -> Result<(), WatcherError> {
        let watcher = self.registry.get(id).ok_or(WatcherError::Disposed(id))?;
        if watcher.compiled.is_some() {
            return Ok(());
        }
        let extras = match watcher.directive.kind {
            DirectiveKind::Event => vec![self.config.event_name.as_str()],
            _ => Vec::new(),
        };
        let compiled = self.compiler.compile(
            &watcher.directive.expression,
            &watcher.context,
            &resolve(&watcher.context),
            &extras,
        )?;
        for dependency in compiled.dependencies() {
            let dependents = self.dependents.entry(dependency.clone()).or_default();
            if !dependents.contains(&id) {
                dependents.push(id);
            }
        }
        if let Some(watcher) = self.registry.get_mut(id) {
            watcher.compiled = Some(compiled);
        }
        Ok(())
    }

    fn evaluate_with(&mut self, id: WatcherId, extras: &[Value]) -> Result<Value, WatcherError> {
        self.compile_watcher(id)?;
        let compiled = self
            .registry
            .get(id)
            .and_then(|watcher| watcher.compiled.as_ref())
            .ok_or(WatcherError::Disposed(id))?;
        Ok(compiled.call(extras)?)
    }

    /// Evaluates a watcher and applies the result to the document.
    fn run(&mut self, document: &mut Document, id: WatcherId) {
        let value = match self.evaluate_with(id, &[]) {
            Ok(value) => value,
            Err(WatcherError::Disposed(_)) => return,
            Err(WatcherError::Compile(error)) => {
                self.report(id, DiagnosticKind::Compile, error.to_string());
                self.dispose(document, id);
                return;
            }
            Err(WatcherError::Evaluate(error)) => {
                self.report(id, DiagnosticKind::Evaluate, error.to_string());
                if let Some(watcher) = self.registry.get_mut(id) {
                    watcher.state = WatcherState::Clean;
                }
                return;
            }
        };
        let Some(watcher) = self.registry.get_mut(id) else {
            return;
        };
        let mut render = std::mem::replace(&mut watcher.render, Render::Binding);
        let template = watcher.template;
        let node = watcher.node;
        let directive = watcher.directive.clone();
        let context = watcher.context.clone();
        let previous = watcher.previous.take();
        match &mut render {
            Render::Binding => {
                binding::apply_binding(document, node, &directive, previous.as_ref(), &value)
            }
            Render::Listener { .. } => {}
            Render::Gate(gate) => self.render_gate(document, template, gate, &context, &value),
            Render::List(list) => self.render_list(
                document,
                template,
                node,
                list,
                &context,
                previous.as_ref(),
                &value,
            ),
        }
        if let Some(watcher) = self.registry.get_mut(id) {
            watcher.render = render;
            watcher.previous = Some(value);
            watcher.state = WatcherState::Clean;
        }
    }

    fn run_batch(&mut self, document: &mut Document) -> usize {
        let batch = self.scheduler.take_batch();
        let mut evaluated = 0;
        for id in batch {
            // Disposed earlier in this batch, e.g. by a gate closing.
            if !self.registry.contains(id) {
                continue;
            }
            self.run(document, id);
            evaluated += 1;
        }
        if evaluated > 0 {
            log::trace!("flush {} evaluated {evaluated} watcher(s)", self.scheduler.flushes());
        }
        evaluated
    }

    /// Turns journaled context writes into invalidations.
    fn collect_changes(&mut self) {
        let journals = self
            .members
            .iter()
            .map(|(id, members)| (*id, members.journal.clone()))
            .collect::<Vec<_>>();
        for (journal_id, journal) in journals {
            let drained = journal.drain();
            if drained.is_empty() {
                continue;
            }
            let members = self
                .members
                .get(&journal_id)
                .map(|members| members.watchers.iter().copied().collect::<Vec<_>>())
                .unwrap_or_default();
            if drained.structural {
                // New names may now resolve; recompile everything reading this journal.
                for id in members {
                    self.forget_compiled(id);
                    self.invalidate(id);
                }
                continue;
            }
            let mut affected = IndexSet::<WatcherId>::new();
            for change in drained.changes {
                let dependency = Dependency {
                    scope: change.scope,
                    name: change.name,
                };
                if let Some(dependents) = self.dependents.get(&dependency) {
                    affected.extend(dependents.iter().copied());
                }
            }
            affected.extend(members.into_iter().filter(|id| {
                self.registry
                    .get(*id)
                    .and_then(Watcher::compiled)
                    .is_some_and(CompiledExpression::is_dynamic)
            }));
            for id in affected {
                self.invalidate(id);
            }
        }
    }

    /// Invalidates every watcher evaluating against `journal`.
    fn digest(&mut self, journal: JournalId) {
        let Some(members) = self.members.get(&journal) else {
            return;
        };
        for id in members.watchers.iter().copied().collect::<Vec<_>>() {
            self.invalidate(id);
        }
    }

    fn forget_compiled(&mut self, id: WatcherId) {
        let Some(compiled) = self
            .registry
            .get_mut(id)
            .and_then(|watcher| watcher.compiled.take())
        else {
            return;
        };
        self.remove_dependents(id, &compiled);
    }

    fn unregister(&mut self, id: WatcherId, watcher: &Watcher) {
        if let Some(compiled) = &watcher.compiled {
            self.remove_dependents(id, compiled);
        }
    }

    fn remove_dependents(&mut self, id: WatcherId, compiled: &CompiledExpression) {
        for dependency in compiled.dependencies() {
            if let Some(dependents) = self.dependents.get_mut(dependency) {
                dependents.retain(|dependent| *dependent != id);
                if dependents.is_empty() {
                    self.dependents.remove(dependency);
                }
            }
        }
    }

    fn report(&mut self, id: WatcherId, kind: DiagnosticKind, message: String) {
        let Some(watcher) = self.registry.get(id) else {
            return;
        };
        let diagnostic = Diagnostic::new(kind, watcher.node, watcher.directive.marker.as_str(), message);
        self.diagnostics.report(diagnostic);
    }
}
