//! Declarative data binding for document trees.
//!
//! Elements opt in through `data-*` markers whose values are small script
//! expressions evaluated against a [`Context`]:
//!
//! - `data-when="expr"` stamps the element's content while `expr` is truthy.
//! - `data-each="expr"` stamps the content once per item of a list, with
//!   `item` and `index` in scope; `data-key="expr"` sets item identity.
//! - `data-on-click="expr"` runs `expr` with `event` in scope on `click`.
//! - `data-attr-aria-label="expr"` writes the `aria-label` attribute.
//! - `data-prop-text-content="expr"` writes the `textContent` property.
//!
//! ```
//! use databind::{Scope, Value, apply};
//! use databind_scene::{Document, El};
//! use std::time::Duration;
//!
//! let mut document = Document::new();
//! let root = document.build(
//!     El::new("p").attr("data-prop-text-content", "'Count: ' + count"),
//! );
//! let context = Scope::with_variables([("count", Value::from(1))]);
//! let mut engine = apply(&mut document, root, context.clone());
//! assert_eq!(document.text_content(root), "Count: 1");
//!
//! context.set("count", 2);
//! engine.tick(&mut document, Duration::from_millis(16));
//! assert_eq!(document.text_content(root), "Count: 2");
//! ```

pub mod compiler;
mod config;
pub mod context;
mod diagnostics;
pub mod directive;
mod engine;
mod evaluator;
pub mod parser;
pub mod resolver;
mod scheduler;
mod value;
pub mod walker;
mod watcher;

pub use compiler::{CompileError, CompiledExpression, Compiler, Dependency, compile};
pub use config::EngineConfig;
pub use context::{Context, Scope, ScopeId};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use directive::{Classification, Directive, DirectiveKind};
pub use engine::{Engine, WatcherError};
pub use evaluator::EvalError;
pub use resolver::{Names, resolve};
pub use scheduler::RenderScheduler;
pub use value::{Function, ItemKey, Object, Value};
pub use watcher::{TemplateId, Watcher, WatcherId, WatcherState};

use databind_scene::{Document, NodeId};

/// Binds `root` to `context` with a default [`Engine`] and renders it once.
/// The returned engine keeps the bindings live; drive it with
/// [`Engine::tick`] and [`Engine::dispatch_event`].
pub fn apply(document: &mut Document, root: NodeId, context: Context) -> Engine {
    let mut engine = Engine::default();
    engine.apply(document, root, context);
    engine
}
