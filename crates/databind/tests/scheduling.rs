//! Frame pacing: invalidations coalesce and flush at most once per frame,
//! in discovery order.

mod support;

use databind::{Engine, EngineConfig, Scope, Value, WatcherState};
use databind_scene::{Document, El};
use pretty_assertions::assert_eq;
use std::time::Duration;
use support::Fixture;

fn two_labels() -> El {
    El::new("div")
        .child(El::new("h1").attr("id", "a").attr("data-prop-text-content", "a"))
        .child(El::new("h2").attr("id", "b").attr("data-prop-text-content", "a + b"))
}

#[test]
fn writes_coalesce_into_one_evaluation() {
    let mut fixture = Fixture::new(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
    );
    for value in 2..10 {
        fixture.context.set("a", value);
    }
    assert_eq!(fixture.frame(), 2);
    assert_eq!(fixture.text("a"), "9");
    assert_eq!(fixture.text("b"), "10");
    assert_eq!(fixture.frame(), 0);
}

#[test]
fn at_most_one_flush_per_frame() {
    let mut fixture = Fixture::new(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
    );
    fixture.context.set("a", 2);
    assert_eq!(fixture.tick_at(Duration::from_millis(100)), 2);

    fixture.context.set("a", 3);
    assert_eq!(fixture.tick_at(Duration::from_millis(105)), 0);
    assert_eq!(fixture.text("a"), "2");
    assert!(fixture.engine.needs_frame());

    assert_eq!(fixture.tick_at(Duration::from_millis(117)), 2);
    assert_eq!(fixture.text("a"), "3");
    assert!(!fixture.engine.needs_frame());
}

#[test]
fn flush_ignores_frame_timing() {
    let mut fixture = Fixture::new(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
    );
    fixture.context.set("b", 5);
    assert_eq!(fixture.engine.flush(&mut fixture.document), 1);
    assert_eq!(fixture.text("b"), "6");
}

#[test]
fn unthrottled_engine_flushes_every_tick() {
    let mut fixture = Fixture::with_config(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
        EngineConfig {
            frame_rate: 0,
            ..EngineConfig::default()
        },
    );
    fixture.context.set("a", 2);
    assert_eq!(fixture.tick_at(Duration::from_millis(1)), 2);
    fixture.context.set("a", 3);
    assert_eq!(fixture.tick_at(Duration::from_millis(1)), 2);
}

#[test]
fn invalidation_is_idempotent_until_flushed() {
    let mut fixture = Fixture::new(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
    );
    let h1 = fixture.by_id("a");
    let watcher = fixture.engine.watchers_on(h1)[0];
    assert_eq!(fixture.engine.watcher_state(watcher), WatcherState::Clean);

    assert!(fixture.engine.invalidate(watcher));
    assert!(!fixture.engine.invalidate(watcher));
    assert_eq!(fixture.engine.watcher_state(watcher), WatcherState::Dirty);
    assert!(fixture.engine.is_pending(watcher));

    assert_eq!(fixture.frame(), 1);
    assert_eq!(fixture.engine.watcher_state(watcher), WatcherState::Clean);
    assert!(!fixture.engine.is_pending(watcher));
}

#[test]
fn disposed_watchers_are_gone() {
    let mut fixture = Fixture::new(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
    );
    let h2 = fixture.by_id("b");
    let watcher = fixture.engine.watchers_on(h2)[0];
    fixture.engine.invalidate(watcher);

    assert!(fixture.engine.dispose(&mut fixture.document, watcher));
    assert!(!fixture.engine.is_pending(watcher));
    assert_eq!(fixture.engine.watcher_state(watcher), WatcherState::Disposed);
    assert!(!fixture.engine.invalidate(watcher));
    assert!(fixture.engine.evaluate(watcher).is_err());

    fixture.context.set("a", 4);
    assert_eq!(fixture.frame(), 1);
    assert_eq!(fixture.text("b"), "2");
}

#[test]
fn evaluate_does_not_render() {
    let mut fixture = Fixture::new(
        two_labels(),
        Scope::with_variables([("a", Value::from(1)), ("b", Value::from(1))]),
    );
    let h2 = fixture.by_id("b");
    let watcher = fixture.engine.watchers_on(h2)[0];
    fixture.context.set("b", 10);
    assert_eq!(fixture.engine.evaluate(watcher), Ok(Value::from(11)));
    assert_eq!(fixture.text("b"), "2");
}

#[test]
fn new_names_are_picked_up() {
    let mut fixture = Fixture::new(
        El::new("p").attr("data-prop-text-content", "typeof later"),
        Scope::root(),
    );
    assert_eq!(fixture.document.text_content(fixture.root), "undefined");

    fixture.context.set("later", "now");
    fixture.frame();
    assert_eq!(fixture.document.text_content(fixture.root), "string");
}

#[test]
fn engines_can_share_a_document() {
    let mut document = Document::new();
    let first = document.build(El::new("button").attr("data-on-click", "hits = hits + 1"));
    let second = document.build(El::new("button").attr("data-on-click", "hits = hits + 10"));
    let context = Scope::with_variables([("hits", Value::from(0))]);

    let mut one = Engine::default();
    let mut two = Engine::default();
    one.apply(&mut document, first, context.clone());
    two.apply(&mut document, second, context.clone());

    assert_eq!(one.dispatch_event(&mut document, second, "click", Value::Undefined), 0);
    assert_eq!(two.dispatch_event(&mut document, second, "click", Value::Undefined), 1);
    assert_eq!(context.get("hits"), Some(Value::from(10)));
}
