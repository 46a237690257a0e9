//! Counter: property and attribute bindings driven by context writes
//! and click handlers.

mod support;

use databind::{Scope, Value, WatcherState};
use databind_scene::El;
use pretty_assertions::assert_eq;
use support::Fixture;

fn counter() -> El {
    El::new("div")
        .child(
            El::new("span")
                .attr("id", "label")
                .attr("data-prop-text-content", "'Count: ' + count"),
        )
        .child(
            El::new("button")
                .attr("id", "increment")
                .attr("data-on-click", "count = count + 1")
                .attr("data-attr-aria-disabled", "count >= limit"),
        )
}

#[test]
fn counter_initializes() {
    let fixture = Fixture::new(
        counter(),
        Scope::with_variables([("count", Value::from(0)), ("limit", Value::from(2))]),
    );
    assert_eq!(fixture.text("label"), "Count: 0");
    let button = fixture.by_id("increment");
    assert_eq!(fixture.document.attribute(button, "aria-disabled"), None);
    assert_eq!(fixture.engine.live_watchers(), 3);
}

#[test]
fn counter_follows_context_writes() {
    let mut fixture = Fixture::new(
        counter(),
        Scope::with_variables([("count", Value::from(0)), ("limit", Value::from(2))]),
    );
    fixture.context.set("count", 5);
    // Nothing renders before the next frame.
    assert_eq!(fixture.text("label"), "Count: 0");
    assert_eq!(fixture.frame(), 2);
    assert_eq!(fixture.text("label"), "Count: 5");
    let button = fixture.by_id("increment");
    assert_eq!(fixture.document.attribute(button, "aria-disabled"), Some(""));
}

#[test]
fn counter_increments_on_click() {
    let mut fixture = Fixture::new(
        counter(),
        Scope::with_variables([("count", Value::from(0)), ("limit", Value::from(2))]),
    );
    let button = fixture.by_id("increment");

    assert_eq!(fixture.click(button), 1);
    assert_eq!(fixture.context.get("count"), Some(Value::from(1)));
    fixture.frame();
    assert_eq!(fixture.text("label"), "Count: 1");

    fixture.click(button);
    fixture.frame();
    assert_eq!(fixture.text("label"), "Count: 2");
    assert_eq!(fixture.document.attribute(button, "aria-disabled"), Some(""));
}

#[test]
fn unchanged_results_are_not_rewritten() {
    let mut fixture = Fixture::new(
        counter(),
        Scope::with_variables([("count", Value::from(0)), ("limit", Value::from(2))]),
    );
    fixture.document.take_mutations();

    fixture.context.set("limit", 3);
    fixture.frame();
    // `count >= limit` stayed false, so the attribute was not touched.
    assert_eq!(fixture.document.take_mutations(), Vec::new());
}

#[test]
fn handlers_see_the_event() {
    let mut fixture = Fixture::new(
        El::new("form")
            .attr("data-on-submit", "last = event.kind")
            .child(El::new("input").attr("id", "field"))
            .child(
                El::new("output")
                    .attr("id", "out")
                    .attr("data-prop-text-content", "last"),
            ),
        Scope::with_variables([("last", Value::text("none"))]),
    );
    let field = fixture.by_id("field");
    let event = Value::object([("kind", Value::text("enter"))]);

    // Bubbles from the input to the form.
    assert_eq!(fixture.dispatch(field, "submit", event), 1);
    fixture.frame();
    assert_eq!(fixture.text("out"), "enter");
}

#[test]
fn listeners_stay_clean() {
    let mut fixture = Fixture::new(
        counter(),
        Scope::with_variables([("count", Value::from(0)), ("limit", Value::from(2))]),
    );
    let button = fixture.by_id("increment");
    let listener = fixture.engine.watchers_on(button)[0];
    assert_eq!(fixture.engine.watcher_state(listener), WatcherState::Clean);

    fixture.click(button);
    assert!(!fixture.engine.is_pending(listener));
    assert_eq!(fixture.engine.watcher_state(listener), WatcherState::Clean);
}

#[test]
fn handler_methods_receive_the_context() {
    let context = Scope::with_variables([("clicks", Value::from(0))]);
    let bump = Value::function(|receiver, _arguments| {
        if let Value::Context(scope) = receiver {
            let clicks = scope.get("clicks").unwrap_or_default().to_number();
            scope.set("clicks", clicks + 1.0);
        }
        Ok(Value::Undefined)
    });
    context.define("bump", bump);
    let mut fixture = Fixture::new(
        El::new("button")
            .attr("data-on-click", "bump()")
            .attr("data-attr-title", "clicks"),
        context,
    );

    fixture.click(fixture.root);
    fixture.click(fixture.root);
    fixture.frame();
    assert_eq!(
        fixture.document.attribute(fixture.root, "title"),
        Some("2")
    );
}
