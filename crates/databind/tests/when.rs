//! `data-when`: gated content is stamped while the condition holds and
//! torn down, watchers included, when it stops holding.

mod support;

use databind::{DiagnosticKind, Scope, Value};
use databind_scene::El;
use pretty_assertions::assert_eq;
use support::Fixture;

#[test]
fn template_gate_stamps_after_itself() {
    let mut fixture = Fixture::new(
        El::new("section").child(
            El::new("template")
                .attr("data-when", "open")
                .child(El::new("p").attr("data-prop-text-content", "message")),
        ),
        Scope::with_variables([("open", Value::from(false)), ("message", Value::text("hi"))]),
    );
    assert_eq!(fixture.html(), r#"<section><template data-when="open"><p data-prop-text-content="message"></p></template></section>"#);

    fixture.context.set("open", true);
    fixture.frame();
    assert_eq!(fixture.texts("p"), vec!["hi"]);
    let template = fixture.all_by_tag("template")[0];
    let stamped = fixture.all_by_tag("p")[0];
    assert_eq!(fixture.document.next_sibling(template), Some(stamped));

    fixture.context.set("message", "hello");
    fixture.frame();
    assert_eq!(fixture.texts("p"), vec!["hello"]);

    fixture.context.set("open", false);
    fixture.frame();
    assert!(fixture.all_by_tag("p").is_empty());
    assert_eq!(fixture.document.children(fixture.root).len(), 1);
}

#[test]
fn element_gate_keeps_the_element() {
    let mut fixture = Fixture::new(
        El::new("div")
            .attr("data-when", "user")
            .child(El::new("b").attr("data-prop-text-content", "user.name")),
        Scope::with_variables([("user", Value::Null)]),
    );
    assert_eq!(fixture.document.children(fixture.root).len(), 0);

    fixture
        .context
        .set("user", Value::object([("name", Value::text("Ada"))]));
    fixture.frame();
    assert_eq!(fixture.document.text_content(fixture.root), "Ada");

    fixture.context.set("user", Value::Null);
    fixture.frame();
    assert_eq!(fixture.document.children(fixture.root).len(), 0);
}

#[test]
fn closing_disposes_nested_watchers() {
    let mut fixture = Fixture::new(
        El::new("main").child(
            El::new("template").attr("data-when", "open").child(
                El::new("ul")
                    .attr("data-each", "items")
                    .child(El::new("li").attr("data-prop-text-content", "item")),
            ),
        ),
        Scope::with_variables([
            ("open", Value::from(true)),
            ("items", Value::list([Value::text("a"), Value::text("b")])),
        ]),
    );
    // gate + list + one binding per item
    assert_eq!(fixture.engine.live_watchers(), 4);
    assert_eq!(fixture.texts("li"), vec!["a", "b"]);
    let nodes = fixture.document.node_count();

    fixture.context.set("open", false);
    fixture.frame();
    assert_eq!(fixture.engine.live_watchers(), 1);
    assert!(fixture.all_by_tag("li").is_empty());
    assert!(fixture.document.node_count() < nodes);

    fixture.context.set("open", true);
    fixture.frame();
    assert_eq!(fixture.engine.live_watchers(), 4);
    assert_eq!(fixture.document.node_count(), nodes);
}

#[test]
fn writes_inside_a_closing_gate_are_dropped() {
    let mut fixture = Fixture::new(
        El::new("div").child(
            El::new("template")
                .attr("data-when", "open")
                .child(El::new("i").attr("data-prop-text-content", "label")),
        ),
        Scope::with_variables([("open", Value::from(true)), ("label", Value::text("x"))]),
    );
    fixture.context.set("open", false);
    fixture.context.set("label", "y");
    // The gate runs first and disposes the binding queued behind it.
    assert_eq!(fixture.frame(), 1);
    assert!(fixture.all_by_tag("i").is_empty());
    assert!(fixture.engine.take_diagnostics().is_empty());
}

#[test]
fn when_takes_precedence_over_each() {
    let fixture = Fixture::new(
        El::new("ul")
            .attr("data-when", "true")
            .attr("data-each", "items")
            .child(El::new("li")),
        Scope::with_variables([("items", Value::list([Value::from(1), Value::from(2)]))]),
    );
    assert_eq!(fixture.all_by_tag("li").len(), 1);
    let diagnostics = fixture.engine.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Classify);
    assert_eq!(diagnostics[0].marker, "each");
}

#[test]
fn teardown_removes_stamped_content() {
    let mut fixture = Fixture::new(
        El::new("div").child(
            El::new("template")
                .attr("data-when", "true")
                .child(El::new("p").attr("data-prop-text-content", "'on'")),
        ),
        Scope::root(),
    );
    assert_eq!(fixture.texts("p"), vec!["on"]);

    let template = fixture.template;
    assert!(fixture.engine.teardown(&mut fixture.document, template));
    assert_eq!(fixture.engine.live_watchers(), 0);
    assert!(fixture.all_by_tag("p").is_empty());
    assert!(!fixture.engine.teardown(&mut fixture.document, template));
}
