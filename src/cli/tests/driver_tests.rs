use super::args::OutputFormat;
use super::config::parse_declarations;
use super::driver::{render_plan, resolve_declarations};
use knit_common::diagnostic_codes;
use knit_resolve::Resolver;

const LAYERED: &str = r#"{
    "graphs": [
        { "name": "App", "type": "app.App", "scopes": ["Singleton"] },
        {
            "name": "User",
            "type": "app.UserGraph",
            "parent": "App",
            "requests": [{ "type": "Session" }]
        }
    ],
    "bindings": [
        { "kind": "constructor", "key": { "type": "Db" }, "scope": "Singleton" },
        {
            "kind": "constructor",
            "key": { "type": "Session" },
            "dependencies": [{ "key": { "type": "Db" } }]
        }
    ]
}"#;

fn outcome(text: &str) -> super::driver::RunOutcome {
    let declarations = parse_declarations(text).expect("declarations parse");
    resolve_declarations(&declarations, Resolver::new(declarations.options.clone()))
}

#[test]
fn resolves_layered_declarations() {
    let outcome = outcome(LAYERED);
    assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics);

    let plan = outcome.plan.expect("plan");
    let app = plan.level("App").expect("App level");
    assert!(
        app.slots.iter().any(|slot| slot.name == "dbProvider"),
        "{:?}",
        app.slots
    );

    let user = plan.level("User").expect("User level");
    let consumed: Vec<_> = user
        .consumed_from_parent
        .iter()
        .filter_map(|&key| plan.display(key))
        .collect();
    assert_eq!(consumed, vec!["Db"]);
}

#[test]
fn text_rendering_lists_slots_sources_and_steps() {
    let plan = outcome(LAYERED).plan.expect("plan");
    let text = render_plan(&plan, OutputFormat::Text).expect("render");

    assert!(text.contains("graph App (depth 0)"), "{text}");
    assert!(text.contains("  slot dbProvider: Provider<Db>"), "{text}");
    assert!(text.contains("  graph User (depth 1)"), "{text}");
    assert!(text.contains("    from parent: Db"), "{text}");
    assert!(text.contains("-> App.dbProvider"), "{text}");
    assert!(text.contains("    construct Session"), "{text}");
}

#[test]
fn json_rendering_is_the_serialized_plan() {
    let plan = outcome(LAYERED).plan.expect("plan");
    let json = render_plan(&plan, OutputFormat::Json).expect("render");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

    assert_eq!(value["levels"][0]["graph"], "App");
    assert_eq!(value["levels"][1]["parent"], 0);
}

#[test]
fn errors_are_counted() {
    let outcome = outcome(
        r#"{
            "graphs": [{ "name": "App", "type": "app.App", "requests": [{ "type": "Missing" }] }]
        }"#,
    );
    assert!(outcome.has_errors());
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(outcome.diagnostics[0].code, diagnostic_codes::MISSING_BINDING);
}
