use super::args::CliArgs;
use super::config::{load_declarations, load_options, parse_declarations, resolve_options};
use clap::Parser;
use knit_common::ResolverOptions;
use std::path::{Path, PathBuf};

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write test file");
    path
}

#[test]
fn loads_declarations_with_embedded_options() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_file(
        dir.path(),
        "decls.json",
        r#"{
            "options": { "fieldSuffix": "Factory" },
            "graphs": [{ "name": "App", "type": "app.App", "requests": [{ "type": "Db" }] }],
            "bindings": [{ "kind": "constructor", "key": { "type": "Db" } }]
        }"#,
    );

    let declarations = load_declarations(&path).expect("declarations should load");
    assert_eq!(declarations.graphs.len(), 1);
    assert_eq!(declarations.bindings.len(), 1);
    assert_eq!(declarations.options.field_suffix, "Factory");
    assert_eq!(declarations.options.provider_type, "Provider");
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.json");

    let error = load_declarations(&path).expect_err("missing file should fail");
    let message = format!("{error:#}");
    assert!(message.contains("failed to read declarations"), "{message}");
    assert!(message.contains("absent.json"), "{message}");
}

#[test]
fn malformed_json_is_reported() {
    assert!(parse_declarations("{ \"graphs\": [").is_err());
    assert!(parse_declarations(r#"{ "bindings": [{ "kind": "factory", "key": { "type": "A" } }] }"#).is_err());
}

#[test]
fn options_layer_embedded_then_config_then_flags() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = write_file(
        dir.path(),
        "knit.json",
        r#"{ "providerType": "javax.inject.Provider", "maxCycleSearch": 10 }"#,
    );
    let config = load_options(&config_path).expect("options should load");

    let embedded = ResolverOptions {
        field_suffix: "Factory".to_string(),
        max_cycle_search: 500,
        ..ResolverOptions::default()
    };
    let args = CliArgs::try_parse_from(["knit", "decls.json", "--max-cycle-search", "3"])
        .expect("parse should succeed");

    let options = resolve_options(embedded, Some(&config), &args);
    assert_eq!(options.field_suffix, "Factory");
    assert_eq!(options.provider_type, "javax.inject.Provider");
    assert_eq!(options.max_cycle_search, 3);
}

#[test]
fn config_defaults_do_not_reset_embedded_options() {
    let embedded = ResolverOptions {
        lazy_type: "dagger.Lazy".to_string(),
        ..ResolverOptions::default()
    };
    let config = ResolverOptions::from_json("{}").expect("empty options parse");
    let args = CliArgs::try_parse_from(["knit", "decls.json"]).expect("parse should succeed");

    let options = resolve_options(embedded, Some(&config), &args);
    assert_eq!(options.lazy_type, "dagger.Lazy");
}
