use super::args::{CliArgs, OutputFormat};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn parses_declarations_path_with_defaults() {
    let args = CliArgs::try_parse_from(["knit", "decls.json"]).expect("parse should succeed");

    assert_eq!(args.declarations, PathBuf::from("decls.json"));
    assert_eq!(args.format, OutputFormat::Json);
    assert!(args.config.is_none());
    assert!(args.out.is_none());
    assert!(!args.no_color);
    assert!(args.provider_type.is_none());
}

#[test]
fn parses_overrides_and_output_options() {
    let args = CliArgs::try_parse_from([
        "knit",
        "decls.json",
        "-c",
        "knit.json",
        "--format",
        "text",
        "-o",
        "plan.txt",
        "--no-color",
        "--provider-type",
        "javax.inject.Provider",
        "--field-suffix",
        "Factory",
        "--max-cycle-search",
        "50",
    ])
    .expect("parse should succeed");

    assert_eq!(args.config, Some(PathBuf::from("knit.json")));
    assert_eq!(args.format, OutputFormat::Text);
    assert_eq!(args.out, Some(PathBuf::from("plan.txt")));
    assert!(args.no_color);
    assert_eq!(args.provider_type.as_deref(), Some("javax.inject.Provider"));
    assert_eq!(args.field_suffix.as_deref(), Some("Factory"));
    assert_eq!(args.max_cycle_search, Some(50));
}

#[test]
fn rejects_missing_declarations_and_unknown_format() {
    assert!(CliArgs::try_parse_from(["knit"]).is_err());
    assert!(CliArgs::try_parse_from(["knit", "decls.json", "--format", "yaml"]).is_err());
}
