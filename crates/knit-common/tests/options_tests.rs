use crate::ResolverOptions;
use crate::limits;

#[test]
fn empty_json_yields_defaults() {
    let options = ResolverOptions::from_json("{}").unwrap();
    assert_eq!(options, ResolverOptions::default());
    assert_eq!(options.provider_type, "Provider");
    assert_eq!(options.max_cycle_search, limits::MAX_CYCLES_PER_COMPONENT);
}

#[test]
fn camel_case_fields_are_read() {
    let options = ResolverOptions::from_json(
        r#"{ "providerType": "javax.inject.Provider", "typeAliases": { "java.lang.Integer": "kotlin.Int" }, "maxHierarchyDepth": 3 }"#,
    )
    .unwrap();
    assert_eq!(options.provider_type, "javax.inject.Provider");
    assert_eq!(options.max_hierarchy_depth, 3);
    assert_eq!(
        options.type_aliases.get("java.lang.Integer").map(String::as_str),
        Some("kotlin.Int")
    );
}

#[test]
fn merge_overlays_non_default_fields() {
    let base = ResolverOptions::from_json(r#"{ "fieldSuffix": "Instance" }"#).unwrap();
    let overrides = ResolverOptions::from_json(r#"{ "providerType": "Factory" }"#).unwrap();
    let merged = base.merged_with(&overrides);
    assert_eq!(merged.field_suffix, "Instance");
    assert_eq!(merged.provider_type, "Factory");
}

#[test]
fn unknown_field_types_are_rejected() {
    assert!(ResolverOptions::from_json(r#"{ "maxCycleSearch": "many" }"#).is_err());
}
