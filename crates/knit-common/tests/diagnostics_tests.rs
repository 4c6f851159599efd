use crate::diagnostics::{DiagnosticCategory, get_message_template};
use crate::{
    DeclarationSite, Diagnostic, DiagnosticCollector, DiagnosticReporter, InternalError,
    diagnostic_codes, format_message,
};

#[test]
fn format_message_fills_placeholders_in_order() {
    assert_eq!(
        format_message("{0} is bound multiple times in '{1}'.", &["Int", "AppGraph"]),
        "Int is bound multiple times in 'AppGraph'."
    );
}

#[test]
fn format_message_leaves_unknown_placeholders() {
    assert_eq!(format_message("{0} and {1}", &["a"]), "a and {1}");
}

#[test]
fn every_code_has_a_template() {
    for code in [
        diagnostic_codes::DUPLICATE_BINDING,
        diagnostic_codes::MISSING_BINDING,
        diagnostic_codes::DUPLICATE_MAP_KEY,
        diagnostic_codes::INCOMPATIBLY_SCOPED_BINDING,
        diagnostic_codes::UNKNOWN_PARENT_GRAPH,
        diagnostic_codes::GRAPH_HIERARCHY_CYCLE,
        diagnostic_codes::DUPLICATE_GRAPH,
        diagnostic_codes::HIERARCHY_TOO_DEEP,
        diagnostic_codes::INVALID_TYPE_REFERENCE,
        diagnostic_codes::INVALID_ALIAS,
        diagnostic_codes::CONTRIBUTION_KIND_MISMATCH,
        diagnostic_codes::MISSING_CONTRIBUTION,
        diagnostic_codes::MISSING_MAP_KEY,
        diagnostic_codes::UNKNOWN_GRAPH,
        diagnostic_codes::UNOWNED_BINDING,
        diagnostic_codes::SCOPE_REDECLARED,
        diagnostic_codes::UNBREAKABLE_CYCLE,
        diagnostic_codes::INTERNAL_ERROR,
    ] {
        assert!(get_message_template(code).is_some(), "no template for {code}");
    }
}

#[test]
fn error_builder_attaches_site_graph_and_related() {
    let site = DeclarationSite::new("AppModule.kt", 12, 3);
    let diag = Diagnostic::error(diagnostic_codes::DUPLICATE_BINDING, &["Int", "AppGraph"])
        .at(Some(site.clone()))
        .in_graph("AppGraph")
        .with_related(Some(DeclarationSite::new("Other.kt", 4, 1)), "also bound here");

    assert_eq!(diag.category, DiagnosticCategory::Error);
    assert_eq!(diag.site, Some(site));
    assert_eq!(diag.graph.as_deref(), Some("AppGraph"));
    assert_eq!(diag.related_information.len(), 1);
    assert_eq!(
        diag.to_string(),
        "AppModule.kt:12:3 - KN1001: Int is bound multiple times in 'AppGraph'."
    );
}

#[test]
fn internal_diagnostic_carries_error_detail() {
    let diag = Diagnostic::internal(&InternalError::UnbalancedExit);
    assert_eq!(diag.code, diagnostic_codes::INTERNAL_ERROR);
    assert!(diag.message_text.contains("exit_level"));
}

#[test]
fn collector_counts_errors_only() {
    let mut collector = DiagnosticCollector::new();
    assert!(!collector.has_errors());

    let mut warning = Diagnostic::error(diagnostic_codes::MISSING_BINDING, &["A", "B"]);
    warning.category = DiagnosticCategory::Warning;
    collector.report(warning);
    assert!(!collector.has_errors());

    collector.report(Diagnostic::error(diagnostic_codes::MISSING_BINDING, &["A", "B"]));
    assert_eq!(collector.error_count(), 1);
    assert_eq!(
        collector.codes(),
        vec![diagnostic_codes::MISSING_BINDING, diagnostic_codes::MISSING_BINDING]
    );

    let taken = collector.take_diagnostics();
    assert_eq!(taken.len(), 2);
    assert!(!collector.has_errors());
}

#[test]
fn site_without_line_prints_file_only() {
    assert_eq!(DeclarationSite::new("Gen.kt", 0, 0).to_string(), "Gen.kt");
}
