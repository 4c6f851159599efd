use super::reporter::Reporter;
use knit_common::{DeclarationSite, Diagnostic, diagnostic_codes};

#[test]
fn formats_site_category_code_and_graph() {
    let reporter = Reporter::new(false);
    let diagnostic = Diagnostic::error(diagnostic_codes::MISSING_BINDING, &["Db", "Repo"])
        .at(Some(DeclarationSite::new("src/Repo.kt", 12, 5)))
        .in_graph("App");

    assert_eq!(
        reporter.format_diagnostic(&diagnostic),
        "src/Repo.kt:12:5 - error K1002: Cannot find a binding for Db. Requested by: Repo [graph App]"
    );
}

#[test]
fn unknown_site_and_related_locations() {
    let reporter = Reporter::new(false);
    let diagnostic = Diagnostic::error(diagnostic_codes::DUPLICATE_BINDING, &["Db", "App"])
        .with_related(Some(DeclarationSite::new("src/DbModule.kt", 0, 0)), "Also bound here.");

    let output = reporter.format_diagnostic(&diagnostic);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec![
            "<unknown> - error K1001: Db is bound multiple times in 'App'.",
            "  Related: src/DbModule.kt - Also bound here.",
        ]
    );
}

#[test]
fn render_separates_diagnostics_with_newlines() {
    let reporter = Reporter::new(false);
    let diagnostics = vec![
        Diagnostic::error(diagnostic_codes::DUPLICATE_GRAPH, &["App"]),
        Diagnostic::error(diagnostic_codes::UNKNOWN_PARENT_GRAPH, &["User", "Ap"]),
    ];

    let output = reporter.render(&diagnostics);
    assert_eq!(output.lines().count(), 2);
    assert!(output.contains("K1007"));
    assert!(output.contains("K1005"));
}

#[test]
fn summary_pluralizes() {
    let reporter = Reporter::new(false);
    assert_eq!(reporter.summary(1), "Found 1 error.");
    assert_eq!(reporter.summary(3), "Found 3 errors.");
}
