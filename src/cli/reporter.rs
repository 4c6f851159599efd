use colored::Colorize;
use knit_common::{Diagnostic, DiagnosticCategory, DiagnosticRelatedInformation};

/// Renders diagnostics for the terminal.
pub struct Reporter {
    color: bool,
}

impl Reporter {
    pub fn new(color: bool) -> Self {
        Reporter { color }
    }

    pub fn render(&self, diagnostics: &[Diagnostic]) -> String {
        let mut out = String::new();
        for (index, diagnostic) in diagnostics.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&self.format_diagnostic(diagnostic));
        }
        out
    }

    /// `file:line:column - error K1002: message`, then one line per related
    /// location.
    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let mut output = match &diagnostic.site {
            Some(site) => site.to_string(),
            None => "<unknown>".to_string(),
        };

        output.push_str(" - ");
        output.push_str(&self.format_category(diagnostic.category));
        output.push(' ');
        output.push_str(&self.format_code(diagnostic.code));
        output.push_str(": ");
        output.push_str(&diagnostic.message_text);

        if let Some(graph) = &diagnostic.graph {
            let context = format!(" [graph {graph}]");
            if self.color {
                output.push_str(&context.dimmed().to_string());
            } else {
                output.push_str(&context);
            }
        }

        for related in &diagnostic.related_information {
            output.push('\n');
            output.push_str(&self.format_related(related));
        }
        output
    }

    /// `N error(s) found.` line printed after the diagnostics.
    pub fn summary(&self, error_count: usize) -> String {
        let noun = if error_count == 1 { "error" } else { "errors" };
        let line = format!("Found {error_count} {noun}.");
        if self.color && error_count > 0 {
            line.red().bold().to_string()
        } else {
            line
        }
    }

    fn format_related(&self, related: &DiagnosticRelatedInformation) -> String {
        let location = related
            .site
            .as_ref()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        let prefix = if self.color {
            "  Related".dimmed().to_string()
        } else {
            "  Related".to_string()
        };
        format!("{prefix}: {location} - {}", related.message_text)
    }

    fn format_category(&self, category: DiagnosticCategory) -> String {
        let label = match category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        };

        if !self.color {
            return label.to_string();
        }

        match category {
            DiagnosticCategory::Error => label.red().bold().to_string(),
            DiagnosticCategory::Warning => label.yellow().bold().to_string(),
            DiagnosticCategory::Suggestion => label.blue().bold().to_string(),
            DiagnosticCategory::Message => label.cyan().bold().to_string(),
        }
    }

    fn format_code(&self, code: u32) -> String {
        let label = format!("K{code}");
        if self.color {
            label.bright_blue().to_string()
        } else {
            label
        }
    }
}
