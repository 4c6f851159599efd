//! Diagnostic types and message lookup for the resolver.
//!
//! Every user-facing problem the engine finds (duplicate or missing bindings,
//! conflicting map keys, unbreakable cycles, malformed hierarchies) becomes a
//! [`Diagnostic`] handed to an injected [`DiagnosticReporter`]. Nothing in the
//! engine writes to a stream; rendering is the caller's job.
//!
//! Message templates are looked up by code from [`DIAGNOSTIC_MESSAGES`] and
//! filled with [`format_message`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InternalError;

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

/// Where a declaration came from in the user's sources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclarationSite {
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl DeclarationSite {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for DeclarationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            return f.write_str(&self.file);
        }
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Related information for a diagnostic (e.g. the other side of a duplicate).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInformation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<DeclarationSite>,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A resolution diagnostic with optional related information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Graph being processed when the problem was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<DeclarationSite>,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create an error diagnostic from a message code and its arguments.
    ///
    /// Unknown codes fall back to the joined arguments so a diagnostic is
    /// never silently dropped.
    #[must_use]
    pub fn error(code: u32, args: &[&str]) -> Self {
        let message_text = match get_message_template(code) {
            Some(template) => format_message(template, args),
            None => args.join(" "),
        };
        Self {
            graph: None,
            site: None,
            message_text,
            category: DiagnosticCategory::Error,
            code,
            related_information: Vec::new(),
        }
    }

    /// Wrap an internal invariant violation.
    #[must_use]
    pub fn internal(error: &InternalError) -> Self {
        let detail = error.to_string();
        Self::error(diagnostic_codes::INTERNAL_ERROR, &[&detail])
    }

    #[must_use]
    pub fn at(mut self, site: Option<DeclarationSite>) -> Self {
        self.site = site;
        self
    }

    #[must_use]
    pub fn in_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, site: Option<DeclarationSite>, message: impl Into<String>) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            site,
            message_text: message.into(),
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(site) = &self.site {
            write!(f, "{site} - ")?;
        }
        write!(f, "KN{}: {}", self.code, self.message_text)
    }
}

// =============================================================================
// Reporter seam
// =============================================================================

/// Sink for diagnostics produced while resolving.
///
/// The engine only ever pushes; whoever drives it decides how (and whether)
/// to render what was collected.
pub trait DiagnosticReporter {
    fn report(&mut self, diagnostic: Diagnostic);

    /// Number of error-category diagnostics reported so far.
    fn error_count(&self) -> usize;

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Reporter that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the collected diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take the collected diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.errors = 0;
        std::mem::take(&mut self.diagnostics)
    }

    /// Codes of everything collected, in report order.
    pub fn codes(&self) -> Vec<u32> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }
}

impl DiagnosticReporter for DiagnosticCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.errors
    }
}

// =============================================================================
// Message table
// =============================================================================

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

pub mod diagnostic_codes {
    // Declaration errors
    pub const DUPLICATE_BINDING: u32 = 1001;
    pub const MISSING_BINDING: u32 = 1002;
    pub const DUPLICATE_MAP_KEY: u32 = 1003;
    pub const INCOMPATIBLY_SCOPED_BINDING: u32 = 1004;
    pub const UNKNOWN_PARENT_GRAPH: u32 = 1005;
    pub const GRAPH_HIERARCHY_CYCLE: u32 = 1006;
    pub const DUPLICATE_GRAPH: u32 = 1007;
    pub const HIERARCHY_TOO_DEEP: u32 = 1008;
    pub const INVALID_TYPE_REFERENCE: u32 = 1009;
    pub const INVALID_ALIAS: u32 = 1010;
    pub const CONTRIBUTION_KIND_MISMATCH: u32 = 1011;
    pub const MISSING_CONTRIBUTION: u32 = 1012;
    pub const MISSING_MAP_KEY: u32 = 1013;
    pub const UNKNOWN_GRAPH: u32 = 1014;
    pub const UNOWNED_BINDING: u32 = 1015;
    pub const SCOPE_REDECLARED: u32 = 1016;

    // Graph errors
    pub const UNBREAKABLE_CYCLE: u32 = 2001;

    // Internal invariant violations
    pub const INTERNAL_ERROR: u32 = 9001;
}

use diagnostic_codes as codes;

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: codes::DUPLICATE_BINDING,
        category: DiagnosticCategory::Error,
        message: "{0} is bound multiple times in '{1}'.",
    },
    DiagnosticMessage {
        code: codes::MISSING_BINDING,
        category: DiagnosticCategory::Error,
        message: "Cannot find a binding for {0}. Requested by: {1}",
    },
    DiagnosticMessage {
        code: codes::DUPLICATE_MAP_KEY,
        category: DiagnosticCategory::Error,
        message: "Map key '{0}' is contributed more than once to {1}.",
    },
    DiagnosticMessage {
        code: codes::INCOMPATIBLY_SCOPED_BINDING,
        category: DiagnosticCategory::Error,
        message: "{0} is scoped with '{1}', which is not declared by {2}.",
    },
    DiagnosticMessage {
        code: codes::UNKNOWN_PARENT_GRAPH,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' extends unknown graph '{1}'.",
    },
    DiagnosticMessage {
        code: codes::GRAPH_HIERARCHY_CYCLE,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' is part of a cyclic parent chain: {1}",
    },
    DiagnosticMessage {
        code: codes::DUPLICATE_GRAPH,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' is declared more than once.",
    },
    DiagnosticMessage {
        code: codes::HIERARCHY_TOO_DEEP,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' is nested {1} levels deep; the limit is {2}.",
    },
    DiagnosticMessage {
        code: codes::INVALID_TYPE_REFERENCE,
        category: DiagnosticCategory::Error,
        message: "Invalid type reference '{0}': {1}",
    },
    DiagnosticMessage {
        code: codes::INVALID_ALIAS,
        category: DiagnosticCategory::Error,
        message: "Alias binding for {0} must have exactly one dependency, found {1}.",
    },
    DiagnosticMessage {
        code: codes::CONTRIBUTION_KIND_MISMATCH,
        category: DiagnosticCategory::Error,
        message: "{0} mixes set and map contributions.",
    },
    DiagnosticMessage {
        code: codes::MISSING_CONTRIBUTION,
        category: DiagnosticCategory::Error,
        message: "Contribution binding for {0} does not name a target collection.",
    },
    DiagnosticMessage {
        code: codes::MISSING_MAP_KEY,
        category: DiagnosticCategory::Error,
        message: "Map entry contributed to {0} has no map key.",
    },
    DiagnosticMessage {
        code: codes::UNKNOWN_GRAPH,
        category: DiagnosticCategory::Error,
        message: "Binding for {0} is declared in unknown graph '{1}'.",
    },
    DiagnosticMessage {
        code: codes::UNOWNED_BINDING,
        category: DiagnosticCategory::Error,
        message: "{0} binding for {1} must be declared inside a graph.",
    },
    DiagnosticMessage {
        code: codes::SCOPE_REDECLARED,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' declares scope '{1}', which its ancestor '{2}' already declares.",
    },
    DiagnosticMessage {
        code: codes::UNBREAKABLE_CYCLE,
        category: DiagnosticCategory::Error,
        message: "Found a dependency cycle that cannot be deferred: {0}",
    },
    DiagnosticMessage {
        code: codes::INTERNAL_ERROR,
        category: DiagnosticCategory::Error,
        message: "Internal resolver error: {0}",
    },
];

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the message template for a diagnostic code.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    get_diagnostic_message(code).map(|m| m.message)
}
