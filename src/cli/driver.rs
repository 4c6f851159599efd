//! One CLI run: load inputs, resolve, render.

use anyhow::{Context, Result};
use knit_common::{Diagnostic, DiagnosticCollector, DiagnosticReporter};
use knit_graph::{Declarations, InitStep, KeyId};
use knit_resolve::{BindingSource, LevelPlan, ResolutionPlan, Resolver};
use std::fmt::Write as _;
use tracing::{info, warn};

use super::args::{CliArgs, OutputFormat};
use super::config;

/// Result of resolving one declaration file.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// `None` when resolution stopped on an internal error.
    pub plan: Option<ResolutionPlan>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunOutcome {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

pub fn run(args: &CliArgs) -> Result<RunOutcome> {
    let declarations = config::load_declarations(&args.declarations)?;
    let config_options = args
        .config
        .as_deref()
        .map(config::load_options)
        .transpose()?;
    let options = config::resolve_options(
        declarations.options.clone(),
        config_options.as_ref(),
        args,
    );
    Ok(resolve_declarations(&declarations, Resolver::new(options)))
}

/// Resolve already-parsed declarations with the given resolver.
pub fn resolve_declarations(declarations: &Declarations, resolver: Resolver) -> RunOutcome {
    let mut collector = DiagnosticCollector::new();
    let plan = match resolver.resolve(&declarations.graphs, &declarations.bindings, &mut collector)
    {
        Ok(plan) => Some(plan),
        Err(error) => {
            warn!(%error, "resolution aborted");
            None
        }
    };
    info!(
        levels = plan.as_ref().map_or(0, |plan| plan.levels.len()),
        errors = collector.error_count(),
        "resolution finished"
    );
    RunOutcome {
        plan,
        diagnostics: collector.take_diagnostics(),
    }
}

pub fn render_plan(plan: &ResolutionPlan, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => plan.to_json().context("failed to serialize plan"),
        OutputFormat::Text => Ok(render_text(plan)),
    }
}

fn render_text(plan: &ResolutionPlan) -> String {
    let mut out = String::new();
    for level in &plan.levels {
        render_level(&mut out, plan, level);
    }
    out
}

fn render_level(out: &mut String, plan: &ResolutionPlan, level: &LevelPlan) {
    let name = |key: KeyId| plan.display(key).unwrap_or("<unknown>");
    let indent = "  ".repeat(level.depth as usize);
    let list = |keys: &[KeyId]| keys.iter().map(|&key| name(key)).collect::<Vec<_>>().join(", ");

    let _ = writeln!(out, "{indent}graph {} (depth {})", level.graph, level.depth);
    if !level.consumed_from_parent.is_empty() {
        let _ = writeln!(
            out,
            "{indent}  from parent: {}",
            list(&level.consumed_from_parent)
        );
    }
    for slot in &level.slots {
        let _ = writeln!(out, "{indent}  slot {}: {}", slot.name, slot.ty);
    }
    for binding in &level.bindings {
        let source = match &binding.source {
            BindingSource::Local => String::new(),
            BindingSource::OwnField { slot } => format!(" -> {slot}"),
            BindingSource::AncestorField { graph, slot, .. } => format!(" -> {graph}.{slot}"),
        };
        let scope = binding
            .scope
            .as_ref()
            .map(|scope| format!(" {scope}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{indent}  {} {}{scope}{source}",
            binding.kind,
            name(binding.key)
        );
    }
    for aggregate in &level.aggregates {
        let _ = writeln!(
            out,
            "{indent}  aggregate {} [{}]",
            name(aggregate.key),
            list(&aggregate.contributors)
        );
    }
    for edge in &level.deferred_edges {
        let _ = writeln!(
            out,
            "{indent}  deferred {} -> {}",
            name(edge.consumer),
            name(edge.dependency)
        );
    }
    for step in &level.init_steps {
        let (verb, key) = match *step {
            InitStep::DeclareForward { key } => ("declare-forward", key),
            InitStep::Construct { key } => ("construct", key),
            InitStep::ResolveForward { key } => ("resolve-forward", key),
        };
        let _ = writeln!(out, "{indent}  {verb} {}", name(key));
    }
}
