//! Loading declaration and option files.
//!
//! Options are layered: values embedded in the declaration file, then a
//! separate `--config` file, then command-line flags.

use anyhow::{Context, Result};
use knit_common::ResolverOptions;
use knit_graph::Declarations;
use std::path::Path;
use tracing::debug;

use super::args::CliArgs;

pub fn parse_declarations(text: &str) -> Result<Declarations> {
    Declarations::from_json(text).context("failed to parse declaration JSON")
}

pub fn load_declarations(path: &Path) -> Result<Declarations> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read declarations: {}", path.display()))?;
    let declarations = Declarations::from_json(&text)
        .with_context(|| format!("failed to parse declarations: {}", path.display()))?;
    debug!(
        path = %path.display(),
        graphs = declarations.graphs.len(),
        bindings = declarations.bindings.len(),
        "loaded declarations"
    );
    Ok(declarations)
}

pub fn load_options(path: &Path) -> Result<ResolverOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read options: {}", path.display()))?;
    ResolverOptions::from_json(&text)
        .with_context(|| format!("failed to parse options: {}", path.display()))
}

/// Apply the `--config` file and the command-line overrides to the options
/// embedded in the declaration file.
pub fn resolve_options(
    embedded: ResolverOptions,
    config: Option<&ResolverOptions>,
    args: &CliArgs,
) -> ResolverOptions {
    let mut options = match config {
        Some(config) => embedded.merged_with(config),
        None => embedded,
    };
    if let Some(provider_type) = &args.provider_type {
        options.provider_type.clone_from(provider_type);
    }
    if let Some(field_suffix) = &args.field_suffix {
        options.field_suffix.clone_from(field_suffix);
    }
    if let Some(max_cycle_search) = args.max_cycle_search {
        options.max_cycle_search = max_cycle_search;
    }
    options
}
