use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the knit binary.
#[derive(Parser, Debug)]
#[command(
    name = "knit",
    version,
    about = "Resolve dependency-injection binding declarations into a code-generation plan"
)]
pub struct CliArgs {
    /// Declaration file produced by the front-end.
    pub declarations: PathBuf,

    /// Options file; its fields override the options embedded in the
    /// declaration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// How to print the plan.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Write the plan here instead of stdout.
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,

    /// Disable colored diagnostics.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Deferred-wrapper type for storage slots (overrides `providerType`).
    #[arg(long)]
    pub provider_type: Option<String>,

    /// Suffix for generated slot names (overrides `fieldSuffix`).
    #[arg(long)]
    pub field_suffix: Option<String>,

    /// Cap on cycles enumerated per component (overrides `maxCycleSearch`).
    #[arg(long)]
    pub max_cycle_search: Option<u32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}
