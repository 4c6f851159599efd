#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;

use knit::cli::args::CliArgs;
use knit::cli::{driver, reporter::Reporter};

const EXIT_SUCCESS: i32 = 0;
const EXIT_DIAGNOSTICS: i32 = 1;
const EXIT_ABORTED: i32 = 2;

fn main() -> Result<()> {
    // Installs nothing unless KNIT_LOG or RUST_LOG is set.
    knit::tracing_config::init_tracing();

    let args = CliArgs::parse();
    let outcome = driver::run(&args)?;

    if !outcome.diagnostics.is_empty() {
        let color = !args.no_color && std::io::stderr().is_terminal();
        let reporter = Reporter::new(color);
        eprintln!("{}", reporter.render(&outcome.diagnostics));
        eprintln!();
        eprintln!("{}", reporter.summary(outcome.error_count()));
    }

    let Some(plan) = &outcome.plan else {
        std::process::exit(EXIT_ABORTED);
    };

    let rendered = driver::render_plan(plan, args.format)?;
    match &args.out {
        Some(path) => std::fs::write(path, &rendered)
            .with_context(|| format!("failed to write plan: {}", path.display()))?,
        None => println!("{rendered}"),
    }

    std::process::exit(if outcome.has_errors() {
        EXIT_DIAGNOSTICS
    } else {
        EXIT_SUCCESS
    });
}
