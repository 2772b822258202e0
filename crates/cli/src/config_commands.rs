use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use ringle_config::{Diagnostic, Severity, ValidationResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration (secrets redacted).
    Show,
}

pub fn handle_config(path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => {
            let result = ringle_config::validate(path);
            eprint!("{}", render_report(&result, verbose, true));
            if result.has_errors() {
                std::process::exit(1);
            }
            Ok(())
        },
        ConfigAction::Show => {
            let config = ringle_config::discover_and_load(path);
            println!("{config:#?}");
            Ok(())
        },
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn render_line(d: &Diagnostic, color: bool) -> String {
    let label = if color {
        let code = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        format!("{BOLD}{code}{}{RESET}", d.severity)
    } else {
        d.severity.to_string()
    };
    if d.path.is_empty() {
        format!("  {label} [{}] {}", d.category, d.message)
    } else {
        format!("  {label} [{}] {}: {}", d.category, d.path, d.message)
    }
}

/// Human-readable report, most severe diagnostics first.
fn render_report(result: &ValidationResult, verbose: bool, color: bool) -> String {
    let mut out = match &result.config_path {
        Some(path) => format!("Checking {}\n\n", path.display()),
        None => "No config file found; checking defaults.\n\n".to_string(),
    };

    let mut shown: Vec<&Diagnostic> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();
    shown.sort_by_key(|d| d.severity);
    for d in &shown {
        out.push_str(&render_line(d, color));
        out.push('\n');
    }
    if !shown.is_empty() {
        out.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        out.push_str("No issues found.\n");
    } else {
        out.push_str(&format!("{errors} error(s), {warnings} warning(s)\n"));
    }
    out
}
