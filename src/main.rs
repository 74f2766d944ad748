//! Portcheck CLI
//!
//! Checks a C# file, project or solution for constructs that break when the
//! code is ported to C++.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use portcheck::config::{ColorMode, Config, OutputFormat, OutputLevel};
use portcheck::{Detector, Processor, Reporter, Target};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Exit code of a run whose analysis failed
const EXIT_FAILED: i32 = 1;
/// Exit code of fatal errors and bad usage
const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(
    name = "portcheck",
    version,
    about = "C# to C++ porting checker",
    long_about = "Checks C# sources for interface diamonds not marked for virtual inheritance \
                  and for non-ASCII identifiers.",
    after_help = "Default values:\n  output-level=error"
)]
struct Cli {
    /// Solution (.sln, .slnx), project (.csproj) or source file (.cs) to check
    #[arg(short, long, required_unless_present = "list_rules")]
    source: Option<PathBuf>,

    /// Configuration file, or a directory containing one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity of progress output
    #[arg(long, value_enum, ignore_case = true)]
    output_level: Option<Level>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Analyze the files of a project in parallel
    #[arg(long)]
    parallel: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::resolve(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_default().unwrap_or_else(|err| {
            log::warn!("Ignoring default configuration: {}", err);
            Config::default()
        }),
    };

    let level = cli.output_level.map(|l| match l {
        Level::Error => OutputLevel::Error,
        Level::Warning => OutputLevel::Warning,
        Level::Info => OutputLevel::Info,
    });
    let format = cli.format.map(|f| match f {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
    });
    config.merge_cli(
        level,
        format,
        cli.no_color,
        cli.parallel,
        cli.jobs,
        cli.disable.clone(),
    );
    for rule in &config.rules.disabled {
        if let Err(err) = rule.parse::<Detector>() {
            log::warn!("{}", err);
        }
    }
    Ok(config)
}

fn print_rules(config: &Config) {
    for detector in Detector::ALL {
        let state = if config.is_rule_enabled(detector.id()) {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!("{} [{}]", detector.id().bold(), state);
        println!("    {}", detector.description());
    }
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Never => {
            colored::control::set_override(false);
            false
        }
        ColorMode::Always => {
            colored::control::set_override(true);
            true
        }
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let config = load_config(cli)?;
    let colored = use_color(config.output.color);
    if cli.list_rules {
        print_rules(&config);
        return Ok(0);
    }
    let mut reporter = Reporter::stdio(&config.output, colored);

    let source = cli.source.clone().unwrap_or_default();
    let target = match Target::detect(&source) {
        Ok(target) => target,
        Err(err) => {
            reporter.fatal(&err.to_string());
            return Ok(EXIT_FATAL);
        }
    };
    log::debug!("Checking {:?}", target);

    let result = Processor::new(&config, &mut reporter).process(&target);
    match result {
        Ok(verdict) => {
            reporter.finish(verdict);
            Ok(if verdict.is_pass() { 0 } else { EXIT_FAILED })
        }
        Err(err) => {
            reporter.fatal(&err.to_string());
            Ok(EXIT_FATAL)
        }
    }
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Handle --no-color
    if cli.no_color {
        colored::control::set_override(false);
    }

    let code = run(&cli).unwrap_or_else(|err| {
        eprintln!("{}: {:#}", "[ERROR]".red().bold(), err);
        EXIT_FATAL
    });
    std::process::exit(code);
}
