//! Command-line interface for repocheck.

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::components;
use crate::config::{Config, OutputMode, DEFAULT_CONFIG_NAMES};
use crate::error::Error;
use crate::process::{CommandRunner, SystemRunner};
use crate::report;
use crate::scan::{self, summarize, Aggregator};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Commented configuration written by `repocheck init`.
const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Static analysis across every component of a multi-repository checkout.
///
/// Each component is analyzed by cppcheck in parallel. Findings can be
/// attributed to commits and authors with git blame, filtered, and written
/// as Markdown, CSV or XML reports.
#[derive(Parser)]
#[command(name = "repocheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Maximum log level selected by `-v`/`-q`.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a checkout and write reports
    #[command(visible_alias = "lint")]
    Check(CheckArgs),
    /// Write a default repocheck.yaml
    Init(InitArgs),
}

/// Arguments for the check command. Flags override the config file.
#[derive(Parser, Default)]
pub struct CheckArgs {
    /// Checkout or source directory to analyze
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Components analyzed concurrently (default: logical cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Analyzer timeout per component, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Upper bound on the analyzer's own thread count
    #[arg(long)]
    pub max_threads: Option<usize>,

    /// Analyzer check categories, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub enable: Vec<String>,

    /// Glob for reported files to drop (repeatable)
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Commit whose findings are dropped (repeatable)
    #[arg(long = "ignore-commit")]
    pub ignore_commits: Vec<String>,

    /// Also drop findings owned by each repository's initial commit
    #[arg(long)]
    pub skip_initial_commit: bool,

    /// Keep only findings whose author name or mail matches this regex
    #[arg(long)]
    pub author: Option<String>,

    /// Drop line-0 findings, syntax/macro errors and information notes
    #[arg(long)]
    pub suppress_noise: bool,

    /// `git log` argument selecting the commits to analyze (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    pub history: Vec<String>,

    /// Reports to write: summary, detail, or both
    #[arg(short, long)]
    pub output: Option<OutputMode>,

    /// Report format: markdown, csv, or xml
    #[arg(short, long)]
    pub format: Option<String>,

    /// Comma-separated summary fields (empty = all)
    #[arg(long)]
    pub summary_sections: Option<String>,

    /// Comma-separated detail fields (empty = all)
    #[arg(long)]
    pub detail_sections: Option<String>,

    /// Link findings to their commit under this review server URL
    #[arg(long)]
    pub link_base: Option<String>,

    /// Report directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Exit non-zero if any finding survives filtering
    #[arg(long)]
    pub fail_on_findings: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "repocheck.yaml")]
    pub output: PathBuf,
}

/// Find a config file in the target directory or the current directory.
fn discover_config(target: &Path) -> Option<PathBuf> {
    [target, Path::new(".")]
        .iter()
        .flat_map(|dir| DEFAULT_CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Load the config file named on the command line, or a discovered one.
pub fn load_config(args: &CheckArgs) -> anyhow::Result<Config> {
    let path = match &args.config {
        Some(p) => p.clone(),
        None => match discover_config(&args.path) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };
    tracing::debug!(config = %path.display(), "loading config");
    Config::parse_file(&path).map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))
}

/// Layer command-line flags over file values.
pub fn apply_overrides(config: &mut Config, args: &CheckArgs) {
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }
    if args.max_threads.is_some() {
        config.max_threads = args.max_threads;
    }
    if !args.enable.is_empty() {
        config.enable = args.enable.clone();
    }
    config.ignore.extend(args.ignore.iter().cloned());
    config.ignore_commits.extend(args.ignore_commits.iter().cloned());
    config.skip_initial_commit |= args.skip_initial_commit;
    if args.author.is_some() {
        config.author = args.author.clone();
    }
    config.suppress_noise |= args.suppress_noise;
    if !args.history.is_empty() {
        config.history = args.history.clone();
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if args.format.is_some() {
        config.format = args.format.clone();
    }
    if args.summary_sections.is_some() {
        config.summary_sections = args.summary_sections.clone();
    }
    if args.detail_sections.is_some() {
        config.detail_sections = args.detail_sections.clone();
    }
    if let Some(base) = &args.link_base {
        config.link.enabled = true;
        config.link.base_url = Some(base.clone());
    }
    if args.out_dir.is_some() {
        config.out_dir = args.out_dir.clone();
    }
}

/// The target must be an existing directory.
fn check_target(path: &Path) -> Result<PathBuf, Error> {
    if !path.is_dir() {
        return Err(Error::FatalInput(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    path.canonicalize().map_err(Error::Io)
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("  {spinner} [{bar:30}] {pos}/{len} {wide_msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    run_check_with(args, Arc::new(SystemRunner))
}

/// Run the check command with a given process runner.
pub fn run_check_with(args: &CheckArgs, runner: Arc<dyn CommandRunner>) -> anyhow::Result<i32> {
    let target = match check_target(&args.path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("{}", Cli::command().render_usage());
            return Ok(EXIT_ERROR);
        }
    };

    let mut config = match load_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };
    apply_overrides(&mut config, args);

    let config = match config.compile() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let found = components::discover(&target)?;
    let components = components::retain_existing(found);
    let analyzed = components.len();
    tracing::info!(target = %target.display(), components = analyzed, "discovered components");

    let bar = progress_bar(analyzed);
    let results = scan::analyze(components, config.clone(), runner, |r| {
        bar.set_message(r.component.relative_path.clone());
        bar.inc(1);
    })?;
    bar.finish_and_clear();

    let results = Aggregator::from_config(&config).aggregate(results);
    let summaries = summarize(&results);
    let outcome = report::write_reports(&results, &summaries, &config);

    let path_str = args.path.to_string_lossy().to_string();
    report::write_pretty(&path_str, analyzed, &summaries, &outcome);

    if args.fail_on_findings && !results.is_empty() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your checkout", args.output.display());
    println!("  2. Run: repocheck check <path> --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
