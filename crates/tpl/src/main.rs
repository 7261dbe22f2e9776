//! tpl CLI - generate projects from template trees

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tpl_core::config::{CACHE_DIR_ENV, DEFAULT_REMOTE_HOST, SEARCH_PATH_ENV};
use tpl_core::templates::engine::{DEFAULT_CLOSE, DEFAULT_OPEN};
use tpl_core::{Delimiters, RenderContext, ScaffoldConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tpl")]
#[command(about = "Generate projects from template trees")]
#[command(version)]
pub struct Args {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a template into a new project directory
    Gen(GenArgs),
}

#[derive(Parser, Debug)]
#[command(after_help = format!(
    "Templates are looked up as a local path or archive, then in ${}, then as a \
     remote repository cached under ${} (default: <user cache dir>/tpl).",
    SEARCH_PATH_ENV, CACHE_DIR_ENV
))]
pub struct GenArgs {
    /// Template: path, archive, search-path name, URL, [<host>/]<owner>/<repo>
    #[arg(short, long)]
    pub template: String,

    /// Left template delimiter
    #[arg(short = 'l', long = "left-delimiter", default_value = DEFAULT_OPEN)]
    pub left_delimiter: String,

    /// Right template delimiter
    #[arg(short = 'r', long = "right-delimiter", default_value = DEFAULT_CLOSE)]
    pub right_delimiter: String,

    /// Project name exposed as `.name` (defaults to the target directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Organization exposed as `.org`
    #[arg(long, default_value = "")]
    pub org: String,

    /// YAML file whose top-level keys are added to the template context
    #[arg(long)]
    pub values: Option<PathBuf>,

    /// Host assumed for <owner>/<repo> shorthand
    #[arg(long, default_value = DEFAULT_REMOTE_HOST)]
    pub host: String,

    /// Use cached repositories without fetching updates
    #[arg(long)]
    pub offline: bool,

    /// Directory to generate the project into
    pub target: PathBuf,
}

/// Initialize logging: `RUST_LOG` wins, otherwise verbosity picks the level
fn init_logging(verbose: u8) {
    let filter_str = match verbose {
        0 => "warn",
        1 => "tpl=info,tpl_core=info",
        2 => "tpl=debug,tpl_core=debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .init();
}

fn default_name(target: &Path) -> String {
    target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn run_gen(args: GenArgs) -> Result<()> {
    let delimiters = Delimiters::new(&args.left_delimiter, &args.right_delimiter)?;
    let config = ScaffoldConfig::from_env()?
        .with_delimiters(delimiters)
        .with_default_host(&args.host)
        .with_offline(args.offline);

    let name = args.name.clone().unwrap_or_else(|| default_name(&args.target));
    let mut context = RenderContext::from_env().with_name(name).with_org(&args.org);
    if let Some(values) = &args.values {
        context = context
            .with_values_file(values)
            .with_context(|| format!("Failed to load values from {}", values.display()))?;
    }

    std::fs::create_dir_all(&args.target)
        .with_context(|| format!("Failed to create {}", args.target.display()))?;

    let generated = tpl_core::generate(&config, &args.template, &args.target, &context)
        .with_context(|| format!("Failed to generate from template '{}'", args.template))?;

    println!(
        "{} {} file(s) in {} {}",
        "Generated".green().bold(),
        generated.files.len(),
        args.target.display().to_string().cyan(),
        format!("(from {})", generated.location).dimmed()
    );

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Gen(gen_args) => run_gen(gen_args),
    }
}
