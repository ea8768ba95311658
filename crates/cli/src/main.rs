mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use osiris_lib::hook::{Hook, LogMode, Schema};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// osiris - build log aggregator for OpenShift builds
#[derive(Parser)]
#[command(name = "osiris")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Store a build document, platform event or build resource
  Store {
    /// JSON file to read ('-' for stdin)
    file: PathBuf,

    /// Shape of the input
    #[arg(short, long, default_value = "default", value_parser = clap::value_parser!(Schema))]
    schema: Schema,
  },

  /// Show a stored build
  Get {
    build_id: String,

    /// Only print the build status
    #[arg(long)]
    status: bool,
  },

  /// Print the log of a build
  Log {
    build_id: String,

    /// Fetch the log from the cluster instead of the store
    #[arg(long)]
    remote: bool,

    /// Namespace of the build (with --remote)
    #[arg(short, long, requires = "remote")]
    namespace: Option<String>,

    /// Verbosity of the cluster client (with --remote)
    #[arg(long, requires = "remote")]
    log_level: Option<u32>,
  },

  /// Attach a log file to a stored build
  Attach {
    build_id: String,

    /// Log file to attach
    file: PathBuf,

    /// Replace an already attached log
    #[arg(short, long)]
    force: bool,
  },

  /// Import log files as builds named after the files
  Import {
    /// Log files, e.g. `my-build-1.log`
    #[arg(required = true)]
    files: Vec<PathBuf>,
  },

  /// List stored builds one page at a time
  List {
    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Cursor returned with the previous page
    #[arg(short, long)]
    cursor: Option<String>,
  },

  /// Count stored builds
  Count,

  /// Delete every stored build
  Purge {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
  },

  /// Check that the store is reachable
  Ready,

  /// Send one notification to an ingestion hook
  Send {
    /// Hook to call
    #[arg(value_parser = parse_hook)]
    hook: Hook,

    build_id: String,

    /// JSON body ('-' for stdin)
    file: PathBuf,

    /// Shape of the body
    #[arg(short, long, default_value = "default", value_parser = clap::value_parser!(Schema))]
    schema: Schema,

    /// Where the completion hook gets the log from
    #[arg(short, long, value_parser = clap::value_parser!(LogMode))]
    mode: Option<LogMode>,

    /// Log level for the completion hook
    #[arg(long)]
    log_level: Option<u32>,
  },

  /// Forward build events (JSON lines) to the ingestion hooks
  Forward {
    /// Event stream to read (stdin if omitted)
    file: Option<PathBuf>,

    /// Where the completion hook gets the log from
    #[arg(short, long, value_parser = clap::value_parser!(LogMode))]
    mode: Option<LogMode>,

    /// Log level for the completion hook
    #[arg(long)]
    log_level: Option<u32>,
  },
}

fn parse_hook(value: &str) -> Result<Hook, String> {
  match value {
    "started" => Ok(Hook::Started),
    "completed" => Ok(Hook::Completed),
    other => Err(format!("unknown hook '{other}' (expected started or completed)")),
  }
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env()
    .ok()
    .or_else(|| {
      let level = std::env::var("LOG_LEVEL").ok().filter(|l| !l.trim().is_empty())?;
      EnvFilter::try_new(level.trim().to_lowercase()).ok()
    })
    .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(env_filter())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let output = cli.output;
  match cli.command {
    Commands::Store { file, schema } => cmd::cmd_store(&file, schema, output),
    Commands::Get { build_id, status } => cmd::cmd_get(&build_id, status, output),
    Commands::Log {
      build_id,
      remote,
      namespace,
      log_level,
    } => cmd::cmd_log(&build_id, remote, namespace.as_deref(), log_level, output),
    Commands::Attach { build_id, file, force } => cmd::cmd_attach(&build_id, &file, force, output),
    Commands::Import { files } => cmd::cmd_import(&files, output),
    Commands::List { page, cursor } => cmd::cmd_list(page, cursor.as_deref(), cli.verbose, output),
    Commands::Count => cmd::cmd_count(output),
    Commands::Purge { yes } => cmd::cmd_purge(yes, output),
    Commands::Ready => cmd::cmd_ready(output),
    Commands::Send {
      hook,
      build_id,
      file,
      schema,
      mode,
      log_level,
    } => cmd::cmd_send(hook, &build_id, &file, schema, mode, log_level, output),
    Commands::Forward { file, mode, log_level } => cmd::cmd_forward(file.as_deref(), mode, log_level, output),
  }
}
