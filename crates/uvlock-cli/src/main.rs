use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use uvlock_core::{DependencyGraph, LockError, Lockfile, ValidateOptions, validate};

#[derive(Parser, Debug)]
#[command(name = "uvlock", version)]
#[command(about = "Inspect, check and reformat uv.lock files")]
struct Cli {
  /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Parse a lockfile and dump the decoded model
  Dump {
    #[arg(value_name = "LOCKFILE")]
    lockfile: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Debug)]
    format: Format,
  },

  /// Check closure, hashes and declared requirements
  Check {
    #[arg(value_name = "LOCKFILE")]
    lockfile: PathBuf,

    /// Fail on warnings too
    #[arg(long)]
    deny_warnings: bool,

    /// Don't warn about packages no root depends on
    #[arg(long)]
    no_unreachable: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Print the lockfile in canonical layout
  Fmt {
    #[arg(value_name = "LOCKFILE")]
    lockfile: PathBuf,

    /// Exit with 1 instead of printing if the file is not canonical
    #[arg(long, conflicts_with = "write")]
    check: bool,

    /// Rewrite the file in place
    #[arg(long)]
    write: bool,
  },

  /// Check downloaded files against their recorded size and hash
  Verify {
    #[arg(value_name = "LOCKFILE")]
    lockfile: PathBuf,

    #[arg(value_name = "ARTIFACT", required = true)]
    artifacts: Vec<PathBuf>,
  },

  /// Print the dependency tree under each root
  Tree {
    #[arg(value_name = "LOCKFILE")]
    lockfile: PathBuf,
  },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
  Debug,
  Json,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
  #[error("{0}")]
  Lock(#[from] LockError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

const SUCCESS: i32 = 0;
const FAILURE: i32 = 1;
const ERROR: i32 = 2;

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .compact()
    .try_init()
    .ok();
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = match cli.command {
    Command::Dump { lockfile, format } => cmd_dump(&lockfile, format),
    Command::Check {
      lockfile,
      deny_warnings,
      no_unreachable,
      json,
    } => {
      let options = ValidateOptions::default()
        .with_deny_warnings(deny_warnings)
        .with_report_unreachable(!no_unreachable);
      cmd_check(&lockfile, &options, json)
    }
    Command::Fmt {
      lockfile,
      check,
      write,
    } => cmd_fmt(&lockfile, check, write),
    Command::Verify {
      lockfile,
      artifacts,
    } => cmd_verify(&lockfile, &artifacts),
    Command::Tree { lockfile } => cmd_tree(&lockfile),
  };

  match result {
    Ok(code) => process::exit(code),
    Err(e) => {
      eprintln!("Error: {e}");
      process::exit(ERROR);
    }
  }
}

fn cmd_dump(path: &Path, format: Format) -> Result<i32, CliError> {
  let lockfile = Lockfile::from_path(path)?;
  match format {
    Format::Debug => println!("{lockfile:#?}"),
    Format::Json => println!("{}", serde_json::to_string_pretty(&lockfile)?),
  }
  Ok(SUCCESS)
}

fn cmd_check(path: &Path, options: &ValidateOptions, json: bool) -> Result<i32, CliError> {
  let lockfile = Lockfile::from_path(path)?;
  let report = validate(&lockfile, options);

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    for issue in report.errors() {
      println!("error: {issue}");
    }
    for issue in report.warnings() {
      println!("warning: {issue}");
    }
    let errors = report.errors().count();
    let warnings = report.warnings().count();
    println!(
      "{}: {} packages, {errors} errors, {warnings} warnings",
      path.display(),
      lockfile.packages.len()
    );
  }

  Ok(if report.is_ok() { SUCCESS } else { FAILURE })
}

fn cmd_fmt(path: &Path, check: bool, write: bool) -> Result<i32, CliError> {
  let contents = std::fs::read_to_string(path)?;
  let lockfile: Lockfile = contents.parse()?;
  let canonical = lockfile.to_toml();

  if check {
    if canonical == contents {
      return Ok(SUCCESS);
    }
    eprintln!("{} is not in canonical form", path.display());
    return Ok(FAILURE);
  }

  if write {
    if canonical != contents {
      std::fs::write(path, &canonical)?;
      tracing::info!(path = %path.display(), "rewrote lockfile");
    }
  } else {
    print!("{canonical}");
  }
  Ok(SUCCESS)
}

fn cmd_verify(path: &Path, artifacts: &[PathBuf]) -> Result<i32, CliError> {
  let lockfile = Lockfile::from_path(path)?;
  let mut code = SUCCESS;

  for artifact_path in artifacts {
    let filename = artifact_path
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or_default();
    let found = lockfile
      .packages
      .iter()
      .find_map(|package| Some((package, package.find_artifact(filename)?)));

    let Some((package, artifact)) = found else {
      println!("unknown: {filename} is not in the lockfile");
      code = FAILURE;
      continue;
    };

    match artifact.verify_reader(File::open(artifact_path)?) {
      Ok(()) => println!("ok: {filename} ({})", package.id()),
      Err(e) => {
        tracing::warn!(file = %artifact_path.display(), error = %e, "artifact failed verification");
        println!("failed: {filename}: {e}");
        code = FAILURE;
      }
    }
  }

  Ok(code)
}

fn cmd_tree(path: &Path) -> Result<i32, CliError> {
  let lockfile = Lockfile::from_path(path)?;
  let graph = DependencyGraph::new(&lockfile);

  for root in graph.roots() {
    println!("{}", graph.package(root).id());
    let mut seen = BTreeSet::from([root]);
    print_children(&graph, root, "", &mut seen);
  }
  Ok(SUCCESS)
}

/// Draw the children of `index`. Packages already printed under this root
/// are marked `(*)` and not expanded again.
fn print_children(
  graph: &DependencyGraph<'_>,
  index: usize,
  prefix: &str,
  seen: &mut BTreeSet<usize>,
) {
  let children: Vec<usize> = graph.children(index).into_iter().collect();
  for (i, &child) in children.iter().enumerate() {
    let is_last = i == children.len() - 1;
    let branch = if is_last { "└── " } else { "├── " };
    let id = graph.package(child).id();

    if !seen.insert(child) {
      println!("{prefix}{branch}{id} (*)");
      continue;
    }
    println!("{prefix}{branch}{id}");

    let child_prefix = if is_last {
      format!("{prefix}    ")
    } else {
      format!("{prefix}│   ")
    };
    print_children(graph, child, &child_prefix, seen);
  }
}
