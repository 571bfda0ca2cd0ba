use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{MatchReport, QuerySource, Verdict};
use facematch_fs::DirectorySource;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod local;
mod remote;

use local::LocalEngine;

#[derive(Parser)]
#[command(name = "facematch", version, about = "FaceMatch reference image matching CLI")]
struct Cli {
    /// Run against this reference directory in-process instead of calling facematchd
    #[arg(short, long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Talk to facematchd on the system bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match an image against the reference set
    Match {
        /// Image to match
        path: PathBuf,
    },
    /// Rebuild the reference store from the reference directory
    Reload,
    /// List reference identities
    List,
    /// Register a new reference image
    Add {
        /// Image to copy into the reference directory
        path: PathBuf,
        /// Identity to store it under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove a reference image
    Remove {
        /// Identity (file name) to remove
        id: String,
    },
    /// Show engine status
    Status,
    /// Print an image's fingerprint as JSON (no reference set needed)
    Extract {
        /// Image to fingerprint
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Fingerprinting a single file needs neither the daemon nor a reference set.
    if let Commands::Extract { path } = &cli.command {
        return extract(path);
    }

    match &cli.dir {
        Some(dir) => run_local(dir, cli.command),
        None => run_remote(cli.system, cli.command).await,
    }
}

fn run_local(dir: &Path, command: Commands) -> Result<ExitCode> {
    let engine = LocalEngine::open(dir)?;

    match command {
        Commands::Match { path } => {
            let decision = engine.match_image(&path)?;
            print_report(&decision.report())
        }
        Commands::Reload => {
            println!("{}", engine.reload()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            for identity in engine.list() {
                println!("{identity}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Add { path, name } => {
            let identity = engine.add(&path, name.as_deref())?;
            println!("Registered {identity}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove { id } => removed(&id, engine.remove(&id)?),
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&engine.status())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Extract { .. } => unreachable!("extract is dispatched in main"),
    }
}

async fn run_remote(system: bool, command: Commands) -> Result<ExitCode> {
    let proxy = remote::connect(system).await?;

    match command {
        Commands::Match { path } => {
            let path = absolute(&path)?;
            let json = proxy.match_image(&path).await?;
            let report: MatchReport =
                serde_json::from_str(&json).context("decoding match report")?;
            print_report(&report)
        }
        Commands::Reload => {
            println!("{}", proxy.reload().await?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            let identities: Vec<String> = serde_json::from_str(&proxy.list_references().await?)?;
            for identity in identities {
                println!("{identity}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Add { path, name } => {
            let path = absolute(&path)?;
            let identity = proxy.register(&path, name.as_deref().unwrap_or("")).await?;
            println!("Registered {identity}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove { id } => removed(&id, proxy.remove(&id).await?),
        Commands::Status => {
            let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Extract { .. } => unreachable!("extract is dispatched in main"),
    }
}

/// Print the report; exit 0 on a match, 2 on a possible match, 1 otherwise.
fn print_report(report: &MatchReport) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(match report.verdict {
        Verdict::Yes => ExitCode::SUCCESS,
        Verdict::Possible => ExitCode::from(2),
        Verdict::No => ExitCode::from(1),
    })
}

fn removed(identity: &str, existed: bool) -> Result<ExitCode> {
    if existed {
        println!("Removed {identity}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("No reference named {identity}");
        Ok(ExitCode::from(1))
    }
}

fn extract(path: &Path) -> Result<ExitCode> {
    let source = DirectorySource::new(".");
    let path = path.to_string_lossy();
    let query = source
        .read_query(&path)
        .with_context(|| format!("reading {path}"))?;
    let fingerprint = facematch_core::extract(&query.path, &query.bytes, query.size)?;
    println!("{}", serde_json::to_string(fingerprint.values())?);
    Ok(ExitCode::SUCCESS)
}

/// The daemon resolves paths from its own working directory.
fn absolute(path: &Path) -> Result<String> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving working directory")?
            .join(path)
    };
    Ok(abs.to_string_lossy().into_owned())
}
