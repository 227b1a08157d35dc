use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};

use schemadrift::presentation::cli_summary::print_summary;
use schemadrift::presentation::writers::{all_writers, write_to_file, writer_for};
use schemadrift::{AppConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "schemadrift",
    about = "Schemadrift — Diff a live database schema against a stored snapshot."
)]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Show catalog queries and rendered statements while running.
    #[arg(long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diff the live schema against a stored snapshot and write the changeset.
    Compare {
        /// Path to the target snapshot document.
        snapshot: PathBuf,

        /// Permit DROP TABLE / DROP COLUMN statements.
        #[arg(long)]
        allow_destructive: bool,

        /// Print the summary without writing any output files.
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, default_value = "all")]
        format: String,
    },
    /// Re-stamp identity tokens from a snapshot onto live tables matched by name.
    Repair {
        /// Path to the snapshot whose identities should be restored.
        snapshot: PathBuf,

        /// Print the statements without writing any output files.
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, default_value = "all")]
        format: String,
    },
    /// Capture the live schema as a snapshot document.
    Dump {
        /// Where to write the snapshot.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else if cli.quiet {
        LogLevel::Error
    } else {
        LogLevel::Info
    };
    schemadrift::init_tracing(level);

    let mut cfg = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Compare {
            snapshot,
            allow_destructive,
            dry_run,
            format,
        } => {
            if allow_destructive {
                cfg.diff.allow_destructive = true;
            }

            let changeset = schemadrift::compare(&cfg, &snapshot).await?;
            print_summary(&changeset);

            if !dry_run && !changeset.is_empty() {
                write_changeset(&cfg, &changeset, &format)?;
            }
        }
        Command::Repair {
            snapshot,
            dry_run,
            format,
        } => {
            let changeset = schemadrift::repair(&cfg, &snapshot).await?;
            print_summary(&changeset);

            if !dry_run && !changeset.is_empty() {
                write_changeset(&cfg, &changeset, &format)?;
            }
        }
        Command::Dump { path } => {
            let schema = schemadrift::dump(&cfg, &path).await?;
            println!(
                "Snapshot of {} table(s) written to {}",
                schema.tables.len(),
                path.display()
            );
        }
    }

    Ok(())
}

/// Write the changeset under a per-run subdirectory via the chosen writers.
fn write_changeset(
    cfg: &AppConfig,
    changeset: &schemadrift::Changeset,
    format: &str,
) -> Result<()> {
    // --- generate subdirectory per changeset ---
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let subdir_name = format!("{}_{}", timestamp, changeset.changeset_id);
    let output_subdir = Path::new(&cfg.output.dir)
        .join(&changeset.driver)
        .join(&subdir_name);

    // create the directory and all parents if needed
    std::fs::create_dir_all(&output_subdir)?;

    match format {
        "all" => {
            for writer in all_writers() {
                write_to_file(&*writer, changeset, output_subdir.to_str().unwrap())?;
            }
        }
        fmt => {
            let writer =
                writer_for(fmt).ok_or_else(|| anyhow::anyhow!("Unknown format: {}", fmt))?;
            write_to_file(&*writer, changeset, output_subdir.to_str().unwrap())?;
        }
    }

    println!("Changeset written to {}", output_subdir.display());
    Ok(())
}
