use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use meta_swap::config::Config;
use meta_swap::pipeline;
use meta_swap::segment::TrailerPolicy;

const USAGE: &str = "usage: meta-swap [OPTIONS] [SOURCE] DESTINATION";

#[derive(Parser, Debug)]
#[command(
    name = "meta-swap",
    version,
    about = "Replace the metadata of a JPEG with that of another, or strip it",
    override_usage = "meta-swap [OPTIONS] [SOURCE] DESTINATION"
)]
struct Cli {
    /// Optional metadata source, then the destination image (rewritten in place)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Drop data after the end-of-image marker instead of failing
    #[arg(long = "strip-trailer")]
    strip_trailer: bool,

    /// Path to config file (default: meta-swap.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default meta-swap.json and exit
    #[arg(long)]
    init: bool,

    /// Check that the files can be merged without modifying anything
    #[arg(long)]
    dry_run: bool,

    /// Keep the backup (DESTINATION~) after a successful run
    #[arg(long)]
    keep_backup: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    ExitCode::from(report(run(&cli)))
}

/// Log a failed run and turn it into a process exit status.
fn report(result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e:#}");
            1
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let (source, destination) = match cli.paths.as_slice() {
        [destination] => (None, destination),
        [source, destination] => (Some(source.as_path()), destination),
        _ => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    // Load config, then apply flag overrides
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.strip_trailer {
        config.trailer = TrailerPolicy::Strip;
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.keep_backup {
        config.keep_backup = true;
    }

    let action = if source.is_some() { "Replaced" } else { "Stripped" };

    if config.dry_run {
        log::info!("DRY RUN — no files will be modified");
        let stats = pipeline::check_metadata(destination, source, &config)?;
        log::info!(
            "{} would keep {} segment(s) and drop {} metadata segment(s)",
            destination.display(),
            stats.image.segments_kept,
            stats.image.segments_dropped
        );
        if let Some(donor) = stats.donor {
            log::info!("  {} metadata segment(s) would be copied", donor.segments_kept);
        }
        return Ok(());
    }

    let outcome = pipeline::replace_metadata(destination, source, &config)?;
    log::info!(
        "{action} metadata of {}: dropped {} segment(s){}",
        outcome.destination.display(),
        outcome.stats.image.segments_dropped,
        outcome
            .stats
            .donor
            .map(|d| format!(", copied {}", d.segments_kept))
            .unwrap_or_default()
    );
    if outcome.backup_kept {
        log::info!("  Backup kept at {}", outcome.backup_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn wrong_argument_count_prints_usage() {
        let cli = Cli::try_parse_from(["meta-swap"]).unwrap();
        assert!(run(&cli).is_ok());

        let cli = Cli::try_parse_from(["meta-swap", "a.jpg", "b.jpg", "c.jpg"]).unwrap();
        assert!(run(&cli).is_ok());
    }

    #[test]
    fn failures_exit_non_zero() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("meta-swap.json");
        let missing = dir.path().join("missing.jpg");
        let cli = Cli::try_parse_from([
            OsStr::new("meta-swap"),
            OsStr::new("--config"),
            config.as_os_str(),
            missing.as_os_str(),
        ])
        .unwrap();

        assert_eq!(report(run(&cli)), 1);
        assert_eq!(report(Ok(())), 0);
    }

    #[test]
    fn strip_trailer_flag() {
        let cli = Cli::try_parse_from(["meta-swap", "--strip-trailer", "a.jpg"]).unwrap();
        assert!(cli.strip_trailer);
        assert_eq!(cli.paths, vec![PathBuf::from("a.jpg")]);
    }
}
