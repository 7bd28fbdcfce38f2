//! zfs-snapback - replicate ZFS filesystems and snapshots between hosts

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use snapback::cli::{Cli, Command, SyncOpts};
use snapback::journal::JournalLogger;
use snapback::logger::{ConsoleLogger, FanoutLogger, Logger, TextLogger};
use snapback::{get_filesystem, Location, Settings, Syncer, Zfs};

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    let cli = Cli::parse();
    let mut settings = Settings::load_or_default(cli.config.as_deref())
        .context("Failed to load settings")?;

    match cli.command {
        Command::Sync(opts) => sync_main(&opts, &mut settings, cli.quiet),
        Command::List { location } => list_main(&location, &settings, cli.quiet),
    }
}

fn zfs_for(location: &Location, settings: &Settings) -> Zfs {
    let transport = location.transport(
        &settings.ssh_binary,
        settings.flags.compression.as_deref(),
    );
    Zfs::new(transport).with_binary(settings.zfs_binary.clone())
}

fn sync_main(opts: &SyncOpts, settings: &mut Settings, quiet: bool) -> Result<()> {
    opts.apply(settings);

    let mut loggers: Vec<Arc<dyn Logger>> = Vec::new();
    loggers.push(Arc::new(ConsoleLogger::new(quiet)));
    if let Some(p) = &settings.log_file {
        loggers.push(Arc::new(
            TextLogger::new(p).with_context(|| format!("Failed to open log file {}", p.display()))?,
        ));
    }
    if let Some(p) = &settings.journal {
        loggers.push(Arc::new(JournalLogger::new(p)?));
    }
    let logger = FanoutLogger::new(loggers);

    let source = Location::parse(&opts.source);
    let destination = Location::parse(&opts.destination);
    let source_zfs = zfs_for(&source, settings);
    let destination_zfs = zfs_for(&destination, settings);

    let from = get_filesystem(&source_zfs, &source.path, &logger)
        .with_context(|| format!("Failed to find source {source}"))?;
    let mut to = get_filesystem(&destination_zfs, &destination.path, &logger)
        .with_context(|| format!("Failed to find destination {destination}"))?;

    let syncer = Syncer::new(&settings.flags, &logger);
    let stats = syncer
        .sync(&from, &mut to)
        .with_context(|| format!("Failed to sync {source} to {destination}"))?;

    if stats.transfers == 0 && !quiet {
        println!("Nothing to do");
    }
    Ok(())
}

fn list_main(location: &str, settings: &Settings, quiet: bool) -> Result<()> {
    let location = Location::parse(location);
    let zfs = zfs_for(&location, settings);
    let fs = get_filesystem(&zfs, &location.path, &ConsoleLogger::new(quiet))
        .with_context(|| format!("Failed to list {location}"))?;
    print!("{fs}");
    Ok(())
}
