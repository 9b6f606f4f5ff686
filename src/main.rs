use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultsync::config::Settings;
use vaultsync::store::{DirStore, RemoteStore, Vault};
use vaultsync::sync::{
    BatchReport, CancelFlag, OpStatus, SyncDirection, SyncEngine, SyncEvent, SyncOperation,
    VaultWatcher,
};

#[derive(Parser, Debug)]
#[command(name = "vaultsync")]
#[command(about = "Bidirectional Markdown vault synchronization", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one full synchronization pass
    Sync {
        /// Vault directory (overrides the config file)
        #[arg(long)]
        vault: Option<PathBuf>,
        /// Remote directory (overrides the config file)
        #[arg(long)]
        remote: Option<PathBuf>,
        /// Sync a single document instead of the whole vault
        #[arg(short, long)]
        path: Option<String>,
        /// Force a direction instead of deciding per document
        #[arg(long, value_enum, default_value = "auto", requires = "path")]
        direction: DirectionArg,
    },
    /// Watch the vault and sync changes as they happen
    Watch {
        /// Vault directory (overrides the config file)
        #[arg(long)]
        vault: Option<PathBuf>,
        /// Remote directory (overrides the config file)
        #[arg(long)]
        remote: Option<PathBuf>,
        /// Skip the full pass normally run before watching
        #[arg(long)]
        no_initial_sync: bool,
    },
    /// Write a starter config file
    Init {
        /// Destination (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    /// Decide per document: push, pull or merge
    Auto,
    /// The vault copy replaces the remote copy
    Push,
    /// The remote copy replaces the vault copy
    Pull,
}

impl From<DirectionArg> for SyncDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Auto => SyncDirection::Bidirectional,
            DirectionArg::Push => SyncDirection::ToRemote,
            DirectionArg::Pull => SyncDirection::ToVault,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            vault,
            remote,
            path,
            direction,
        } => match path {
            Some(path) => sync_single(&settings, vault, remote, &path, direction.into()).await,
            None => sync_full(&settings, vault, remote).await,
        },
        Commands::Watch {
            vault,
            remote,
            no_initial_sync,
        } => watch(&settings, vault, remote, no_initial_sync).await,
        Commands::Init { path } => init(path),
    }
}

async fn open_stores(
    settings: &Settings,
    vault_override: Option<PathBuf>,
    remote_override: Option<PathBuf>,
) -> Result<(Arc<Vault>, Arc<dyn RemoteStore>)> {
    let vault_root = vault_override
        .or_else(|| non_empty(&settings.vault.root))
        .context("no vault directory configured; pass --vault or set vault.root")?;
    let remote_root = remote_override
        .or_else(|| non_empty(&settings.remote.root))
        .context("no remote directory configured; pass --remote or set remote.root")?;

    let vault = Arc::new(Vault::open(vault_root).await?);
    let remote: Arc<dyn RemoteStore> = Arc::new(DirStore::open(remote_root).await?);
    Ok((vault, remote))
}

fn non_empty(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

async fn sync_single(
    settings: &Settings,
    vault: Option<PathBuf>,
    remote: Option<PathBuf>,
    path: &str,
    direction: SyncDirection,
) -> Result<()> {
    let (vault, remote) = open_stores(settings, vault, remote).await?;
    let engine = SyncEngine::new(vault, remote, settings.engine_config()?);

    let op = engine.sync_one(path, direction).await?;
    print_operation(&op);
    if op.status == OpStatus::Failed {
        bail!("sync failed for {path}");
    }
    Ok(())
}

async fn sync_full(
    settings: &Settings,
    vault: Option<PathBuf>,
    remote: Option<PathBuf>,
) -> Result<()> {
    let (vault, remote) = open_stores(settings, vault, remote).await?;
    let total = vault.list_documents(&settings.filter()?)?.len() as u64;

    let (tx, rx) = mpsc::channel(64);
    let engine = Arc::new(SyncEngine::with_events(
        vault,
        remote,
        settings.engine_config()?,
        tx,
    ));

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) | {msg}",
            )
            .unwrap()
            .progress_chars("=>-"),
    );
    let display = tokio::spawn(drive_progress(rx, pb));

    let cancel = CancelFlag::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let report = engine.sync_all(&cancel).await?;

    // releasing the engine closes the event channel and ends the display task
    drop(engine);
    let _ = display.await;

    print_report(&report);
    if report.failed > 0 {
        bail!("{} documents failed to sync", report.failed);
    }
    Ok(())
}

async fn drive_progress(mut rx: mpsc::Receiver<SyncEvent>, pb: ProgressBar) {
    while let Some(event) = rx.recv().await {
        match event {
            SyncEvent::Started { path, .. } => pb.set_message(path),
            SyncEvent::Retrying { path, attempt, .. } => {
                pb.set_message(format!("{path} (retry {attempt})"));
            }
            SyncEvent::Finished(op) => {
                if op.status == OpStatus::Conflict {
                    pb.println(format!("{} {}", "conflict".yellow().bold(), op.path));
                }
                pb.inc(1);
            }
        }
    }
    pb.finish_and_clear();
}

async fn watch(
    settings: &Settings,
    vault: Option<PathBuf>,
    remote: Option<PathBuf>,
    no_initial_sync: bool,
) -> Result<()> {
    let (vault, remote) = open_stores(settings, vault, remote).await?;
    let engine = SyncEngine::new(vault.clone(), remote, settings.engine_config()?);

    if !no_initial_sync {
        let report = engine.sync_all(&CancelFlag::new()).await?;
        info!(
            synced = report.successful,
            conflicts = report.conflicts,
            failed = report.failed,
            "initial pass finished"
        );
    }

    let (watcher, mut events) =
        VaultWatcher::spawn(vault.root(), settings.filter()?, settings.watcher_config())?;
    println!("{} {}", "Watching".bold(), vault.root().display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            maybe = events.recv() => match maybe {
                Some(event) => match engine.handle_event(&event).await {
                    Ok(Some(op)) => print_operation(&op),
                    Ok(None) => {}
                    Err(e) => warn!(path = %event.path, error = %e, "event handling failed"),
                },
                None => break,
            },
        }
    }

    watcher.close().await;

    let stats = engine.stats();
    println!();
    println!(
        "{} {} synced, {} conflicts, {} failed",
        "Session:".bold(),
        stats.successful.to_string().green(),
        stats.conflicts.to_string().yellow(),
        stats.failed.to_string().red(),
    );
    Ok(())
}

fn init(path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(Settings::default_path)
        .context("no config directory available on this platform")?;
    if path.exists() {
        bail!("config file already exists at {}", path.display());
    }
    Settings::default().save_to(&path)?;
    println!("Wrote starter config to {}", path.display());
    Ok(())
}

fn print_operation(op: &SyncOperation) {
    let direction = match op.direction {
        Some(SyncDirection::ToRemote) => "pushed",
        Some(SyncDirection::ToVault) => "pulled",
        Some(SyncDirection::Bidirectional) => "merged",
        None => "unchanged",
    };
    match op.status {
        OpStatus::Completed => {
            println!("{} {} ({} ms)", direction.green(), op.path, op.duration_ms);
        }
        OpStatus::Conflict => {
            println!("{} {}", "conflict".yellow().bold(), op.path);
            for hint in &op.suggestions {
                println!("  {}", hint.dimmed());
            }
        }
        OpStatus::Failed => {
            println!(
                "{} {} {}",
                "failed".red().bold(),
                op.path,
                op.error.as_deref().unwrap_or("")
            );
        }
        _ => {}
    }
}

fn print_report(report: &BatchReport) {
    println!();
    println!("{}", "Sync complete".bold());
    println!(
        "  {} {}",
        "Synced:".bold(),
        report.successful.to_string().green()
    );
    if report.conflicts > 0 {
        println!(
            "  {} {}",
            "Conflicts:".bold(),
            report.conflicts.to_string().yellow()
        );
        for op in &report.operations {
            if op.status == OpStatus::Conflict {
                println!("    {}", op.path.yellow());
                for hint in &op.suggestions {
                    println!("      {}", hint.dimmed());
                }
            }
        }
    }
    if report.failed > 0 {
        println!("  {} {}", "Failed:".bold(), report.failed.to_string().red());
        for op in &report.operations {
            if op.status == OpStatus::Failed {
                println!(
                    "    {} {}",
                    op.path.red(),
                    op.error.as_deref().unwrap_or("")
                );
            }
        }
    }
    if report.skipped > 0 {
        println!("  Skipped: {}", report.skipped);
    }
    if report.cancelled {
        println!("  {}", "Cancelled before completion".yellow());
    }
}
