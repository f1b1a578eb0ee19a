//! pathwatch - serialized filesystem operations and live tree mirroring.
//!
//! Usage:
//!   pathwatch watch [PATH]            Mirror a directory, printing updates
//!   pathwatch snapshot [PATH]         One-shot sorted tree listing
//!   pathwatch snapshot -f json [PATH] Same, as JSON
//!   pathwatch --help                  Show help

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};

use pathwatch_core::{Initiator, PathElement};
use pathwatch_io::{FsScheduler, ThreadExecutor, TokioExecutor};
use pathwatch_model::{ChannelReporter, DirectoryModel, ModelEvent, TreeMirror, watch_tree};

#[derive(Parser)]
#[command(
    name = "pathwatch",
    version,
    about = "Watch directories and mirror them as a live tree model",
    long_about = "pathwatch keeps an in-memory tree model of a directory in sync\n\
                  with the filesystem, printing every observed creation, deletion,\n\
                  and modification as it happens."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a directory and print typed updates until interrupted
    Watch {
        /// Directory to mirror
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Take a one-shot sorted snapshot of a tree
    Snapshot {
        /// Root to snapshot
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Watch { path } => run_watch(&path),
        Command::Snapshot { path, format } => run_snapshot(&path, format),
    }
}

/// Mirror a directory: seed the model from a snapshot, re-snapshot on every
/// notification batch, print every update, shut down cleanly on Ctrl-C.
fn run_watch(path: &Path) -> Result<()> {
    let root = path.canonicalize().context("Invalid path")?;

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let scheduler = FsScheduler::new(Arc::new(TokioExecutor::current()))?;

    let (reporter, updates) = ChannelReporter::new();
    let model = Arc::new(Mutex::new(DirectoryModel::new(&root, Arc::new(reporter))));

    // Print updates on their own thread so slow output never backs up the
    // consumer context.
    let printer = std::thread::spawn(move || {
        while let Ok(event) = updates.recv() {
            match event {
                ModelEvent::Update(update) => println!("{update}"),
                ModelEvent::Error(error) => eprintln!("model error: {error}"),
            }
        }
    });

    scheduler.subscribe_errors(|error| {
        tracing::warn!(%error, "watch error");
    });

    let external = Initiator::external();
    let mirror = TreeMirror::new(scheduler.clone(), Arc::clone(&model), external.clone());
    scheduler.subscribe_events(move |event| mirror.handle_event(&event));

    // Seed the model and the watch set from an initial snapshot.
    let initial = runtime.block_on(async {
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler
            .tree_snapshot(root.clone(), move |result| {
                let _ = tx.send(result);
            })
            .map_err(|e| eyre!(e))?;
        rx.await.map_err(|_| eyre!("scheduler dropped the snapshot"))
    })??;
    if !initial.is_directory {
        return Err(eyre!("{} is not a directory", root.display()));
    }
    model
        .lock()
        .expect("model lock poisoned")
        .sync(&initial, Some(&external));
    watch_tree(&scheduler, &initial);

    eprintln!("Watching {} (Ctrl-C to stop)", root.display());
    runtime.block_on(tokio::signal::ctrl_c())?;

    eprintln!("Shutting down...");
    scheduler.shutdown();
    runtime.block_on(async {
        for _ in 0..200 {
            if scheduler.is_shutdown_complete() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        Err(eyre!("worker did not terminate in time"))
    })?;

    drop(model);
    drop(printer);
    Ok(())
}

/// Take one snapshot through the scheduler and print it.
fn run_snapshot(path: &Path, format: OutputFormat) -> Result<()> {
    let root = path.canonicalize().context("Invalid path")?;

    let scheduler = FsScheduler::new(Arc::new(ThreadExecutor::new()))?;
    let (tx, rx) = std::sync::mpsc::channel();
    scheduler
        .tree_snapshot(root, move |result| {
            let _ = tx.send(result);
        })
        .map_err(|e| eyre!(e))?;
    let element = rx
        .recv_timeout(Duration::from_secs(30))
        .context("Snapshot timed out")??;
    scheduler.shutdown();

    match format {
        OutputFormat::Text => print_element(&element, 0),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&element)?),
    }
    Ok(())
}

/// Print an element and its children as an indented tree.
fn print_element(element: &PathElement, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = if depth == 0 {
        element.path.display().to_string()
    } else {
        element.name()
    };
    let dir_marker = if element.is_directory { "/" } else { "" };
    println!("{indent}{name}{dir_marker}");
    for child in &element.children {
        print_element(child, depth + 1);
    }
}
