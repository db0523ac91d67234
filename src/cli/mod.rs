//! CLI layer: argument parsing and dispatch for `push`, `fetch`,
//! `filter-clean`, `filter-smudge`, and `push-state`.
//!
//! This wiring is deliberately narrow: no
//! config-file parsing of its own (it reads through `git config`), no
//! exhaustive flag surface, just enough to drive the library end to end.

pub mod args;

use args::{Cli, Commands, FetchArgs, FilterArgs, PushArgs, PushStateCommands};
use clap::Parser;
use std::io::{Read, Write};

use crate::config::{Context, GitConfigLookup};
use crate::error::GitLobError;
use crate::git::Refspec;
use crate::progress::{self, ProgressEvent};
use crate::provider::basic::BasicProvider;
use crate::provider::smart::SmartProvider;
use crate::provider::SyncProvider;
use crate::push_state::PushStateCache;
use crate::store::Store;
use crate::transfer::TransferCoordinator;

pub fn run() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let repo_path = std::env::current_dir().expect("current directory must be readable");
    let result = dispatch(&cli.command, &repo_path);

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(e.exit_code());
    }
}

fn dispatch(command: &Commands, repo_path: &std::path::Path) -> Result<(), GitLobError> {
    let config = GitConfigLookup::new(repo_path);
    let ctx = Context::new(&config, repo_path);

    match command {
        Commands::Push(args) => cmd_push(&ctx, args),
        Commands::Fetch(args) => cmd_fetch(&ctx, args),
        Commands::FilterClean(args) => cmd_filter_clean(&ctx, args),
        Commands::FilterSmudge(args) => cmd_filter_smudge(&ctx, args),
        Commands::PushState(cmd) => cmd_push_state(&ctx, cmd),
    }
}

/// Drains a progress receiver to stderr, logging a line per event. Meant
/// to run until the sender side is dropped. Takes ownership so the
/// consumer thread is the sole reader and `recv()` returns `None` exactly
/// once the coordinator's sender is dropped.
fn drain_progress(rx: progress::ProgressReceiver) {
    while let Some(event) = rx.recv() {
        match event {
            ProgressEvent::Calculate { desc } => tracing::info!("{desc}"),
            ProgressEvent::TransferBytes { file, done, total, .. } => {
                tracing::debug!("{file}: {done}/{total} bytes");
            }
            ProgressEvent::Skip { file } => tracing::debug!("skip {file}"),
            ProgressEvent::NotFound { file } => tracing::warn!("not found: {file}"),
        }
    }
}

fn cmd_push(ctx: &Context, args: &PushArgs) -> Result<(), GitLobError> {
    let remote = match &args.remote {
        Some(r) => r.clone(),
        None => ctx.default_remote()?,
    };
    let store = Store::new(ctx.store_root()?);
    let push_state_root = ctx.store_root()?.join("state");
    let push_state = PushStateCache::new(push_state_root);
    let basic = BasicProvider::new(ctx.config);
    basic.validate_config(&remote)?;
    let smart;
    let provider: &dyn SyncProvider = if is_smart_provider(ctx, &remote) {
        smart = SmartProvider::new(&basic);
        &smart
    } else {
        &basic
    };
    let coordinator = TransferCoordinator::new(&ctx.repo_path, &store, &push_state, provider);

    let (tx, rx) = progress::channel(progress::DEFAULT_QUEUE_CAPACITY);
    let consumer = std::thread::scope(|scope| {
        let handle = scope.spawn(move || drain_progress(rx));
        for spec in &args.refspecs {
            let refspec = Refspec::parse(spec)?;
            let report = coordinator.push_refspec(&remote, &refspec, args.recheck, args.force, args.dry_run, &tx)?;
            if !report.not_found.is_empty() {
                tracing::warn!(
                    "{} LOB(s) missing locally and remotely, stopped at commit {}",
                    report.not_found.len(),
                    report.incomplete_from.as_deref().unwrap_or("?")
                );
            }
            eprintln!("pushed {} commit(s) to {remote}", report.pushed_commits.len());
        }
        drop(tx);
        handle.join().expect("progress consumer thread panicked");
        Ok::<(), GitLobError>(())
    });
    consumer
}

fn is_smart_provider(ctx: &Context, remote: &str) -> bool {
    ctx.config.get(&format!("remote.{remote}.git-lob-provider")).as_deref() == Some("smart")
}

fn cmd_fetch(ctx: &Context, args: &FetchArgs) -> Result<(), GitLobError> {
    let remote = match &args.remote {
        Some(r) => r.clone(),
        None => ctx.default_remote()?,
    };
    let store = Store::new(ctx.store_root()?);
    let push_state_root = ctx.store_root()?.join("state");
    let push_state = PushStateCache::new(push_state_root);
    let basic = BasicProvider::new(ctx.config);
    basic.validate_config(&remote)?;
    let smart;
    let provider: &dyn SyncProvider = if is_smart_provider(ctx, &remote) {
        smart = SmartProvider::new(&basic);
        &smart
    } else {
        &basic
    };
    let coordinator = TransferCoordinator::new(&ctx.repo_path, &store, &push_state, provider);

    let (tx, rx) = progress::channel(progress::DEFAULT_QUEUE_CAPACITY);
    std::thread::scope(|scope| {
        let handle = scope.spawn(move || drain_progress(rx));
        for spec in &args.refspecs {
            let refspec = Refspec::parse(spec)?;
            let fetched = coordinator.fetch_refspec(&remote, &refspec, args.force, &tx)?;
            eprintln!("fetched {} LOB(s) for {remote}", fetched.len());
        }
        drop(tx);
        handle.join().expect("progress consumer thread panicked");
        Ok(())
    })
}

fn cmd_filter_clean(ctx: &Context, _args: &FilterArgs) -> Result<(), GitLobError> {
    let mut bytes = Vec::new();
    std::io::stdin().read_to_end(&mut bytes)?;

    let store = Store::new(ctx.store_root()?);
    let (sha, _) = store.store_bytes(&bytes[..], ctx.chunk_size())?;
    let placeholder = crate::placeholder::encode(&sha).expect("store_bytes produces a valid sha1 hex digest");
    std::io::stdout().write_all(placeholder.as_bytes())?;
    Ok(())
}

fn cmd_filter_smudge(ctx: &Context, _args: &FilterArgs) -> Result<(), GitLobError> {
    let mut bytes = Vec::new();
    std::io::stdin().read_to_end(&mut bytes)?;

    let store = Store::new(ctx.store_root()?);
    match crate::placeholder::decode(&bytes) {
        Some(sha) => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            store.retrieve_bytes(&sha, &mut lock)?;
            Ok(())
        }
        None => {
            // Not a placeholder (e.g. pre-existing plain file): pass through.
            std::io::stdout().write_all(&bytes)?;
            Ok(())
        }
    }
}

fn cmd_push_state(ctx: &Context, cmd: &PushStateCommands) -> Result<(), GitLobError> {
    let push_state_root = ctx.store_root()?.join("state");
    let push_state = PushStateCache::new(push_state_root);
    match cmd {
        PushStateCommands::List { remote } => {
            for sha in push_state.list_pushed(remote)? {
                println!("{sha}");
            }
            Ok(())
        }
        PushStateCommands::MarkAll { remote } => push_state.mark_all(&ctx.repo_path, remote),
        PushStateCommands::Cleanup { remote } => push_state.cleanup(&ctx.repo_path, remote),
        PushStateCommands::Reset { remote } => push_state.reset(remote),
    }
}
