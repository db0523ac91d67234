//! Argument structs for the narrow command set the CLI actually wires up:
//! `push`, `fetch`, `filter-clean`, `filter-smudge`, `push-state`.
//!
//! Help text, exhaustive flag sets, and full process-level argument
//! dispatch are out of scope; this exists to exercise the
//! library's operations by hand and from integration tests.

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "git-lob",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATETIME"), ")"),
    about = "Externalize large binary objects from Git history"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload LOBs referenced by new commits to a remote.
    Push(PushArgs),

    /// Download LOBs needed to check out a refspec.
    Fetch(FetchArgs),

    /// Git filter-driver "clean": stdin bytes in, placeholder line out.
    #[command(name = "filter-clean")]
    FilterClean(FilterArgs),

    /// Git filter-driver "smudge": placeholder in, reconstructed bytes out.
    #[command(name = "filter-smudge")]
    FilterSmudge(FilterArgs),

    /// Inspect or reset a remote's push-state cache.
    #[command(name = "push-state", subcommand)]
    PushState(PushStateCommands),
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Remote name; defaults to the current branch's configured remote.
    #[arg(long)]
    pub remote: Option<String>,

    /// Refspec(s) to push: a ref, or an `a..b` range. Defaults to HEAD.
    #[arg(default_value = "HEAD")]
    pub refspecs: Vec<String>,

    /// Ignore the push-state cache and rescan from the ref's tip.
    #[arg(long)]
    pub recheck: bool,

    /// Re-upload every LOB even if the remote already has a same-sized copy.
    #[arg(long)]
    pub force: bool,

    /// Scan and report what would be pushed without uploading.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[arg(long)]
    pub remote: Option<String>,

    #[arg(default_value = "HEAD")]
    pub refspecs: Vec<String>,

    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// The path Git passes via `%f`; unused beyond logging, since clean/smudge
    /// are stateless byte transforms over stdin/stdout.
    pub path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PushStateCommands {
    /// List SHAs recorded as pushed to a remote.
    List { remote: String },

    /// Seed a remote's push-state from every known ref's tip.
    MarkAll { remote: String },

    /// Eliminate ancestor-redundant and invalid SHAs.
    Cleanup { remote: String },

    /// Clear a remote's push-state entirely.
    Reset { remote: String },
}
