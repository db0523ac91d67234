//! # git-lob — large binary object externalization for Git
//!
//! Content-addressed local object store for large binary objects referenced
//! from Git history via a fixed-width placeholder, synchronized to
//! pluggable remotes, with a push-state cache that tracks per-remote
//! propagation so repeated pushes don't rescan the whole history.
//!
//! ## Library usage
//!
//! This crate is primarily a CLI tool invoked as a Git filter driver and
//! push/fetch companion, but every component (store, scanner, push-state
//! cache, provider contract, transfer coordinator, progress channel) is a
//! plain library API usable independently of the CLI.

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod placeholder;
pub mod progress;
pub mod provider;
pub mod push_state;
pub mod scanner;
pub mod store;
pub mod transfer;
