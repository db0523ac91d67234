//! Sync provider contract (C6): the single extension point for transports.
//! Avoids a deep hierarchy in favor of one trait and two capability
//! variants (`basic`, `smart`) selected at runtime by name.

use crate::error::GitLobError;
use std::path::Path;

pub mod basic;
pub mod smart;

/// What kind of progress event a transfer produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Transfer,
    Skip,
    NotFound,
}

/// Invoked per file during upload/download. Returns `true` to request
/// cancellation — the coordinator lets the current file finish (crash
/// safety) but stops enqueuing further work.
pub type ProgressCallback<'a> = dyn FnMut(&str, TransferKind, u64, u64) -> bool + 'a;

/// Every transport variant must satisfy this contract. `basic` models a
/// dumb filesystem/mountpoint; `smart` can consult the remote for
/// already-present files before transferring (see [`smart::SmartProvider`]).
pub trait SyncProvider {
    fn type_id(&self) -> &'static str;

    fn validate_config(&self, remote_name: &str) -> Result<(), GitLobError>;

    /// Uploads `relpaths` (relative to `base_dir`). With `force=true`, every
    /// path is sent even if the remote already has a same-sized copy
    /// (letting the coordinator dedupe instead). With `force=false`, the
    /// provider may skip a file when the remote size already matches.
    fn upload(
        &self,
        remote_name: &str,
        relpaths: &[String],
        base_dir: &Path,
        force: bool,
        progress: &mut ProgressCallback,
    ) -> Result<(), GitLobError>;

    fn download(
        &self,
        remote_name: &str,
        relpaths: &[String],
        to_dir: &Path,
        force: bool,
        progress: &mut ProgressCallback,
    ) -> Result<(), GitLobError>;

    fn file_exists(&self, remote_name: &str, relpath: &str) -> Result<bool, GitLobError>;

    fn file_exists_and_is_of_size(&self, remote_name: &str, relpath: &str, size: u64) -> Result<bool, GitLobError>;
}
