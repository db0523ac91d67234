//! Smart provider: wraps a transport capable of consulting the remote for
//! already-present files before transfer, via a manifest file the remote
//! maintains of `relpath size` pairs. Falls back to per-file existence
//! checks when not present, so a remote without a manifest still works —
//! it just can't batch the presence check.

use super::{ProgressCallback, SyncProvider, TransferKind};
use crate::error::GitLobError;
use std::collections::HashMap;
use std::path::Path;

#[cfg(test)]
#[path = "smart_tests.rs"]
mod tests;

const MANIFEST_RELPATH: &str = "git-lob-manifest";

pub struct SmartProvider<'a> {
    inner: &'a dyn SyncProvider,
}

impl<'a> SmartProvider<'a> {
    pub fn new(inner: &'a dyn SyncProvider) -> Self {
        Self { inner }
    }

    /// Reads the remote's manifest of already-present files, if any. A
    /// missing manifest is not an error — it just means no batch
    /// presence-check is available this run.
    fn read_manifest(&self, remote_name: &str, base_dir: &Path) -> Option<HashMap<String, u64>> {
        if !self.inner.file_exists(remote_name, MANIFEST_RELPATH).ok()? {
            return None;
        }
        let tmp = tempfile_dir();
        let mut no_op = |_: &str, _: TransferKind, _: u64, _: u64| false;
        self.inner
            .download(remote_name, &[MANIFEST_RELPATH.to_string()], &tmp, false, &mut no_op)
            .ok()?;
        let text = std::fs::read_to_string(tmp.join(MANIFEST_RELPATH)).ok()?;
        let _ = base_dir;
        let mut map = HashMap::new();
        for line in text.lines() {
            if let Some((path, size)) = line.rsplit_once(' ') {
                if let Ok(size) = size.parse::<u64>() {
                    map.insert(path.to_string(), size);
                }
            }
        }
        Some(map)
    }
}

fn tempfile_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("git-lob-manifest-{}", std::process::id()))
}

impl<'a> SyncProvider for SmartProvider<'a> {
    fn type_id(&self) -> &'static str {
        "smart"
    }

    fn validate_config(&self, remote_name: &str) -> Result<(), GitLobError> {
        self.inner.validate_config(remote_name)
    }

    fn upload(
        &self,
        remote_name: &str,
        relpaths: &[String],
        base_dir: &Path,
        force: bool,
        progress: &mut ProgressCallback,
    ) -> Result<(), GitLobError> {
        let manifest = self.read_manifest(remote_name, base_dir);
        let to_send: Vec<String> = match (&manifest, force) {
            (_, true) => relpaths.to_vec(),
            (Some(m), false) => relpaths
                .iter()
                .filter(|p| {
                    let local_size = std::fs::metadata(base_dir.join(p)).map(|m| m.len()).unwrap_or(0);
                    !m.get(*p).is_some_and(|remote_size| *remote_size == local_size)
                })
                .cloned()
                .collect(),
            (None, false) => relpaths.to_vec(),
        };
        for p in relpaths {
            if !to_send.contains(p) {
                let size = std::fs::metadata(base_dir.join(p)).map(|m| m.len()).unwrap_or(0);
                if progress(p, TransferKind::Skip, size, size) {
                    return Ok(());
                }
            }
        }
        self.inner.upload(remote_name, &to_send, base_dir, force, progress)
    }

    fn download(
        &self,
        remote_name: &str,
        relpaths: &[String],
        to_dir: &Path,
        force: bool,
        progress: &mut ProgressCallback,
    ) -> Result<(), GitLobError> {
        self.inner.download(remote_name, relpaths, to_dir, force, progress)
    }

    fn file_exists(&self, remote_name: &str, relpath: &str) -> Result<bool, GitLobError> {
        self.inner.file_exists(remote_name, relpath)
    }

    fn file_exists_and_is_of_size(&self, remote_name: &str, relpath: &str, size: u64) -> Result<bool, GitLobError> {
        self.inner.file_exists_and_is_of_size(remote_name, relpath, size)
    }
}
