//! Push-state cache (C5): per-remote sorted set of commit SHAs known fully
//! pushed, with ancestor-consolidation and a per-remote advisory lock.

use crate::error::GitLobError;
use crate::git;
use fs4::fs_std::FileExt;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "push_state_tests.rs"]
mod tests;

/// A push-state cache rooted at `<gitdir>/git-lob/state`.
pub struct PushStateCache {
    state_root: PathBuf,
}

impl PushStateCache {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self { state_root: state_root.into() }
    }

    fn remote_dir(&self, remote: &str) -> PathBuf {
        self.state_root.join("remotes").join(remote)
    }

    fn data_path(&self, remote: &str) -> PathBuf {
        self.remote_dir(remote).join("push_state")
    }

    fn lock_path(&self, remote: &str) -> PathBuf {
        self.remote_dir(remote).join("push_state.lock")
    }

    fn with_lock<T>(&self, remote: &str, f: impl FnOnce() -> Result<T, GitLobError>) -> Result<T, GitLobError> {
        std::fs::create_dir_all(self.remote_dir(remote))?;
        let lock_file = File::create(self.lock_path(remote))?;
        FileExt::lock_exclusive(&lock_file).map_err(GitLobError::Io)?;
        let result = f();
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn read_set(&self, remote: &str) -> Result<BTreeSet<String>, GitLobError> {
        let path = self.data_path(remote);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text.lines().filter(|l| !l.is_empty()).map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(GitLobError::Io(e)),
        }
    }

    fn write_set(&self, remote: &str, set: &BTreeSet<String>) -> Result<(), GitLobError> {
        let dir = self.remote_dir(remote);
        std::fs::create_dir_all(&dir)?;
        let mut text = String::new();
        for sha in set {
            text.push_str(sha);
            text.push('\n');
        }
        let tmp_path = dir.join(format!("push_state.tmp.{}", std::process::id()));
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(text.as_bytes())?;
            f.flush()?;
        }
        std::fs::rename(&tmp_path, self.data_path(remote))?;
        Ok(())
    }

    /// Idempotently inserts `sha`. If `replace_sha` is the direct ancestor
    /// just marked, it is removed in the same write — an incremental
    /// optimization that keeps the set small during a linear walk without
    /// needing a full O(N²) `cleanup`.
    pub fn mark_pushed(&self, remote: &str, sha: &str, replace_sha: Option<&str>) -> Result<(), GitLobError> {
        self.with_lock(remote, || {
            let mut set = self.read_set(remote)?;
            if let Some(old) = replace_sha {
                set.remove(old);
            }
            set.insert(sha.to_string());
            self.write_set(remote, &set)
        })
    }

    pub fn is_pushed(&self, remote: &str, sha: &str) -> Result<bool, GitLobError> {
        Ok(self.read_set(remote)?.contains(sha))
    }

    pub fn list_pushed(&self, remote: &str) -> Result<Vec<String>, GitLobError> {
        Ok(self.read_set(remote)?.into_iter().collect())
    }

    /// Best common ancestor between `ref_` and any SHA in the pushed set,
    /// computed via Git's best-ancestor operation over `{ref_} ∪ pushed`.
    pub fn latest_pushed_ancestor(
        &self,
        repo_path: &Path,
        remote: &str,
        ref_: &str,
    ) -> Result<Option<String>, GitLobError> {
        let pushed = self.read_set(remote)?;
        let mut best: Option<String> = None;
        for sha in &pushed {
            if let Some(base) = git::merge_base(repo_path, ref_, sha)? {
                best = match best {
                    None => Some(base),
                    Some(prev) => {
                        if git::is_ancestor(repo_path, &prev, &base)? {
                            Some(base)
                        } else {
                            Some(prev)
                        }
                    }
                };
            }
        }
        Ok(best)
    }

    /// Eliminates any SHA that is a strict ancestor of another SHA in the
    /// set, and any SHA that is no longer a valid ref. O(N²) in set size.
    pub fn cleanup(&self, repo_path: &Path, remote: &str) -> Result<(), GitLobError> {
        self.with_lock(remote, || {
            let set = self.read_set(remote)?;
            let mut valid: Vec<String> = Vec::new();
            for sha in &set {
                if git::resolve_sha(repo_path, sha).is_ok() {
                    valid.push(sha.clone());
                }
            }
            let mut keep: BTreeSet<String> = valid.iter().cloned().collect();
            for a in &valid {
                for b in &valid {
                    if a != b && git::is_ancestor(repo_path, a, b)? {
                        keep.remove(a);
                    }
                }
            }
            self.write_set(remote, &keep)
        })
    }

    pub fn reset(&self, remote: &str) -> Result<(), GitLobError> {
        self.with_lock(remote, || self.write_set(remote, &BTreeSet::new()))
    }

    /// Seeds the set to the consolidated latest commits of every known ref
    /// — used when a newly-added remote is known to already have
    /// everything, or per the initialization heuristic (empty local store
    /// implies nothing left to push).
    pub fn mark_all(&self, repo_path: &Path, remote: &str) -> Result<(), GitLobError> {
        let refs = git::list_refs(repo_path)?;
        let mut set: BTreeSet<String> = refs.into_iter().map(|r| r.sha).collect();
        self.with_lock(remote, || {
            // Consolidate immediately so the seeded set contains no
            // ancestor-redundant entries.
            let mut keep = set.clone();
            let all: Vec<String> = set.iter().cloned().collect();
            for a in &all {
                for b in &all {
                    if a != b && git::is_ancestor(repo_path, a, b).unwrap_or(false) {
                        keep.remove(a);
                    }
                }
            }
            set = keep;
            self.write_set(remote, &set)
        })
    }

    /// Applies the initialization heuristic: if the local LOB store is
    /// empty, seed every known remote's cache with `mark_all` (nothing to
    /// push implies everything is pushed).
    pub fn apply_init_heuristic_if_store_empty(
        &self,
        repo_path: &Path,
        store_root: &Path,
        remotes: &[String],
    ) -> Result<(), GitLobError> {
        if store_is_empty(store_root) {
            for remote in remotes {
                self.mark_all(repo_path, remote)?;
            }
        }
        Ok(())
    }
}

fn store_is_empty(store_root: &Path) -> bool {
    match std::fs::read_dir(store_root) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
