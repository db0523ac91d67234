//! Transfer coordinator (C7): drives push/fetch by combining the history
//! scanner (C4), the push-state cache (C5), the LOB store (C1), and a sync
//! provider (C6), publishing progress events (C8) as it goes.

use crate::git;
use crate::error::GitLobError;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::provider::{SyncProvider, TransferKind};
use crate::push_state::PushStateCache;
use crate::scanner::{CommitLobRefs, HistoryScanner, PathFilter, ScanDirection};
use crate::store::Store;
use std::path::Path;

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;

/// A single unit of push/fetch work: one commit's worth of LOB chunk/meta
/// relative paths, resolved by C1.
#[derive(Clone, Debug)]
struct CommitFileSet {
    commit_sha: String,
    relpaths: Vec<String>,
    complete: bool,
}

fn meta_relpath(sha: &str) -> String {
    format!("{}/{}/{}/meta", &sha[0..2], &sha[2..4], &sha[4..])
}

fn resolve_commit_files(
    store: &Store,
    commit: &CommitLobRefs,
) -> Result<CommitFileSet, GitLobError> {
    let mut relpaths = Vec::new();
    let mut complete = true;
    for sha in &commit.lob_shas {
        match store.read_meta(sha) {
            Ok(info) => {
                relpaths.push(meta_relpath(sha));
                relpaths.extend(store.list_chunk_paths(&info));
            }
            Err(GitLobError::NotFoundForShas { .. }) => {
                complete = false;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(CommitFileSet { commit_sha: commit.commit_sha.clone(), relpaths, complete })
}

/// Outcome of a push for a single refspec.
#[derive(Clone, Debug, Default)]
pub struct PushReport {
    pub pushed_commits: Vec<String>,
    pub not_found: Vec<String>,
    pub incomplete_from: Option<String>,
}

pub struct TransferCoordinator<'a> {
    repo_path: &'a Path,
    store: &'a Store,
    push_state: &'a PushStateCache,
    provider: &'a dyn SyncProvider,
}

impl<'a> TransferCoordinator<'a> {
    pub fn new(
        repo_path: &'a Path,
        store: &'a Store,
        push_state: &'a PushStateCache,
        provider: &'a dyn SyncProvider,
    ) -> Self {
        Self { repo_path, store, push_state, provider }
    }

    /// Pushes one refspec to `remote`. `recheck` skips the push-state
    /// lookup and walks from the ref's tip; an explicit `a..b` range
    /// bypasses the ancestor lookup entirely. `dry_run` performs the scan
    /// and emits events but mutates nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn push_refspec(
        &self,
        remote: &str,
        refspec: &git::Refspec,
        recheck: bool,
        force: bool,
        dry_run: bool,
        progress: &ProgressSender,
    ) -> Result<PushReport, GitLobError> {
        progress.send(ProgressEvent::Calculate { desc: format!("scanning {}", refspec.render()) });

        let scanner = HistoryScanner::new(self.repo_path);
        let (from, to) = match (&refspec.range_op, &refspec.ref2) {
            (Some(git::RangeOp::DotDot), Some(to)) => (Some(refspec.ref1.clone()), to.clone()),
            (None, None) => {
                let tip = refspec.ref1.clone();
                let ancestor = if recheck {
                    None
                } else {
                    self.push_state.latest_pushed_ancestor(self.repo_path, remote, &tip)?
                };
                (ancestor, tip)
            }
            _ => {
                return Err(GitLobError::Usage(format!(
                    "push only accepts a single ref or an a..b range, got {}",
                    refspec.render()
                )));
            }
        };

        let commits = scanner.diff_scan(from.as_deref(), &to, ScanDirection::Additions, &PathFilter::default())?;

        let mut report = PushReport::default();
        let mut uploaded_paths: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut previous_pushed: Option<String> = from.clone();

        for commit in &commits {
            if report.incomplete_from.is_some() {
                break;
            }
            let mut file_set = resolve_commit_files(self.store, commit)?;
            if !file_set.complete {
                let missing: Vec<&String> = commit
                    .lob_shas
                    .iter()
                    .filter(|sha| self.store.read_meta(sha).is_err())
                    .collect();
                let mut all_present_remotely = true;
                for sha in &missing {
                    if !self.probe_remote_has_lob(remote, sha)? {
                        all_present_remotely = false;
                        report.not_found.push((*sha).clone());
                    }
                }
                if all_present_remotely {
                    file_set.complete = true;
                } else {
                    report.incomplete_from = Some(commit.commit_sha.clone());
                    break;
                }
            }

            if dry_run {
                report.pushed_commits.push(file_set.commit_sha.clone());
                previous_pushed = Some(file_set.commit_sha.clone());
                continue;
            }

            let to_send: Vec<String> = if force {
                let fresh: Vec<String> = file_set
                    .relpaths
                    .iter()
                    .filter(|p| !uploaded_paths.contains(*p))
                    .cloned()
                    .collect();
                for p in &fresh {
                    uploaded_paths.insert(p.clone());
                }
                fresh
            } else {
                file_set.relpaths.clone()
            };

            self.provider.upload(remote, &to_send, self.store.root(), force, &mut |file, kind, done, total| {
                let event = match kind {
                    TransferKind::Transfer => ProgressEvent::TransferBytes {
                        file: file.to_string(),
                        done,
                        total,
                        overall_done: done,
                        overall_total: total,
                    },
                    TransferKind::Skip => ProgressEvent::Skip { file: file.to_string() },
                    TransferKind::NotFound => ProgressEvent::NotFound { file: file.to_string() },
                };
                progress.send(event);
                false
            })?;

            self.push_state.mark_pushed(remote, &file_set.commit_sha, previous_pushed.as_deref())?;
            previous_pushed = Some(file_set.commit_sha.clone());
            report.pushed_commits.push(file_set.commit_sha.clone());
        }

        if !dry_run {
            self.push_state.cleanup(self.repo_path, remote)?;
        }
        Ok(report)
    }

    fn probe_remote_has_lob(&self, remote: &str, sha: &str) -> Result<bool, GitLobError> {
        match self.store.read_meta(sha) {
            Ok(info) => self.probe_chunks_present(remote, &info),
            Err(GitLobError::NotFoundForShas { .. }) => self.probe_remote_only_lob(remote, sha),
            Err(e) => Err(e),
        }
    }

    /// Local meta is missing, so the chunk layout (`num_chunks`/`chunk_size`)
    /// has to be learned from the remote's own meta file before chunk
    /// presence can be confirmed. Downloads that meta file to a scratch
    /// location under the store root, parses it, and cleans up — nothing
    /// is left behind in the local store by a probe.
    fn probe_remote_only_lob(&self, remote: &str, sha: &str) -> Result<bool, GitLobError> {
        let meta_rel = meta_relpath(sha);
        let probe_dir = self.store.root().join(format!("tempdownload-probe-{}", std::process::id()));
        let mut no_op = |_: &str, _: TransferKind, _: u64, _: u64| false;
        let download_result = self.provider.download(remote, &[meta_rel.clone()], &probe_dir, false, &mut no_op);

        let info = match download_result {
            Ok(()) => {
                let text = std::fs::read_to_string(probe_dir.join(&meta_rel))?;
                crate::store::LobInfo::parse_meta_text(&text)
            }
            Err(GitLobError::NotFoundForShas { .. }) => None,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&probe_dir);
                return Err(e);
            }
        };
        let _ = std::fs::remove_dir_all(&probe_dir);

        match info {
            Some(info) => self.probe_chunks_present(remote, &info),
            None => Ok(false),
        }
    }

    fn probe_chunks_present(&self, remote: &str, info: &crate::store::LobInfo) -> Result<bool, GitLobError> {
        let meta_rel = meta_relpath(&info.sha);
        if !self.provider.file_exists(remote, &meta_rel)? {
            return Ok(false);
        }
        for (i, relpath) in self.store.list_chunk_paths(info).into_iter().enumerate() {
            let expected = info.expected_chunk_size(i as u32);
            if !self.provider.file_exists_and_is_of_size(remote, &relpath, expected)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fetches everything needed to check out `refspec`: meta first, then
    /// chunks, verifying each through C1.
    pub fn fetch_refspec(
        &self,
        remote: &str,
        refspec: &git::Refspec,
        force: bool,
        progress: &ProgressSender,
    ) -> Result<Vec<String>, GitLobError> {
        progress.send(ProgressEvent::Calculate { desc: format!("scanning {}", refspec.render()) });
        let scanner = HistoryScanner::new(self.repo_path);
        let shas = scanner.all_lobs_to_checkout_in_refspec(refspec)?;

        let mut fetched = Vec::new();
        for sha in &shas {
            if self.store.verify(sha)? == crate::store::VerifyResult::Ok {
                progress.send(ProgressEvent::Skip { file: sha.clone() });
                continue;
            }
            self.provider.download(remote, &[meta_relpath(sha)], self.store.root(), force, &mut |file, kind, done, total| {
                let event = match kind {
                    TransferKind::Transfer => {
                        ProgressEvent::TransferBytes { file: file.to_string(), done, total, overall_done: done, overall_total: total }
                    }
                    TransferKind::Skip => ProgressEvent::Skip { file: file.to_string() },
                    TransferKind::NotFound => ProgressEvent::NotFound { file: file.to_string() },
                };
                progress.send(event);
                false
            })?;
            let info = self.store.read_meta(sha)?;
            let chunk_paths = self.store.list_chunk_paths(&info);
            self.provider.download(remote, &chunk_paths, self.store.root(), force, &mut |file, kind, done, total| {
                let event = match kind {
                    TransferKind::Transfer => {
                        ProgressEvent::TransferBytes { file: file.to_string(), done, total, overall_done: done, overall_total: total }
                    }
                    TransferKind::Skip => ProgressEvent::Skip { file: file.to_string() },
                    TransferKind::NotFound => ProgressEvent::NotFound { file: file.to_string() },
                };
                progress.send(event);
                false
            })?;
            if self.store.verify_full(sha)? != crate::store::VerifyResult::Ok {
                return Err(GitLobError::Integrity { sha: sha.clone(), reason: "fetched content failed verification".to_string() });
            }
            fetched.push(sha.clone());
        }
        Ok(fetched)
    }
}
