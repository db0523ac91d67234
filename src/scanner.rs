//! History scanner (C4): turns refspecs into ordered commit→{LOB SHA} sets
//! via diff scanning and tree snapshotting, with include/exclude path
//! filtering layered on top of the raw Git Interface primitives.

use crate::error::GitLobError;
use crate::git::{self, DiffDirection, Refspec};
use std::path::Path;

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;

/// Path include/exclude filter applied per changed file.
#[derive(Clone, Debug, Default)]
pub struct PathFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl PathFilter {
    fn matches(&self, path: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        if self.exclude.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanDirection {
    Additions,
    Removals,
    Both,
}

/// One commit's worth of LOB references discovered by a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitLobRefs {
    pub commit_sha: String,
    pub lob_shas: Vec<String>,
}

pub struct HistoryScanner<'a> {
    repo_path: &'a Path,
}

impl<'a> HistoryScanner<'a> {
    pub fn new(repo_path: &'a Path) -> Self {
        Self { repo_path }
    }

    /// Enumerates commits that changed a placeholder between `(from, to]`,
    /// ancestor-first. `direction` selects additions, removals, or both;
    /// `filter` restricts by path, choosing the b-side filename for
    /// additions and the a-side for removals (merge diffs carry a single
    /// filename already, handled by [`git::stream_placeholder_diff`]).
    pub fn diff_scan(
        &self,
        from: Option<&str>,
        to: &str,
        direction: ScanDirection,
        filter: &PathFilter,
    ) -> Result<Vec<CommitLobRefs>, GitLobError> {
        let records = git::stream_placeholder_diff(self.repo_path, from, to)?;
        let mut out = Vec::new();
        for rec in records {
            let mut shas = Vec::new();
            for change in &rec.changes {
                let direction_matches = match direction {
                    ScanDirection::Additions => change.direction == DiffDirection::Added,
                    ScanDirection::Removals => change.direction == DiffDirection::Removed,
                    ScanDirection::Both => true,
                };
                if direction_matches && filter.matches(&change.path) {
                    shas.push(change.sha.clone());
                }
            }
            if !shas.is_empty() {
                out.push(CommitLobRefs { commit_sha: rec.commit_sha, lob_shas: shas });
            }
        }
        Ok(out)
    }

    /// All LOB SHAs referenced by files present at `commit`, regardless of
    /// when they were introduced.
    pub fn snapshot_scan(&self, commit: &str) -> Result<Vec<String>, GitLobError> {
        let blobs = git::snapshot_placeholder_blobs(self.repo_path, commit)?;
        let mut shas: Vec<String> = blobs.into_iter().map(|(_, sha)| sha).collect();
        shas.sort();
        shas.dedup();
        Ok(shas)
    }

    /// For a single ref, equals `snapshot(ref)`. For an `a..b` range,
    /// equals `snapshot(b) ∪ removals(a..b)` — the removals capture LOBs
    /// that used to be present somewhere in the range but are absent at
    /// `b`. Only `..` ranges are accepted; `...` is rejected here.
    pub fn all_lobs_to_checkout_in_refspec(&self, refspec: &Refspec) -> Result<Vec<String>, GitLobError> {
        match (&refspec.range_op, &refspec.ref2) {
            (None, None) => self.snapshot_scan(&refspec.ref1),
            (Some(git::RangeOp::DotDot), Some(to)) => {
                let mut shas = self.snapshot_scan(to)?;
                let removals = self.diff_scan(
                    Some(&refspec.ref1),
                    to,
                    ScanDirection::Removals,
                    &PathFilter::default(),
                )?;
                for rec in removals {
                    shas.extend(rec.lob_shas);
                }
                shas.sort();
                shas.dedup();
                Ok(shas)
            }
            _ => Err(GitLobError::Usage(format!(
                "only a single ref or an a..b range is accepted, got {}",
                refspec.render()
            ))),
        }
    }

    /// Snapshot at `commit` plus removals from `log --since=<days> commit`
    /// (looking backwards), used by fetch to pre-populate LOBs needed for
    /// nearby checkouts.
    pub fn recent_ancestors(&self, commit: &str, days: u32) -> Result<Vec<String>, GitLobError> {
        let mut shas = self.snapshot_scan(commit)?;
        let within_window = git::first_parent_log_since(self.repo_path, commit, days)?;
        if let Some(oldest) = within_window.last() {
            if oldest != commit {
                let removals =
                    self.diff_scan(Some(oldest), commit, ScanDirection::Removals, &PathFilter::default())?;
                for rec in removals {
                    shas.extend(rec.lob_shas);
                }
            }
        }
        shas.sort();
        shas.dedup();
        Ok(shas)
    }

    /// Unions diff-scan output across multiple refspecs without re-walking
    /// shared ancestors twice, deduping by commit SHA. Used by the
    /// multi-refspec push path.
    pub fn scan_many(
        &self,
        refspecs: &[(Option<String>, String)],
        direction: ScanDirection,
        filter: &PathFilter,
    ) -> Result<Vec<CommitLobRefs>, GitLobError> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (from, to) in refspecs {
            for rec in self.diff_scan(from.as_deref(), to, direction, filter)? {
                if seen.insert(rec.commit_sha.clone()) {
                    out.push(rec);
                }
            }
        }
        Ok(out)
    }
}
