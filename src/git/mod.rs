//! Git subprocess façade (C3) — everything the rest of the crate knows about
//! invoking `git` lives here. Every public function either runs to
//! completion and returns parsed output, or streams a long-running
//! subcommand's stdout line-by-line so a caller can process a large history
//! without buffering it.
//!
//! All invocations are read-only except the index refresh performed by the
//! filter commands elsewhere in the crate.

use crate::error::GitLobError;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;

/// Rare Unicode separators used in custom `git log --format=` output so a
/// field boundary can never collide with content a user typed into a
/// commit subject.
pub const FIELD_SEP: char = '\u{241F}';
pub const RECORD_SEP: char = '\u{241E}';

fn run_git(repo_path: &Path, args: &[&str]) -> Result<String, GitLobError> {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .map_err(|e| GitLobError::Git {
            command: args.join(" "),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(GitLobError::Git {
            command: args.join(" "),
            exit_status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    String::from_utf8(output.stdout).map_err(|e| GitLobError::Git {
        command: args.join(" "),
        exit_status: 0,
        stderr: format!("non-UTF-8 output: {e}"),
    })
}

/// Spawns `git <args>` with piped stdout for line-by-line streaming, used by
/// scans over potentially large histories so the whole log never has to be
/// buffered in memory.
pub struct GitLineStream {
    child: Child,
    reader: BufReader<std::process::ChildStdout>,
    command: String,
}

impl GitLineStream {
    fn spawn(repo_path: &Path, args: &[&str]) -> Result<Self, GitLobError> {
        let mut child = Command::new("git")
            .current_dir(repo_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitLobError::Git {
                command: args.join(" "),
                exit_status: -1,
                stderr: e.to_string(),
            })?;
        let stdout = child.stdout.take().expect("piped stdout");
        Ok(Self {
            child,
            reader: BufReader::new(stdout),
            command: args.join(" "),
        })
    }

    /// Returns the next line (newline stripped), or `None` at end of output.
    pub fn next_line(&mut self) -> Result<Option<String>, GitLobError> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).map_err(|e| GitLobError::Git {
            command: self.command.clone(),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
        if n == 0 {
            return Ok(None);
        }
        if buf.ends_with('\n') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    /// Waits for the subprocess to exit and surfaces a structured error if
    /// it failed. Must be called after the caller is done reading lines.
    pub fn finish(mut self) -> Result<(), GitLobError> {
        let status = self.child.wait().map_err(|e| GitLobError::Git {
            command: self.command.clone(),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut s) = self.child.stderr.take() {
                use std::io::Read;
                let _ = s.read_to_string(&mut stderr);
            }
            return Err(GitLobError::Git {
                command: self.command,
                exit_status: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Resolves `<gitdir>` for the repository at `repo_path`.
pub fn git_dir(repo_path: &Path) -> Result<PathBuf, GitLobError> {
    let out = run_git(repo_path, &["rev-parse", "--git-dir"])?;
    let dir = PathBuf::from(out.trim());
    Ok(if dir.is_absolute() { dir } else { repo_path.join(dir) })
}

/// Current branch name, resolved once per process by the caller (branch
/// cannot change mid-run).
pub fn current_branch(repo_path: &Path) -> Result<String, GitLobError> {
    let out = run_git(repo_path, &["symbolic-ref", "--short", "HEAD"])?;
    Ok(out.trim().to_string())
}

/// Resolves any ref-like string to a full 40-char commit SHA.
pub fn resolve_sha(repo_path: &Path, refname: &str) -> Result<String, GitLobError> {
    let out = run_git(repo_path, &["rev-parse", "--verify", &format!("{refname}^{{commit}}")])?;
    Ok(out.trim().to_string())
}

/// Ancestor test: is `ancestor` an ancestor of (or equal to) `descendant`?
pub fn is_ancestor(repo_path: &Path, ancestor: &str, descendant: &str) -> Result<bool, GitLobError> {
    let status = Command::new("git")
        .current_dir(repo_path)
        .args(["merge-base", "--is-ancestor", ancestor, descendant])
        .status()
        .map_err(|e| GitLobError::Git {
            command: "merge-base --is-ancestor".to_string(),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
    match status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(GitLobError::Git {
            command: "merge-base --is-ancestor".to_string(),
            exit_status: status.code().unwrap_or(-1),
            stderr: format!("{ancestor}..{descendant}"),
        }),
    }
}

/// Best common ancestor of `a` and `b` (used by the push-state cache's
/// `latest_pushed_ancestor` to compute a best-ancestor over a union set).
pub fn merge_base(repo_path: &Path, a: &str, b: &str) -> Result<Option<String>, GitLobError> {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(["merge-base", a, b])
        .output()
        .map_err(|e| GitLobError::Git {
            command: "merge-base".to_string(),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
    if output.status.success() {
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if sha.is_empty() { None } else { Some(sha) })
    } else {
        // No common ancestor is exit status 1 with empty stdout, not an error.
        match output.status.code() {
            Some(1) => Ok(None),
            code => Err(GitLobError::Git {
                command: "merge-base".to_string(),
                exit_status: code.unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

// ─── Refspecs ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeOp {
    DotDot,
    DotDotDot,
}

impl RangeOp {
    fn as_str(self) -> &'static str {
        match self {
            RangeOp::DotDot => "..",
            RangeOp::DotDotDot => "...",
        }
    }
}

/// A parsed refspec: either a single ref or a two-ended range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Refspec {
    pub ref1: String,
    pub range_op: Option<RangeOp>,
    pub ref2: Option<String>,
}

impl Refspec {
    /// Parses `"ref"`, `"a..b"`, or `"a...b"`. Any other shape is a usage error.
    pub fn parse(s: &str) -> Result<Self, GitLobError> {
        if let Some(idx) = s.find("...") {
            let (a, rest) = s.split_at(idx);
            let b = &rest[3..];
            if a.is_empty() || b.is_empty() {
                return Err(GitLobError::Usage(format!("malformed refspec: {s}")));
            }
            return Ok(Refspec {
                ref1: a.to_string(),
                range_op: Some(RangeOp::DotDotDot),
                ref2: Some(b.to_string()),
            });
        }
        if let Some(idx) = s.find("..") {
            let (a, rest) = s.split_at(idx);
            let b = &rest[2..];
            if a.is_empty() || b.is_empty() {
                return Err(GitLobError::Usage(format!("malformed refspec: {s}")));
            }
            return Ok(Refspec {
                ref1: a.to_string(),
                range_op: Some(RangeOp::DotDot),
                ref2: Some(b.to_string()),
            });
        }
        if s.is_empty() {
            return Err(GitLobError::Usage("empty refspec".to_string()));
        }
        Ok(Refspec { ref1: s.to_string(), range_op: None, ref2: None })
    }

    pub fn render(&self) -> String {
        match (&self.range_op, &self.ref2) {
            (Some(op), Some(r2)) => format!("{}{}{}", self.ref1, op.as_str(), r2),
            _ => self.ref1.clone(),
        }
    }

    /// True for a bare `a..b` two-dot range (the only range kind the
    /// history scanner's composite operations accept; `...` is rejected by
    /// the caller there).
    pub fn is_two_dot_range(&self) -> bool {
        self.range_op == Some(RangeOp::DotDot)
    }
}

// ─── Refs ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind {
    LocalBranch,
    RemoteBranch,
    LocalTag,
    RemoteTag,
    Head,
    Other,
}

#[derive(Clone, Debug)]
pub struct RefEntry {
    pub name: String,
    pub sha: String,
    pub kind: RefKind,
}

fn classify_ref(name: &str) -> RefKind {
    if name == "HEAD" {
        RefKind::Head
    } else if name.starts_with("refs/heads/") {
        RefKind::LocalBranch
    } else if name.starts_with("refs/remotes/") {
        RefKind::RemoteBranch
    } else if name.starts_with("refs/tags/") {
        RefKind::LocalTag
    } else {
        RefKind::Other
    }
}

/// Lists every ref, deduplicating annotated tags' `^{}` dereference entries
/// down to the commit SHA they point at (so a tag appears once, pointing at
/// a commit, never twice as a tag-object SHA and a commit SHA).
pub fn list_refs(repo_path: &Path) -> Result<Vec<RefEntry>, GitLobError> {
    let out = run_git(repo_path, &["show-ref", "--head", "--dereference"])?;
    let mut by_name: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for line in out.lines() {
        let Some((sha, name)) = line.split_once(' ') else { continue };
        if let Some(base) = name.strip_suffix("^{}") {
            // Dereferenced tag object: overwrite with the commit it points to.
            by_name.insert(base.to_string(), sha.to_string());
        } else if !by_name.contains_key(name) {
            by_name.insert(name.to_string(), sha.to_string());
            order.push(name.to_string());
        }
    }
    Ok(order
        .into_iter()
        .map(|name| {
            let sha = by_name.remove(&name).unwrap();
            let kind = classify_ref(&name);
            RefEntry { name, sha, kind }
        })
        .collect())
}

/// Lists local branch names (no `refs/heads/` prefix).
pub fn list_local_branches(repo_path: &Path) -> Result<Vec<String>, GitLobError> {
    Ok(list_refs(repo_path)?
        .into_iter()
        .filter(|r| r.kind == RefKind::LocalBranch)
        .map(|r| r.name.trim_start_matches("refs/heads/").to_string())
        .collect())
}

/// Lists remote-tracking branch names (no `refs/remotes/` prefix).
pub fn list_remote_branches(repo_path: &Path) -> Result<Vec<String>, GitLobError> {
    Ok(list_refs(repo_path)?
        .into_iter()
        .filter(|r| r.kind == RefKind::RemoteBranch)
        .map(|r| r.name.trim_start_matches("refs/remotes/").to_string())
        .collect())
}

// ─── Commit summaries ───────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct PersonStamp {
    pub name: String,
    pub email: String,
    pub date: String,
}

#[derive(Clone, Debug)]
pub struct CommitSummary {
    pub sha: String,
    pub short_sha: String,
    pub parents: Vec<String>,
    pub author: PersonStamp,
    pub committer: PersonStamp,
    pub subject: String,
}

const SUMMARY_FORMAT: &str =
    "%H\u{241F}%h\u{241F}%P\u{241F}%an\u{241F}%ae\u{241F}%ad\u{241F}%cn\u{241F}%ce\u{241F}%cd\u{241F}%s";

fn parse_summary_record(record: &str) -> Option<CommitSummary> {
    let fields: Vec<&str> = record.split(FIELD_SEP).collect();
    if fields.len() != 10 {
        return None;
    }
    Some(CommitSummary {
        sha: fields[0].to_string(),
        short_sha: fields[1].to_string(),
        parents: fields[2].split_whitespace().map(str::to_string).collect(),
        author: PersonStamp {
            name: fields[3].to_string(),
            email: fields[4].to_string(),
            date: fields[5].to_string(),
        },
        committer: PersonStamp {
            name: fields[6].to_string(),
            email: fields[7].to_string(),
            date: fields[8].to_string(),
        },
        subject: fields[9].to_string(),
    })
}

/// Fetches `{sha, short_sha, parents, author/committer dates+ids, subject}`
/// for a single commit.
pub fn commit_summary(repo_path: &Path, sha: &str) -> Result<CommitSummary, GitLobError> {
    let out = run_git(
        repo_path,
        &["show", "-s", &format!("--format={SUMMARY_FORMAT}"), sha],
    )?;
    parse_summary_record(out.trim_end_matches('\n')).ok_or_else(|| GitLobError::Git {
        command: "show --format".to_string(),
        exit_status: 0,
        stderr: format!("unparsable commit summary for {sha}"),
    })
}

/// Walks first-parent history starting at `start_sha`, batching rev-list
/// output and invoking `callback(current, parent)` for each step in
/// ascending (oldest-first) order. The callback returns `true` to continue
/// or `false` to stop early; the walk returns the number of commits visited.
pub fn walk_first_parent(
    repo_path: &Path,
    start_sha: &str,
    batch_size: usize,
    mut callback: impl FnMut(&str, Option<&str>) -> bool,
) -> Result<usize, GitLobError> {
    let batch_arg = format!("--batch-size={batch_size}");
    let mut stream = GitLineStream::spawn(
        repo_path,
        &[
            "rev-list",
            "--first-parent",
            "--reverse",
            "--parents",
            &batch_arg,
            start_sha,
        ],
    )?;
    let mut visited = 0usize;
    let mut stopped_early = false;
    while let Some(line) = stream.next_line()? {
        let mut parts = line.split_whitespace();
        let Some(current) = parts.next() else { continue };
        let parent = parts.next();
        visited += 1;
        if !callback(current, parent) {
            stopped_early = true;
            break;
        }
    }
    if stopped_early {
        drop(stream);
    } else {
        stream.finish()?;
    }
    Ok(visited)
}

/// Lists first-parent commit SHAs reachable from `commit` within the last
/// `days` days, newest first. Used by the "recent ancestors" scan to bound
/// how far back it looks instead of walking full history.
pub fn first_parent_log_since(repo_path: &Path, commit: &str, days: u32) -> Result<Vec<String>, GitLobError> {
    let since = format!("--since={days}.days.ago");
    let out = run_git(repo_path, &["log", "--first-parent", &since, "--format=%H", commit])?;
    Ok(out.lines().map(str::to_string).collect())
}

// ─── Diff scan primitive ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffDirection {
    Added,
    Removed,
}

#[derive(Clone, Debug)]
pub struct PlaceholderDiffChange {
    pub path: String,
    pub sha: String,
    pub direction: DiffDirection,
}

#[derive(Clone, Debug)]
pub struct CommitDiffRecord {
    pub commit_sha: String,
    pub changes: Vec<PlaceholderDiffChange>,
}

/// Streams a diff-filtered log between `(from, to]`, producing per-commit
/// sets of placeholder additions/removals, without loading the whole range
/// into memory. `from` of `None` means from the root. Both directions are
/// always collected in one pass; callers that want only additions or only
/// removals filter `PlaceholderDiffChange::direction` themselves, carrying
/// the direction flag explicitly rather than relying on a merged regex.
pub fn stream_placeholder_diff(
    repo_path: &Path,
    from: Option<&str>,
    to: &str,
) -> Result<Vec<CommitDiffRecord>, GitLobError> {
    let range = match from {
        Some(f) => format!("{f}..{to}"),
        None => to.to_string(),
    };
    let marker_format = "COMMIT\u{241E}%H".to_string();
    let mut stream = GitLineStream::spawn(
        repo_path,
        &[
            "log",
            "--first-parent",
            "--reverse",
            "-p",
            "--no-color",
            "--no-renames",
            &format!("--format={marker_format}"),
            &range,
        ],
    )?;

    let mut records: Vec<CommitDiffRecord> = Vec::new();
    let mut current: Option<CommitDiffRecord> = None;
    let mut b_path: Option<String> = None;
    let mut a_path: Option<String> = None;

    while let Some(line) = stream.next_line()? {
        if let Some(sha) = line.strip_prefix("COMMIT\u{241E}") {
            if let Some(rec) = current.take() {
                if !rec.changes.is_empty() {
                    records.push(rec);
                }
            }
            current = Some(CommitDiffRecord { commit_sha: sha.to_string(), changes: Vec::new() });
            b_path = None;
            a_path = None;
            continue;
        }
        if let Some(p) = line.strip_prefix("+++ b/") {
            b_path = if p == "/dev/null" { None } else { Some(p.to_string()) };
            continue;
        }
        if let Some(p) = line.strip_prefix("--- a/") {
            a_path = if p == "/dev/null" { None } else { Some(p.to_string()) };
            continue;
        }
        let Some(rec) = current.as_mut() else { continue };
        if let Some(rest) = line.strip_prefix('+') {
            if let Some(sha) = crate::placeholder::decode(rest.as_bytes()) {
                if let Some(path) = b_path.clone().or_else(|| a_path.clone()) {
                    rec.changes.push(PlaceholderDiffChange { path, sha, direction: DiffDirection::Added });
                }
            }
        } else if let Some(rest) = line.strip_prefix('-') {
            if let Some(sha) = crate::placeholder::decode(rest.as_bytes()) {
                if let Some(path) = a_path.clone().or_else(|| b_path.clone()) {
                    rec.changes.push(PlaceholderDiffChange { path, sha, direction: DiffDirection::Removed });
                }
            }
        }
    }
    if let Some(rec) = current.take() {
        if !rec.changes.is_empty() {
            records.push(rec);
        }
    }
    stream.finish()?;
    Ok(records)
}

// ─── Snapshot scan primitive ────────────────────────────────────────

/// Lists every placeholder blob present in the tree at `commit` using a
/// recursive `ls-tree` filtered to exact object size 49, then resolves
/// blob contents via a single batched `cat-file --batch`.
pub fn snapshot_placeholder_blobs(
    repo_path: &Path,
    commit: &str,
) -> Result<Vec<(String, String)>, GitLobError> {
    let ls = run_git(repo_path, &["ls-tree", "-r", "--long", commit])?;
    let mut candidates: Vec<(String, String)> = Vec::new(); // (blob_sha, path)
    for line in ls.lines() {
        // "<mode> blob <sha> <size>\t<path>"
        let Some((meta, path)) = line.split_once('\t') else { continue };
        let fields: Vec<&str> = meta.split_whitespace().collect();
        if fields.len() != 4 || fields[1] != "blob" {
            continue;
        }
        let Ok(size) = fields[3].parse::<usize>() else { continue };
        if size != crate::placeholder::LINE_LEN {
            continue;
        }
        candidates.push((fields[2].to_string(), path.to_string()));
    }
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut child = Command::new("git")
        .current_dir(repo_path)
        .args(["cat-file", "--batch"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| GitLobError::Git {
            command: "cat-file --batch".to_string(),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
    {
        use std::io::Write;
        let mut stdin = child.stdin.take().expect("piped stdin");
        for (blob_sha, _) in &candidates {
            writeln!(stdin, "{blob_sha}").map_err(|e| GitLobError::Git {
                command: "cat-file --batch".to_string(),
                exit_status: -1,
                stderr: e.to_string(),
            })?;
        }
    }
    let mut reader = BufReader::new(child.stdout.take().expect("piped stdout"));
    let mut results = Vec::new();
    for (_blob_sha, path) in &candidates {
        let mut header = String::new();
        if reader.read_line(&mut header).map_err(|e| GitLobError::Git {
            command: "cat-file --batch".to_string(),
            exit_status: -1,
            stderr: e.to_string(),
        })? == 0
        {
            break;
        }
        // "<sha> blob <size>" or "<sha> missing"
        let parts: Vec<&str> = header.trim_end().split_whitespace().collect();
        if parts.len() < 2 || parts[1] != "blob" {
            continue;
        }
        let size: usize = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        let mut content = vec![0u8; size];
        use std::io::Read;
        reader.read_exact(&mut content).map_err(|e| GitLobError::Git {
            command: "cat-file --batch".to_string(),
            exit_status: -1,
            stderr: e.to_string(),
        })?;
        let mut trailing_nl = [0u8; 1];
        let _ = reader.read_exact(&mut trailing_nl);
        if let Some(sha) = crate::placeholder::decode(&content) {
            results.push((path.clone(), sha));
        }
    }
    let status = child.wait().map_err(|e| GitLobError::Git {
        command: "cat-file --batch".to_string(),
        exit_status: -1,
        stderr: e.to_string(),
    })?;
    if !status.success() {
        return Err(GitLobError::Git {
            command: "cat-file --batch".to_string(),
            exit_status: status.code().unwrap_or(-1),
            stderr: String::new(),
        });
    }
    Ok(results)
}

// ─── Push remote / push.default resolution ─────────────────────────

/// `branch.<cur>.remote`, falling back to `origin`.
pub fn default_remote(config: &dyn crate::config::ConfigLookup, current_branch: &str) -> String {
    config
        .get(&format!("branch.{current_branch}.remote"))
        .unwrap_or_else(|| "origin".to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushDefault {
    Matching,
    Current,
    Upstream,
    Simple,
    Nothing,
}

impl PushDefault {
    pub fn from_config(config: &dyn crate::config::ConfigLookup) -> Self {
        match config.get("push.default").as_deref() {
            Some("matching") => PushDefault::Matching,
            Some("current") => PushDefault::Current,
            Some("upstream") | Some("tracking") => PushDefault::Upstream,
            Some("nothing") => PushDefault::Nothing,
            _ => PushDefault::Simple,
        }
    }
}

/// Determines which local branches to push under the resolved
/// `push.default` policy, matching Git's own semantics. `simple` pushes
/// only if the upstream branch has the same name as the local branch on
/// the target remote.
pub fn default_push_branches(
    repo_path: &Path,
    config: &dyn crate::config::ConfigLookup,
    current_branch: &str,
    remote: &str,
) -> Result<Vec<String>, GitLobError> {
    match PushDefault::from_config(config) {
        PushDefault::Nothing => Ok(Vec::new()),
        PushDefault::Matching => {
            let locals = list_local_branches(repo_path)?;
            let remotes = list_remote_branches(repo_path)?;
            let remote_prefix = format!("{remote}/");
            Ok(locals
                .into_iter()
                .filter(|b| remotes.iter().any(|r| r == &format!("{remote_prefix}{b}")))
                .collect())
        }
        PushDefault::Current => Ok(vec![current_branch.to_string()]),
        PushDefault::Upstream => {
            let upstream_key = format!("branch.{current_branch}.merge");
            match config.get(&upstream_key) {
                Some(merge_ref) => {
                    let name = merge_ref.trim_start_matches("refs/heads/").to_string();
                    Ok(vec![name])
                }
                None => Ok(Vec::new()),
            }
        }
        PushDefault::Simple => {
            let upstream_remote = config.get(&format!("branch.{current_branch}.remote"));
            let upstream_merge = config.get(&format!("branch.{current_branch}.merge"));
            match (upstream_remote, upstream_merge) {
                (Some(r), Some(merge_ref)) if r == remote => {
                    let upstream_name = merge_ref.trim_start_matches("refs/heads/");
                    if upstream_name == current_branch {
                        Ok(vec![current_branch.to_string()])
                    } else {
                        Ok(Vec::new())
                    }
                }
                _ => Ok(Vec::new()),
            }
        }
    }
}
