use super::*;
use crate::config::MapConfig;
use std::path::Path;
use std::process::Command;

fn init_repo(dir: &Path) {
    let run = |args: &[&str]| {
        let status = Command::new("git").current_dir(dir).args(args).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-q"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
    run(&["config", "commit.gpgsign", "false"]);
}

fn commit(dir: &Path, file: &str, contents: &str, msg: &str) -> String {
    std::fs::write(dir.join(file), contents).unwrap();
    let status = Command::new("git").current_dir(dir).args(["add", file]).status().unwrap();
    assert!(status.success());
    let status = Command::new("git")
        .current_dir(dir)
        .args(["commit", "-q", "-m", msg])
        .status()
        .unwrap();
    assert!(status.success());
    let out = Command::new("git").current_dir(dir).args(["rev-parse", "HEAD"]).output().unwrap();
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

#[test]
fn test_refspec_parse_bare_ref() {
    let r = Refspec::parse("master").unwrap();
    assert_eq!(r.ref1, "master");
    assert_eq!(r.range_op, None);
    assert_eq!(r.ref2, None);
}

#[test]
fn test_refspec_parse_two_dot() {
    let r = Refspec::parse("feature1..master").unwrap();
    assert_eq!(r.ref1, "feature1");
    assert_eq!(r.range_op, Some(RangeOp::DotDot));
    assert_eq!(r.ref2.as_deref(), Some("master"));
}

#[test]
fn test_refspec_parse_three_dot() {
    let a = "4094012345678901234567890123456789abcd";
    let b = "e84012345678901234567890123456789074d8";
    let s = format!("{a}...{b}");
    let r = Refspec::parse(&s).unwrap();
    assert_eq!(r.ref1, a);
    assert_eq!(r.range_op, Some(RangeOp::DotDotDot));
    assert_eq!(r.ref2.as_deref(), Some(b));
}

#[test]
fn test_refspec_render_round_trips() {
    for s in ["master", "a..b", "a...b"] {
        let parsed = Refspec::parse(s).unwrap();
        assert_eq!(parsed.render(), s);
    }
}

#[test]
fn test_refspec_parse_rejects_empty() {
    assert!(Refspec::parse("").is_err());
    assert!(Refspec::parse("..b").is_err());
    assert!(Refspec::parse("a..").is_err());
}

#[test]
fn test_current_branch_and_git_dir() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    commit(tmp.path(), "a.txt", "hello", "initial");
    let branch = current_branch(tmp.path()).unwrap();
    assert!(branch == "master" || branch == "main");
    let gitdir = git_dir(tmp.path()).unwrap();
    assert!(gitdir.ends_with(".git"));
}

#[test]
fn test_is_ancestor_and_merge_base() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    let c1 = commit(tmp.path(), "a.txt", "v1", "first");
    let c2 = commit(tmp.path(), "a.txt", "v2", "second");
    assert!(is_ancestor(tmp.path(), &c1, &c2).unwrap());
    assert!(!is_ancestor(tmp.path(), &c2, &c1).unwrap());
    assert_eq!(merge_base(tmp.path(), &c1, &c2).unwrap().as_deref(), Some(c1.as_str()));
}

#[test]
fn test_walk_first_parent_visits_all_commits_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    let mut shas = Vec::new();
    for i in 0..10 {
        shas.push(commit(tmp.path(), "a.txt", &format!("v{i}"), &format!("commit {i}")));
    }
    let head = shas.last().unwrap().clone();
    let mut visited = Vec::new();
    let count = walk_first_parent(tmp.path(), &head, 20, |current, _parent| {
        visited.push(current.to_string());
        true
    })
    .unwrap();
    assert_eq!(count, 10);
    assert_eq!(visited, shas);
}

#[test]
fn test_walk_first_parent_stops_early() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    for i in 0..15 {
        commit(tmp.path(), "a.txt", &format!("v{i}"), &format!("commit {i}"));
    }
    let head = current_branch(tmp.path()).unwrap();
    let mut seen = 0;
    walk_first_parent(tmp.path(), &head, 5, |_current, _parent| {
        seen += 1;
        seen < 5
    })
    .unwrap();
    assert_eq!(seen, 5);
}

#[test]
fn test_commit_summary_fields() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    let sha = commit(tmp.path(), "a.txt", "hello", "a nice subject");
    let summary = commit_summary(tmp.path(), &sha).unwrap();
    assert_eq!(summary.sha, sha);
    assert_eq!(summary.subject, "a nice subject");
    assert!(summary.parents.is_empty());
    assert_eq!(summary.author.email, "test@example.com");
}

#[test]
fn test_snapshot_placeholder_blobs_filters_by_exact_size() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    let sha = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    let placeholder = crate::placeholder::encode(sha).unwrap();
    std::fs::write(tmp.path().join("binary.dat"), &placeholder).unwrap();
    std::fs::write(tmp.path().join("plain.txt"), "not a placeholder, wrong size").unwrap();
    let head = commit(tmp.path(), "keep.txt", "x", "seed");
    let _ = head;
    Command::new("git").current_dir(tmp.path()).args(["add", "-A"]).status().unwrap();
    Command::new("git")
        .current_dir(tmp.path())
        .args(["commit", "-q", "-m", "add files"])
        .status()
        .unwrap();
    let commit_sha = Command::new("git")
        .current_dir(tmp.path())
        .args(["rev-parse", "HEAD"])
        .output()
        .unwrap();
    let commit_sha = String::from_utf8(commit_sha.stdout).unwrap().trim().to_string();

    let blobs = snapshot_placeholder_blobs(tmp.path(), &commit_sha).unwrap();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].0, "binary.dat");
    assert_eq!(blobs[0].1, sha);
}

#[test]
fn test_default_push_branches_simple_matches_same_name_upstream() {
    let mut m = std::collections::HashMap::new();
    m.insert("push.default".to_string(), "simple".to_string());
    m.insert("branch.main.remote".to_string(), "origin".to_string());
    m.insert("branch.main.merge".to_string(), "refs/heads/main".to_string());
    let cfg = MapConfig(m);
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    commit(tmp.path(), "a.txt", "x", "seed");
    let branches = default_push_branches(tmp.path(), &cfg, "main", "origin").unwrap();
    assert_eq!(branches, vec!["main".to_string()]);
}

#[test]
fn test_default_push_branches_simple_rejects_mismatched_upstream_name() {
    let mut m = std::collections::HashMap::new();
    m.insert("push.default".to_string(), "simple".to_string());
    m.insert("branch.main.remote".to_string(), "origin".to_string());
    m.insert("branch.main.merge".to_string(), "refs/heads/renamed".to_string());
    let cfg = MapConfig(m);
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    commit(tmp.path(), "a.txt", "x", "seed");
    let branches = default_push_branches(tmp.path(), &cfg, "main", "origin").unwrap();
    assert!(branches.is_empty());
}

#[test]
fn test_default_push_branches_nothing() {
    let mut m = std::collections::HashMap::new();
    m.insert("push.default".to_string(), "nothing".to_string());
    let cfg = MapConfig(m);
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    commit(tmp.path(), "a.txt", "x", "seed");
    let branches = default_push_branches(tmp.path(), &cfg, "main", "origin").unwrap();
    assert!(branches.is_empty());
}

#[test]
fn test_stream_placeholder_diff_captures_additions_and_removals() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    let sha1 = "0000000000000000000000000000000000000001";
    let sha2 = "0000000000000000000000000000000000000002";
    commit(tmp.path(), "a.dat", &crate::placeholder::encode(sha1).unwrap(), "add first lob");
    commit(tmp.path(), "a.dat", &crate::placeholder::encode(sha2).unwrap(), "swap lob");

    let records = stream_placeholder_diff(tmp.path(), None, "HEAD").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].changes.len(), 1);
    assert_eq!(records[0].changes[0].sha, sha1);
    assert_eq!(records[0].changes[0].direction, DiffDirection::Added);

    let second = &records[1].changes;
    assert!(second.iter().any(|c| c.sha == sha2 && c.direction == DiffDirection::Added));
    assert!(second.iter().any(|c| c.sha == sha1 && c.direction == DiffDirection::Removed));
}
