use super::*;
use std::process::Command;

fn init_repo(dir: &Path) {
    let run = |args: &[&str]| {
        let status = Command::new("git").current_dir(dir).args(args).status().unwrap();
        assert!(status.success());
    };
    run(&["init", "-q"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
}

fn commit(dir: &Path, msg: &str) -> String {
    std::fs::write(dir.join("f.txt"), msg).unwrap();
    Command::new("git").current_dir(dir).args(["add", "-A"]).status().unwrap();
    Command::new("git").current_dir(dir).args(["commit", "-q", "-m", msg]).status().unwrap();
    let out = Command::new("git").current_dir(dir).args(["rev-parse", "HEAD"]).output().unwrap();
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

#[test]
fn test_s3_push_state_ordering() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(tmp.path());

    cache.mark_pushed("origin", "b09000000000000000000000000000000006dc", None).unwrap();
    cache.mark_pushed("origin", "c12000000000000000000000000000000000341", None).unwrap();
    cache.mark_pushed("origin", "b09000000000000000000000000000000006dc", None).unwrap(); // dup
    cache
        .mark_pushed(
            "origin",
            "d3f000000000000000000000000000000000dde",
            Some("b09000000000000000000000000000000006dc"),
        )
        .unwrap();

    let mut expected = vec![
        "c12000000000000000000000000000000000341".to_string(),
        "d3f000000000000000000000000000000000dde".to_string(),
    ];
    expected.sort();
    assert_eq!(cache.list_pushed("origin").unwrap(), expected);
}

#[test]
fn test_is_pushed_and_list_pushed_sorted_no_dups() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(tmp.path());
    cache.mark_pushed("origin", "bbb", None).unwrap();
    cache.mark_pushed("origin", "aaa", None).unwrap();
    cache.mark_pushed("origin", "aaa", None).unwrap();
    assert!(cache.is_pushed("origin", "bbb").unwrap());
    assert!(!cache.is_pushed("origin", "ccc").unwrap());
    assert_eq!(cache.list_pushed("origin").unwrap(), vec!["aaa".to_string(), "bbb".to_string()]);
}

#[test]
fn test_reset_clears_set() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(tmp.path());
    cache.mark_pushed("origin", "aaa", None).unwrap();
    cache.reset("origin").unwrap();
    assert!(cache.list_pushed("origin").unwrap().is_empty());
}

#[test]
fn test_cleanup_removes_ancestor_redundant_and_invalid_shas() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    let c1 = commit(repo.path(), "first");
    let c2 = commit(repo.path(), "second");

    let state_dir = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(state_dir.path());
    cache.mark_pushed("origin", &c1, None).unwrap();
    cache.mark_pushed("origin", &c2, None).unwrap();
    cache.mark_pushed("origin", "0000000000000000000000000000000000dead", None).unwrap();

    cache.cleanup(repo.path(), "origin").unwrap();
    assert_eq!(cache.list_pushed("origin").unwrap(), vec![c2]);
}

#[test]
fn test_mark_all_seeds_consolidated_refs() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    commit(repo.path(), "first");
    let c2 = commit(repo.path(), "second");

    let state_dir = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(state_dir.path());
    cache.mark_all(repo.path(), "origin").unwrap();

    let pushed = cache.list_pushed("origin").unwrap();
    assert_eq!(pushed, vec![c2]);
}

#[test]
fn test_init_heuristic_seeds_when_store_empty() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    let c1 = commit(repo.path(), "only commit");

    let state_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(state_dir.path());
    cache
        .apply_init_heuristic_if_store_empty(repo.path(), store_dir.path(), &["origin".to_string()])
        .unwrap();

    assert_eq!(cache.list_pushed("origin").unwrap(), vec![c1]);
}

#[test]
fn test_init_heuristic_skips_when_store_nonempty() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    commit(repo.path(), "only commit");

    let state_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    std::fs::write(store_dir.path().join("marker"), b"x").unwrap();
    let cache = PushStateCache::new(state_dir.path());
    cache
        .apply_init_heuristic_if_store_empty(repo.path(), store_dir.path(), &["origin".to_string()])
        .unwrap();

    assert!(cache.list_pushed("origin").unwrap().is_empty());
}

#[test]
fn test_latest_pushed_ancestor() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    let c1 = commit(repo.path(), "first");
    let c2 = commit(repo.path(), "second");

    let state_dir = tempfile::tempdir().unwrap();
    let cache = PushStateCache::new(state_dir.path());
    cache.mark_pushed("origin", &c1, None).unwrap();

    let ancestor = cache.latest_pushed_ancestor(repo.path(), "origin", &c2).unwrap();
    assert_eq!(ancestor.as_deref(), Some(c1.as_str()));
}
