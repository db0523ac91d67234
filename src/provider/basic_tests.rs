use super::*;
use crate::config::MapConfig;

fn provider_for(remote_root: &Path) -> (MapConfig, String) {
    let mut m = std::collections::HashMap::new();
    m.insert("remote.origin.git-lob-path".to_string(), remote_root.display().to_string());
    (MapConfig(m), "origin".to_string())
}

#[test]
fn test_upload_then_download_round_trips() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let (cfg, remote_name) = provider_for(remote.path());
    let provider = BasicProvider::new(&cfg);
    provider.validate_config(&remote_name).unwrap();

    std::fs::write(local.path().join("ab"), b"hello world").unwrap();
    let mut events = Vec::new();
    provider
        .upload(&remote_name, &["ab".to_string()], local.path(), false, &mut |f, k, d, t| {
            events.push((f.to_string(), k, d, t));
            false
        })
        .unwrap();
    assert!(remote.path().join("ab").exists());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, TransferKind::Transfer);

    let download_dir = tempfile::tempdir().unwrap();
    provider
        .download(&remote_name, &["ab".to_string()], download_dir.path(), false, &mut |_, _, _, _| false)
        .unwrap();
    let content = std::fs::read(download_dir.path().join("ab")).unwrap();
    assert_eq!(content, b"hello world");
}

#[test]
fn test_upload_skips_when_size_matches_and_not_forced() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let (cfg, remote_name) = provider_for(remote.path());
    let provider = BasicProvider::new(&cfg);

    std::fs::write(local.path().join("ab"), b"same size").unwrap();
    std::fs::write(remote.path().join("ab"), b"same size").unwrap();

    let mut kinds = Vec::new();
    provider
        .upload(&remote_name, &["ab".to_string()], local.path(), false, &mut |_, k, _, _| {
            kinds.push(k);
            false
        })
        .unwrap();
    assert_eq!(kinds, vec![TransferKind::Skip]);
}

#[test]
fn test_upload_forced_sends_even_when_present() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let (cfg, remote_name) = provider_for(remote.path());
    let provider = BasicProvider::new(&cfg);

    std::fs::write(local.path().join("ab"), b"same size").unwrap();
    std::fs::write(remote.path().join("ab"), b"same size").unwrap();

    let mut kinds = Vec::new();
    provider
        .upload(&remote_name, &["ab".to_string()], local.path(), true, &mut |_, k, _, _| {
            kinds.push(k);
            false
        })
        .unwrap();
    assert_eq!(kinds, vec![TransferKind::Transfer]);
}

#[test]
fn test_download_missing_file_is_not_found() {
    let remote = tempfile::tempdir().unwrap();
    let (cfg, remote_name) = provider_for(remote.path());
    let provider = BasicProvider::new(&cfg);
    let to_dir = tempfile::tempdir().unwrap();
    let err = provider
        .download(&remote_name, &["missing".to_string()], to_dir.path(), false, &mut |_, _, _, _| false)
        .unwrap_err();
    assert!(matches!(err, GitLobError::NotFoundForShas { .. }));
}

#[test]
fn test_cancellation_stops_after_current_file() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let (cfg, remote_name) = provider_for(remote.path());
    let provider = BasicProvider::new(&cfg);
    std::fs::write(local.path().join("a"), b"a").unwrap();
    std::fs::write(local.path().join("b"), b"b").unwrap();

    let mut seen = Vec::new();
    provider
        .upload(
            &remote_name,
            &["a".to_string(), "b".to_string()],
            local.path(),
            false,
            &mut |f, _, _, _| {
                seen.push(f.to_string());
                true
            },
        )
        .unwrap();
    assert_eq!(seen, vec!["a".to_string()]);
}
