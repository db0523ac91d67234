//! Content-addressed LOB store (C1): chunked write/read, integrity
//! verification, and the two-level fan-out on-disk layout.
//!
//! Every write goes through create-temp → write → rename so a crash never
//! leaves a half-written chunk or meta file visible under its final name.

use crate::error::GitLobError;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Parsed contents of a LOB's meta file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobInfo {
    pub sha: String,
    pub size: u64,
    pub chunk_size: u64,
    pub num_chunks: u32,
}

impl LobInfo {
    /// `min(chunk_size, size - i*chunk_size)`.
    pub fn expected_chunk_size(&self, i: u32) -> u64 {
        let consumed = self.chunk_size * i as u64;
        self.chunk_size.min(self.size.saturating_sub(consumed))
    }

    fn to_meta_text(&self) -> String {
        format!(
            "sha={}\nsize={}\nchunk_size={}\nnum_chunks={}\n",
            self.sha, self.size, self.chunk_size, self.num_chunks
        )
    }

    /// Parses a meta file's text layout. Exposed crate-wide so a transport
    /// can learn a LOB's chunk layout from a remote's meta file without a
    /// local copy.
    pub(crate) fn parse_meta_text(text: &str) -> Option<LobInfo> {
        let mut sha = None;
        let mut size = None;
        let mut chunk_size = None;
        let mut num_chunks = None;
        for line in text.lines() {
            let (key, value) = line.split_once('=')?;
            match key {
                "sha" => sha = Some(value.to_string()),
                "size" => size = value.parse().ok(),
                "chunk_size" => chunk_size = value.parse().ok(),
                "num_chunks" => num_chunks = value.parse().ok(),
                _ => {}
            }
        }
        Some(LobInfo {
            sha: sha?,
            size: size?,
            chunk_size: chunk_size?,
            num_chunks: num_chunks?,
        })
    }
}

/// Outcome of [`Store::verify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyResult {
    Ok,
    Missing { relpaths: Vec<String> },
    Corrupt { reason: String },
}

/// A LOB store rooted at a single directory (typically `<gitdir>/git-lob`).
pub struct Store {
    root: PathBuf,
}

fn fanout_dir(root: &Path, sha: &str) -> PathBuf {
    root.join(&sha[0..2]).join(&sha[2..4]).join(&sha[4..])
}

fn meta_relpath(sha: &str) -> String {
    format!("{}/{}/{}/meta", &sha[0..2], &sha[2..4], &sha[4..])
}

fn chunk_relpath(sha: &str, i: u32) -> String {
    format!("{}/{}/{}/{}", &sha[0..2], &sha[2..4], &sha[4..], i)
}

/// Writes `data` to `path` via create-temp-in-same-dir → write → rename, the
/// atomic commit point for every LOB Store mutation.
fn atomic_write(dir: &Path, final_path: &Path, data: &[u8], temp_prefix: &str) -> Result<(), GitLobError> {
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!("{temp_prefix}{}", std::process::id()));
    {
        let mut f = BufWriter::new(File::create(&tmp_path)?);
        f.write_all(data)?;
        f.flush()?;
    }
    std::fs::rename(&tmp_path, final_path)?;
    Ok(())
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_path(&self, sha: &str) -> PathBuf {
        self.root.join(meta_relpath(sha))
    }

    fn chunk_path(&self, sha: &str, i: u32) -> PathBuf {
        self.root.join(chunk_relpath(sha, i))
    }

    /// Relative chunk paths for a known-complete LOB, for handing to a
    /// transport without exposing the fan-out layout.
    pub fn list_chunk_paths(&self, info: &LobInfo) -> Vec<String> {
        (0..info.num_chunks).map(|i| chunk_relpath(&info.sha, i)).collect()
    }

    pub fn read_meta(&self, sha: &str) -> Result<LobInfo, GitLobError> {
        let text = std::fs::read_to_string(self.meta_path(sha)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitLobError::NotFoundForShas { shas: vec![sha.to_string()] }
            } else {
                GitLobError::Io(e)
            }
        })?;
        LobInfo::parse_meta_text(&text).ok_or_else(|| GitLobError::Integrity {
            sha: sha.to_string(),
            reason: "meta file is not parseable".to_string(),
        })
    }

    /// Streaming writer: hashes content while splitting it into
    /// `chunk_size`-sized chunks, writing each chunk to a temp file as soon
    /// as it's read — only the running hasher and a single `chunk_size`
    /// buffer are held across iterations, never the whole object. The
    /// content-addressed final location isn't known until hashing
    /// completes, so each chunk's temp file is held under `root` and
    /// renamed into its fan-out path once the SHA is known; the meta file
    /// is written last (also via temp+rename) so a complete LOB is never
    /// observable half-written. A no-op if the SHA already has complete
    /// storage.
    pub fn store_bytes(&self, mut reader: impl Read, chunk_size: u64) -> Result<(String, u64), GitLobError> {
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; chunk_size as usize];
        let mut total: u64 = 0;
        let mut temp_paths: Vec<PathBuf> = Vec::new();
        let pid = std::process::id();

        let write_result = (|| -> Result<(), GitLobError> {
            loop {
                let n = read_full(&mut reader, &mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                total += n as u64;
                let temp_path = self.root.join(format!("tempupload-{pid}-{}", temp_paths.len()));
                std::fs::create_dir_all(&self.root)?;
                {
                    let mut f = BufWriter::new(File::create(&temp_path)?);
                    f.write_all(&buf[..n])?;
                    f.flush()?;
                }
                temp_paths.push(temp_path);
                if n < buf.len() {
                    break;
                }
            }
            Ok(())
        })();

        if let Err(e) = write_result {
            for path in &temp_paths {
                let _ = std::fs::remove_file(path);
            }
            return Err(e);
        }

        let sha = hex::encode(hasher.finalize());

        if self.is_complete(&sha).unwrap_or(false) {
            for path in &temp_paths {
                let _ = std::fs::remove_file(path);
            }
            return Ok((sha, total));
        }

        let dir = fanout_dir(&self.root, &sha);
        std::fs::create_dir_all(&dir)?;
        for (i, temp_path) in temp_paths.iter().enumerate() {
            std::fs::rename(temp_path, self.chunk_path(&sha, i as u32))?;
        }
        let info = LobInfo {
            sha: sha.clone(),
            size: total,
            chunk_size,
            num_chunks: temp_paths.len() as u32,
        };
        atomic_write(&dir, &self.meta_path(&sha), info.to_meta_text().as_bytes(), "tempupload-meta-")?;
        Ok((sha, total))
    }

    /// Streams chunks `0..num_chunks-1` into `writer`, failing with an
    /// integrity error if any chunk is missing or the wrong size.
    pub fn retrieve_bytes(&self, sha: &str, mut writer: impl Write) -> Result<u64, GitLobError> {
        let info = self.read_meta(sha)?;
        let mut total = 0u64;
        for i in 0..info.num_chunks {
            let path = self.chunk_path(sha, i);
            let bytes = std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitLobError::Integrity { sha: sha.to_string(), reason: format!("missing chunk {i}") }
                } else {
                    GitLobError::Io(e)
                }
            })?;
            let expected = info.expected_chunk_size(i);
            if bytes.len() as u64 != expected {
                return Err(GitLobError::Integrity {
                    sha: sha.to_string(),
                    reason: format!("chunk {i} has size {} but expected {expected}", bytes.len()),
                });
            }
            writer.write_all(&bytes)?;
            total += bytes.len() as u64;
        }
        Ok(total)
    }

    fn is_complete(&self, sha: &str) -> Result<bool, GitLobError> {
        match self.read_meta(sha) {
            Ok(info) => {
                for i in 0..info.num_chunks {
                    let path = self.chunk_path(sha, i);
                    let meta = match std::fs::metadata(&path) {
                        Ok(m) => m,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
                        Err(e) => return Err(GitLobError::Io(e)),
                    };
                    if meta.len() != info.expected_chunk_size(i) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Err(GitLobError::NotFoundForShas { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Cheap check: meta parses, and every chunk exists with the expected
    /// size. Does not rehash content.
    pub fn verify(&self, sha: &str) -> Result<VerifyResult, GitLobError> {
        let info = match self.read_meta(sha) {
            Ok(i) => i,
            Err(GitLobError::NotFoundForShas { shas }) => {
                return Ok(VerifyResult::Missing { relpaths: vec![meta_relpath(&shas[0])] });
            }
            Err(e) => return Err(e),
        };
        let mut missing = Vec::new();
        for i in 0..info.num_chunks {
            let path = self.chunk_path(sha, i);
            match std::fs::metadata(&path) {
                Ok(m) if m.len() == info.expected_chunk_size(i) => {}
                Ok(_) => {
                    return Ok(VerifyResult::Corrupt {
                        reason: format!("chunk {i} has unexpected size"),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    missing.push(chunk_relpath(sha, i));
                }
                Err(e) => return Err(GitLobError::Io(e)),
            }
        }
        if missing.is_empty() {
            Ok(VerifyResult::Ok)
        } else {
            Ok(VerifyResult::Missing { relpaths: missing })
        }
    }

    /// Full verification: rehashes the LOB's content and compares it to `sha`.
    pub fn verify_full(&self, sha: &str) -> Result<VerifyResult, GitLobError> {
        match self.verify(sha)? {
            VerifyResult::Ok => {}
            other => return Ok(other),
        }
        let mut hasher = Sha1::new();
        let info = self.read_meta(sha)?;
        for i in 0..info.num_chunks {
            let bytes = std::fs::read(self.chunk_path(sha, i))?;
            hasher.update(&bytes);
        }
        let actual = hex::encode(hasher.finalize());
        if actual == sha {
            Ok(VerifyResult::Ok)
        } else {
            Ok(VerifyResult::Corrupt { reason: format!("rehash produced {actual}") })
        }
    }

    /// Deletes temp files (`tempupload*`/`tempdownload*`) older than
    /// `max_age_hours`. Safe to call at any time; interrupted writes never
    /// leave a visible final-named file, only stale temps.
    pub fn sweep_temp_files(&self, max_age_hours: u64) -> Result<usize, GitLobError> {
        let max_age = std::time::Duration::from_secs(max_age_hours * 3600);
        let now = std::time::SystemTime::now();
        let mut removed = 0;
        sweep_dir(&self.root, now, max_age, &mut removed)?;
        Ok(removed)
    }
}

fn sweep_dir(dir: &Path, now: std::time::SystemTime, max_age: std::time::Duration, removed: &mut usize) -> Result<(), GitLobError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            sweep_dir(&path, now, max_age, removed)?;
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("tempupload") || name.starts_with("tempdownload")) {
            continue;
        }
        let metadata = entry.metadata()?;
        if let Ok(modified) = metadata.modified() {
            if now.duration_since(modified).unwrap_or_default() > max_age {
                std::fs::remove_file(&path)?;
                *removed += 1;
            }
        }
    }
    Ok(())
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
