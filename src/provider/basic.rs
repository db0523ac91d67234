//! Basic provider: a dumb filesystem/mountpoint transport. Every file is
//! written through a temp name on the remote and renamed on completion, so
//! a restart only ever discards partial temps, never a finished file.

use super::{ProgressCallback, SyncProvider, TransferKind};
use crate::config::ConfigLookup;
use crate::error::GitLobError;
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "basic_tests.rs"]
mod tests;

pub struct BasicProvider<'a> {
    config: &'a dyn ConfigLookup,
}

impl<'a> BasicProvider<'a> {
    pub fn new(config: &'a dyn ConfigLookup) -> Self {
        Self { config }
    }

    fn remote_root(&self, remote_name: &str) -> Result<PathBuf, GitLobError> {
        self.config
            .get(&format!("remote.{remote_name}.git-lob-path"))
            .map(PathBuf::from)
            .ok_or_else(|| GitLobError::Config {
                remote: remote_name.to_string(),
                detail: "remote.<name>.git-lob-path is not set".to_string(),
            })
    }
}

impl<'a> SyncProvider for BasicProvider<'a> {
    fn type_id(&self) -> &'static str {
        "basic"
    }

    fn validate_config(&self, remote_name: &str) -> Result<(), GitLobError> {
        let root = self.remote_root(remote_name)?;
        if !root.exists() {
            return Err(GitLobError::Config {
                remote: remote_name.to_string(),
                detail: format!("path {} does not exist", root.display()),
            });
        }
        Ok(())
    }

    fn upload(
        &self,
        remote_name: &str,
        relpaths: &[String],
        base_dir: &Path,
        force: bool,
        progress: &mut ProgressCallback,
    ) -> Result<(), GitLobError> {
        let root = self.remote_root(remote_name)?;
        for relpath in relpaths {
            let src = base_dir.join(relpath);
            let dst = root.join(relpath);
            let size = std::fs::metadata(&src).map_err(GitLobError::Io)?.len();
            if !force && self.file_exists_and_is_of_size(remote_name, relpath, size)? {
                let cancel = progress(relpath, TransferKind::Skip, size, size);
                if cancel {
                    return Ok(());
                }
                continue;
            }
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = dst.with_extension("gitlob-remote-tmp");
            std::fs::copy(&src, &tmp).map_err(|e| GitLobError::Transfer {
                file: relpath.clone(),
                cause: e.to_string(),
            })?;
            std::fs::rename(&tmp, &dst).map_err(|e| GitLobError::Transfer {
                file: relpath.clone(),
                cause: e.to_string(),
            })?;
            let cancel = progress(relpath, TransferKind::Transfer, size, size);
            if cancel {
                return Ok(());
            }
        }
        Ok(())
    }

    fn download(
        &self,
        remote_name: &str,
        relpaths: &[String],
        to_dir: &Path,
        force: bool,
        progress: &mut ProgressCallback,
    ) -> Result<(), GitLobError> {
        let root = self.remote_root(remote_name)?;
        for relpath in relpaths {
            let src = root.join(relpath);
            let dst = to_dir.join(relpath);
            let meta = std::fs::metadata(&src).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitLobError::NotFoundForShas { shas: vec![relpath.clone()] }
                } else {
                    GitLobError::Io(e)
                }
            })?;
            let size = meta.len();
            if !force && dst.exists() && std::fs::metadata(&dst)?.len() == size {
                let cancel = progress(relpath, TransferKind::Skip, size, size);
                if cancel {
                    return Ok(());
                }
                continue;
            }
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = dst.with_extension("gitlob-local-tmp");
            std::fs::copy(&src, &tmp).map_err(|e| GitLobError::Transfer {
                file: relpath.clone(),
                cause: e.to_string(),
            })?;
            std::fs::rename(&tmp, &dst).map_err(|e| GitLobError::Transfer {
                file: relpath.clone(),
                cause: e.to_string(),
            })?;
            let cancel = progress(relpath, TransferKind::Transfer, size, size);
            if cancel {
                return Ok(());
            }
        }
        Ok(())
    }

    fn file_exists(&self, remote_name: &str, relpath: &str) -> Result<bool, GitLobError> {
        let root = self.remote_root(remote_name)?;
        Ok(root.join(relpath).exists())
    }

    fn file_exists_and_is_of_size(&self, remote_name: &str, relpath: &str, size: u64) -> Result<bool, GitLobError> {
        let root = self.remote_root(remote_name)?;
        match std::fs::metadata(root.join(relpath)) {
            Ok(m) => Ok(m.len() == size),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(GitLobError::Io(e)),
        }
    }
}
