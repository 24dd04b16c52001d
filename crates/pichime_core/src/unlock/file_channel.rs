//! Two-file unlock channel shared with the web front end.
//!
//! `alarm.txt` holds `1` while an alarm accepts remote unlock, `unlock.txt`
//! holds the current token. Every write replaces the file atomically
//! through a temp file in the same directory.

use super::token::UnlockToken;
use super::{UnlockError, UnlockResult, UnlockSignal};
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const FLAG_FILE_NAME: &str = "alarm.txt";
pub const TOKEN_FILE_NAME: &str = "unlock.txt";
const FLAG_ACTIVE: &str = "1";

#[derive(Debug, Clone)]
pub struct FileUnlockChannel {
    dir: PathBuf,
    token_len: usize,
}

impl FileUnlockChannel {
    pub fn new(dir: impl Into<PathBuf>, token_len: usize) -> Self {
        Self {
            dir: dir.into(),
            token_len,
        }
    }

    pub fn flag_path(&self) -> PathBuf {
        self.dir.join(FLAG_FILE_NAME)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE_NAME)
    }

    fn read_flag(&self) -> UnlockResult<bool> {
        Ok(read_artifact(&self.flag_path())? == FLAG_ACTIVE)
    }

    fn write_artifact(&self, path: &Path, contents: &str) -> UnlockResult<()> {
        let io_err = |source| UnlockError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(|source| UnlockError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut staged = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        staged.write_all(contents.as_bytes()).map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;
        staged.persist(path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

impl UnlockSignal for FileUnlockChannel {
    fn read_active(&self) -> UnlockResult<bool> {
        if !self.read_flag()? {
            return Ok(false);
        }
        Ok(!read_artifact(&self.token_path())?.is_empty())
    }

    fn activate(&self) -> UnlockResult<UnlockToken> {
        let token = UnlockToken::generate(self.token_len);
        self.write_artifact(&self.flag_path(), FLAG_ACTIVE)?;
        self.write_artifact(&self.token_path(), token.as_str())?;
        debug!(
            "event=unlock_activate module=unlock status=ok token_len={}",
            token.as_str().len()
        );
        Ok(token)
    }

    fn deactivate(&self) -> UnlockResult<()> {
        self.write_artifact(&self.token_path(), "")?;
        self.write_artifact(&self.flag_path(), "")?;
        info!("event=unlock_deactivate module=unlock status=ok");
        Ok(())
    }

    fn current_token(&self) -> UnlockResult<Option<UnlockToken>> {
        if !self.read_flag()? {
            return Ok(None);
        }
        Ok(UnlockToken::from_stored(&read_artifact(&self.token_path())?))
    }
}

/// Reads an artifact; a missing file reads as empty.
fn read_artifact(path: &Path) -> UnlockResult<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().to_string()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(UnlockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{FileUnlockChannel, FLAG_FILE_NAME, TOKEN_FILE_NAME};
    use crate::unlock::UnlockSignal;

    #[test]
    fn missing_artifacts_read_as_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileUnlockChannel::new(dir.path().join("absent"), 32);
        assert!(!channel.read_active().unwrap());
        assert!(channel.current_token().unwrap().is_none());
    }

    #[test]
    fn activate_writes_flag_and_token_files() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileUnlockChannel::new(dir.path(), 40);
        let token = channel.activate().unwrap();

        let flag = std::fs::read_to_string(dir.path().join(FLAG_FILE_NAME)).unwrap();
        let stored = std::fs::read_to_string(dir.path().join(TOKEN_FILE_NAME)).unwrap();
        assert_eq!(flag, "1");
        assert_eq!(stored, token.as_str());
        assert_eq!(stored.len(), 40);
        assert!(channel.read_active().unwrap());
    }

    #[test]
    fn flag_without_token_is_inactive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FLAG_FILE_NAME), "1").unwrap();
        let channel = FileUnlockChannel::new(dir.path(), 32);
        assert!(!channel.read_active().unwrap());
    }

    #[test]
    fn deactivate_clears_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileUnlockChannel::new(dir.path(), 32);
        channel.activate().unwrap();
        channel.deactivate().unwrap();

        assert_eq!(std::fs::read_to_string(channel.flag_path()).unwrap(), "");
        assert_eq!(std::fs::read_to_string(channel.token_path()).unwrap(), "");
        assert!(!channel.read_active().unwrap());
    }
}
