//! All-or-nothing file output.
//!
//! Every file of a run is first written to a `.tmp` sibling, flushed and
//! synced. [`StagedWrites::commit`] then renames them into place in staging
//! order. If a rename fails, the files already renamed are removed again, as
//! are the remaining temporaries and any directory staging created. Dropping
//! an uncommitted set cleans up the same way.

use crate::error::{Result, TheftcastError};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

#[derive(Debug, Default)]
pub struct StagedWrites {
    /// `(temporary, final)` pairs in staging order.
    staged: Vec<(PathBuf, PathBuf)>,
    /// Directories created while staging, outermost first.
    created_dirs: Vec<PathBuf>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Writes `bytes` to the temporary sibling of `path`.
    pub fn stage(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            self.create_dirs(parent)?;
        }

        let tmp = temp_path(path);
        let written = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.flush()?;
            file.sync_all()
        })();
        if let Err(e) = written {
            let _ignored = std::fs::remove_file(&tmp);
            return Err(write_error(path, &e));
        }

        debug!("Staged {} bytes for {}", bytes.len(), path.display());
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Renames every staged file into place and returns the final paths.
    #[instrument(skip(self), fields(files = self.staged.len()))]
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let staged = std::mem::take(&mut self.staged);
        let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());

        for (idx, (tmp, path)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(tmp, path) {
                warn!(
                    "Rename of {} failed, rolling back {} file(s)",
                    path.display(),
                    committed.len()
                );
                for done in &committed {
                    let _ignored = std::fs::remove_file(done);
                }
                for (pending, _) in staged.iter().skip(idx) {
                    let _ignored = std::fs::remove_file(pending);
                }
                // `self` is dropped here and removes the directories it made
                return Err(write_error(path, &e));
            }
            committed.push(path.clone());
        }

        self.created_dirs.clear();
        Ok(committed)
    }

    fn create_dirs(&mut self, dir: &Path) -> Result<()> {
        let mut missing: Vec<PathBuf> = dir
            .ancestors()
            .filter(|a| !a.as_os_str().is_empty())
            .take_while(|a| !a.exists())
            .map(Path::to_path_buf)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(dir).map_err(|e| write_error(dir, &e))?;
        missing.reverse();
        self.created_dirs.extend(missing);
        Ok(())
    }
}

impl Drop for StagedWrites {
    fn drop(&mut self) {
        for (tmp, _) in self.staged.drain(..) {
            let _ignored = std::fs::remove_file(tmp);
        }
        // Innermost first; only empty directories are removed
        for dir in self.created_dirs.drain(..).rev() {
            let _ignored = std::fs::remove_dir(dir);
        }
    }
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_error(path: &Path, e: &std::io::Error) -> TheftcastError {
    TheftcastError::ArtifactWrite(format!("cannot write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_renames_in_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = dir.path().join("a").join("one.csv");
        let second = dir.path().join("two.json");

        let mut files = StagedWrites::new();
        files.stage(&first, b"1")?;
        files.stage(&second, b"2")?;
        assert!(!first.exists());
        assert!(temp_path(&first).exists());

        let written = files.commit()?;
        assert_eq!(written, vec![first.clone(), second.clone()]);
        assert_eq!(std::fs::read_to_string(&first)?, "1");
        assert!(!temp_path(&second).exists());
        Ok(())
    }

    #[test]
    fn test_failed_rename_rolls_back_earlier_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let early = dir.path().join("maps").join("mapping_B.csv");
        let blocked = dir.path().join("report.json");
        let last = dir.path().join("model.json");
        std::fs::create_dir_all(blocked.join("occupied"))?;

        let mut files = StagedWrites::new();
        files.stage(&early, b"x")?;
        files.stage(&blocked, b"y")?;
        files.stage(&last, b"z")?;

        let err = files.commit().unwrap_err();
        assert!(matches!(err, TheftcastError::ArtifactWrite(_)));
        assert!(!early.exists());
        assert!(!dir.path().join("maps").exists());
        assert!(!last.exists());
        assert!(!temp_path(&blocked).exists());
        assert!(!temp_path(&last).exists());
        assert!(blocked.is_dir());
        Ok(())
    }

    #[test]
    fn test_drop_without_commit_cleans_up() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("out").join("nested");
        let path = out.join("file.txt");
        {
            let mut files = StagedWrites::new();
            files.stage(&path, b"data")?;
            assert_eq!(files.len(), 1);
        }
        assert!(!temp_path(&path).exists());
        assert!(!dir.path().join("out").exists());
        Ok(())
    }
}
