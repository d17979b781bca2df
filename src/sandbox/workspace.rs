use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::LanguageProfile;

/// A uniquely named directory owned by exactly one request
///
/// Holds the submitted source and whatever the compile step produces. The
/// directory is removed by [`Workspace::close`]; if the owner never gets there
/// (early return, panic, cancelled future) it is removed on drop instead.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    source_path: PathBuf,
    closed: bool,
}

impl Workspace {
    /// Allocates `<root>/<uuid>` and writes the source file into it
    pub async fn open(
        root: &Path,
        profile: &LanguageProfile,
        source_code: &str,
    ) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let dir = root.join(Uuid::new_v4().simple().to_string());
        // create_dir (not create_dir_all) fails on an existing name
        tokio::fs::create_dir(&dir).await?;

        let workspace = Self {
            source_path: dir.join(&profile.source_file),
            dir,
            closed: false,
        };
        tokio::fs::write(&workspace.source_path, source_code).await?;

        log::debug!("Opened workspace {}", workspace.dir.display());
        Ok(workspace)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Removes the directory and everything in it
    pub async fn close(mut self) -> io::Result<()> {
        self.closed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                log::debug!("Removed workspace {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.dir)
            && e.kind() != io::ErrorKind::NotFound
        {
            log::warn!("Failed to remove workspace {}: {e}", self.dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> LanguageProfile {
        LanguageProfile::new("sh", "main.sh", None, vec!["sh".into(), "%INPUT%".into()]).unwrap()
    }

    #[tokio::test]
    async fn test_open_writes_source_and_close_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(root.path(), &profile(), "echo hi\n")
            .await
            .unwrap();

        assert!(workspace.dir().starts_with(root.path()));
        assert_eq!(fs::read_to_string(workspace.source_path()).unwrap(), "echo hi\n");
        fs::write(workspace.dir().join("main"), "artifact").unwrap();

        let dir = workspace.dir().to_path_buf();
        workspace.close().await.unwrap();
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_unclosed_workspace() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(root.path(), &profile(), "").await.unwrap();
        let dir = workspace.dir().to_path_buf();
        assert!(dir.exists());

        drop(workspace);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_concurrent_workspaces_never_share_a_directory() {
        let root = tempfile::tempdir().unwrap();
        let profile = profile();

        let mut handles = Vec::new();
        for i in 0..16 {
            let root = root.path().to_path_buf();
            let profile = profile.clone();
            handles.push(tokio::spawn(async move {
                Workspace::open(&root, &profile, &format!("echo {i}\n"))
                    .await
                    .unwrap()
            }));
        }

        let mut workspaces = Vec::new();
        for handle in handles {
            workspaces.push(handle.await.unwrap());
        }

        let mut dirs: Vec<_> = workspaces.iter().map(|w| w.dir().to_path_buf()).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 16);

        for workspace in workspaces {
            workspace.close().await.unwrap();
        }
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
