//! Local artifact storage keyed by filename.
//!
//! Each pipeline run works inside its own scope directory under the store
//! root, so two builds that produce the same filename never share a path.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{RelayError, Result};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

/// A read handle over one stored artifact. Each channel upload gets its own.
#[derive(Debug)]
pub struct ArtifactReader {
    pub filename: String,
    pub length: u64,
    pub file: File,
}

impl ArtifactReader {
    pub fn into_stream(self) -> ReaderStream<File> {
        ReaderStream::new(self.file)
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A store rooted at `<root>/<scope>`, used for a single run
    pub fn scoped(&self, scope: &str) -> Result<ArtifactStore> {
        Ok(Self::new(self.root.join(checked_name(scope)?)))
    }

    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_name(filename)?))
    }

    /// Create (or truncate) the file for a fresh download.
    pub async fn create(&self, filename: &str) -> Result<File> {
        let path = self.path_for(filename)?;
        fs::create_dir_all(&self.root).await?;
        Ok(File::create(path).await?)
    }

    pub async fn open(&self, filename: &str) -> Result<ArtifactReader> {
        let path = self.path_for(filename)?;
        let file = File::open(&path).await?;
        let length = file.metadata().await?.len();
        Ok(ArtifactReader {
            filename: filename.to_string(),
            length,
            file,
        })
    }

    pub async fn exists(&self, filename: &str) -> bool {
        match self.path_for(filename) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Delete an artifact. Returns false when there was nothing to delete.
    pub async fn remove(&self, filename: &str) -> Result<bool> {
        let path = self.path_for(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed artifact {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the store root and anything left in it
    pub async fn purge(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                debug!("Removed artifact directory {:?}", self.root);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn checked_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(RelayError::Validation(format!(
            "Invalid artifact name '{}'",
            name
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn create_open_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));

        let mut file = store.create("app.apk").await.unwrap();
        file.write_all(b"payload").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let mut reader = store.open("app.apk").await.unwrap();
        assert_eq!(reader.length, 7);
        let mut content = String::new();
        reader.file.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "payload");

        assert!(store.remove("app.apk").await.unwrap());
        assert!(!store.remove("app.apk").await.unwrap());
        assert!(!store.exists("app.apk").await);
    }

    #[test]
    fn rejects_path_traversal() {
        let store = ArtifactStore::new("/tmp/artifacts");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("..").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("app.ipa").is_ok());
        assert!(store.scoped("../run").is_err());
    }

    #[tokio::test]
    async fn scopes_keep_same_named_artifacts_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let first = store.scoped("run-1").unwrap();
        let second = store.scoped("run-2").unwrap();

        first.create("bin").await.unwrap().write_all(b"one").await.unwrap();
        second.create("bin").await.unwrap().write_all(b"two").await.unwrap();

        first.purge().await.unwrap();
        assert!(!first.root().exists());
        assert!(second.exists("bin").await);
        first.purge().await.unwrap();
    }
}
