use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::sanitize_filename;

/// Filesystem store for the markdown artifacts the translation rows point
/// at. Rows reference artifacts by bare filename; the directory root comes
/// from the configuration.
///
/// Artifact writes are not transactional with the database, so the save
/// path must write replacements before the row update and only remove the
/// superseded files afterwards.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: &Path) -> Result<ContentStore> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create upload dir {}", root.display()))?;
        Ok(ContentStore {
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, content_ref: &str) -> PathBuf {
        self.root.join(sanitize_filename(content_ref))
    }

    /// Writes `content` under a sanitized version of `filename` and returns
    /// the reference to persist. Overwrites silently: filename collisions
    /// across posts are a known gap.
    pub async fn write(&self, filename: &str, content: &str) -> Result<String> {
        let content_ref = sanitize_filename(filename);
        let path = self.root.join(&content_ref);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;
        Ok(content_ref)
    }

    pub async fn read(&self, content_ref: &str) -> Result<String> {
        let path = self.path_for(content_ref);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read artifact {}", path.display()))
    }

    /// Removal of an already-replaced artifact. A missing file is not an
    /// error: the ref may have been overwritten in place.
    pub async fn remove(&self, content_ref: &str) -> Result<()> {
        let path = self.path_for(content_ref);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();

        let content_ref = store.write("hello world.md", "# hi").await.unwrap();
        assert_eq!(content_ref, "hello-world.md");
        assert_eq!(store.read(&content_ref).await.unwrap(), "# hi");

        store.remove(&content_ref).await.unwrap();
        assert!(store.read(&content_ref).await.is_err());
        // Second removal is a no-op.
        store.remove(&content_ref).await.unwrap();
    }

    #[tokio::test]
    async fn refs_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let content_ref = store.write("../escape.md", "nope").await.unwrap();
        assert!(!content_ref.contains('/'));
        assert!(dir.path().join(&content_ref).exists());
    }
}
