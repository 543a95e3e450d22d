use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;

/// Where validated receipt files end up. Behind a trait so tests can swap
/// the disk out.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, name: &str, body: Bytes) -> anyhow::Result<()>;
    async fn delete(&self, name: &str) -> anyhow::Result<()>;
}

/// Local-disk store rooted at the configured upload directory. Callers
/// hand it generated names only, never client-supplied paths.
#[derive(Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl FileStore for LocalDisk {
    async fn save(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create upload dir {}", self.root.display()))?;
        let path = self.root.join(name);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> anyhow::Result<()> {
        let path = self.root.join(name);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove upload {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_delete_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDisk::new(dir.path().join("uploads"));

        store
            .save("a.png", Bytes::from_static(b"\x89PNG data"))
            .await
            .expect("save should create the directory and write");
        let on_disk = std::fs::read(dir.path().join("uploads").join("a.png")).unwrap();
        assert_eq!(on_disk, b"\x89PNG data");

        store.delete("a.png").await.expect("delete should succeed");
        assert!(!dir.path().join("uploads").join("a.png").exists());
    }

    #[tokio::test]
    async fn delete_of_missing_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDisk::new(dir.path().to_path_buf());
        assert!(store.delete("nope.pdf").await.is_err());
    }
}
