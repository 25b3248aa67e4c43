use async_trait::async_trait;
use eltflow_utils::error::Error;
use eltflow_utils::EltResult;
use std::path::{Component, Path, PathBuf};

/// The two object-storage calls the router needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn copy_object(&self, bucket: &str, from: &str, to: &str) -> EltResult<()>;

    async fn delete_object(&self, bucket: &str, name: &str) -> EltResult<()>;
}

/// Object store backed by a local directory: each bucket is a subdirectory
/// of `root` and object names are relative paths inside it.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, name: &str) -> EltResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = Path::new(bucket)
            .components()
            .chain(relative.components())
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || bucket.is_empty() || name.is_empty() {
            return Err(Error::ObjectStoreError(format!("invalid object '{bucket}/{name}'")));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn copy_object(&self, bucket: &str, from: &str, to: &str) -> EltResult<()> {
        let source = self.object_path(bucket, from)?;
        let target = self.object_path(bucket, to)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&source, &target).await.map_err(|e| {
            Error::ObjectStoreError(format!("copy {bucket}/{from} -> {bucket}/{to}: {e}"))
        })?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> EltResult<()> {
        let path = self.object_path(bucket, name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Error::ObjectStoreError(format!("delete {bucket}/{name}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn copy_then_delete() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("landing/raw")).unwrap();
        std::fs::write(dir.path().join("landing/raw/a.png"), b"png").unwrap();
        let store = FsObjectStore::new(dir.path());

        store.copy_object("landing", "raw/a.png", "processed/images/a.png").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("landing/processed/images/a.png")).unwrap(), b"png");

        store.delete_object("landing", "raw/a.png").await.unwrap();
        assert!(!dir.path().join("landing/raw/a.png").exists());
    }

    #[tokio::test]
    async fn missing_object_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let err = store.copy_object("landing", "raw/none.csv", "processed/other/none.csv").await.unwrap_err();
        assert!(matches!(err, Error::ObjectStoreError(_)));
    }

    #[tokio::test]
    async fn rejects_paths_leaving_the_bucket() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(store.delete_object("landing", "../secret").await.is_err());
        assert!(store.delete_object("/etc", "passwd").await.is_err());
    }
}
