//! services/api/src/adapters/storage.rs
//!
//! Stores rendered certificates as files under a single directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::debug;
use tutoring_core::ports::{DocumentStorage, PortError, PortResult};

/// An adapter that implements the `DocumentStorage` port on the local filesystem.
#[derive(Clone, Debug)]
pub struct FsDocumentStorage {
    root: PathBuf,
}

impl FsDocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStorage for FsDocumentStorage {
    async fn store(&self, name: &str, document: Bytes) -> PortResult<String> {
        // Names are flat file names; anything that could escape the root is refused.
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(PortError::Unexpected(format!(
                "refusing to store document under '{}'",
                name
            )));
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let path = self.root.join(name);
        tokio::fs::write(&path, &document)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        debug!(path = %path.display(), bytes = document.len(), "Document stored");
        Ok(path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tutoring-storage-{}-{}", tag, std::process::id()))
    }

    #[tokio::test]
    async fn overwrites_documents_with_the_same_name() {
        let root = scratch_dir("overwrite");
        let storage = FsDocumentStorage::new(&root);

        let first = storage
            .store("constancia_1_2_3.pdf", Bytes::from_static(b"first"))
            .await
            .unwrap();
        let second = storage
            .store("constancia_1_2_3.pdf", Bytes::from_static(b"second"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(tokio::fs::read(&second).await.unwrap(), b"second");
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_names_that_leave_the_directory() {
        let storage = FsDocumentStorage::new(scratch_dir("escape"));
        for name in ["../evil.pdf", "nested/file.pdf", ""] {
            assert!(storage.store(name, Bytes::new()).await.is_err(), "{}", name);
        }
    }
}
