use async_trait::async_trait;

use super::PublishError;

/// Existing file and the concurrency token needed to overwrite or delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitResult {
    /// Public URL of the written file, when the backend reports one.
    pub html_url: Option<String>,
}

/// File-level access to a version-controlled content repository.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// `Ok(None)` when no file exists at `path`.
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, PublishError>;

    /// Create (`sha == None`) or update (`sha == Some(current)`) a file in one commit.
    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<CommitResult, PublishError>;

    async fn delete_file(&self, path: &str, message: &str, sha: &str) -> Result<(), PublishError>;

    /// File names directly under `dir`; a missing directory is empty.
    async fn list_dir(&self, dir: &str) -> Result<Vec<String>, PublishError>;
}

#[async_trait]
impl<T: ContentRepo + ?Sized> ContentRepo for std::sync::Arc<T> {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, PublishError> {
        (**self).get_file(path).await
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<CommitResult, PublishError> {
        (**self).put_file(path, content, message, sha).await
    }

    async fn delete_file(&self, path: &str, message: &str, sha: &str) -> Result<(), PublishError> {
        (**self).delete_file(path, message, sha).await
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<String>, PublishError> {
        (**self).list_dir(dir).await
    }
}
