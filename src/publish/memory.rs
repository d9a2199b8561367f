//! In-process content repository for tests and local runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::repo::{CommitResult, ContentRepo, RemoteFile};
use super::PublishError;

#[derive(Default)]
struct State {
    files: BTreeMap<String, (String, String)>,
    commits: Vec<String>,
    next_sha: u64,
    fail_with: Option<(u16, String)>,
}

/// Files keyed by path with a per-write sha, enforcing the same
/// create-vs-update rules as the remote API.
#[derive(Default)]
pub struct MemoryRepo {
    state: Mutex<State>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with the given API status until [`MemoryRepo::recover`].
    pub fn fail_with(&self, status: u16, message: impl Into<String>) {
        self.lock().fail_with = Some((status, message.into()));
    }

    pub fn recover(&self) {
        self.lock().fail_with = None;
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).map(|(body, _)| body.clone())
    }

    /// Commit messages in order.
    pub fn commits(&self) -> Vec<String> {
        self.lock().commits.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(state: &State) -> Result<(), PublishError> {
        match &state.fail_with {
            Some((status, message)) => Err(PublishError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContentRepo for MemoryRepo {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, PublishError> {
        let st = self.lock();
        Self::check(&st)?;
        Ok(st
            .files
            .get(path)
            .map(|(_, sha)| RemoteFile { sha: sha.clone() }))
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<CommitResult, PublishError> {
        let mut st = self.lock();
        Self::check(&st)?;
        let current = st.files.get(path).map(|(_, s)| s.as_str());
        match (current, sha) {
            (Some(_), None) => {
                return Err(PublishError::Api {
                    status: 422,
                    message: "\"sha\" wasn't supplied.".into(),
                })
            }
            (Some(cur), Some(given)) if cur != given => {
                return Err(PublishError::Api {
                    status: 409,
                    message: format!("{path} does not match {given}"),
                })
            }
            (None, Some(_)) => {
                return Err(PublishError::Api {
                    status: 404,
                    message: "Not Found".into(),
                })
            }
            _ => {}
        }
        st.next_sha += 1;
        let new_sha = format!("{:040x}", st.next_sha);
        st.files
            .insert(path.to_string(), (content.to_string(), new_sha));
        st.commits.push(message.to_string());
        Ok(CommitResult {
            html_url: Some(format!("memory://{path}")),
        })
    }

    async fn delete_file(&self, path: &str, message: &str, sha: &str) -> Result<(), PublishError> {
        let mut st = self.lock();
        Self::check(&st)?;
        match st.files.get(path) {
            Some((_, cur)) if cur == sha => {
                st.files.remove(path);
                st.commits.push(message.to_string());
                Ok(())
            }
            Some(_) => Err(PublishError::Api {
                status: 409,
                message: format!("{path} does not match {sha}"),
            }),
            None => Err(PublishError::Api {
                status: 404,
                message: "Not Found".into(),
            }),
        }
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<String>, PublishError> {
        let st = self.lock();
        Self::check(&st)?;
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(st
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_requires_current_sha() {
        let repo = MemoryRepo::new();
        repo.put_file("a/x.mdx", "1", "Add", None).await.unwrap();
        assert!(repo.put_file("a/x.mdx", "2", "Add", None).await.is_err());

        let sha = repo.get_file("a/x.mdx").await.unwrap().unwrap().sha;
        repo.put_file("a/x.mdx", "2", "Update", Some(&sha)).await.unwrap();
        assert!(matches!(
            repo.put_file("a/x.mdx", "3", "Update", Some(&sha)).await,
            Err(PublishError::Api { status: 409, .. })
        ));
        assert_eq!(repo.content("a/x.mdx").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn list_dir_is_shallow() {
        let repo = MemoryRepo::new();
        repo.put_file("c/ai/a.mdx", "", "m", None).await.unwrap();
        repo.put_file("c/ai/sub/b.mdx", "", "m", None).await.unwrap();
        assert_eq!(repo.list_dir("c/ai").await.unwrap(), vec!["a.mdx"]);
        assert!(repo.list_dir("c/space").await.unwrap().is_empty());
    }
}
