//! Persisted set of already-ingested links.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

/// Append-only set of links. Persisted as a sorted JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    links: BTreeSet<String>,
}

impl SeenSet {
    /// Missing file → empty set. A corrupt file is logged and treated as empty.
    pub async fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "reading seen set");
                return Self::default();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(v) => Self {
                links: v.into_iter().collect(),
            },
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "seen set is not a JSON array, starting empty");
                Self::default()
            }
        }
    }

    /// Rewrite the whole file via a temp file + rename.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let sorted: Vec<&String> = self.links.iter().collect();
        let json = serde_json::to_vec_pretty(&sorted).context("serializing seen set")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    /// Returns `true` if the link was not seen before.
    pub fn insert(&mut self, link: &str) -> bool {
        self.links.insert(link.to_string())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_sorted_and_tolerates_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("seen.json");

        let mut s = SeenSet::load(&path).await;
        assert!(s.is_empty());
        assert!(s.insert("https://b"));
        assert!(s.insert("https://a"));
        assert!(!s.insert("https://a"));
        s.save(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let v: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(v, vec!["https://a".to_string(), "https://b".to_string()]);

        let again = SeenSet::load(&path).await;
        assert_eq!(again, s);

        std::fs::write(&path, "{not json").unwrap();
        assert!(SeenSet::load(&path).await.is_empty());
    }
}
