//! Review-time state: pending candidates, edit sessions, in-flight claims,
//! and the per-process publish history.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::article::Candidate;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending candidates keyed by id.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<Candidate>;
    /// Insert or replace under `candidate.id`.
    async fn put(&self, candidate: Candidate);
    async fn delete(&self, id: &str) -> Option<Candidate>;
    /// Oldest first.
    async fn list(&self) -> Vec<Candidate>;
    async fn len(&self) -> usize;
    /// Drop candidates inserted before `cutoff`; returns how many were removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize;
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<HashMap<String, (Candidate, DateTime<Utc>)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit timestamp.
    pub fn put_at(&self, candidate: Candidate, inserted_at: DateTime<Utc>) {
        lock(&self.inner).insert(candidate.id.clone(), (candidate, inserted_at));
    }
}

#[async_trait]
impl CandidateStore for InMemoryStore {
    async fn get(&self, id: &str) -> Option<Candidate> {
        lock(&self.inner).get(id).map(|(c, _)| c.clone())
    }

    async fn put(&self, candidate: Candidate) {
        self.put_at(candidate, Utc::now());
    }

    async fn delete(&self, id: &str) -> Option<Candidate> {
        lock(&self.inner).remove(id).map(|(c, _)| c)
    }

    async fn list(&self) -> Vec<Candidate> {
        let map = lock(&self.inner);
        let mut items: Vec<_> = map.values().collect();
        items.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        items.into_iter().map(|(c, _)| c.clone()).collect()
    }

    async fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut map = lock(&self.inner);
        let before = map.len();
        map.retain(|_, (_, at)| *at >= cutoff);
        before - map.len()
    }
}

/// Reviewer → candidate id awaiting a replacement title.
pub struct EditSessions {
    inner: Mutex<HashMap<i64, (String, Instant)>>,
    ttl: Duration,
}

impl EditSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Open (or replace) the reviewer's session.
    pub fn begin(&self, user_id: i64, candidate_id: &str) {
        lock(&self.inner).insert(user_id, (candidate_id.to_string(), Instant::now()));
    }

    /// Close the session and return its target, unless it has expired.
    pub fn take(&self, user_id: i64) -> Option<String> {
        let (id, opened) = lock(&self.inner).remove(&user_id)?;
        (opened.elapsed() <= self.ttl).then_some(id)
    }

    pub fn is_open(&self, user_id: i64) -> bool {
        lock(&self.inner)
            .get(&user_id)
            .is_some_and(|(_, opened)| opened.elapsed() <= self.ttl)
    }
}

/// Candidate ids with an approve/reject/edit in progress.
#[derive(Default)]
pub struct Claims {
    inner: Mutex<HashSet<String>>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another action already holds `id`.
    pub fn try_claim(&self, id: &str) -> Option<Claim<'_>> {
        lock(&self.inner).insert(id.to_string()).then(|| Claim {
            owner: self,
            id: id.to_string(),
        })
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        lock(&self.inner).contains(id)
    }
}

/// Released on drop.
pub struct Claim<'a> {
    owner: &'a Claims,
    id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        lock(&self.owner.inner).remove(&self.id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedEntry {
    pub ts_unix: i64,
    pub id: String,
    pub title: String,
    pub url: Option<String>,
}

/// Bounded log of articles published by this process.
#[derive(Debug)]
pub struct PublishedHistory {
    inner: Mutex<Vec<PublishedEntry>>,
    total: Mutex<u64>,
    cap: usize,
}

impl PublishedHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(1_000))),
            total: Mutex::new(0),
            cap: cap.clamp(1, 1_000),
        }
    }

    pub fn push(&self, id: &str, title: &str, url: Option<String>) {
        *lock(&self.total) += 1;
        let mut v = lock(&self.inner);
        v.push(PublishedEntry {
            ts_unix: Utc::now().timestamp(),
            id: id.to_string(),
            title: title.to_string(),
            url,
        });
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    /// Everything published since start, including entries rotated out.
    pub fn total(&self) -> u64 {
        *lock(&self.total)
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<PublishedEntry> {
        let v = lock(&self.inner);
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn cand(id: &str) -> Candidate {
        serde_json::from_value(serde_json::json!({ "id": id, "title": id })).unwrap()
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.put_at(cand("old"), now - ChronoDuration::hours(80));
        store.put_at(cand("new"), now - ChronoDuration::hours(1));
        let removed = store
            .purge_older_than(now - ChronoDuration::hours(72))
            .await;
        assert_eq!(removed, 1);
        assert!(store.get("old").await.is_none());
        assert!(store.get("new").await.is_some());
    }

    #[tokio::test]
    async fn list_is_oldest_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.put_at(cand("b"), now);
        store.put_at(cand("a"), now - ChronoDuration::minutes(5));
        let ids: Vec<_> = store.list().await.into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let claims = Claims::new();
        let first = claims.try_claim("x").unwrap();
        assert!(claims.try_claim("x").is_none());
        assert!(claims.try_claim("y").is_some());
        drop(first);
        assert!(!claims.is_claimed("x"));
        assert!(claims.try_claim("x").is_some());
    }

    #[test]
    fn sessions_expire() {
        let s = EditSessions::new(Duration::ZERO);
        s.begin(7, "x");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(s.take(7), None);

        let s = EditSessions::new(Duration::from_secs(60));
        s.begin(7, "x");
        s.begin(7, "y");
        assert!(s.is_open(7));
        assert_eq!(s.take(7).as_deref(), Some("y"));
        assert_eq!(s.take(7), None);
    }

    #[test]
    fn history_is_capped_but_counts_everything() {
        let h = PublishedHistory::with_capacity(2);
        for i in 0..3 {
            h.push(&format!("id{i}"), "t", None);
        }
        assert_eq!(h.total(), 3);
        let ids: Vec<_> = h.snapshot_last_n(10).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["id1", "id2"]);
    }
}
