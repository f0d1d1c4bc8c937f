//! In-memory user registry

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub created_at: DateTime<Utc>,
    /// Jobs in the order they were created
    pub job_ids: Vec<String>,
}

/// Maps external identities to user records. Records are never removed.
#[derive(Default)]
pub struct UserRegistry {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `candidate` if it names a known user, otherwise mint a new
    /// user and return its id
    pub async fn resolve_or_create(&self, candidate: Option<&str>) -> String {
        let mut users = self.users.write().await;

        if let Some(id) = candidate.filter(|id| !id.is_empty()) {
            if users.contains_key(id) {
                return id.to_string();
            }
        }

        let user_id = Uuid::new_v4().to_string();
        let record = UserRecord {
            created_at: Utc::now(),
            job_ids: Vec::new(),
        };
        debug!(user_id = %user_id, created_at = %record.created_at, "Created user");
        users.insert(user_id.clone(), record);
        user_id
    }

    /// Append a job to a user's job list. Returns false for unknown users.
    pub async fn link_job(&self, user_id: &str, job_id: &str) -> bool {
        match self.users.write().await.get_mut(user_id) {
            Some(record) => {
                record.job_ids.push(job_id.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.users.read().await.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_id_is_preserved() {
        let registry = UserRegistry::new();
        let id = registry.resolve_or_create(None).await;

        assert_eq!(registry.resolve_or_create(Some(&id)).await, id);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_absent_id_creates_distinct_users() {
        let registry = UserRegistry::new();
        let a = registry.resolve_or_create(None).await;
        let b = registry.resolve_or_create(None).await;

        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_ids_are_replaced() {
        let registry = UserRegistry::new();

        let unknown = registry.resolve_or_create(Some("not-registered")).await;
        assert_ne!(unknown, "not-registered");
        assert!(registry.get("not-registered").await.is_none());

        let empty = registry.resolve_or_create(Some("")).await;
        assert!(!empty.is_empty());
        assert!(registry.get(&empty).await.is_some());
    }

    #[tokio::test]
    async fn test_link_job() {
        let registry = UserRegistry::new();
        let id = registry.resolve_or_create(None).await;

        assert!(registry.link_job(&id, "job-1").await);
        assert!(registry.link_job(&id, "job-2").await);
        assert!(!registry.link_job("ghost", "job-3").await);

        let record = registry.get(&id).await.unwrap();
        assert_eq!(record.job_ids, vec!["job-1", "job-2"]);
        assert!(record.created_at <= Utc::now());
    }
}
