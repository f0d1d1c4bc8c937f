//! In-memory job store

use crate::types::Job;
use crate::users::UserRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Holds every job submitted during the life of the process
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    users: Arc<UserRegistry>,
}

impl JobStore {
    pub fn new(users: Arc<UserRegistry>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            users,
        }
    }

    /// Insert a queued job and link it to its user.
    ///
    /// A job created for an unknown user is stored but appears in no
    /// user's job list.
    pub async fn create(&self, user_id: &str) -> String {
        let job_id = Uuid::new_v4().to_string();
        let job = Job::new(job_id.clone(), user_id.to_string());
        debug!(job_id = %job.id, user_id = %job.user_id, created_at = %job.created_at, "Job stored");

        self.jobs.write().await.insert(job_id.clone(), job);

        if !self.users.link_job(user_id, &job_id).await {
            debug!(job_id = %job_id, user_id = %user_id, "Job created for unknown user, not linked");
        }

        job_id
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Jobs of a user in creation order, empty for unknown users
    pub async fn list_for_user(&self, user_id: &str) -> Vec<Job> {
        let Some(record) = self.users.get(user_id).await else {
            return Vec::new();
        };

        let jobs = self.jobs.read().await;
        record
            .job_ids
            .iter()
            .filter_map(|id| jobs.get(id).cloned())
            .collect()
    }

    /// Mutate a job in place. Returns false if the job does not exist.
    pub async fn update<F>(&self, job_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        match self.jobs.write().await.get_mut(job_id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}
