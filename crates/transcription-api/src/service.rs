//! Boundary operations consumed by the HTTP layer

use crate::capabilities::Capabilities;
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::jobs::JobStore;
use crate::orchestrator::{Caches, JobOrchestrator, OrchestratorConfig};
use crate::types::{JobSnapshot, JobStatus, ServiceStats, SubmittedJob};
use crate::users::UserRegistry;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TranscriptionService {
    version: String,
    users: Arc<UserRegistry>,
    jobs: Arc<JobStore>,
    caches: Arc<Caches>,
    orchestrator: JobOrchestrator,
}

impl TranscriptionService {
    pub fn new(
        version: impl Into<String>,
        caches: Caches,
        capabilities: Capabilities,
        orchestrator_config: OrchestratorConfig,
    ) -> Self {
        let users = Arc::new(UserRegistry::new());
        let jobs = Arc::new(JobStore::new(users.clone()));
        let caches = Arc::new(caches);
        let orchestrator = JobOrchestrator::new(
            jobs.clone(),
            caches.clone(),
            capabilities,
            orchestrator_config,
        );

        Self {
            version: version.into(),
            users,
            jobs,
            caches,
            orchestrator,
        }
    }

    pub fn from_config(config: &Config, capabilities: Capabilities) -> Self {
        Self::new(
            config.api_version.clone(),
            Caches::from_config(config),
            capabilities,
            OrchestratorConfig::from_config(config),
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reject callers that declare a protocol version other than ours.
    /// An undeclared version is accepted.
    pub fn check_version(&self, client_version: Option<&str>) -> Result<()> {
        match client_version {
            Some(client) if !client.is_empty() && client != self.version => {
                warn!(client_version = %client, server_version = %self.version, "Version mismatch");
                Err(ServiceError::VersionMismatch {
                    client: client.to_string(),
                    server: self.version.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    pub async fn submit(&self, candidate_user_id: Option<&str>, input: Vec<u8>) -> SubmittedJob {
        let user_id = self.users.resolve_or_create(candidate_user_id).await;
        let job_id = self.orchestrator.submit(&user_id, input).await;

        SubmittedJob {
            job_id,
            user_id,
            status: JobStatus::Queued,
        }
    }

    pub async fn get_job(
        &self,
        job_id: &str,
        candidate_user_id: Option<&str>,
    ) -> Result<JobSnapshot> {
        let user_id = self.users.resolve_or_create(candidate_user_id).await;

        match self.jobs.get(job_id).await {
            Some(job) => {
                info!(job_id = %job_id, user_id = %user_id, "Job status checked");
                Ok(job.snapshot())
            }
            None => {
                warn!(job_id = %job_id, user_id = %user_id, "Job not found");
                Err(ServiceError::NotFound(job_id.to_string()))
            }
        }
    }

    pub async fn list_jobs(&self, candidate_user_id: Option<&str>) -> Vec<JobSnapshot> {
        let user_id = self.users.resolve_or_create(candidate_user_id).await;
        let jobs: Vec<JobSnapshot> = self
            .jobs
            .list_for_user(&user_id)
            .await
            .iter()
            .map(|job| job.snapshot())
            .collect();

        info!(user_id = %user_id, count = jobs.len(), "Jobs listed");
        jobs
    }

    pub async fn get_user(&self, candidate_user_id: Option<&str>) -> String {
        let user_id = self.users.resolve_or_create(candidate_user_id).await;
        info!(user_id = %user_id, "User identified");
        user_id
    }

    pub async fn cache_stats(&self) -> ServiceStats {
        let (transcription_cache, category_cache, user_preference_cache) =
            self.caches.stats().await;

        ServiceStats {
            transcription_cache,
            category_cache,
            user_preference_cache,
            active_jobs: self.jobs.len().await,
            in_flight_jobs: self.orchestrator.in_flight(),
            users: self.users.len().await,
        }
    }

    /// Clear all three caches. Running jobs keep working and repopulate
    /// them as they go.
    pub async fn clear_caches(&self) {
        info!("Clearing all caches");
        self.caches.clear_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Categorizer, ContentResolver, Latency, PreferenceLookup};
    use crate::types::{Category, LlmProvider, Sentiment};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingTranscriber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentResolver for CountingTranscriber {
        async fn resolve(&self, input: &[u8]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(format!("T:{}", String::from_utf8_lossy(input)))
        }
    }

    struct FixedPreference;

    #[async_trait]
    impl PreferenceLookup for FixedPreference {
        async fn lookup(&self, _user_id: &str) -> Result<LlmProvider> {
            Ok(LlmProvider::OpenAi)
        }
    }

    struct TopicCategorizer;

    #[async_trait]
    impl Categorizer for TopicCategorizer {
        async fn categorize(&self, content: &str, _provider: LlmProvider) -> Result<Category> {
            Ok(Category {
                primary_topic: content.to_string(),
                sentiment: Sentiment::Positive,
                keywords: vec![],
                confidence: 1.0,
                summary: String::new(),
            })
        }
    }

    fn service() -> (TranscriptionService, Arc<CountingTranscriber>) {
        let transcriber = Arc::new(CountingTranscriber::default());
        let capabilities = Capabilities {
            content: transcriber.clone(),
            preference: Arc::new(FixedPreference),
            categorizer: Arc::new(TopicCategorizer),
        };
        let config = Config {
            simulate_latency: false,
            ..Config::default()
        };
        let service = TranscriptionService::from_config(&config, capabilities);
        (service, transcriber)
    }

    async fn wait_done(service: &TranscriptionService, job_id: &str, user: &str) -> JobSnapshot {
        loop {
            let job = service.get_job(job_id, Some(user)).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[test]
    fn test_check_version() {
        let (service, _) = service();
        assert!(service.check_version(None).is_ok());
        assert!(service.check_version(Some("")).is_ok());
        assert!(service.check_version(Some("1.0.0")).is_ok());
        assert!(matches!(
            service.check_version(Some("2.0.0")),
            Err(ServiceError::VersionMismatch { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_is_immediately_retrievable() {
        let (service, _) = service();

        let submitted = service.submit(None, b"X".to_vec()).await;
        assert_eq!(submitted.status, JobStatus::Queued);

        let job = service
            .get_job(&submitted.job_id, Some(&submitted.user_id))
            .await
            .unwrap();
        assert_eq!(job.job_id, submitted.job_id);
    }

    #[tokio::test]
    async fn test_get_unknown_job() {
        let (service, _) = service();
        let err = service.get_job("missing", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_input_same_user_hits_transcription_cache() {
        let (service, transcriber) = service();
        let user = service.get_user(None).await;

        let a = service.submit(Some(&user), b"X".to_vec()).await;
        assert_eq!(a.user_id, user);
        let a = wait_done(&service, &a.job_id, &user).await;
        assert_eq!(a.status, JobStatus::Completed);
        let calls_before = transcriber.calls.load(Ordering::SeqCst);

        let b = service.submit(Some(&user), b"X".to_vec()).await;
        let b = wait_done(&service, &b.job_id, &user).await;

        assert_eq!(b.status, JobStatus::Completed);
        assert_eq!(b.transcription, a.transcription);
        assert_eq!(b.category, a.category);
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), calls_before);

        let stats = service.cache_stats().await;
        assert_eq!(stats.transcription_cache.hits, 1);
        assert_eq!(stats.transcription_cache.misses, 1);
        assert_eq!(stats.category_cache.hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_jobs_only_returns_own_jobs_in_order() {
        let (service, _) = service();
        let alice = service.get_user(None).await;
        let bob = service.get_user(None).await;

        let a1 = service.submit(Some(&alice), b"1".to_vec()).await.job_id;
        service.submit(Some(&bob), b"2".to_vec()).await;
        let a2 = service.submit(Some(&alice), b"3".to_vec()).await.job_id;

        let listed: Vec<String> = service
            .list_jobs(Some(&alice))
            .await
            .into_iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(listed, vec![a1, a2]);

        assert!(service.list_jobs(Some("stranger")).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_and_clear() {
        let (service, _) = service();
        let submitted = service.submit(None, b"X".to_vec()).await;
        wait_done(&service, &submitted.job_id, &submitted.user_id).await;

        let stats = service.cache_stats().await;
        assert_eq!(stats.active_jobs, 1);
        assert_eq!(stats.in_flight_jobs, 0);
        assert_eq!(stats.users, 1);
        assert_eq!(stats.transcription_cache.entries, 1);
        assert_eq!(stats.category_cache.entries, 1);
        assert_eq!(stats.user_preference_cache.entries, 1);

        service.clear_caches().await;

        let stats = service.cache_stats().await;
        assert_eq!(stats.transcription_cache.entries, 0);
        assert_eq!(stats.category_cache.entries, 0);
        assert_eq!(stats.user_preference_cache.entries, 0);
        assert_eq!(stats.transcription_cache.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_running_job_is_repopulated() {
        let (service, transcriber) = service();
        let user = service.get_user(None).await;

        let first = service.submit(Some(&user), b"X".to_vec()).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);

        service.clear_caches().await;
        assert_eq!(service.cache_stats().await.transcription_cache.entries, 0);

        let first = wait_done(&service, &first.job_id, &user).await;
        assert_eq!(first.status, JobStatus::Completed);
        assert_eq!(service.cache_stats().await.transcription_cache.entries, 1);

        let second = service.submit(Some(&user), b"X".to_vec()).await;
        let second = wait_done(&service, &second.job_id, &user).await;

        assert_eq!(second.transcription, first.transcription);
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache_stats().await.transcription_cache.hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_submissions_both_transcribe() {
        let (service, transcriber) = service();
        let user = service.get_user(None).await;

        let a = service.submit(Some(&user), b"X".to_vec()).await;
        let b = service.submit(Some(&user), b"X".to_vec()).await;
        let a = wait_done(&service, &a.job_id, &user).await;
        let b = wait_done(&service, &b.job_id, &user).await;

        assert_eq!(a.status, JobStatus::Completed);
        assert_eq!(b.status, JobStatus::Completed);
        assert_eq!(a.transcription, b.transcription);
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 2);

        let stats = service.cache_stats().await;
        assert_eq!(stats.transcription_cache.entries, 1);
        assert_eq!(stats.transcription_cache.misses, 2);
        assert_eq!(stats.transcription_cache.hits, 0);
    }

    #[test]
    fn test_latency_disabled_by_config() {
        let config = Config {
            simulate_latency: false,
            ..Config::default()
        };
        let orchestrator_config = OrchestratorConfig::from_config(&config);
        assert_eq!(orchestrator_config.intake_latency, Latency::NONE);
        assert_eq!(orchestrator_config.settle_latency, Latency::NONE);
    }
}
