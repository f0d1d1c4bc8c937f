//! Background job pipeline
//!
//! Every submitted job runs on its own tokio task:
//!
//! ```text
//! queued -> processing 0.1 -> (intake) 0.3 -> transcript 0.5
//!   category cached:  -> 0.9
//!   category missing: -> preference -> 0.7 -> categorize -> 0.9
//! -> (settle) completed 1.0
//! ```
//!
//! A failure or panic while transcribing or looking up the preference moves
//! the job to `error`. A failed or panicking categorization is logged and the
//! job completes without a category. Nothing is retried.

use crate::capabilities::{Capabilities, Latency};
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::jobs::JobStore;
use crate::types::{Category, Job, LlmProvider};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use ttl_cache::{fingerprint, CacheStats, TtlCache};

/// The three caches consulted by the pipeline
pub struct Caches {
    /// Raw input fingerprint -> transcript
    pub transcription: TtlCache<String>,
    /// Transcript fingerprint -> category
    pub category: TtlCache<Category>,
    /// User id -> preferred provider
    pub preference: TtlCache<LlmProvider>,
}

impl Caches {
    pub fn new(
        transcription_ttl: Duration,
        category_ttl: Duration,
        preference_ttl: Duration,
        max_entries: Option<usize>,
    ) -> Self {
        Self {
            transcription: bounded(TtlCache::new("transcription", transcription_ttl), max_entries),
            category: bounded(TtlCache::new("category", category_ttl), max_entries),
            preference: bounded(TtlCache::new("user_preference", preference_ttl), max_entries),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.transcription_cache_ttl,
            config.category_cache_ttl,
            config.preference_cache_ttl,
            config.cache_max_entries,
        )
    }

    pub async fn clear_all(&self) {
        self.transcription.clear().await;
        self.category.clear().await;
        self.preference.clear().await;
    }

    pub async fn stats(&self) -> (CacheStats, CacheStats, CacheStats) {
        (
            self.transcription.stats().await,
            self.category.stats().await,
            self.preference.stats().await,
        )
    }
}

fn bounded<V: Clone + Send + Sync>(cache: TtlCache<V>, max_entries: Option<usize>) -> TtlCache<V> {
    match max_entries {
        Some(max) => cache.with_max_entries(max),
        None => cache,
    }
}

/// Pacing and concurrency settings for the pipeline
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between pickup and transcription
    pub intake_latency: Latency,
    /// Delay between categorization and completion
    pub settle_latency: Latency,
    /// Upper bound on jobs executing at once; submission never waits on it
    pub max_concurrent_jobs: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            intake_latency: Latency::between_secs(0.5, 1.0),
            settle_latency: Latency::between_secs(0.5, 1.0),
            max_concurrent_jobs: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        if config.simulate_latency {
            Self {
                max_concurrent_jobs: config.max_concurrent_jobs,
                ..defaults
            }
        } else {
            Self {
                intake_latency: Latency::NONE,
                settle_latency: Latency::NONE,
                max_concurrent_jobs: config.max_concurrent_jobs,
            }
        }
    }
}

/// Drives jobs from `queued` to a terminal state
#[derive(Clone)]
pub struct JobOrchestrator {
    jobs: Arc<JobStore>,
    caches: Arc<Caches>,
    capabilities: Capabilities,
    config: OrchestratorConfig,
    limiter: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<JobStore>,
        caches: Arc<Caches>,
        capabilities: Capabilities,
        config: OrchestratorConfig,
    ) -> Self {
        let permits = config
            .max_concurrent_jobs
            .unwrap_or(Semaphore::MAX_PERMITS)
            .clamp(1, Semaphore::MAX_PERMITS);

        Self {
            jobs,
            caches,
            capabilities,
            config,
            limiter: Arc::new(Semaphore::new(permits)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a queued job and start processing it in the background.
    /// Returns as soon as the job is stored.
    pub async fn submit(&self, user_id: &str, input: Vec<u8>) -> String {
        let job_id = self.jobs.create(user_id).await;
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let this = self.clone();
        let task_job_id = job_id.clone();
        let task_user_id = user_id.to_string();
        tokio::spawn(async move {
            this.run(&task_job_id, &task_user_id, &input).await;
        });

        info!(job_id = %job_id, user_id = %user_id, "Job created");
        job_id
    }

    /// Jobs submitted but not yet completed or failed
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn run(&self, job_id: &str, user_id: &str, input: &[u8]) {
        let result = match self.limiter.acquire().await {
            Ok(_permit) => guarded(self.process(job_id, user_id, input)).await,
            Err(e) => Err(ServiceError::Capability(format!(
                "Job scheduler unavailable: {}",
                e
            ))),
        };

        match result {
            Ok(()) => {
                self.jobs.update(job_id, Job::complete).await;
                info!(job_id = %job_id, user_id = %user_id, "Job completed");
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id = %job_id, user_id = %user_id, error = %message, "Error processing job");
                self.jobs.update(job_id, |job| job.fail(message)).await;
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn process(&self, job_id: &str, user_id: &str, input: &[u8]) -> Result<()> {
        self.jobs.update(job_id, Job::start).await;

        self.config.intake_latency.sleep().await;
        self.jobs.update(job_id, |job| job.advance(0.3)).await;

        let transcription = self.resolve_content(job_id, input).await?;
        self.jobs
            .update(job_id, |job| {
                job.transcription = Some(transcription.clone());
                job.advance(0.5);
            })
            .await;

        let content_key = fingerprint(transcription.as_bytes());

        if let Some(category) = self.caches.category.get(&content_key).await {
            info!(job_id = %job_id, "Using cached categorization");
            self.jobs
                .update(job_id, |job| {
                    job.category = Some(category);
                    job.advance(0.9);
                })
                .await;
        } else {
            let provider = self.resolve_preference(user_id).await?;
            self.jobs.update(job_id, |job| job.advance(0.7)).await;

            info!(job_id = %job_id, provider = %provider, "Categorizing transcription");
            match guarded(
                self.capabilities
                    .categorizer
                    .categorize(&transcription, provider),
            )
            .await
            {
                Ok(category) => {
                    info!(job_id = %job_id, topic = %category.primary_topic, "Categorization successful");
                    self.caches
                        .category
                        .set(content_key, category.clone())
                        .await;
                    self.jobs
                        .update(job_id, |job| job.category = Some(category))
                        .await;
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Categorization failed, completing without category");
                }
            }

            self.jobs.update(job_id, |job| job.advance(0.9)).await;
        }

        self.config.settle_latency.sleep().await;
        Ok(())
    }

    /// Transcript for `input`, from cache when possible. A fresh transcript
    /// is always written back, even if a concurrent job stored one meanwhile.
    async fn resolve_content(&self, job_id: &str, input: &[u8]) -> Result<String> {
        let input_key = fingerprint(input);

        if let Some(transcription) = self.caches.transcription.get(&input_key).await {
            info!(job_id = %job_id, "Using cached transcription");
            return Ok(transcription);
        }

        let transcription = self.capabilities.content.resolve(input).await?;
        self.caches
            .transcription
            .set(input_key, transcription.clone())
            .await;
        Ok(transcription)
    }

    async fn resolve_preference(&self, user_id: &str) -> Result<LlmProvider> {
        let lookup = &self.capabilities.preference;
        let provider = self
            .caches
            .preference
            .try_get_or_set(user_id, || lookup.lookup(user_id))
            .await?;
        info!(user_id = %user_id, provider = %provider, "Resolved LLM preference");
        Ok(provider)
    }
}

/// Await `future`, turning a panic into a capability error
async fn guarded<T, F>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panic_error(payload)))
}

fn panic_error(payload: Box<dyn Any + Send>) -> ServiceError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ServiceError::Capability(format!("Job step panicked: {}", message))
}
