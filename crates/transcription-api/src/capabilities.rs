//! Injected capabilities used by the job pipeline
//!
//! The orchestrator only depends on these traits. Production wires the
//! simulated transcriber and preference store below together with
//! [`LlmCategorizer`](crate::categorization::LlmCategorizer); tests supply
//! deterministic fakes.

use crate::error::Result;
use crate::types::{Category, LlmProvider};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Turns raw input (audio) into content (a transcript)
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, input: &[u8]) -> Result<String>;
}

/// Looks up which LLM provider a user prefers
#[async_trait]
pub trait PreferenceLookup: Send + Sync {
    async fn lookup(&self, user_id: &str) -> Result<LlmProvider>;
}

/// Categorizes content with the given provider
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, content: &str, provider: LlmProvider) -> Result<Category>;
}

/// The set of capabilities a job pipeline runs against
#[derive(Clone)]
pub struct Capabilities {
    pub content: Arc<dyn ContentResolver>,
    pub preference: Arc<dyn PreferenceLookup>,
    pub categorizer: Arc<dyn Categorizer>,
}

/// A uniformly random delay between `min` and `max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latency {
    pub min: Duration,
    pub max: Duration,
}

impl Latency {
    pub const NONE: Latency = Latency {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn between_secs(min: f64, max: f64) -> Self {
        Self {
            min: Duration::from_secs_f64(min),
            max: Duration::from_secs_f64(max),
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    pub async fn sleep(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

const SAMPLE_TRANSCRIPTS: [&str; 3] = [
    "I've always been fascinated by cars, especially classic muscle cars from the 60s and 70s. The raw power and beautiful design of those vehicles is just incredible.",
    "Bald eagles are such majestic creatures. I love watching them soar through the sky and dive down to catch fish. Their white heads against the blue sky is a sight I'll never forget.",
    "Deep sea diving opens up a whole new world of exploration. The mysterious creatures and stunning coral reefs you encounter at those depths are unlike anything else on Earth.",
];

/// Stand-in for a speech-to-text engine: waits, then returns one of a few
/// canned transcripts
pub struct SimulatedTranscriber {
    latency: Latency,
}

impl SimulatedTranscriber {
    pub fn new(latency: Latency) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedTranscriber {
    fn default() -> Self {
        Self::new(Latency::between_secs(2.0, 5.0))
    }
}

#[async_trait]
impl ContentResolver for SimulatedTranscriber {
    async fn resolve(&self, input: &[u8]) -> Result<String> {
        self.latency.sleep().await;
        let transcript = SAMPLE_TRANSCRIPTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(SAMPLE_TRANSCRIPTS[0]);
        info!(input_bytes = input.len(), "Transcribed input");
        Ok(transcript.to_string())
    }
}

/// Stand-in for a slow database query returning a user's preferred provider
pub struct SimulatedPreferenceStore {
    latency: Latency,
}

impl SimulatedPreferenceStore {
    pub fn new(latency: Latency) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedPreferenceStore {
    fn default() -> Self {
        Self::new(Latency::between_secs(5.0, 8.0))
    }
}

#[async_trait]
impl PreferenceLookup for SimulatedPreferenceStore {
    async fn lookup(&self, user_id: &str) -> Result<LlmProvider> {
        info!(user_id = %user_id, "Expensive database query for LLM preference");
        self.latency.sleep().await;
        let provider = if rand::rng().random_bool(0.5) {
            LlmProvider::OpenAi
        } else {
            LlmProvider::Anthropic
        };
        info!(user_id = %user_id, provider = %provider, "Loaded LLM preference");
        Ok(provider)
    }
}

/// Placeholder input used when a request carries no body: one of ten
/// seeds, so repeated demo submissions hit the transcription cache
pub fn demo_input() -> Vec<u8> {
    rand::rng().random_range(1..=10u32).to_string().into_bytes()
}
