use std::env;
use std::time::Duration;

const HOUR_SECS: u64 = 60 * 60;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_version: String,
    pub cors_origins: Vec<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_model_id: String,
    pub anthropic_model_id: String,
    pub transcription_cache_ttl: Duration,
    pub category_cache_ttl: Duration,
    pub preference_cache_ttl: Duration,
    pub cache_max_entries: Option<usize>,
    pub max_concurrent_jobs: Option<usize>,
    /// Sleep between pipeline steps and inside the simulated capabilities
    pub simulate_latency: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            api_version: "1.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            openai_api_key: None,
            anthropic_api_key: None,
            openai_model_id: "gpt-4o-mini".to_string(),
            anthropic_model_id: "claude-3-5-haiku-latest".to_string(),
            transcription_cache_ttl: Duration::from_secs(24 * HOUR_SECS),
            category_cache_ttl: Duration::from_secs(24 * HOUR_SECS),
            preference_cache_ttl: Duration::from_secs(HOUR_SECS),
            cache_max_entries: None,
            max_concurrent_jobs: None,
            simulate_latency: true,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let api_version = env::var("API_VERSION").unwrap_or(defaults.api_version);

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
            .unwrap_or(defaults.cors_origins);

        let openai_api_key = non_empty_var("OPENAI_API_KEY");
        let anthropic_api_key = non_empty_var("ANTHROPIC_API_KEY");

        let openai_model_id = env::var("OPENAI_MODEL_ID").unwrap_or(defaults.openai_model_id);
        let anthropic_model_id =
            env::var("ANTHROPIC_MODEL_ID").unwrap_or(defaults.anthropic_model_id);

        let simulate_latency = env::var("SIMULATE_LATENCY")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.simulate_latency);

        Self {
            port,
            api_version,
            cors_origins,
            openai_api_key,
            anthropic_api_key,
            openai_model_id,
            anthropic_model_id,
            transcription_cache_ttl: secs_var("TRANSCRIPTION_CACHE_TTL_SECS")
                .unwrap_or(defaults.transcription_cache_ttl),
            category_cache_ttl: secs_var("CATEGORY_CACHE_TTL_SECS")
                .unwrap_or(defaults.category_cache_ttl),
            preference_cache_ttl: secs_var("PREFERENCE_CACHE_TTL_SECS")
                .unwrap_or(defaults.preference_cache_ttl),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok()),
            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0),
            simulate_latency,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn secs_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.api_version, "1.0.0");
        assert_eq!(config.transcription_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.category_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.preference_cache_ttl, Duration::from_secs(3_600));
        assert!(config.cache_max_entries.is_none());
        assert!(config.max_concurrent_jobs.is_none());
        assert!(config.simulate_latency);
    }
}
