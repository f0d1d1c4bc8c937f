//! Transcript categorization backed by OpenAI or Anthropic
//!
//! Both providers are asked for the same structured answer (primary topic,
//! sentiment, comma separated keywords, confidence and a short summary),
//! which is validated before it becomes a [`Category`].

use crate::capabilities::Categorizer;
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::types::{Category, LlmProvider, Sentiment};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const CATEGORIZE_TOOL: &str = "categorize_transcript";

const SYSTEM_PROMPT: &str = "You are an expert transcript analyzer. Your job is to categorize transcripts based on content.

You MUST respond using ONLY valid JSON with these fields:
- primary_topic: The main topic of the transcript
- sentiment: Must be one of [\"positive\", \"neutral\", \"negative\"]
- keywords: 3-5 comma-separated keywords from the transcript
- confidence: Confidence score for the categorization (0.0 to 1.0)
- summary: A 1-2 sentence summary of the transcript

DO NOT include any explanations, just return the JSON.";

const REQUIRED_FIELDS: [&str; 5] = [
    "primary_topic",
    "sentiment",
    "keywords",
    "confidence",
    "summary",
];

/// Categorizer calling the provider the user prefers
pub struct LlmCategorizer {
    client: Client,
    openai_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    openai_model: String,
    anthropic_model: String,
}

impl LlmCategorizer {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            openai_api_key: config.openai_api_key.clone(),
            anthropic_api_key: config.anthropic_api_key.clone(),
            openai_model: config.openai_model_id.clone(),
            anthropic_model: config.anthropic_model_id.clone(),
        })
    }

    async fn categorize_openai(&self, api_key: &str, transcript: &str) -> Result<Category> {
        let body = json!({
            "model": self.openai_model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Please categorize this transcript: {}", transcript) },
            ],
        });

        let response: OpenAiResponse = self
            .client
            .post(format!("{}/v1/chat/completions", OPENAI_BASE_URL))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::Capability("OpenAI returned no content".to_string()))?;

        parse_category_json(&content)
    }

    async fn categorize_anthropic(&self, api_key: &str, transcript: &str) -> Result<Category> {
        let body = json!({
            "model": self.anthropic_model,
            "max_tokens": 1024,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": format!("Please categorize this transcript: {}", transcript) },
            ],
            "tools": [category_tool()],
            "tool_choice": { "type": "tool", "name": CATEGORIZE_TOOL },
        });

        let response: AnthropicResponse = self
            .client
            .post(format!("{}/v1/messages", ANTHROPIC_BASE_URL))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let input = response
            .content
            .into_iter()
            .find(|block| block.kind == "tool_use")
            .and_then(|block| block.input)
            .ok_or_else(|| {
                ServiceError::Capability("Anthropic returned no tool call".to_string())
            })?;

        parse_category(&input)
    }
}

#[async_trait]
impl Categorizer for LlmCategorizer {
    async fn categorize(&self, content: &str, provider: LlmProvider) -> Result<Category> {
        debug!(provider = %provider, chars = content.len(), "Categorizing transcript");

        let category = match provider {
            LlmProvider::OpenAi => {
                let key = self.openai_api_key.as_deref().ok_or_else(|| {
                    ServiceError::Config("OPENAI_API_KEY not set in environment".to_string())
                })?;
                self.categorize_openai(key, content).await?
            }
            LlmProvider::Anthropic => {
                let key = self.anthropic_api_key.as_deref().ok_or_else(|| {
                    ServiceError::Config("ANTHROPIC_API_KEY not set in environment".to_string())
                })?;
                self.categorize_anthropic(key, content).await?
            }
        };

        info!(provider = %provider, topic = %category.primary_topic, "Categorized transcript");
        Ok(category)
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    input: Option<Value>,
}

fn category_tool() -> Value {
    json!({
        "name": CATEGORIZE_TOOL,
        "description": "Tool schema for categorizing a transcript",
        "input_schema": {
            "type": "object",
            "properties": {
                "primary_topic": { "type": "string", "description": "The primary topic discussed in the transcript" },
                "sentiment": { "type": "string", "enum": ["positive", "neutral", "negative"], "description": "The overall sentiment of the transcript" },
                "keywords": { "type": "string", "description": "3-5 keywords that represent the main topics in the transcript, comma separated" },
                "confidence": { "type": "number", "description": "Confidence score for the categorization (0.0 to 1.0)" },
                "summary": { "type": "string", "description": "A short summary of the transcript content (1-2 sentences)" },
            },
            "required": REQUIRED_FIELDS,
        },
    })
}

/// Parse a provider's raw JSON text answer
pub fn parse_category_json(text: &str) -> Result<Category> {
    let value: Value = serde_json::from_str(text)
        .map_err(|_| ServiceError::Capability("Response is not valid JSON".to_string()))?;
    parse_category(&value)
}

/// Validate a structured answer and convert it into a [`Category`].
///
/// Keywords may arrive as a comma separated string or as an array.
pub fn parse_category(value: &Value) -> Result<Category> {
    let invalid = ServiceError::Capability;

    for field in REQUIRED_FIELDS {
        if value.get(field).is_none() {
            return Err(invalid(format!("Missing required field: {}", field)));
        }
    }

    let text_field = |field: &str| -> Result<String> {
        value[field]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| invalid(format!("Invalid {} value: {}", field, value[field])))
    };

    let sentiment = value["sentiment"]
        .as_str()
        .and_then(Sentiment::parse)
        .ok_or_else(|| invalid(format!("Invalid sentiment value: {}", value["sentiment"])))?;

    let confidence = value["confidence"]
        .as_f64()
        .filter(|c| (0.0..=1.0).contains(c))
        .ok_or_else(|| invalid(format!("Invalid confidence value: {}", value["confidence"])))?;

    let keywords = match &value["keywords"] {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        other => return Err(invalid(format!("Invalid keywords value: {}", other))),
    };

    Ok(Category {
        primary_topic: text_field("primary_topic")?,
        sentiment,
        keywords,
        confidence,
        summary: text_field("summary")?,
    })
}
