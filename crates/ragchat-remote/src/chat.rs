use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use ragchat_core::config::LlmSettings;
use ragchat_core::traits::LanguageModel;
use ragchat_core::{Error, Result};

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiChat {
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    client: Client,
}

impl OpenAiChat {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: None,
            client: Client::new(),
        }
    }

    /// Requires an API key from `llm.api_key` or `OPENAI_API_KEY`.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::ConfigurationError("llm.api_key is not set (APP_LLM__API_KEY or OPENAI_API_KEY)".into())
            })?;
        let mut chat = Self::new(&settings.base_url, &settings.model, &key);
        chat.temperature = settings.temperature;
        Ok(chat)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        if let (Some(obj), Some(t)) = (body.as_object_mut(), self.temperature) {
            obj.insert("temperature".to_string(), json!(t));
        }
        body
    }
}

pub(crate) fn parse_completion(payload: &Value) -> anyhow::Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("completion response has no message content"))
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion failed ({status}): {text}"));
        }
        let payload: Value = res.json().await.context("decoding chat completion")?;
        let content = parse_completion(&payload)?;
        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
