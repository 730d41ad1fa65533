use std::time::Duration;

use eyre::{Result, bail};
use log::debug;
use reqwest::StatusCode;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CHAT_ENDPOINT: &str = "/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Chat API failures the caller can act on
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{env_var} environment variable not set and no api_key in config")]
    MissingApiKey { env_var: &'static str },

    #[error("{api} API rejected the API key (401); check your configuration")]
    Unauthorized { api: &'static str },

    #[error("{api} API rate limit exceeded (429); try again later")]
    RateLimited { api: &'static str },

    #[error("{api} API returned {status}: {message}")]
    Status {
        api: &'static str,
        status: StatusCode,
        message: String,
    },
}

impl ChatError {
    /// Failures that repeat identically on every attempt
    pub fn is_permanent(&self) -> bool {
        matches!(self, ChatError::MissingApiKey { .. } | ChatError::Unauthorized { .. })
    }
}

/// Everything needed to reach the chat-completion endpoint
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ChatSettings {
    /// Environment variable holding the key for the configured model
    pub fn api_key_env(&self) -> &'static str {
        if is_anthropic_model(&self.model) {
            "ANTHROPIC_API_KEY"
        } else if self.api_url.contains("openai.com") {
            "OPENAI_API_KEY"
        } else {
            "DEEPSEEK_API_KEY"
        }
    }

    fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        let env_var = self.api_key_env();
        std::env::var(env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ChatError::MissingApiKey { env_var }.into())
    }
}

fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

fn chat_url(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    if base.ends_with(CHAT_ENDPOINT) {
        base.to_string()
    } else {
        format!("{}{CHAT_ENDPOINT}", base.trim_end_matches("/v1"))
    }
}

/// Send `prompt` as a single user message and return the model's raw text reply
pub async fn complete(client: &reqwest::Client, settings: &ChatSettings, prompt: &str) -> Result<String> {
    let api_key = settings.resolve_api_key()?;

    if is_anthropic_model(&settings.model) {
        complete_anthropic(client, settings, &api_key, prompt).await
    } else {
        complete_openai(client, settings, &api_key, prompt).await
    }
}

async fn complete_anthropic(
    client: &reqwest::Client,
    settings: &ChatSettings,
    api_key: &str,
    prompt: &str,
) -> Result<String> {
    debug!("Requesting analysis via Anthropic API with model {}", settings.model);

    let body = serde_json::json!({
        "model": settings.model,
        "max_tokens": settings.max_tokens,
        "temperature": settings.temperature,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    });

    let resp = client
        .post(ANTHROPIC_URL)
        .timeout(settings.timeout)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(status_error("Anthropic", status, &body).into());
    }

    let json: serde_json::Value = resp.json().await?;
    extract_anthropic_text(&json)
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

async fn complete_openai(
    client: &reqwest::Client,
    settings: &ChatSettings,
    api_key: &str,
    prompt: &str,
) -> Result<String> {
    let url = chat_url(&settings.api_url);
    debug!("Requesting analysis from {url} with model {}", settings.model);

    let body = serde_json::json!({
        "model": settings.model,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ],
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens
    });

    let resp = client
        .post(&url)
        .timeout(settings.timeout)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(status_error("chat completion", status, &body).into());
    }

    let json: serde_json::Value = resp.json().await?;
    extract_openai_text(&json)
}

fn status_error(api: &'static str, status: StatusCode, body: &str) -> ChatError {
    match status {
        StatusCode::UNAUTHORIZED => ChatError::Unauthorized { api },
        StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimited { api },
        _ => {
            let message = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            ChatError::Status { api, status, message }
        }
    }
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .pointer("/choices/0/message/content")
        .and_then(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected chat completion response format");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_anthropic_model() {
        assert!(is_anthropic_model("claude-sonnet-4-6"));
        assert!(!is_anthropic_model("deepseek-chat"));
        assert!(!is_anthropic_model("gpt-4o-mini"));
    }

    #[test]
    fn test_chat_url() {
        assert_eq!(chat_url("https://api.deepseek.com"), "https://api.deepseek.com/v1/chat/completions");
        assert_eq!(chat_url("https://api.openai.com/v1/"), "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            chat_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_api_key_env() {
        let mut settings = ChatSettings::default();
        assert_eq!(settings.api_key_env(), "DEEPSEEK_API_KEY");
        settings.api_url = "https://api.openai.com".to_string();
        assert_eq!(settings.api_key_env(), "OPENAI_API_KEY");
        settings.model = "claude-sonnet-4-6".to_string();
        assert_eq!(settings.api_key_env(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_configured_key_wins() {
        let settings = ChatSettings {
            api_key: Some("  sk-test  ".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_status_error() {
        let unauthorized = status_error("x", StatusCode::UNAUTHORIZED, "");
        assert!(unauthorized.to_string().contains("401"));
        assert!(unauthorized.is_permanent());

        let limited = status_error("x", StatusCode::TOO_MANY_REQUESTS, "");
        assert!(limited.to_string().contains("rate limit"));
        assert!(!limited.is_permanent());

        let other = status_error("x", StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad model"}}"#);
        assert!(other.to_string().ends_with("bad model"));
        assert!(!other.is_permanent());
    }

    #[test]
    fn test_missing_key_is_permanent() {
        let err: eyre::Report = ChatError::MissingApiKey { env_var: "DEEPSEEK_API_KEY" }.into();
        let chat = err.downcast_ref::<ChatError>().unwrap();
        assert!(chat.is_permanent());
        assert!(err.to_string().starts_with("DEEPSEEK_API_KEY"));
    }

    #[test]
    fn test_extract_anthropic_text() {
        let json = serde_json::json!({
            "content": [
                {"type": "text", "text": "**Detailed Summary:** "},
                {"type": "text", "text": "Here it is."}
            ]
        });
        assert_eq!(extract_anthropic_text(&json).unwrap(), "**Detailed Summary:** Here it is.");
        assert!(extract_anthropic_text(&serde_json::json!({"content": []})).is_err());
    }

    #[test]
    fn test_extract_openai_text() {
        let json = serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Analysis of the video."}}
            ]
        });
        assert_eq!(extract_openai_text(&json).unwrap(), "Analysis of the video.");
        assert!(extract_openai_text(&serde_json::json!({"choices": []})).is_err());
        assert!(
            extract_openai_text(&serde_json::json!({"choices": [{"message": {"content": "  "}}]})).is_err()
        );
    }
}
