use crate::error::AiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// Seam for the external text-completion service. Construct one client at
/// startup and hand it to every component that needs it.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, AiError>;

    fn model_id(&self) -> &str;
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    output: Option<String>,
}

/// HTTP implementation of [`GenerativeClient`] against a single
/// completion endpoint with optional bearer auth.
pub struct HttpGenerativeClient {
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl HttpGenerativeClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, AiError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            client: Client::new(),
        })
    }
}

#[async_trait]
impl GenerativeClient for HttpGenerativeClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, AiError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            temperature,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AiError::BackendResponse {
                backend: "generation".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.text.or(body.output).unwrap_or_default().trim().to_string())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Strips a leading/trailing triple-backtick fence and an optional
/// leading `json` label. Generation backends asked for JSON-only output
/// still wrap it this way often enough that every parse goes through
/// here.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with("```") {
        let mut lines: Vec<&str> = trimmed.lines().collect();
        if lines.first().is_some_and(|line| line.starts_with("```")) {
            lines.remove(0);
        }
        if lines.last().is_some_and(|line| line.trim().starts_with("```")) {
            lines.pop();
        }
        return finish_strip(lines.join("\n").trim().to_string());
    }

    finish_strip(trimmed.to_string())
}

fn finish_strip(text: String) -> String {
    let lowered = text.to_lowercase();
    if lowered.starts_with("json") {
        text[4..].trim_start().to_string()
    } else {
        text
    }
}

/// Lenient parse of a model response expected to be a JSON array.
/// Anything that is not parseable JSON, or not an array, degrades to an
/// empty list.
pub fn parse_json_array(text: &str) -> Vec<Value> {
    let body = strip_code_fences(text);
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Lenient parse of a model response expected to be a JSON object.
pub fn parse_json_object(text: &str) -> Option<Value> {
    let body = strip_code_fences(text);
    match serde_json::from_str::<Value>(&body) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n[{\"title\": \"One\"}]\n```";
        let parsed = parse_json_array(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["title"], "One");
    }

    #[test]
    fn bare_json_label_is_stripped() {
        let raw = "JSON [1, 2, 3]";
        assert_eq!(parse_json_array(raw).len(), 3);
    }

    #[test]
    fn prose_degrades_to_empty() {
        assert!(parse_json_array("I could not find any sections.").is_empty());
    }

    #[test]
    fn non_array_json_degrades_to_empty() {
        assert!(parse_json_array("{\"title\": \"One\"}").is_empty());
    }

    #[test]
    fn fence_without_language_label_is_unwrapped() {
        let raw = "```\n[]\n```";
        assert!(parse_json_array(raw).is_empty());
        assert_eq!(strip_code_fences(raw), "[]");
    }

    #[test]
    fn object_responses_parse_for_flag_payloads() {
        let raw = "```json\n{\"flags\": []}\n```";
        let value = parse_json_object(raw).expect("object parses");
        assert!(value["flags"].as_array().is_some());
    }
}
