//! `ChatModel` over any endpoint that speaks the OpenAI Chat Completions API.
//!
//! Every call asks for `response_format = json_object`; the gateway still
//! verifies the answer, since not every compatible server honours it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use clinisim_contracts::error::{ClinisimError, ClinisimResult};
use clinisim_core::traits::{ChatModel, ChatRequest};

/// Upper bound for one HTTP exchange. The gateway's per-call timeout is
/// normally shorter.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// How much of an error body to keep in messages.
const BODY_EXCERPT_CHARS: usize = 200;

/// True for HTTP statuses where repeating the call may succeed.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT_CHARS).collect()
}

pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> ClinisimResult<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ClinisimError::Config {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    /// Read the API key from the environment variable `api_key_env`.
    ///
    /// A missing or empty variable is a `Config` error.
    pub fn from_env(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key_env: &str,
    ) -> ClinisimResult<Self> {
        let key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ClinisimError::Config {
                reason: format!("environment variable {} is not set", api_key_env),
            })?;
        Self::new(base_url, model, Some(key))
    }

    /// `{base}/v1/chat/completions`, tolerating a base that already ends in `/v1`.
    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{}/v1/chat/completions", base)
    }

    fn request_body<'a>(&'a self, request: &'a ChatRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatCompletionMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> ClinisimResult<String> {
        let url = self.completions_url();
        debug!(node = %request.node, model = %self.model, %url, "sending chat completion");

        let mut builder = self.client.post(&url).json(&self.request_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(node = %request.node, error = %e, "chat completion request failed");
            ClinisimError::Transport {
                reason: e.to_string(),
                retryable: e.is_timeout() || e.is_connect(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ClinisimError::Transport {
            reason: format!("failed to read response body: {}", e),
            retryable: true,
        })?;
        debug!(node = %request.node, status = status.as_u16(), "chat completion response");

        if !status.is_success() {
            return Err(ClinisimError::Transport {
                reason: format!("HTTP {}: {}", status, excerpt(&body)),
                retryable: is_retryable_status(status.as_u16()),
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| ClinisimError::Transport {
                reason: format!("malformed completion envelope: {}. Raw: {}", e, excerpt(&body)),
                retryable: false,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClinisimError::Transport {
                reason: "completion has no choices or empty content".to_string(),
                retryable: false,
            })
    }
}

// ── Chat Completions wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            node: "GenerateResponse".to_string(),
            system: "You are the patient.".to_string(),
            user: "How have you been sleeping?".to_string(),
            temperature: 0.8,
        }
    }

    /// Serve exactly one HTTP exchange with `status` and `body`, returning the
    /// raw request the client sent.
    async fn serve_once(status: u16, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{}", addr), handle)
    }

    fn request_json(raw: &str) -> Value {
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        serde_json::from_str(body).unwrap()
    }

    // ── URL and body ──────────────────────────────────────────────────────────

    #[test]
    fn completions_url_avoids_double_v1() {
        for base in ["https://api.example.com", "https://api.example.com/v1", "https://api.example.com/v1/"] {
            let model = OpenAiChatModel::new(base, "gpt-4o", None).unwrap();
            assert_eq!(model.completions_url(), "https://api.example.com/v1/chat/completions");
        }
    }

    #[test]
    fn body_requests_json_object_with_both_prompts() {
        let model = OpenAiChatModel::new("http://localhost", "gpt-4o", None).unwrap();
        let req = request();
        let body = serde_json::to_value(model.request_body(&req)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"], json!({ "type": "json_object" }));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "How have you been sleeping?");
    }

    #[test]
    fn retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(status), "{status} should not be retryable");
        }
    }

    #[test]
    fn missing_key_env_is_config_error() {
        match OpenAiChatModel::from_env("http://localhost", "gpt-4o", "CLINISIM_TEST_KEY_THAT_IS_NEVER_SET") {
            Err(ClinisimError::Config { reason }) => {
                assert!(reason.contains("CLINISIM_TEST_KEY_THAT_IS_NEVER_SET"))
            }
            Err(other) => panic!("expected Config, got {:?}", other),
            Ok(_) => panic!("expected Config, got a model"),
        }
    }

    // ── HTTP exchange ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let envelope = json!({
            "id": "cmpl-1",
            "choices": [{ "message": { "role": "assistant", "content": "{\"patient_response\":\"Badly.\"}" } }]
        });
        let (base, server) = serve_once(200, envelope.to_string()).await;
        let model = OpenAiChatModel::new(base, "gpt-4o", Some("sk-test".to_string())).unwrap();

        let text = model.complete(&request()).await.unwrap();
        assert_eq!(text, "{\"patient_response\":\"Badly.\"}");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert_eq!(request_json(&raw)["temperature"].as_f64().unwrap() as f32, 0.8);
    }

    #[tokio::test]
    async fn server_error_is_retryable_transport() {
        let (base, _server) = serve_once(503, "{\"error\":\"overloaded\"}".to_string()).await;
        let model = OpenAiChatModel::new(base, "gpt-4o", None).unwrap();

        match model.complete(&request()).await {
            Err(ClinisimError::Transport { reason, retryable }) => {
                assert!(retryable);
                assert!(reason.contains("503"));
            }
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn auth_failure_is_not_retryable() {
        let (base, _server) = serve_once(401, "{\"error\":\"bad key\"}".to_string()).await;
        let model = OpenAiChatModel::new(base, "gpt-4o", Some("wrong".to_string())).unwrap();

        match model.complete(&request()).await {
            Err(ClinisimError::Transport { retryable, .. }) => assert!(!retryable),
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_transport_error() {
        let (base, _server) = serve_once(200, json!({ "choices": [] }).to_string()).await;
        let model = OpenAiChatModel::new(base, "gpt-4o", None).unwrap();

        assert!(matches!(
            model.complete(&request()).await,
            Err(ClinisimError::Transport { retryable: false, .. })
        ));
    }
}
