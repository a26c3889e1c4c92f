//! LLM API interaction.
//!
//! This module provides the single external call boundary of the report:
//! the unified prompt goes out through [`AskAsync::ask`] exactly once per run.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`GeminiClient`]: Google Gemini `generateContent` over `reqwest`
//!
//! Tests substitute their own [`AskAsync`] implementations to record the
//! prompt or simulate failures.
//!
//! # Failure policy
//!
//! There is no retry loop. Transport errors, non-2xx answers (429 reported as
//! quota exhaustion), API error bodies and replies without text all surface
//! as [`AiRequestError`] and end the run.

use crate::config::GeminiConfig;
use crate::error::AiRequestError;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and return its reply.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, AiRequestError>;
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

/// Client for the Gemini `generateContent` endpoint.
///
/// Requests JSON output (`responseMimeType: application/json`) and returns
/// the concatenated text parts of the first candidate.
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from the Gemini settings.
    ///
    /// # Errors
    ///
    /// Returns [`AiRequestError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &GeminiConfig) -> Result<Self, AiRequestError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

impl AskAsync for GeminiClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(prompt_chars = text.chars().count()))]
    async fn ask(&self, text: &str) -> Result<Self::Response, AiRequestError> {
        let t0 = Instant::now();
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let res = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                body = %truncate_for_log(&body, 300),
                "Gemini request rejected"
            );
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                AiRequestError::QuotaExceeded(body)
            } else {
                AiRequestError::Status {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let resp: GeminiResponse = res.json().await?;
        if let Some(error) = resp.error {
            return Err(AiRequestError::Api(error.message));
        }

        let reply = resp
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(AiRequestError::EmptyResponse)?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            reply_chars = reply.chars().count(),
            "Gemini request succeeded"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    #[tokio::test]
    async fn test_ask_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "hello"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{\"greeting\":"}, {"text": "\"hi\"}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let reply = client.ask("hello").await.unwrap();
        assert_eq!(reply, r#"{"greeting":"hi"}"#);
    }

    #[tokio::test]
    async fn test_ask_quota_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client.ask("hello").await.unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn test_ask_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, AiRequestError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_ask_api_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"message": "API key not valid"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, AiRequestError::Api(ref m) if m.contains("not valid")));
    }

    #[tokio::test]
    async fn test_ask_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, AiRequestError::EmptyResponse));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = GeminiClient::new(&config("http://localhost:1/")).unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("test-key"));
        assert!(dbg.contains("http://localhost:1/v1beta/models/gemini-2.5-flash:generateContent"));
    }
}
