//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for the `generateContent` endpoint with:
//! - Multimodal requests (text and inline base64 images)
//! - Image output via response modalities
//! - Structured JSON output via response MIME type
//! - A retrying transport with exponential backoff (see [`retry`])

pub mod retry;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use retry::{RetryPolicy, RETRYABLE_STATUSES};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl Error {
    /// Whether the resilient caller should try this request again.
    ///
    /// Transport failures and the statuses in [`RETRYABLE_STATUSES`] are
    /// transient; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        if api_key.trim().is_empty() {
            return Err(Error::NoApiKey);
        }
        Ok(Self::new(api_key))
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the retry policy used for every call.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send a `generateContent` request, retrying transient failures.
    pub async fn generate_content(&self, model: &str, request: &Request) -> Result<Response, Error> {
        retry::with_backoff(&self.retry, model, || self.send_once(model, request)).await
    }

    /// Issue exactly one HTTP request with no retry.
    async fn send_once(&self, model: &str, request: &Request) -> Result<Response, Error> {
        let api_request = ApiRequest::from(request);
        let headers = self.build_headers();

        let response = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.without_url().to_string()))?;

        parse_response_body(&body)
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A `generateContent` request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub contents: Vec<Content>,
    pub response_modalities: Option<Vec<Modality>>,
    pub response_mime_type: Option<String>,
}

impl Request {
    /// Create a single-turn request from the given parts.
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content { role: None, parts }],
            ..Default::default()
        }
    }

    /// Ask the model for specific output modalities (e.g. text and image).
    pub fn with_response_modalities(mut self, modalities: &[Modality]) -> Self {
        self.response_modalities = Some(modalities.to_vec());
        self
    }

    /// Ask the model for a structured response (e.g. `application/json`).
    pub fn with_response_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.response_mime_type = Some(mime_type.into());
        self
    }
}

/// One turn of content.
#[derive(Debug, Clone)]
pub struct Content {
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// A piece of multimodal content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text {
        text: String,
    },
    /// Base64-encoded bytes with their MIME type.
    InlineData {
        mime_type: String,
        data: String,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Extract text from a Text part.
    pub fn as_text(&self) -> Option<&str> {
        if let Part::Text { text } = self {
            Some(text)
        } else {
            None
        }
    }
}

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "TEXT",
            Modality::Image => "IMAGE",
        }
    }
}

/// The first candidate of a `generateContent` response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
    /// Set when the prompt itself was blocked and no candidate was produced.
    pub block_reason: Option<String>,
}

impl Response {
    /// The first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }

    /// The first inline data part as `(mime_type, base64_data)`.
    pub fn first_inline_data(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|part| match part {
            Part::InlineData { mime_type, data } => Some((mime_type.as_str(), data.as_str())),
            Part::Text { .. } => None,
        })
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

impl From<&Request> for ApiRequest {
    fn from(request: &Request) -> Self {
        let generation_config = if request.response_modalities.is_none()
            && request.response_mime_type.is_none()
        {
            None
        } else {
            Some(ApiGenerationConfig {
                response_modalities: request
                    .response_modalities
                    .as_ref()
                    .map(|m| m.iter().map(|m| m.as_str().to_string()).collect()),
                response_mime_type: request.response_mime_type.clone(),
            })
        };

        ApiRequest {
            contents: request
                .contents
                .iter()
                .map(|c| ApiContent {
                    role: c.role.clone(),
                    parts: c.parts.iter().map(ApiPart::from).collect(),
                })
                .collect(),
            generation_config,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiBlob>,
}

impl From<&Part> for ApiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text { text } => ApiPart {
                text: Some(text.clone()),
                inline_data: None,
            },
            Part::InlineData { mime_type, data } => ApiPart {
                text: None,
                inline_data: Some(ApiBlob {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn parse_response(api_response: ApiResponse) -> Response {
    let block_reason = api_response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let Some(candidate) = api_response.candidates.into_iter().next() else {
        return Response {
            block_reason,
            ..Default::default()
        };
    };

    let parts = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| match (part.inline_data, part.text) {
            (Some(blob), _) => Some(Part::InlineData {
                mime_type: blob.mime_type,
                data: blob.data,
            }),
            (None, Some(text)) => Some(Part::Text { text }),
            (None, None) => None,
        })
        .collect();

    Response {
        parts,
        finish_reason: candidate.finish_reason,
        block_reason,
    }
}

fn parse_response_body(body: &str) -> Result<Response, Error> {
    let api_response: ApiResponse =
        serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;
    Ok(parse_response(api_response))
}
