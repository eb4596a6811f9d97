// src/vision.rs
//! Vision backend: the outbound chat-completions call, one image per call.
//! The trait seam lets the pipeline run against scripted backends in tests.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::VisionConfig;
use crate::error::ExtractError;

/// Instruction sent alongside every screenshot. The model owns numeric
/// normalization ("3.0万" -> 30000); the parser rejects anything else.
const EXTRACT_PROMPT: &str = "\
You are a data extraction assistant. The image is a screenshot of a WeChat \
official-account article list containing one or more push cards. For every \
card, extract:\n\
1. brand: the account name shown at the top of the card.\n\
2. date: the date or time shown on the card (for example \"昨天\", \
\"5分钟前\", \"2023年10月20日\"). If none is visible, infer from context or \
use \"未知日期\".\n\
3. articles: every article under that card, each with:\n\
   - title\n\
   - reads: converted to a plain number (\"3.0万\" -> 30000)\n\
   - likes: converted to a plain number\n\
   - shares: converted to a plain number, omit if not shown\n\
\n\
Treat each push block as its own object; one screenshot may contain pushes \
from several dates. Return strictly a JSON list in the following format and \
nothing else:\n\
\n\
[\n\
  {\n\
    \"brand\": \"account name\",\n\
    \"date\": \"昨天\",\n\
    \"articles\": [\n\
      {\n\
        \"title\": \"article title\",\n\
        \"reads\": 7240,\n\
        \"likes\": 86\n\
      }\n\
    ]\n\
  }\n\
]";

/// One outbound extraction call. Implementations must be safe to share
/// across the fan-out tasks.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Send one image and return the model's raw text reply.
    async fn extract_text(&self, image_base64: &str) -> Result<String, ExtractError>;
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Ark (Doubao) chat-completions client.
pub struct ArkVisionClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_completion_tokens: u32,
}

impl ArkVisionClient {
    /// Fails fast when no API key is configured; no call is ever attempted.
    pub fn new(cfg: &VisionConfig) -> Result<Self, ExtractError> {
        if cfg.api_key.trim().is_empty() {
            return Err(ExtractError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .user_agent("wechat-card-extractor/0.1")
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            max_completion_tokens: cfg.max_completion_tokens,
        })
    }
}

#[async_trait]
impl VisionBackend for ArkVisionClient {
    async fn extract_text(&self, image_base64: &str) -> Result<String, ExtractError> {
        #[derive(Serialize)]
        struct ImageUrl<'a> {
            url: &'a str,
        }
        #[derive(Serialize)]
        #[serde(tag = "type", rename_all = "snake_case")]
        enum Part<'a> {
            ImageUrl { image_url: ImageUrl<'a> },
            Text { text: &'a str },
        }
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_completion_tokens: u32,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let data_url = to_data_url(image_base64);
        let req = Req {
            model: &self.model,
            max_completion_tokens: self.max_completion_tokens,
            messages: vec![Msg {
                role: "user",
                content: vec![
                    Part::ImageUrl {
                        image_url: ImageUrl { url: &data_url },
                    },
                    Part::Text {
                        text: EXTRACT_PROMPT,
                    },
                ],
            }],
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "vision endpoint error");
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ExtractError::NoContent)
    }

    fn name(&self) -> &'static str {
        "ark"
    }
}

/// Uploads arrive either as a bare base64 payload or a full data URL.
/// Bare payloads default to the PNG mime type.
fn to_data_url(image_base64: &str) -> Cow<'_, str> {
    if image_base64.starts_with("data:") {
        Cow::Borrowed(image_base64)
    } else {
        Cow::Owned(format!("data:image/png;base64,{image_base64}"))
    }
}
