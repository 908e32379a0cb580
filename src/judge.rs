//! The automated judge: scores a candidate answer against the expected
//! answer via a chat-completions endpoint.
//!
//! One call per answer, no caching. The model's structured response is the
//! sole source of truth for pass/fail; anything else (transport failure,
//! timeout, non-2xx, unparseable body) is `JudgeUnavailable`, which the
//! session engine treats as retryable rather than a wrong answer.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::JudgeConfig;
use crate::domain::Verdict;
use crate::error::JudgeUnavailable;
use crate::util::fill_template;

/// Seam between the session engine and the judge transport. Tests drive the
/// engine with a scripted implementation; production uses [`OpenAiJudge`].
#[allow(async_fn_in_trait)]
pub trait Judge {
  async fn evaluate(
    &self,
    question_prompt: &str,
    expected_answer: &str,
    candidate_answer: &str,
  ) -> Result<Verdict, JudgeUnavailable>;
}

#[derive(Clone)]
pub struct OpenAiJudge {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
  system: String,
  user_template: String,
}

impl OpenAiJudge {
  /// Build the client from config plus the API key (env-only, never from
  /// the config file). Returns None if the HTTP client cannot be built.
  pub fn new(cfg: &JudgeConfig, api_key: String) -> Option<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: cfg.base_url.clone(),
      model: cfg.model.clone(),
      system: cfg.prompts.system.clone(),
      user_template: cfg.prompts.user_template.clone(),
    })
  }
}

impl Judge for OpenAiJudge {
  #[instrument(
    level = "info",
    skip_all,
    fields(model = %self.model, question_len = question_prompt.len(), answer_len = candidate_answer.len())
  )]
  async fn evaluate(
    &self,
    question_prompt: &str,
    expected_answer: &str,
    candidate_answer: &str,
  ) -> Result<Verdict, JudgeUnavailable> {
    let user = fill_template(
      &self.user_template,
      &[
        ("question", question_prompt),
        ("expected", expected_answer),
        ("answer", candidate_answer),
      ],
    );

    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: self.system.clone() },
        ChatMessageReq { role: "user".into(), content: user },
      ],
      temperature: 0.0,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "coursebot/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| JudgeUnavailable(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or(body);
      return Err(JudgeUnavailable(format!("HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| JudgeUnavailable(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(
        target: "judge",
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        "Judge token usage"
      );
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    let verdict: Verdict = serde_json::from_str(&text)
      .map_err(|e| JudgeUnavailable(format!("unusable verdict: {}", e)))?;
    info!(target: "judge", passed = verdict.passed, elapsed = ?start.elapsed(), "Verdict received");
    Ok(verdict)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an API error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
