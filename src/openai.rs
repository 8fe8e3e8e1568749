//! Minimal OpenAI client for the per-step writing advisor.
//!
//! We only call chat.completions and only need plain text back. Calls are
//! instrumented and log model names, latencies, and response sizes (not
//! contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Prompts;
use crate::domain::StepDefinition;
use crate::protocol::ChatTurn;
use crate::util::fill_template;

/// At most this many prior turns are forwarded, oldest dropped first.
/// Keeps token usage bounded on long back-and-forth sessions.
const HISTORY_LIMIT: usize = 10;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// Plain-text chat completion over an explicit message list.
  #[instrument(level = "info", skip(self, messages), fields(model = %self.model, turns = messages.len()))]
  async fn chat_plain(&self, messages: Vec<ChatMessageReq>, temperature: f32) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages,
      temperature,
      max_tokens: Some(500),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "tamgu-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    Ok(text)
  }

  /// Advise on one step's draft: system prompt from the step title, the
  /// recent conversation turns, then the step's review instruction with
  /// the current answer.
  #[instrument(level = "info", skip(self, prompts, step, answer, history),
               fields(step = step.id, answer_len = answer.len(), turns = history.len()))]
  pub async fn step_advice(
    &self,
    prompts: &Prompts,
    step: &StepDefinition,
    answer: &str,
    history: &[ChatTurn],
  ) -> Result<String, String> {
    let system = fill_template(&prompts.advice_system_template, &[("title", &step.title)]);

    let mut messages = Vec::with_capacity(history.len().min(HISTORY_LIMIT) + 2);
    messages.push(ChatMessageReq { role: "system".into(), content: system });

    let recent = if history.len() > HISTORY_LIMIT {
      &history[history.len() - HISTORY_LIMIT..]
    } else {
      history
    };
    for turn in recent {
      messages.push(ChatMessageReq { role: turn.role.clone(), content: turn.content.clone() });
    }

    let user = if step.ai_prompt.is_empty() {
      fill_template(&prompts.review_user_template, &[("title", &step.title), ("answer", answer)])
    } else {
      fill_template(&prompts.advice_user_template, &[("ai_prompt", &step.ai_prompt), ("answer", answer)])
    };
    messages.push(ChatMessageReq { role: "user".into(), content: user });

    self.chat_plain(messages, 0.7).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

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

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
