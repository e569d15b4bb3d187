use crate::settings::{PromptTemplates, Settings};
use crate::types::{DigestError, RawItem, Result, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

const TEMPERATURE: f32 = 0.2;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Calls the chat-completion endpoint with the prompt templates and extracts
/// the JSON digest payload embedded in the reply.
pub struct Summarizer {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    templates: PromptTemplates,
}

impl Summarizer {
    pub fn new(settings: &Settings, templates: PromptTemplates) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            templates,
        })
    }

    /// One synchronous request; any auth, transport, or response-shape
    /// problem surfaces as a `Summarization` error so the caller can swap in
    /// the local fallback digest.
    pub async fn summarize(
        &self,
        items: &[RawItem],
        hours: i64,
    ) -> Result<(Value, TokenUsage)> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DigestError::Summarization("PERPLEXITY_API_KEY is not set".into()))?;

        let user_prompt = self.build_user_prompt(items, hours);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.templates.system,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| DigestError::Summarization(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Summarization(format!(
                "endpoint returned HTTP {status}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| DigestError::Summarization(err.to_string()))?;

        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| DigestError::Summarization("response contained no choices".into()))?;
        if content.trim().is_empty() {
            return Err(DigestError::Summarization(
                "response missing summary content".into(),
            ));
        }

        debug!("summarizer returned {} chars", content.len());
        let payload = extract_json(content)?;
        Ok((payload, body.usage.unwrap_or_default()))
    }

    /// Fill the user template with the window description and the numbered
    /// item block: source, title, URL, publication display date, paywall flag.
    pub fn build_user_prompt(&self, items: &[RawItem], hours: i64) -> String {
        let mut listing = String::new();
        for (index, item) in items.iter().enumerate() {
            let _ = write!(listing, "{}. [{}] {} — {}", index + 1, item.source, item.title, item.link);
            if !item.published_display.is_empty() {
                let _ = write!(listing, " ({})", item.published_display);
            }
            if item.paywalled {
                listing.push_str(" [paywalled]");
            }
            listing.push('\n');
        }
        self.templates
            .user
            .replace(
                PromptTemplates::WINDOW_PLACEHOLDER,
                &format!("the last {hours} hours"),
            )
            .replace(PromptTemplates::ITEMS_PLACEHOLDER, listing.trim_end())
    }
}

/// Two-stage parse of the reply text: find a candidate JSON substring, then
/// parse it structurally. Code fences are stripped first; when the remainder
/// does not start with `{`, the first balanced `{...}` span is used.
pub fn extract_json(content: &str) -> Result<Value> {
    let stripped = strip_code_fences(content);
    let candidate = if stripped.trim_start().starts_with('{') {
        stripped.trim()
    } else {
        balanced_object_span(stripped).ok_or_else(|| {
            DigestError::Summarization("response contained no JSON object".into())
        })?
    };
    serde_json::from_str(candidate)
        .map_err(|err| DigestError::Summarization(format!("malformed JSON in response: {err}")))
}

fn strip_code_fences(content: &str) -> &str {
    let Some(open) = content.find("```") else {
        return content;
    };
    let after_fence = &content[open + 3..];
    // Skip the optional language tag on the opening fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// First balanced top-level `{...}` span, tolerant of braces inside strings.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
