use crate::types::{DigestError, Result};
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_MODEL: &str = "sonar";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration, gathered from the environment in a single
/// validation pass at startup and handed to each component explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub mail_from: String,
    /// Extra comma-separated recipients appended after the roster.
    pub mail_to_extra: String,
    pub sender_name: String,
    pub sender_address: String,
    pub timezone: String,
    pub archive_url: String,
    pub unsubscribe_url: String,
    pub manage_topics_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let mail_from = required("MAIL_FROM")?;
        let sender_address = optional("SENDER_ADDRESS").unwrap_or_else(|| mail_from.clone());

        let request_timeout_secs = match optional("PERPLEXITY_TIMEOUT") {
            Some(raw) => raw.parse().map_err(|_| {
                DigestError::Config(format!("PERPLEXITY_TIMEOUT is not a number: {raw}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let smtp_port_raw = required("SMTP_PORT")?;
        let smtp_port = smtp_port_raw.parse().map_err(|_| {
            DigestError::Config(format!("SMTP_PORT is not a valid port: {smtp_port_raw}"))
        })?;

        Ok(Self {
            api_key: optional("PERPLEXITY_API_KEY"),
            api_base_url: optional("PERPLEXITY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: optional("PERPLEXITY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout_secs,
            smtp_host: required("SMTP_SERVER")?,
            smtp_port,
            smtp_user: required("SMTP_USER")?,
            smtp_pass: required("SMTP_PASS")?,
            mail_from,
            mail_to_extra: optional("MAIL_TO").unwrap_or_default(),
            sender_name: optional("SENDER_NAME").unwrap_or_else(|| "Morning Digest".to_string()),
            sender_address,
            timezone: optional("DIGEST_TZ").unwrap_or_else(|| "Europe/Paris".to_string()),
            archive_url: optional("ARCHIVE_URL").unwrap_or_default(),
            unsubscribe_url: optional("UNSUBSCRIBE_URL").unwrap_or_default(),
            manage_topics_url: optional("MANAGE_TOPICS_URL").unwrap_or_default(),
        })
    }
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| DigestError::Config(format!("{key} is not set")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Prompt templates for the summarization call, loaded eagerly so a missing
/// or empty file aborts the run before any network activity.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub system: String,
    pub user: String,
}

impl PromptTemplates {
    pub const WINDOW_PLACEHOLDER: &'static str = "{{window}}";
    pub const ITEMS_PLACEHOLDER: &'static str = "{{items}}";

    pub fn load(dir: &Path) -> Result<Self> {
        let system = read_template(&dir.join("system_prompt.txt"))?;
        let user = read_template(&dir.join("user_prompt.txt"))?;

        for placeholder in [Self::WINDOW_PLACEHOLDER, Self::ITEMS_PLACEHOLDER] {
            if !user.contains(placeholder) {
                return Err(DigestError::Config(format!(
                    "user prompt template is missing the {placeholder} placeholder"
                )));
            }
        }

        Ok(Self { system, user })
    }
}

fn read_template(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).map_err(|err| {
        DigestError::Config(format!("cannot read template {}: {err}", path.display()))
    })?;
    if text.trim().is_empty() {
        return Err(DigestError::Config(format!(
            "template {} is empty",
            path.display()
        )));
    }
    Ok(text)
}
