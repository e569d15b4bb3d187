use serde::{Deserialize, Serialize};

/// A configured RSS source, read from the feed config CSV.
#[derive(Debug, Clone)]
pub struct FeedDescriptor {
    pub name: String,
    pub url: String,
    pub notes: String,
}

/// A normalized feed entry, before summarization.
///
/// The dedup key is (lowercased title, exact link). `published_display` and
/// `published_iso` are empty when the entry carried no parseable timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub source: String,
    pub title: String,
    pub link: String,
    pub published_display: String,
    pub published_iso: String,
    pub paywalled: bool,
}

/// One fully-populated card in the rendered digest.
///
/// Every field always holds a value: either taken from the summarizer payload
/// or substituted from the matching [`RawItem`] and fixed defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub market_impact: String,
    pub action: String,
    pub tags: Vec<String>,
    pub paywalled: bool,
    pub published_display: String,
    pub published_iso: String,
}

/// The structured digest rendered into the email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub highlights: Vec<String>,
    pub items: Vec<DigestItem>,
}

/// Token accounting reported by the chat-completion endpoint.
/// All zeroes on the fallback path.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default, rename = "prompt_tokens")]
    pub prompt: u32,
    #[serde(default, rename = "completion_tokens")]
    pub completion: u32,
    #[serde(default, rename = "total_tokens")]
    pub total: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;
