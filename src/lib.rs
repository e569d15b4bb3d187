pub mod feeds;
pub mod fetcher;
pub mod mailer;
pub mod render;
pub mod sanitize;
pub mod settings;
pub mod summarizer;
pub mod types;

pub use fetcher::Fetcher;
pub use mailer::Mailer;
pub use settings::{PromptTemplates, Settings};
pub use summarizer::Summarizer;
pub use types::*;
