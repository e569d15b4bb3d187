use anyhow::bail;
use chrono::{Datelike, Utc};
use clap::Parser;
use morning_digest::{feeds, fetcher, render, sanitize};
use morning_digest::{Fetcher, Mailer, PromptTemplates, RawItem, Settings, Summarizer, TokenUsage};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Compile and email a morning finance digest.
#[derive(Parser, Debug)]
#[command(name = "morning-digest")]
struct Cli {
    /// CSV file containing feed metadata (name,rss_url,notes)
    #[arg(long = "csv")]
    csv: PathBuf,

    /// Look-back window for feed entries, in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// Number of entries to include in the digest
    #[arg(long, default_value_t = 8)]
    topn: usize,

    /// Maximum number of items fetched per feed before filtering
    #[arg(long = "per-feed", default_value_t = 10)]
    per_feed: usize,

    /// CSV roster of digest recipients (email,name)
    #[arg(long = "members-csv")]
    members_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let templates = PromptTemplates::load(Path::new("prompts"))?;

    let feed_list = feeds::load_feeds(&cli.csv)?;
    if feed_list.is_empty() {
        bail!("no feeds found in {}", cli.csv.display());
    }

    let roster = match &cli.members_csv {
        Some(path) => feeds::load_roster(path)?,
        None => Vec::new(),
    };
    let recipients = feeds::mail_recipients(&roster, &settings.mail_to_extra);

    let http_fetcher = Fetcher::new(settings.request_timeout_secs)?;
    let items = fetcher::dedupe(
        http_fetcher
            .fetch_items(&feed_list, cli.hours, cli.per_feed)
            .await,
    );

    let mailer = Mailer::new(&settings)?;
    let week = Utc::now().iso_week().week();

    if items.is_empty() {
        info!("no fresh items found; sending placeholder email");
        let digest = sanitize::fallback_digest(&[]);
        let html = render::render_email(&digest, cli.hours, true, &settings);
        let subject = format!("Weekly Digest — Week {week} (no new items)");
        let sent = mailer.send(&html, &subject, &recipients).await?;
        info!("sent placeholder digest to {sent} recipients");
        return Ok(());
    }

    let selected: Vec<RawItem> = items.into_iter().take(cli.topn).collect();
    let summarizer = Summarizer::new(&settings, templates)?;
    let (digest, usage, used_fallback) = match summarizer.summarize(&selected, cli.hours).await {
        Ok((payload, usage)) => (sanitize::sanitize_digest(&payload, &selected), usage, false),
        Err(err) => {
            warn!("summarization failed, using local fallback: {err}");
            (sanitize::fallback_digest(&selected), TokenUsage::default(), true)
        }
    };
    if !used_fallback {
        info!(
            prompt = usage.prompt,
            completion = usage.completion,
            total = usage.total,
            "summarization token usage"
        );
    }

    let html = render::render_email(&digest, cli.hours, used_fallback, &settings);
    let mut subject = format!("Weekly Digest — Week {week}");
    if used_fallback {
        subject.push_str(" (headlines)");
    }
    let sent = mailer.send(&html, &subject, &recipients).await?;
    info!(
        "sent digest with {} items to {sent} recipients",
        digest.items.len()
    );
    Ok(())
}

fn init_tracing() {
    // LOG_LEVEL mirrors the original job's variable; RUST_LOG still works.
    let filter = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}
