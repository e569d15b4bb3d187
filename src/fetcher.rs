use crate::types::{DigestError, FeedDescriptor, RawItem, Result};
use chrono::{DateTime, Duration, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "morning-digest/0.1";
pub const DISPLAY_DATE_FORMAT: &str = "%d %b %Y";

/// Fetches feeds one at a time over a shared HTTP client and normalizes
/// their entries into [`RawItem`]s.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(StdDuration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Collect entries within the look-back window, capped at `per_feed`
    /// entries per source. A feed that fails to fetch or parse is logged and
    /// skipped; it never aborts the run.
    pub async fn fetch_items(
        &self,
        feeds: &[FeedDescriptor],
        hours: i64,
        per_feed: usize,
    ) -> Vec<RawItem> {
        let mut items = Vec::new();
        for feed in feeds {
            let entries = match self.fetch_feed(&feed.url).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("failed fetching {}: {err}", feed.name);
                    continue;
                }
            };
            let mut kept = 0;
            for entry in entries.into_iter().take(per_feed) {
                if let Some(item) = normalize_entry(feed, &entry, hours) {
                    items.push(item);
                    kept += 1;
                }
            }
            debug!("{}: kept {kept} entries", feed.name);
        }
        info!("fetched {} items from {} feeds", items.len(), feeds.len());
        items
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<Entry>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Parse(format!("HTTP {status} from {url}")));
        }
        let body = response.bytes().await?;
        let feed = parser::parse(body.as_ref())
            .map_err(|err| DigestError::Parse(format!("failed to parse {url}: {err}")))?;
        Ok(feed.entries)
    }
}

/// First available timestamp for an entry. feed-rs already folds the
/// created/modified fields of the various formats into published/updated,
/// keeping that priority order.
fn entry_timestamp(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.published.or(entry.updated)
}

/// An entry with no parseable timestamp is always considered fresh.
pub fn in_last_hours(timestamp: Option<DateTime<Utc>>, hours: i64) -> bool {
    match timestamp {
        Some(ts) => ts >= Utc::now() - Duration::hours(hours),
        None => true,
    }
}

fn normalize_entry(feed: &FeedDescriptor, entry: &Entry, hours: i64) -> Option<RawItem> {
    let timestamp = entry_timestamp(entry);
    if !in_last_hours(timestamp, hours) {
        return None;
    }
    let link = entry.links.first()?.href.trim().to_string();
    if link.is_empty() {
        return None;
    }
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "(no title)".to_string());

    let (published_display, published_iso) = match timestamp {
        Some(ts) => (ts.format(DISPLAY_DATE_FORMAT).to_string(), ts.to_rfc3339()),
        None => (String::new(), String::new()),
    };

    Some(RawItem {
        source: feed.name.clone(),
        title,
        link,
        published_display,
        published_iso,
        paywalled: feed.notes.to_lowercase().contains("paywall"),
    })
}

/// Remove items sharing a (lowercased title, exact link) key. The first
/// occurrence wins and the original order is preserved.
pub fn dedupe(items: Vec<RawItem>) -> Vec<RawItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((item.title.to_lowercase(), item.link.clone())))
        .collect()
}
