use crate::types::{DigestError, FeedDescriptor, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    rss_url: String,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    email: String,
    #[serde(default)]
    #[allow(dead_code)]
    name: String,
}

/// Read the feed config CSV (`name,rss_url,notes`). Rows with an empty or
/// unparseable `rss_url` are skipped.
pub fn load_feeds(path: &Path) -> Result<Vec<FeedDescriptor>> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| {
        DigestError::Config(format!("cannot read feed config {}: {err}", path.display()))
    })?;

    let mut feeds = Vec::new();
    for row in reader.deserialize() {
        let row: FeedRow = row?;
        let url = row.rss_url.trim().to_string();
        if url.is_empty() {
            continue;
        }
        if Url::parse(&url).is_err() {
            warn!("skipping feed row with invalid URL: {url}");
            continue;
        }
        let name = row.name.trim();
        feeds.push(FeedDescriptor {
            name: if name.is_empty() {
                "Unnamed Feed".to_string()
            } else {
                name.to_string()
            },
            url,
            notes: row.notes.trim().to_string(),
        });
    }
    debug!("loaded {} feeds from {}", feeds.len(), path.display());
    Ok(feeds)
}

/// Read the recipient roster CSV (`email,name`). Blank emails are dropped and
/// duplicates are removed case-insensitively, first occurrence wins.
pub fn load_roster(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| {
        DigestError::Config(format!("cannot read roster {}: {err}", path.display()))
    })?;

    let mut seen = HashSet::new();
    let mut emails = Vec::new();
    for row in reader.deserialize() {
        let row: RosterRow = row?;
        let email = row.email.trim().to_string();
        if email.is_empty() || !seen.insert(email.to_lowercase()) {
            continue;
        }
        emails.push(email);
    }
    Ok(emails)
}

/// Combine the roster with the comma-separated `MAIL_TO` value. The config
/// addresses are appended after the roster; blanks are dropped and duplicates
/// removed case-insensitively with order preserved.
pub fn mail_recipients(roster: &[String], extra: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    let candidates = roster
        .iter()
        .map(String::as_str)
        .chain(extra.split(','))
        .map(str::trim)
        .filter(|address| !address.is_empty());

    for address in candidates {
        if seen.insert(address.to_lowercase()) {
            recipients.push(address.to_string());
        }
    }
    recipients
}
