use crate::types::{Digest, DigestItem, RawItem};
use serde_json::{Map, Value};

pub const MAX_ITEMS: usize = 10;
pub const MAX_HIGHLIGHTS: usize = 6;
pub const MAX_TAGS: usize = 4;

pub const DEFAULT_SUMMARY: &str = "Headline only; see source link.";
pub const DEFAULT_IMPACT: &str = "Market impact unclear.";
pub const DEFAULT_ACTION: &str = "Skim the source if the topic is relevant.";
pub const DEFAULT_TAG: &str = "headline";
pub const QUIET_HIGHLIGHT: &str = "Quiet window — no fresh items from the tracked feeds.";

const FALLBACK_SUMMARY: &str = "Summary unavailable; showing the headline as published.";
const FALLBACK_IMPACT: &str = "Not assessed.";
const FALLBACK_ACTION: &str = "Open the source link for details.";

/// Repair the parsed summarizer payload into a complete [`Digest`].
///
/// This is a per-field defaulting policy, not a schema validator: a missing
/// or malformed field falls back on its own while the rest of the payload is
/// kept. Payload items are correlated to raw items by URL where the payload
/// provides one; an item without a URL is matched by its array position.
/// The link, paywall flag, and publication dates always come from the raw
/// item, never from the model.
pub fn sanitize_digest(payload: &Value, raw_items: &[RawItem]) -> Digest {
    let highlights = sanitize_highlights(payload.get("highlights"), raw_items);

    let payload_items: Vec<Option<&Map<String, Value>>> = payload
        .get("items")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(Value::as_object).collect())
        .unwrap_or_default();
    let matched = correlate_items(&payload_items, raw_items);

    let items = raw_items
        .iter()
        .take(MAX_ITEMS)
        .zip(matched)
        .map(|(raw, entry)| sanitize_item(entry, raw))
        .collect();

    Digest { highlights, items }
}

/// Deterministic local digest used when the summarizer fails: highlights from
/// the first raw items (or a quiet placeholder) and one generic card per item.
pub fn fallback_digest(raw_items: &[RawItem]) -> Digest {
    let items = raw_items
        .iter()
        .map(|raw| DigestItem {
            title: raw.title.clone(),
            url: raw.link.clone(),
            source: raw.source.clone(),
            summary: FALLBACK_SUMMARY.to_string(),
            market_impact: FALLBACK_IMPACT.to_string(),
            action: FALLBACK_ACTION.to_string(),
            tags: vec![DEFAULT_TAG.to_string()],
            paywalled: raw.paywalled,
            published_display: raw.published_display.clone(),
            published_iso: raw.published_iso.clone(),
        })
        .collect();

    Digest {
        highlights: headline_highlights(raw_items),
        items,
    }
}

fn sanitize_highlights(value: Option<&Value>, raw_items: &[RawItem]) -> Vec<String> {
    let highlights: Vec<String> = value
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .take(MAX_HIGHLIGHTS)
                .collect()
        })
        .unwrap_or_default();

    if highlights.is_empty() {
        headline_highlights(raw_items)
    } else {
        highlights
    }
}

fn headline_highlights(raw_items: &[RawItem]) -> Vec<String> {
    let highlights: Vec<String> = raw_items
        .iter()
        .take(3)
        .map(|item| format!("{}: {}", item.source, item.title))
        .collect();
    if highlights.is_empty() {
        vec![QUIET_HIGHLIGHT.to_string()]
    } else {
        highlights
    }
}

/// Assign each raw item its payload entry. URL matches win; a leftover entry
/// without a URL of its own is accepted at its array position, so a model
/// that reorders its output cannot attach text to the wrong link.
fn correlate_items<'a>(
    payload_items: &[Option<&'a Map<String, Value>>],
    raw_items: &[RawItem],
) -> Vec<Option<&'a Map<String, Value>>> {
    let mut used = vec![false; payload_items.len()];
    let mut matched: Vec<Option<&Map<String, Value>>> = vec![None; raw_items.len().min(MAX_ITEMS)];

    for (raw_index, raw) in raw_items.iter().take(MAX_ITEMS).enumerate() {
        for (payload_index, entry) in payload_items.iter().enumerate() {
            let Some(obj) = entry else { continue };
            if used[payload_index] {
                continue;
            }
            if obj
                .get("url")
                .and_then(Value::as_str)
                .is_some_and(|url| url.trim() == raw.link)
            {
                used[payload_index] = true;
                matched[raw_index] = Some(obj);
                break;
            }
        }
    }

    for (raw_index, slot) in matched.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        let Some(Some(obj)) = payload_items.get(raw_index) else {
            continue;
        };
        let has_url = obj
            .get("url")
            .and_then(Value::as_str)
            .is_some_and(|url| !url.trim().is_empty());
        if !used[raw_index] && !has_url {
            used[raw_index] = true;
            *slot = Some(obj);
        }
    }

    matched
}

fn sanitize_item(entry: Option<&Map<String, Value>>, raw: &RawItem) -> DigestItem {
    DigestItem {
        title: text_field(entry, "title").unwrap_or_else(|| raw.title.clone()),
        url: raw.link.clone(),
        source: text_field(entry, "source").unwrap_or_else(|| raw.source.clone()),
        summary: text_field(entry, "summary").unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        market_impact: text_field(entry, "market_impact")
            .unwrap_or_else(|| DEFAULT_IMPACT.to_string()),
        action: text_field(entry, "action").unwrap_or_else(|| DEFAULT_ACTION.to_string()),
        tags: sanitize_tags(entry.and_then(|obj| obj.get("tags"))),
        paywalled: raw.paywalled,
        published_display: raw.published_display.clone(),
        published_iso: raw.published_iso.clone(),
    }
}

fn text_field(entry: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    entry?
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Lowercased, space-to-hyphen slugs, at most [`MAX_TAGS`]. Anything that is
/// not a list of non-empty strings collapses to the single default tag.
fn sanitize_tags(value: Option<&Value>) -> Vec<String> {
    let tags: Vec<String> = value
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(slugify)
                .filter(|tag| !tag.is_empty())
                .take(MAX_TAGS)
                .collect()
        })
        .unwrap_or_default();

    if tags.is_empty() {
        vec![DEFAULT_TAG.to_string()]
    } else {
        tags
    }
}

fn slugify(tag: &str) -> String {
    tag.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(title: &str, link: &str) -> RawItem {
        RawItem {
            source: "Feed One".to_string(),
            title: title.to_string(),
            link: link.to_string(),
            published_display: "01 Jan 2025".to_string(),
            published_iso: "2025-01-01T06:00:00+00:00".to_string(),
            paywalled: false,
        }
    }

    #[test]
    fn short_items_array_fills_remainder_from_defaults() {
        let payload = json!({
            "highlights": ["Something moved"],
            "items": [{
                "url": "https://x/1",
                "summary": "A real summary.",
                "tags": ["Rates", "Central Banks"]
            }]
        });
        let raw_items = vec![raw("first", "https://x/1"), raw("second", "https://x/2")];
        let digest = sanitize_digest(&payload, &raw_items);

        assert_eq!(digest.items.len(), 2);
        assert_eq!(digest.items[0].summary, "A real summary.");
        assert_eq!(digest.items[0].tags, vec!["rates", "central-banks"]);
        assert_eq!(digest.items[1].summary, DEFAULT_SUMMARY);
        assert_eq!(digest.items[1].market_impact, DEFAULT_IMPACT);
        assert_eq!(digest.items[1].action, DEFAULT_ACTION);
        assert_eq!(digest.items[1].tags, vec![DEFAULT_TAG]);
        assert_eq!(digest.items[1].title, "second");
    }

    #[test]
    fn non_list_tags_yield_the_default_tag() {
        let payload = json!({
            "items": [{"url": "https://x/1", "tags": "not-a-list"}]
        });
        let digest = sanitize_digest(&payload, &[raw("first", "https://x/1")]);
        assert_eq!(digest.items[0].tags, vec![DEFAULT_TAG]);
    }

    #[test]
    fn tags_are_capped_at_four() {
        let payload = json!({
            "items": [{"url": "https://x/1", "tags": ["a", "b", "c", "d", "e"]}]
        });
        let digest = sanitize_digest(&payload, &[raw("first", "https://x/1")]);
        assert_eq!(digest.items[0].tags.len(), MAX_TAGS);
    }

    #[test]
    fn reordered_payload_items_are_matched_by_url() {
        let payload = json!({
            "items": [
                {"url": "https://x/2", "summary": "About the second story."},
                {"url": "https://x/1", "summary": "About the first story."}
            ]
        });
        let raw_items = vec![raw("first", "https://x/1"), raw("second", "https://x/2")];
        let digest = sanitize_digest(&payload, &raw_items);
        assert_eq!(digest.items[0].summary, "About the first story.");
        assert_eq!(digest.items[1].summary, "About the second story.");
        assert_eq!(digest.items[0].url, "https://x/1");
    }

    #[test]
    fn url_less_payload_item_is_matched_positionally() {
        let payload = json!({
            "items": [{"summary": "Positional summary."}]
        });
        let digest = sanitize_digest(&payload, &[raw("first", "https://x/1")]);
        assert_eq!(digest.items[0].summary, "Positional summary.");
        assert_eq!(digest.items[0].url, "https://x/1");
    }

    #[test]
    fn dates_and_paywall_always_come_from_the_raw_item() {
        let payload = json!({
            "items": [{
                "url": "https://x/1",
                "paywalled": true,
                "published_display": "fabricated",
                "published_iso": "fabricated"
            }]
        });
        let digest = sanitize_digest(&payload, &[raw("first", "https://x/1")]);
        assert!(!digest.items[0].paywalled);
        assert_eq!(digest.items[0].published_display, "01 Jan 2025");
    }

    #[test]
    fn empty_payload_synthesizes_highlights_from_raw_items() {
        let payload = json!({});
        let raw_items = vec![
            raw("first", "https://x/1"),
            raw("second", "https://x/2"),
            raw("third", "https://x/3"),
            raw("fourth", "https://x/4"),
        ];
        let digest = sanitize_digest(&payload, &raw_items);
        assert_eq!(digest.highlights.len(), 3);
        assert_eq!(digest.highlights[0], "Feed One: first");
    }

    #[test]
    fn highlights_are_capped_at_six() {
        let payload = json!({
            "highlights": ["1", "2", "3", "4", "5", "6", "7", ""]
        });
        let digest = sanitize_digest(&payload, &[raw("first", "https://x/1")]);
        assert_eq!(digest.highlights.len(), MAX_HIGHLIGHTS);
    }

    #[test]
    fn items_are_capped_at_ten() {
        let raw_items: Vec<_> = (0..12)
            .map(|i| raw(&format!("story {i}"), &format!("https://x/{i}")))
            .collect();
        let digest = sanitize_digest(&json!({}), &raw_items);
        assert_eq!(digest.items.len(), MAX_ITEMS);
    }

    #[test]
    fn fallback_item_count_equals_raw_item_count() {
        let raw_items = vec![raw("first", "https://x/1"), raw("second", "https://x/2")];
        let digest = fallback_digest(&raw_items);
        assert_eq!(digest.items.len(), raw_items.len());
        assert_eq!(digest.items[0].tags, vec![DEFAULT_TAG]);
        assert_eq!(digest.highlights.len(), 2);
    }

    #[test]
    fn fallback_with_no_items_uses_quiet_placeholder() {
        let digest = fallback_digest(&[]);
        assert!(digest.items.is_empty());
        assert_eq!(digest.highlights, vec![QUIET_HIGHLIGHT]);
    }
}
