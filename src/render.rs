use crate::settings::Settings;
use crate::types::Digest;
use chrono::Utc;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

const FALLBACK_NOTE: &str = "Summaries unavailable; showing headlines.";
const SUMMARY_NOTE: &str = "Summaries generated automatically from the listed sources.";

/// Build the complete HTML email body. Every feed- or model-derived string is
/// escaped before interpolation, URLs included as attribute values.
pub fn render_email(
    digest: &Digest,
    hours: i64,
    used_fallback: bool,
    settings: &Settings,
) -> String {
    let today = Utc::now().format("%A, %d %b %Y").to_string();
    let note = if used_fallback {
        FALLBACK_NOTE
    } else {
        SUMMARY_NOTE
    };

    let mut html = String::new();
    html.push_str("<html>\n  <body style=\"font-family:Arial,sans-serif;color:#222\">\n");
    let _ = writeln!(
        html,
        "    <h2>Morning Digest — {}</h2>",
        encode_text(&today)
    );
    let _ = writeln!(
        html,
        "    <p>{} highlights from the last {} hours.</p>",
        digest.items.len(),
        hours
    );
    let _ = writeln!(
        html,
        "    <p style=\"color:#555;font-size:13px\">{}</p>",
        encode_text(note)
    );

    html.push_str("    <ul>\n");
    for highlight in &digest.highlights {
        let _ = writeln!(html, "      <li>{}</li>", encode_text(highlight));
    }
    html.push_str("    </ul>\n");

    if digest.items.is_empty() {
        let _ = writeln!(
            html,
            "    <div style=\"border:1px solid #ddd;border-radius:6px;padding:12px;margin:8px 0\">\
             <p>No fresh items in the last {hours} hours. See you tomorrow.</p></div>"
        );
    }

    for item in &digest.items {
        html.push_str(
            "    <div style=\"border:1px solid #ddd;border-radius:6px;padding:12px;margin:8px 0\">\n",
        );
        let _ = writeln!(
            html,
            "      <h3 style=\"margin:0 0 4px 0\"><a href=\"{}\">{}</a>{}</h3>",
            encode_double_quoted_attribute(&item.url),
            encode_text(&item.title),
            if item.paywalled {
                " <span style=\"color:#b00;font-size:12px\">[paywalled]</span>"
            } else {
                ""
            }
        );
        let mut origin = item.source.clone();
        if !item.published_display.is_empty() {
            origin.push_str(" · ");
            origin.push_str(&item.published_display);
        }
        let _ = writeln!(
            html,
            "      <p style=\"color:#666;font-size:12px;margin:0 0 8px 0\">{}</p>",
            encode_text(&origin)
        );
        let _ = writeln!(html, "      <p>{}</p>", encode_text(&item.summary));
        let _ = writeln!(
            html,
            "      <p><strong>Market impact:</strong> {}</p>",
            encode_text(&item.market_impact)
        );
        let _ = writeln!(
            html,
            "      <p><strong>Action:</strong> {}</p>",
            encode_text(&item.action)
        );
        let tags = item.tags.join(", ");
        let _ = writeln!(
            html,
            "      <p style=\"color:#888;font-size:12px\">{}</p>",
            encode_text(&tags)
        );
        html.push_str("    </div>\n");
    }

    html.push_str("    <hr style=\"border:none;border-top:1px solid #eee\">\n");
    let _ = writeln!(
        html,
        "    <p style=\"color:#666;font-size:12px\">{} — automated delivery, {} time.</p>",
        encode_text(&settings.sender_name),
        encode_text(&settings.timezone)
    );

    let footer_links: Vec<String> = [
        (&settings.archive_url, "Archive"),
        (&settings.unsubscribe_url, "Unsubscribe"),
        (&settings.manage_topics_url, "Manage topics"),
    ]
    .into_iter()
    .filter(|(url, _)| !url.is_empty())
    .map(|(url, label)| {
        format!(
            "<a href=\"{}\">{label}</a>",
            encode_double_quoted_attribute(url)
        )
    })
    .collect();
    if !footer_links.is_empty() {
        let _ = writeln!(
            html,
            "    <p style=\"color:#666;font-size:12px\">{}</p>",
            footer_links.join(" · ")
        );
    }

    html.push_str("  </body>\n</html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DigestItem;

    fn settings() -> Settings {
        Settings {
            api_key: None,
            api_base_url: "https://api.example.test".to_string(),
            model: "sonar".to_string(),
            request_timeout_secs: 60,
            smtp_host: "smtp.example.test".to_string(),
            smtp_port: 465,
            smtp_user: "user".to_string(),
            smtp_pass: "pass".to_string(),
            mail_from: "digest@example.test".to_string(),
            mail_to_extra: String::new(),
            sender_name: "Morning Digest".to_string(),
            sender_address: "digest@example.test".to_string(),
            timezone: "Europe/Paris".to_string(),
            archive_url: "https://example.test/archive".to_string(),
            unsubscribe_url: String::new(),
            manage_topics_url: String::new(),
        }
    }

    fn digest_item(title: &str, url: &str) -> DigestItem {
        DigestItem {
            title: title.to_string(),
            url: url.to_string(),
            source: "Feed One".to_string(),
            summary: "A short summary.".to_string(),
            market_impact: "Limited.".to_string(),
            action: "None needed.".to_string(),
            tags: vec!["headline".to_string()],
            paywalled: false,
            published_display: "01 Jan 2025".to_string(),
            published_iso: "2025-01-01T06:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn zero_item_digest_renders_placeholder_card() {
        let digest = Digest {
            highlights: vec!["Nothing new".to_string()],
            items: Vec::new(),
        };
        let html = render_email(&digest, 24, true, &settings());
        assert!(html.contains("No fresh items in the last 24 hours"));
        assert!(html.contains(FALLBACK_NOTE));
    }

    #[test]
    fn derived_text_is_escaped() {
        let mut item = digest_item("<script>alert(1)</script>", "https://x/?a=1&b=2");
        item.summary = "Profits \"up\" & rising".to_string();
        let digest = Digest {
            highlights: vec!["<b>big</b> day".to_string()],
            items: vec![item],
        };
        let html = render_email(&digest, 24, false, &settings());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;big&lt;/b&gt; day"));
        assert!(html.contains("https://x/?a=1&amp;b=2"));
    }

    #[test]
    fn paywalled_items_get_a_badge() {
        let mut item = digest_item("Behind the wall", "https://x/1");
        item.paywalled = true;
        let digest = Digest {
            highlights: vec!["h".to_string()],
            items: vec![item],
        };
        let html = render_email(&digest, 24, false, &settings());
        assert!(html.contains("[paywalled]"));
    }

    #[test]
    fn footer_skips_empty_links() {
        let digest = Digest {
            highlights: vec!["h".to_string()],
            items: vec![digest_item("t", "https://x/1")],
        };
        let html = render_email(&digest, 24, false, &settings());
        assert!(html.contains(">Archive</a>"));
        assert!(!html.contains("Unsubscribe"));
    }
}
