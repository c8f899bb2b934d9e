// src/ingest/providers/feed.rs
//! Profile feeds exposed as RSS 2.0 (e.g. through an RSS bridge for a social account).

use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::error::FetchError;
use crate::ingest::types::Item;
use crate::ingest::{content_digest, normalize_text};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0)
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse an RSS document into items, newest first.
/// Undated entries are stamped with `fetched_at` so the recency window keeps them.
pub fn parse_feed(
    source_id: &str,
    xml: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<Item>, FetchError> {
    let t0 = std::time::Instant::now();
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml))
        .map_err(|e| FetchError::Permanent(format!("parsing feed xml: {e}")))?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = it.title.as_deref().unwrap_or_default();
        let desc = it.description.as_deref().unwrap_or_default();
        let content = match (title.trim().is_empty(), desc.trim().is_empty()) {
            (false, false) => normalize_text(&format!("{title}. {desc}")),
            (false, true) => normalize_text(title),
            _ => normalize_text(desc),
        };
        if content.is_empty() {
            continue;
        }

        let link = non_empty(it.link.as_deref());
        let identity_key = non_empty(it.guid.as_ref().map(|g| g.value.as_str()))
            .or_else(|| link.clone())
            .unwrap_or_else(|| content_digest(source_id, &content));
        let timestamp = it
            .pub_date
            .as_deref()
            .and_then(parse_rfc2822)
            .unwrap_or(fetched_at);

        out.push(Item {
            source_id: source_id.to_string(),
            identity_key,
            content,
            timestamp,
            url: link,
        });
    }

    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    histogram!("promo_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn guid_wins_over_link_and_missing_date_uses_fetch_time() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
<item>
  <title>Spring promotion</title>
  <link>https://social.example/p/abc</link>
  <guid isPermaLink="false">post-abc</guid>
</item>
</channel></rss>"#;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let items = parse_feed("insta", xml, now).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identity_key, "post-abc");
        assert_eq!(items[0].timestamp, now);
        assert_eq!(items[0].url.as_deref(), Some("https://social.example/p/abc"));
    }

    #[test]
    fn garbage_is_permanent() {
        let err = parse_feed("insta", "<html>nope", Utc::now()).unwrap_err();
        assert!(!err.is_transient());
    }
}
