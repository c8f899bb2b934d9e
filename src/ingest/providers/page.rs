// src/ingest/providers/page.rs
//! Retailer promotion pages: every `<div class="promotion">` element is one item.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::ingest::types::Item;
use crate::ingest::{content_digest, normalize_text};

const PROMO_CLASS: &str = "promotion";

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match base {
        Some(b) => b.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}

fn is_promotion(el: &ElementRef<'_>) -> bool {
    el.value().classes().any(|c| c == PROMO_CLASS)
}

/// Blocks nested inside another promotion belong to the outer one.
fn has_promotion_ancestor(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| is_promotion(&a))
}

fn block_text(el: &ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Extract promotion blocks in page order. Pages carry no dates, so every item
/// is stamped with `fetched_at`.
///
/// The first link in a block is its identity. A link shared by several blocks
/// on the same page is suffixed with the block's content digest so keys stay
/// unique within the batch. Blocks without a link use the digest alone.
pub fn parse_page(source_id: &str, page_url: &str, html: &str, fetched_at: DateTime<Utc>) -> Vec<Item> {
    let (Ok(block_sel), Ok(link_sel)) =
        (Selector::parse("div.promotion"), Selector::parse("a[href]"))
    else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    let blocks: Vec<(String, Option<String>)> = document
        .select(&block_sel)
        .filter(|el| !has_promotion_ancestor(el))
        .filter_map(|el| {
            let content = block_text(&el);
            if content.is_empty() {
                return None;
            }
            let link = el
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| resolve(base.as_ref(), href));
            Some((content, link))
        })
        .collect();

    let mut link_uses: HashMap<&str, usize> = HashMap::new();
    for link in blocks.iter().filter_map(|(_, l)| l.as_deref()) {
        *link_uses.entry(link).or_default() += 1;
    }

    blocks
        .iter()
        .map(|(content, link)| {
            let identity_key = match link.as_deref() {
                Some(l) if link_uses.get(l).copied().unwrap_or(0) > 1 => {
                    format!("{l}#{}", content_digest(source_id, content))
                }
                Some(l) => l.to_string(),
                None => content_digest(source_id, content),
            };
            Item {
                source_id: source_id.to_string(),
                identity_key,
                content: content.clone(),
                timestamp: fetched_at,
                url: link.clone(),
            }
        })
        .collect()
}
