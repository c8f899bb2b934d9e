//! # Diff
//! Pure set difference by identity key. No I/O.

use std::collections::HashSet;

use crate::ingest::types::Item;

/// Items of `fetched` whose key is absent from `baseline`, in fetched order.
/// Repeats inside `fetched` collapse to their first occurrence.
pub fn diff(baseline: &[Item], fetched: &[Item]) -> Vec<Item> {
    let mut seen: HashSet<&str> = baseline.iter().map(|it| it.identity_key.as_str()).collect();
    fetched
        .iter()
        .filter(|it| seen.insert(it.identity_key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn it(key: &str, content: &str) -> Item {
        Item {
            source_id: "shop".into(),
            identity_key: key.into(),
            content: content.into(),
            timestamp: Utc::now(),
            url: None,
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let fetched = vec![it("a", "first"), it("b", "b"), it("a", "second")];
        let out = diff(&[], &fetched);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "first");
        assert_eq!(out[1].identity_key, "b");
    }

    #[test]
    fn same_text_different_key_is_new() {
        let baseline = vec![it("https://x/1", "50% off")];
        let fetched = vec![it("https://x/2", "50% off")];
        assert_eq!(diff(&baseline, &fetched).len(), 1);
    }

    #[test]
    fn edited_caption_same_key_is_not_new() {
        let baseline = vec![it("https://x/1", "50% off")];
        let fetched = vec![it("https://x/1", "50% off, extended!")];
        assert!(diff(&baseline, &fetched).is_empty());
    }
}
