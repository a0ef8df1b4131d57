// src/ingest/dedup.rs
use std::collections::HashMap;

use crate::ingest::types::NormalizedItem;

/// Collapse a batch to one item per natural key.
///
/// When a key repeats, the later item replaces the earlier one but keeps the
/// slot of the key's first appearance. Returns the surviving items and how
/// many were dropped.
pub fn dedupe(items: Vec<NormalizedItem>) -> (Vec<NormalizedItem>, usize) {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<NormalizedItem> = Vec::with_capacity(items.len());
    let mut removed = 0usize;

    for item in items {
        match slots.get(&item.natural_key) {
            Some(&idx) => {
                out[idx] = item;
                removed += 1;
            }
            None => {
                slots.insert(item.natural_key.clone(), out.len());
                out.push(item);
            }
        }
    }

    (out, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;

    fn video(id: &str, title: &str) -> NormalizedItem {
        NormalizedItem::new(SourceKind::Video, id, title)
    }

    #[test]
    fn later_duplicate_wins_and_keeps_first_slot() {
        let batch = vec![
            video("a", "first a"),
            video("b", "only b"),
            video("a", "second a"),
            video("c", "only c"),
            video("a", "third a"),
        ];
        let (out, removed) = dedupe(batch);
        assert_eq!(removed, 2);
        let keys: Vec<_> = out.iter().map(|i| i.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(out[0].title, "third a");
    }

    #[test]
    fn empty_batch_is_untouched() {
        let (out, removed) = dedupe(Vec::new());
        assert!(out.is_empty());
        assert_eq!(removed, 0);
    }
}
