// src/aggregate.rs
//! Brand grouping and cross-day merging. Pure functions over the batch;
//! the store stays free of merge logic so this is testable without I/O.

use crate::model::{BrandGroup, Card};

/// Group a labeled batch by trimmed brand name, preserving first-seen
/// order. Batches are small, so a linear scan beats a map here.
pub fn merge_within_batch(cards: Vec<Card>) -> Vec<BrandGroup> {
    let mut groups: Vec<BrandGroup> = Vec::new();
    for card in cards {
        let brand = card.brand.trim();
        match groups.iter_mut().find(|g| g.brand == brand) {
            Some(group) => group.cards.push(card),
            None => groups.push(BrandGroup {
                brand: brand.to_string(),
                cards: vec![card],
            }),
        }
    }
    groups
}

/// Merge a new batch's groups into a day's accumulated groups. Existing
/// cards stay first with new ones appended; unseen brands append at the
/// end. Stored cards are never re-ranked or re-ordered.
pub fn merge_across_days(
    existing: Vec<BrandGroup>,
    incoming: Vec<BrandGroup>,
) -> Vec<BrandGroup> {
    let mut merged = existing;
    for group in incoming {
        let brand = group.brand.trim();
        match merged.iter_mut().find(|g| g.brand == brand) {
            Some(target) => target.cards.extend(group.cards),
            None => merged.push(BrandGroup {
                brand: brand.to_string(),
                cards: group.cards,
            }),
        }
    }
    merged
}
