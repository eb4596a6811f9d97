// src/label.rs
//! Headline ranking and position labels.
//!
//! Runs exactly once per extraction batch, after all images' cards are
//! flattened and before brand grouping: headline rank compares article
//! counts across the whole batch regardless of brand.

use crate::model::Card;

/// Tag for cards ranked into the top spots by article count.
pub const HEADLINE_TAG: &str = "headline";
/// Tag for everything below the headline cut.
pub const MINOR_TAG: &str = "minor-card";
/// A card is a headline when its `headline_rank` does not exceed this.
pub const HEADLINE_CUTOFF: u32 = 2;

/// Assign `headline_rank`, `source_label`, and per-article `position_label`
/// to a freshly extracted batch, in place. Cards must be in processing
/// order (image upload order, then in-image order).
pub fn label_batch(cards: &mut [Card]) {
    // Step 1: provisional source numbering in processing order. The final
    // pass below replaces it.
    for (seq, card) in cards.iter_mut().enumerate() {
        card.source_label = Some(format!("{}-{}", MINOR_TAG, seq + 1));
    }

    // Step 2: rank by article count, descending. The sort is stable, so
    // ties keep their processing order.
    let mut by_count: Vec<usize> = (0..cards.len()).collect();
    by_count.sort_by(|&a, &b| cards[b].articles.len().cmp(&cards[a].articles.len()));
    for (pos, &idx) in by_count.iter().enumerate() {
        cards[idx].headline_rank = Some(pos as u32 + 1);
    }

    // Step 3: labels. Headline cards number every article; minor cards
    // only number when there is more than one.
    for card in cards.iter_mut() {
        let rank = card.headline_rank.unwrap_or(u32::MAX);
        if rank <= HEADLINE_CUTOFF {
            card.source_label = Some(format!("{}-{}", HEADLINE_TAG, rank));
            for (i, article) in card.articles.iter_mut().enumerate() {
                article.position_label = Some(format!("{}-{}", HEADLINE_TAG, i + 1));
            }
        } else {
            card.source_label = Some(MINOR_TAG.to_string());
            if card.articles.len() == 1 {
                card.articles[0].position_label = Some(MINOR_TAG.to_string());
            } else {
                for (i, article) in card.articles.iter_mut().enumerate() {
                    article.position_label = Some(format!("{}-{}", MINOR_TAG, i + 1));
                }
            }
        }
    }
}
