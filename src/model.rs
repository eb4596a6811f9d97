// src/model.rs
//! Core data model: articles, cards, brand groups, daily records.
//!
//! Wire names are camelCase so the browser UI and stored JSON stay
//! compatible with the existing frontend.

use serde::{Deserialize, Serialize};

/// One article row extracted from a screenshot card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub reads: u64,
    pub likes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,
    /// Display tag assigned by the labeler ("headline-1", "minor-card", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_label: Option<String>,
}

/// One push block: a brand published one or more articles on one date.
/// A single screenshot may yield zero or more cards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub brand: String,
    /// Date as printed on the screenshot ("yesterday", "2023-10-20", ...);
    /// free-form, never validated.
    pub date: String,
    pub articles: Vec<Article>,
    /// Card-level echo of the article labels, assigned by the labeler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    /// 1-based rank by article count within the card's batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline_rank: Option<u32>,
}

/// All cards for one normalized brand, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BrandGroup {
    pub brand: String,
    pub cards: Vec<Card>,
}

/// The persisted, continuously merged dataset for one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    /// "YYYY-MM-DD".
    pub date: String,
    pub brands: Vec<BrandGroup>,
    /// Unix millis, fixed at first save for this date.
    pub created_at: i64,
    /// Unix millis, refreshed on every merge.
    pub updated_at: i64,
}
