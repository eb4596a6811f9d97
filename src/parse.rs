// src/parse.rs
//! Model output parser: free-form chat text -> typed card records.
//!
//! The model is asked for a fenced JSON array, but real replies vary: bare
//! JSON, a single object instead of an array, stray prose around the fence.
//! Anything that deviates further is rejected as malformed with a short
//! snippet of the offending text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ExtractError;
use crate::model::{Article, Card};

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence regex"));

/// Extract the card list from raw model text.
pub fn parse_cards(raw: &str) -> Result<Vec<Card>, ExtractError> {
    let body = match RE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => raw,
    };

    let value: Value =
        serde_json::from_str(body.trim()).map_err(|_| ExtractError::malformed(raw))?;

    // The model sometimes returns one object for a single-card screenshot.
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(ExtractError::malformed(raw)),
    };

    let mut cards = Vec::with_capacity(items.len());
    for item in &items {
        cards.push(card_from_value(item).ok_or_else(|| ExtractError::malformed(raw))?);
    }
    Ok(cards)
}

fn card_from_value(v: &Value) -> Option<Card> {
    let obj = v.as_object()?;
    let brand = obj.get("brand")?.as_str()?.to_string();
    let date = obj.get("date")?.as_str()?.to_string();

    let mut articles = Vec::new();
    for raw in obj.get("articles")?.as_array()? {
        articles.push(article_from_value(raw)?);
    }

    Some(Card {
        brand,
        date,
        articles,
        source_label: None,
        headline_rank: None,
    })
}

fn article_from_value(v: &Value) -> Option<Article> {
    let obj = v.as_object()?;
    let title = obj.get("title")?.as_str()?.to_string();
    let reads = count_from(obj.get("reads")?)?;
    let likes = count_from(obj.get("likes")?)?;
    let shares = match obj.get("shares") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(count_from(raw)?),
    };

    Some(Article {
        title,
        reads,
        likes,
        shares,
        position_label: None,
    })
}

/// Accept non-negative integers, including integral floats (`30000.0`).
/// Magnitude strings like "3.0万" are the model's job to convert; one
/// leaking through makes the whole response malformed.
fn count_from(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    let f = v.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_JSON: &str = r#"[
        {
            "brand": "量子位",
            "date": "昨天",
            "articles": [
                {"title": "大模型周报", "reads": 30000, "likes": 86}
            ]
        }
    ]"#;

    #[test]
    fn fenced_with_json_tag_parses() {
        let raw = format!("```json\n{CARD_JSON}\n```");
        let cards = parse_cards(&raw).expect("parse");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].brand, "量子位");
        assert_eq!(cards[0].articles[0].reads, 30000);
    }

    #[test]
    fn fenced_without_tag_parses() {
        let raw = format!("```\n{CARD_JSON}\n```");
        assert_eq!(parse_cards(&raw).expect("parse").len(), 1);
    }

    #[test]
    fn bare_json_matches_fenced_result() {
        let fenced = format!("```json\n{CARD_JSON}\n```");
        assert_eq!(
            parse_cards(&fenced).expect("fenced"),
            parse_cards(CARD_JSON).expect("bare")
        );
    }

    #[test]
    fn prose_around_fence_is_ignored() {
        let raw = format!("好的，以下是提取结果：\n```json\n{CARD_JSON}\n```\n希望对你有帮助。");
        assert_eq!(parse_cards(&raw).expect("parse").len(), 1);
    }

    #[test]
    fn single_object_wraps_into_one_element_list() {
        let raw = r#"{"brand": "新智元", "date": "今天", "articles": []}"#;
        let cards = parse_cards(raw).expect("parse");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].brand, "新智元");
        assert!(cards[0].articles.is_empty());
    }

    #[test]
    fn empty_array_yields_no_cards() {
        assert!(parse_cards("[]").expect("parse").is_empty());
    }

    #[test]
    fn garbage_is_malformed_with_snippet() {
        let raw = "抱歉，这张图片我无法识别。".repeat(40);
        match parse_cards(&raw) {
            Err(ExtractError::Malformed { snippet }) => {
                assert!(snippet.chars().count() <= 200);
                assert!(raw.starts_with(&snippet));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn top_level_scalar_is_malformed() {
        assert!(matches!(
            parse_cards("42"),
            Err(ExtractError::Malformed { .. })
        ));
    }

    #[test]
    fn magnitude_string_is_rejected() {
        let raw = r#"[{"brand": "b", "date": "d", "articles": [
            {"title": "t", "reads": "3.0万", "likes": 1}
        ]}]"#;
        assert!(matches!(
            parse_cards(raw),
            Err(ExtractError::Malformed { .. })
        ));
    }

    #[test]
    fn integral_float_counts_are_accepted() {
        let raw = r#"[{"brand": "b", "date": "d", "articles": [
            {"title": "t", "reads": 30000.0, "likes": 86.0, "shares": 3.0}
        ]}]"#;
        let cards = parse_cards(raw).expect("parse");
        assert_eq!(cards[0].articles[0].reads, 30000);
        assert_eq!(cards[0].articles[0].shares, Some(3));
    }

    #[test]
    fn fractional_or_negative_counts_are_rejected() {
        let fractional = r#"[{"brand": "b", "date": "d", "articles": [
            {"title": "t", "reads": 3.5, "likes": 1}
        ]}]"#;
        assert!(parse_cards(fractional).is_err());

        let negative = r#"[{"brand": "b", "date": "d", "articles": [
            {"title": "t", "reads": -1, "likes": 1}
        ]}]"#;
        assert!(parse_cards(negative).is_err());
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let raw = r#"[{"brand": "b", "articles": []}]"#;
        assert!(matches!(
            parse_cards(raw),
            Err(ExtractError::Malformed { .. })
        ));
    }

    #[test]
    fn null_shares_reads_as_absent() {
        let raw = r#"[{"brand": "b", "date": "d", "articles": [
            {"title": "t", "reads": 1, "likes": 2, "shares": null}
        ]}]"#;
        let cards = parse_cards(raw).expect("parse");
        assert_eq!(cards[0].articles[0].shares, None);
    }

    #[test]
    fn labels_start_unassigned() {
        let cards = parse_cards(CARD_JSON).expect("parse");
        assert_eq!(cards[0].source_label, None);
        assert_eq!(cards[0].headline_rank, None);
        assert_eq!(cards[0].articles[0].position_label, None);
    }
}
