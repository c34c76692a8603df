//! crates/prep_core/src/feed.rs
//!
//! Post-processing and fallbacks for the scraped current-affairs feed.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{ArticleContent, CurrentAffairsItem, FeedKind, FeedSource};

/// Maximum number of feed items returned to the client.
pub const DEFAULT_FEED_LIMIT: usize = 30;
/// Maximum number of paragraphs kept from one article.
pub const ARTICLE_PARAGRAPH_LIMIT: usize = 20;

/// Drops items whose title was already seen (first one wins) and caps the list.
pub fn dedupe_and_limit(items: Vec<CurrentAffairsItem>, limit: usize) -> Vec<CurrentAffairsItem> {
    let mut unique: Vec<CurrentAffairsItem> = Vec::with_capacity(items.len().min(limit));
    for item in items {
        if unique.len() == limit {
            break;
        }
        if !unique.iter().any(|u| u.title == item.title) {
            unique.push(item);
        }
    }
    unique
}

/// Removes duplicate paragraphs and caps the article body.
pub fn dedupe_paragraphs(paragraphs: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for p in paragraphs {
        if unique.len() == ARTICLE_PARAGRAPH_LIMIT {
            break;
        }
        if !unique.contains(&p) {
            unique.push(p);
        }
    }
    unique
}

/// Placeholder items shown when every source failed.
pub fn fallback_items(today: NaiveDate) -> Vec<CurrentAffairsItem> {
    let date = today.format("%Y-%m-%d").to_string();
    vec![
        CurrentAffairsItem {
            title: "Linguistic Reorganisation of States in India".to_string(),
            date: date.clone(),
            category: "Polity and Governance".to_string(),
            kind: FeedKind::Daily,
            syllabus: Some("GS2/ Polity and Governance".to_string()),
            context: Some(
                "The Tamil Nadu Governor recently criticised the linguistic division of states in India."
                    .to_string(),
            ),
            summary: Some(
                "The States Reorganisation Act, 1956 established a unified system of 14 states and 6 union territories."
                    .to_string(),
            ),
            link: None,
            source: FeedSource::NextIas,
        },
        CurrentAffairsItem {
            title: "Human Outer Planet Exploration (HOPE)".to_string(),
            date,
            category: "Science and Technology".to_string(),
            kind: FeedKind::Daily,
            syllabus: Some("GS3/ Science and Technology".to_string()),
            context: Some(
                "Bengaluru-based space tech company Protoplanet, along with ISRO, has developed the analogue station."
                    .to_string(),
            ),
            summary: Some(
                "HOPE is an analogue site mimicking geological and environmental conditions found on the Moon and Mars."
                    .to_string(),
            ),
            link: None,
            source: FeedSource::Vajiram,
        },
    ]
}

/// Placeholder article shown when an article could not be scraped.
pub fn fallback_article(now: DateTime<Utc>) -> ArticleContent {
    ArticleContent {
        title: "Article Not Available".to_string(),
        date: now.date_naive().format("%Y-%m-%d").to_string(),
        syllabus: None,
        context: None,
        background: None,
        content: vec![
            "This article could not be loaded. Please try again later or visit the original source."
                .to_string(),
        ],
        source: "Error".to_string(),
        scraped_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> CurrentAffairsItem {
        CurrentAffairsItem {
            title: title.to_string(),
            date: "2025-08-02".to_string(),
            category: "Current Affairs".to_string(),
            kind: FeedKind::Daily,
            syllabus: None,
            context: None,
            summary: None,
            link: None,
            source: FeedSource::NextIas,
        }
    }

    #[test]
    fn first_title_wins_and_limit_applies() {
        let mut first = item("Monsoon Session of Parliament");
        first.summary = Some("kept".to_string());
        let items = vec![
            first,
            item("Monsoon Session of Parliament"),
            item("Repo rate unchanged"),
            item("New Ramsar sites"),
        ];

        let out = dedupe_and_limit(items, 2);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].summary.as_deref(), Some("kept"));
        assert_eq!(out[1].title, "Repo rate unchanged");
    }

    #[test]
    fn paragraphs_are_unique_and_capped() {
        let mut paragraphs = vec!["same".to_string(), "same".to_string()];
        paragraphs.extend((0..30).map(|i| format!("paragraph {i}")));
        let out = dedupe_paragraphs(paragraphs);
        assert_eq!(out.len(), ARTICLE_PARAGRAPH_LIMIT);
        assert_eq!(out.iter().filter(|p| *p == "same").count(), 1);
    }

    #[test]
    fn fallback_items_serialise_like_scraped_ones() {
        let items = fallback_items(NaiveDate::from_ymd_opt(2025, 8, 2).unwrap());
        let json = serde_json::to_value(&items).unwrap();
        assert_eq!(json[0]["type"], "daily");
        assert_eq!(json[1]["source"], "Vajiram & Ravi");
        assert_eq!(json[0]["date"], "2025-08-02");
    }
}
