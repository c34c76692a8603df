//! services/api/src/adapters/current_affairs.rs
//!
//! This module contains the adapter for the current-affairs websites.
//! It implements the `CurrentAffairsService` port from the `core` crate by
//! fetching pages with `reqwest` and reading them with CSS selectors.
//!
//! Parsing is best effort: the sites change their markup without notice, so
//! every field except the title is optional and each page has a fallback pass.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use prep_core::{
    domain::{ArticleContent, CurrentAffairsItem, FeedKind, FeedSource, SourceSelector},
    feed,
    ports::{CurrentAffairsService, PortError, PortResult},
};
use regex::Regex;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::config::Config;

/// Characters kept from a scraped context or summary.
const SNIPPET_CHARS: usize = 200;
/// Headings shorter than this are navigation, not articles.
const MIN_TITLE_CHARS: usize = 10;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CurrentAffairsService` by scraping NEXT IAS and Vajiram & Ravi.
#[derive(Clone)]
pub struct HttpScraperAdapter {
    client: Client,
    config: Arc<Config>,
}

impl HttpScraperAdapter {
    /// Creates a new `HttpScraperAdapter` sending the configured user agent.
    pub fn new(config: Arc<Config>) -> PortResult<Self> {
        let client = Client::builder()
            .user_agent(config.scraper_user_agent.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn fetch_html(&self, url: &str, what: &str) -> PortResult<String> {
        debug!("Fetching {} from {}", what, url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::ExternalService(format!("Failed to fetch {}: {}", what, e)))?;
        if !response.status().is_success() {
            return Err(PortError::ExternalService(format!(
                "Failed to fetch {}: {}",
                what,
                response.status().as_u16()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PortError::ExternalService(format!("Failed to read {}: {}", what, e)))
    }

    async fn scrape_nextias(&self, kind: FeedKind, today: NaiveDate) -> PortResult<Vec<CurrentAffairsItem>> {
        let html = self.fetch_html(&self.config.nextias_url, "NEXT IAS").await?;
        let origin = origin_of(&self.config.nextias_url)?;
        parse_nextias(&html, kind, today, &origin)
    }

    async fn scrape_vajiram(&self, today: NaiveDate) -> PortResult<Vec<CurrentAffairsItem>> {
        let base = self.config.vajiram_base_url.trim_end_matches('/');
        let url = format!(
            "{}/current-affairs/upsc-prelims-current-affairs/{}/",
            base,
            today.format("%Y/%m/%d")
        );
        let html = self.fetch_html(&url, "Vajiram").await?;
        parse_vajiram(&html, today, base)
    }
}

//=========================================================================================
// `CurrentAffairsService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CurrentAffairsService for HttpScraperAdapter {
    /// Scrapes every selected source in order. Any failing source fails the whole feed.
    async fn fetch_feed(
        &self,
        sources: SourceSelector,
        kind: FeedKind,
    ) -> PortResult<Vec<CurrentAffairsItem>> {
        let today = self.config.local_date(Utc::now());
        let mut items = Vec::new();
        for source in sources.sources() {
            let scraped = match source {
                FeedSource::NextIas => self.scrape_nextias(kind, today).await?,
                // Vajiram only publishes a daily page.
                FeedSource::Vajiram => self.scrape_vajiram(today).await?,
            };
            info!("Scraped {} items from {}", scraped.len(), source.label());
            items.extend(scraped);
        }
        Ok(items)
    }

    async fn fetch_article(&self, url: &str) -> PortResult<ArticleContent> {
        let url = repair_url(url);
        Url::parse(&url).map_err(|e| PortError::InvalidInput(format!("Invalid article URL: {}", e)))?;
        let html = self.fetch_html(&url, "article").await?;
        let now = Utc::now();
        parse_article(&html, source_label(&url), self.config.local_date(now), now)
    }
}

//=========================================================================================
// URL helpers
//=========================================================================================

fn doubled_scheme() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^https?://[^/]+https?://").ok())
        .as_ref()
}

/// Repairs links like `https://www.nextias.comhttps://www.nextias.com/ca/...`.
pub fn repair_url(url: &str) -> String {
    match doubled_scheme() {
        Some(pattern) => pattern.replace(url.trim(), "https://").into_owned(),
        None => url.trim().to_string(),
    }
}

/// Resolves a scraped `href` against the site origin.
fn absolute_url(href: &str, origin: &str) -> String {
    let href = repair_url(href);
    if href.starts_with("http") {
        href
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

fn origin_of(url: &str) -> PortResult<String> {
    Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .map_err(|e| PortError::Unexpected(format!("Invalid site URL '{}': {}", url, e)))
}

fn source_label(url: &str) -> &'static str {
    if url.contains("vajiramandravi") {
        FeedSource::Vajiram.label()
    } else {
        FeedSource::NextIas.label()
    }
}

//=========================================================================================
// HTML helpers
//=========================================================================================

fn selector(css: &str) -> PortResult<Selector> {
    Selector::parse(css).map_err(|e| PortError::Unexpected(format!("Bad selector '{}': {}", css, e)))
}

/// The element's text with whitespace collapsed.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn snippet(text: &str) -> Option<String> {
    let text: String = text.chars().take(SNIPPET_CHARS).collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// The nearest enclosing block that groups a heading with its teaser.
fn closest_block(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| matches!(e.value().name(), "div" | "article" | "section"))
}

fn next_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().filter_map(ElementRef::wrap).next()
}

fn looks_like_article(title: &str, site_words: &[&str]) -> bool {
    title.chars().count() > MIN_TITLE_CHARS
        && !["Menu", "Navigation", "UPSC", "Current Affairs"]
            .iter()
            .chain(site_words)
            .any(|w| title.contains(w))
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.trim().to_string())
}

//=========================================================================================
// NEXT IAS
//=========================================================================================

pub fn parse_nextias(
    html: &str,
    kind: FeedKind,
    today: NaiveDate,
    origin: &str,
) -> PortResult<Vec<CurrentAffairsItem>> {
    let doc = Html::parse_document(html);
    let date = today.format("%Y-%m-%d").to_string();
    let item = |title: String, category: &str, kind: FeedKind| CurrentAffairsItem {
        title,
        date: date.clone(),
        category: category.to_string(),
        kind,
        syllabus: None,
        context: None,
        summary: None,
        link: None,
        source: FeedSource::NextIas,
    };

    let mut items = Vec::new();
    match kind {
        FeedKind::Daily => {
            let headings = selector("h3, h4, h5")?;
            let teaser = selector("p, div")?;
            let paragraphs = selector("p")?;
            let anchors = selector("a")?;
            for heading in doc.select(&headings) {
                let title = text_of(heading);
                if !looks_like_article(&title, &["NEXT IAS", "Daily Current Affairs"]) {
                    continue;
                }
                let mut entry = item(title, "Current Affairs", FeedKind::Daily);
                if let Some(block) = closest_block(heading) {
                    entry.link = block
                        .select(&anchors)
                        .find(|a| text_of(*a).to_lowercase().contains("read more"))
                        .and_then(|a| a.value().attr("href"))
                        .map(|href| absolute_url(href, origin));
                    entry.context = block.select(&teaser).next().and_then(|e| snippet(&text_of(e)));
                    entry.syllabus = block
                        .select(&paragraphs)
                        .map(text_of)
                        .find(|t| t.contains("Syllabus:"));
                }
                items.push(entry);
            }

            if items.is_empty() {
                let links = selector(r#"a[href*="/ca/current-affairs/"]"#)?;
                let dates = selector(".date, .published-date, time")?;
                for anchor in doc.select(&links) {
                    let title = text_of(anchor);
                    if title.chars().count() <= MIN_TITLE_CHARS {
                        continue;
                    }
                    let mut entry = item(title, "Current Affairs", FeedKind::Daily);
                    entry.link = anchor.value().attr("href").map(|href| absolute_url(href, origin));
                    if let Some(published) = closest_block(anchor)
                        .and_then(|block| block.select(&dates).next())
                        .and_then(|d| non_empty(text_of(d)))
                    {
                        entry.date = published;
                    }
                    items.push(entry);
                }
            }
        }
        FeedKind::Headlines | FeedKind::Editorial => {
            let (blocks, category) = match kind {
                FeedKind::Headlines => (selector(".headlines-item, .news-item")?, "Headlines"),
                _ => (selector(".editorial-item, .analysis-item")?, "Editorial Analysis"),
            };
            let titles = selector("h3, h4, .title")?;
            let anchors = selector("a")?;
            for block in doc.select(&blocks) {
                let Some(title) = block.select(&titles).next().and_then(|t| non_empty(text_of(t))) else {
                    continue;
                };
                let mut entry = item(title, category, kind);
                entry.link = block
                    .select(&anchors)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(|href| absolute_url(href, origin));
                items.push(entry);
            }
        }
    }
    Ok(items)
}

//=========================================================================================
// Vajiram & Ravi
//=========================================================================================

fn latest_news_title() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^:]+):").ok()).as_ref()
}

pub fn parse_vajiram(html: &str, today: NaiveDate, base: &str) -> PortResult<Vec<CurrentAffairsItem>> {
    let doc = Html::parse_document(html);
    let date = today.format("%Y-%m-%d").to_string();
    let headings = selector("h2, h3, h4")?;
    let anchors = selector("a")?;

    let mut items = Vec::new();
    for heading in doc.select(&headings) {
        let title = text_of(heading);
        if !looks_like_article(&title, &["Vajiram"]) {
            continue;
        }
        let href = heading
            .select(&anchors)
            .next()
            .and_then(|a| a.value().attr("href"))
            .or_else(|| {
                heading
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|e| e.value().name() == "a")
                    .and_then(|a| a.value().attr("href"))
            });
        let summary = next_element(heading)
            .filter(|e| matches!(e.value().name(), "p" | "div"))
            .and_then(|e| snippet(&text_of(e)));
        items.push(CurrentAffairsItem {
            title,
            date: date.clone(),
            category: "Current Affairs".to_string(),
            kind: FeedKind::Daily,
            syllabus: None,
            context: None,
            summary,
            link: href.map(|h| absolute_url(h, base)),
            source: FeedSource::Vajiram,
        });
    }

    if items.is_empty() {
        let paragraphs = selector("p")?;
        for paragraph in doc.select(&paragraphs) {
            let text = text_of(paragraph);
            if text.chars().count() <= 50 || !text.contains("Latest News") {
                continue;
            }
            if let Some(found) = latest_news_title().and_then(|p| p.captures(&text)) {
                let (whole, title) = (&found[0], found[1].trim().to_string());
                items.push(CurrentAffairsItem {
                    title,
                    date: date.clone(),
                    category: "Current Affairs".to_string(),
                    kind: FeedKind::Daily,
                    syllabus: None,
                    context: None,
                    summary: non_empty(text[whole.len()..].to_string()),
                    link: None,
                    source: FeedSource::Vajiram,
                });
            }
        }
    }
    Ok(items)
}

//=========================================================================================
// Articles
//=========================================================================================

const CONTENT_CONTAINERS: [&str; 8] = [
    ".article-content",
    ".entry-content",
    ".post-content",
    ".content-area",
    "article .content",
    ".main-content",
    ".article-body",
    ".post-body",
];

fn first_text(doc: &Html, css: &str) -> PortResult<Option<String>> {
    let sel = selector(css)?;
    Ok(doc.select(&sel).map(text_of).find(|t| !t.is_empty()))
}

/// A `Label:` paragraph, or the paragraph right after a heading or bold label.
fn labelled_section(doc: &Html, label: &str) -> PortResult<Option<String>> {
    let headings = selector("h2, h3, strong")?;
    let after_heading = doc
        .select(&headings)
        .filter(|h| text_of(*h).contains(label))
        .filter_map(next_element)
        .filter(|e| e.value().name() == "p")
        .map(text_of)
        .find(|t| !t.is_empty());
    if after_heading.is_some() {
        return Ok(after_heading);
    }
    let paragraphs = selector("p")?;
    let needle = format!("{}:", label);
    Ok(doc.select(&paragraphs).map(text_of).find(|t| t.contains(&needle)))
}

fn is_body_text(text: &str, min_chars: usize) -> bool {
    text.chars().count() > min_chars && !text.contains('©') && !text.contains("NEXT IAS")
}

pub fn parse_article(
    html: &str,
    source: &str,
    today: NaiveDate,
    now: chrono::DateTime<Utc>,
) -> PortResult<ArticleContent> {
    let doc = Html::parse_document(html);

    let title = match first_text(&doc, "h1, .article-title, .entry-title")? {
        Some(title) => title,
        None => first_text(&doc, "title")?
            .map(|t| t.replace(" - NEXT IAS", "").replace(" | NEXT IAS", ""))
            .unwrap_or_default(),
    };
    let date = match first_text(&doc, ".published-date, .date, time, .meta-date")? {
        Some(date) => date,
        None => today.format("%Y-%m-%d").to_string(),
    };
    let syllabus = match first_text(&doc, ".syllabus, .gs-syllabus")? {
        Some(s) => Some(s),
        None => labelled_section(&doc, "Syllabus")?,
    };
    let context = labelled_section(&doc, "Context")?;
    let background = labelled_section(&doc, "Background")?;

    let mut content = Vec::new();
    let paragraphs = selector("p")?;
    for css in CONTENT_CONTAINERS {
        let container = selector(css)?;
        if let Some(block) = doc.select(&container).next() {
            let mut texts: Vec<String> = block.select(&paragraphs).map(text_of).collect();
            if texts.is_empty() {
                texts.push(text_of(block));
            }
            content.extend(texts.into_iter().filter(|t| is_body_text(t, 20)));
            break;
        }
    }
    if content.is_empty() {
        let scoped = selector("article p, .main p, .content p, .post p")?;
        content.extend(doc.select(&scoped).map(text_of).filter(|t| is_body_text(t, 20)));
    }
    if content.is_empty() {
        content.extend(
            doc.select(&paragraphs)
                .map(text_of)
                .filter(|t| is_body_text(t, 50) && !t.contains("Call")),
        );
    }

    Ok(ArticleContent {
        title,
        date,
        syllabus,
        context,
        background,
        content: feed::dedupe_paragraphs(content),
        source: source.to_string(),
        scraped_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 2).unwrap()
    }

    #[test]
    fn doubled_schemes_are_repaired() {
        assert_eq!(
            repair_url("https://www.nextias.comhttps://www.nextias.com/ca/current-affairs/x"),
            "https://www.nextias.com/ca/current-affairs/x"
        );
        assert_eq!(repair_url("https://www.nextias.com/a"), "https://www.nextias.com/a");
        assert_eq!(
            absolute_url("/ca/current-affairs/x", "https://www.nextias.com"),
            "https://www.nextias.com/ca/current-affairs/x"
        );
    }

    #[test]
    fn nextias_daily_reads_headings_with_their_block() {
        let html = r#"
            <html><body>
              <h3>Daily Current Affairs</h3>
              <div class="card">
                <h4>Linguistic Reorganisation of States</h4>
                <p>Syllabus: GS2/ Polity and Governance</p>
                <p>The Governor criticised the linguistic division of states.</p>
                <a href="/ca/current-affairs/02-08-2025/linguistic">Read More</a>
              </div>
              <div><h4>Short</h4></div>
            </body></html>"#;
        let items = parse_nextias(html, FeedKind::Daily, today(), "https://www.nextias.com").unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "Linguistic Reorganisation of States");
        assert_eq!(item.date, "2025-08-02");
        assert_eq!(item.syllabus.as_deref(), Some("Syllabus: GS2/ Polity and Governance"));
        assert_eq!(item.context.as_deref(), Some("Syllabus: GS2/ Polity and Governance"));
        assert_eq!(
            item.link.as_deref(),
            Some("https://www.nextias.com/ca/current-affairs/02-08-2025/linguistic")
        );
    }

    #[test]
    fn nextias_falls_back_to_article_links() {
        let html = r#"<div><a href="https://www.nextias.comhttps://www.nextias.com/ca/current-affairs/hope">Human Outer Planet Exploration</a><time>2025-08-01</time></div>"#;
        let items = parse_nextias(html, FeedKind::Daily, today(), "https://www.nextias.com").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date, "2025-08-01");
        assert_eq!(
            items[0].link.as_deref(),
            Some("https://www.nextias.com/ca/current-affairs/hope")
        );
    }

    #[test]
    fn nextias_editorials_use_item_blocks() {
        let html = r#"<div class="editorial-item"><h3>Federalism under strain</h3><a href="/editorial/1">x</a></div>"#;
        let items = parse_nextias(html, FeedKind::Editorial, today(), "https://www.nextias.com").unwrap();
        assert_eq!(items[0].category, "Editorial Analysis");
        assert_eq!(items[0].kind, FeedKind::Editorial);
        assert_eq!(items[0].link.as_deref(), Some("https://www.nextias.com/editorial/1"));
    }

    #[test]
    fn vajiram_headings_and_latest_news_fallback() {
        let html = r#"<h2><a href="/current-affairs/repo-rate">RBI keeps the repo rate unchanged</a></h2><p>The MPC voted to hold rates.</p>"#;
        let items = parse_vajiram(html, today(), "https://vajiramandravi.com").unwrap();
        assert_eq!(items[0].link.as_deref(), Some("https://vajiramandravi.com/current-affairs/repo-rate"));
        assert_eq!(items[0].summary.as_deref(), Some("The MPC voted to hold rates."));
        assert_eq!(items[0].source, FeedSource::Vajiram);

        let html = "<p>New Ramsar Sites: Latest News says four wetlands were added to the Ramsar list this week.</p>";
        let items = parse_vajiram(html, today(), "https://vajiramandravi.com").unwrap();
        assert_eq!(items[0].title, "New Ramsar Sites");
        assert!(items[0].summary.as_deref().unwrap().starts_with("Latest News"));
    }

    #[test]
    fn article_sections_and_content_are_extracted() {
        let html = r#"
            <html><head><title>HOPE | NEXT IAS</title></head><body>
              <span class="date">02 Aug 2025</span>
              <h2>Context</h2><p>ISRO and Protoplanet built an analogue station.</p>
              <div class="entry-content">
                <p>HOPE mimics conditions found on the Moon and Mars.</p>
                <p>HOPE mimics conditions found on the Moon and Mars.</p>
                <p>Too short</p>
                <p>© NEXT IAS all rights reserved, reproduction prohibited.</p>
              </div>
            </body></html>"#;
        let article = parse_article(html, "NEXT IAS", today(), Utc::now()).unwrap();
        assert_eq!(article.title, "HOPE");
        assert_eq!(article.date, "02 Aug 2025");
        assert_eq!(
            article.context.as_deref(),
            Some("ISRO and Protoplanet built an analogue station.")
        );
        assert_eq!(article.content, vec!["HOPE mimics conditions found on the Moon and Mars."]);
        assert!(article.background.is_none());
    }
}
