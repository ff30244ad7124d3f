// src/services/fetch.rs

//! Content fetching service.
//!
//! Fetches listing pages for each configured source, follows item links,
//! and converts detail pages into the structures the core consumes: flat
//! [`ContentItem`]s for discussions, and [`PageSource`] heading walks for
//! bulletins. All scraping mechanics stay here; the parser and resolver
//! never see markup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Comment, Config, ContentItem, SourcePattern};
use crate::parser::{DocNode, PageSource, dates};
use crate::utils::url::{extract_source_id, resolve_url};

/// A listing row before detail fetch.
#[derive(Debug, Clone)]
struct ListedItem {
    title: String,
    link: String,
}

/// Service for fetching content items from configured sources.
pub struct ContentFetcher {
    config: Arc<Config>,
    client: Client,
}

impl ContentFetcher {
    /// Create a fetcher with the configured HTTP client.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.fetch.user_agent)
            .timeout(Duration::from_secs(config.fetch.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Fetch all discussion items (questions, blog posts) for a source.
    pub async fn fetch_discussions(&self, source: &SourcePattern) -> Result<Vec<ContentItem>> {
        let listed = self.fetch_listing(source).await?;
        let delay = Duration::from_millis(self.config.fetch.request_delay_ms);
        let concurrency = self.config.fetch.max_concurrent.max(1);

        let mut items = Vec::with_capacity(listed.len());
        let mut detail_stream = stream::iter(listed)
            .map(|row| async move { self.fetch_discussion_detail(source, row).await })
            .buffered(concurrency);

        while let Some(result) = detail_stream.next().await {
            match result {
                Ok(item) => items.push(item),
                Err(error) => {
                    log::warn!("Failed to fetch discussion detail: {error}");
                }
            }
            if delay.as_millis() > 0 {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(items)
    }

    /// Fetch all bulletin pages for a source, each as an item plus its
    /// heading-walk page representation.
    pub async fn fetch_bulletins(
        &self,
        source: &SourcePattern,
    ) -> Result<Vec<(ContentItem, PageSource)>> {
        let listed = self.fetch_listing(source).await?;
        let delay = Duration::from_millis(self.config.fetch.request_delay_ms);

        let mut pages = Vec::with_capacity(listed.len());
        for row in listed {
            match self.fetch_bulletin_detail(source, &row).await {
                Ok(pair) => pages.push(pair),
                Err(error) => {
                    log::warn!("Failed to fetch bulletin {}: {error}", row.link);
                }
            }
            if delay.as_millis() > 0 {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(pages)
    }

    /// Fetch a listing page and extract (title, link) rows.
    async fn fetch_listing(&self, source: &SourcePattern) -> Result<Vec<ListedItem>> {
        let html = self.client.get(&source.url).send().await?.text().await?;
        let document = Html::parse_document(&html);

        let row_sel = parse_selector(&source.item_selector)?;
        let title_sel = parse_selector(&source.title_selector)?;
        let link_sel = source
            .link_selector
            .as_ref()
            .map(|s| parse_selector(s))
            .transpose()?;

        let base_url = url::Url::parse(&source.url)?;
        let cleaning = &self.config.cleaning;

        let mut listed = Vec::new();
        for row in document.select(&row_sel) {
            let Some(title_elem) = row.select(&title_sel).next() else {
                continue;
            };
            let title = cleaning.clean_title(&title_elem.text().collect::<String>());
            if title.is_empty() {
                continue;
            }

            let link_elem = link_sel
                .as_ref()
                .and_then(|sel| row.select(sel).next())
                .unwrap_or(title_elem);
            let raw_link = link_elem.value().attr(&source.link_attr).unwrap_or("");
            if raw_link.is_empty() {
                continue;
            }

            listed.push(ListedItem {
                title,
                link: resolve_url(&base_url, raw_link),
            });
        }
        Ok(listed)
    }

    async fn fetch_discussion_detail(
        &self,
        source: &SourcePattern,
        row: ListedItem,
    ) -> Result<ContentItem> {
        let html = self.client.get(&row.link).send().await?.text().await?;
        let document = Html::parse_document(&html);

        let body = match &source.body_selector {
            Some(selector) => {
                let sel = parse_selector(selector)?;
                document
                    .select(&sel)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .unwrap_or_default()
            }
            None => String::new(),
        };

        let comments = match &source.comment_selector {
            Some(selector) => extract_comments(
                &document,
                selector,
                source.comment_body_selector.as_deref(),
            )?,
            None => Vec::new(),
        };

        let activity_count = match &source.reply_count_selector {
            Some(selector) => {
                let sel = parse_selector(selector)?;
                document
                    .select(&sel)
                    .next()
                    .map(|el| parse_count(&el.text().collect::<String>()))
                    .unwrap_or(0)
            }
            None => comments.len() as u64,
        };

        Ok(ContentItem {
            source_id: extract_source_id(&row.link),
            kind: source.kind,
            title: row.title,
            body,
            link: row.link,
            activity_count,
            comments,
        })
    }

    async fn fetch_bulletin_detail(
        &self,
        source: &SourcePattern,
        row: &ListedItem,
    ) -> Result<(ContentItem, PageSource)> {
        let html = self.client.get(&row.link).send().await?.text().await?;
        let document = Html::parse_document(&html);

        let page = page_to_source(
            &document,
            &row.link,
            &row.title,
            source.body_selector.as_deref(),
        )?;

        let activity_count = match &source.reply_count_selector {
            Some(selector) => {
                let sel = parse_selector(selector)?;
                document
                    .select(&sel)
                    .next()
                    .map(|el| parse_count(&el.text().collect::<String>()))
                    .unwrap_or(0)
            }
            None => 0,
        };

        let item = ContentItem {
            source_id: page.source_id(),
            kind: source.kind,
            title: row.title.clone(),
            body: page.intro.clone(),
            link: row.link.clone(),
            activity_count,
            comments: Vec::new(),
        };
        Ok((item, page))
    }
}

/// Extract anonymized replies from a discussion detail page.
///
/// Position is the 1-based index of the row in thread order. The body
/// comes from the body selector so author bylines and signatures in the
/// row never enter the stored text. Rows without a parseable timestamp
/// are dropped.
fn extract_comments(
    document: &Html,
    row_selector: &str,
    body_selector: Option<&str>,
) -> Result<Vec<Comment>> {
    let row_sel = parse_selector(row_selector)?;
    let body_sel = body_selector.map(parse_selector).transpose()?;
    let time_sel = parse_selector("time[datetime]")?;

    let mut comments = Vec::new();
    for (index, row) in document.select(&row_sel).enumerate() {
        let body = match &body_sel {
            Some(sel) => row
                .select(sel)
                .next()
                .map(|el| el.text().collect::<String>())
                .unwrap_or_default(),
            None => row.text().collect::<String>(),
        };
        let body = body.trim().to_string();
        if body.is_empty() {
            continue;
        }

        let Some(posted_at) = comment_timestamp(&row, &time_sel) else {
            log::debug!("Reply {} has no parseable timestamp, dropped", index + 1);
            continue;
        };

        comments.push(Comment {
            position: index as u32 + 1,
            posted_at,
            body,
        });
    }
    Ok(comments)
}

/// Timestamp of a reply row: a `datetime` attribute if present, else the
/// first date appearing in the row text, at midnight UTC.
fn comment_timestamp(row: &ElementRef, time_sel: &Selector) -> Option<DateTime<Utc>> {
    if let Some(el) = row.select(time_sel).next() {
        if let Some(raw) = el.value().attr("datetime") {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Some(parsed.with_timezone(&Utc));
            }
            if let Some(date) = dates::parse_first_date(raw) {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
    }

    let text = row.text().collect::<String>();
    dates::parse_first_date(&text)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl PageSource {
    /// The source id this page will be tracked under.
    pub fn source_id(&self) -> String {
        extract_source_id(&self.url)
    }
}

/// Convert a detail page DOM into the heading-walk representation.
///
/// Walks the direct children of the content region in document order:
/// `h2`/`h3`/`h4` elements open a new node, everything else accumulates
/// into the current node's body (or the intro before the first heading).
pub fn page_to_source(
    document: &Html,
    url: &str,
    title: &str,
    region_selector: Option<&str>,
) -> Result<PageSource> {
    let region_sel = parse_selector(region_selector.unwrap_or("body"))?;
    let region = document
        .select(&region_sel)
        .next()
        .ok_or_else(|| AppError::parse(url, "content region not found"))?;

    let mut intro = String::new();
    let mut nodes: Vec<DocNode> = Vec::new();

    for child in region.children() {
        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };

        let level = match element.value().name() {
            "h2" => Some(2u8),
            "h3" => Some(3),
            "h4" => Some(4),
            _ => None,
        };

        match level {
            Some(level) => {
                nodes.push(DocNode {
                    level,
                    text: element.text().collect::<String>().trim().to_string(),
                    anchor: heading_anchor(&element),
                    body: String::new(),
                });
            }
            None => {
                let text = element.text().collect::<String>();
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match nodes.last_mut() {
                    Some(node) => {
                        if !node.body.is_empty() {
                            node.body.push('\n');
                        }
                        node.body.push_str(text);
                    }
                    None => {
                        if !intro.is_empty() {
                            intro.push('\n');
                        }
                        intro.push_str(text);
                    }
                }
            }
        }
    }

    Ok(PageSource {
        url: url.to_string(),
        title: title.to_string(),
        intro,
        nodes,
    })
}

/// Anchor id of a heading: its own id attribute, or a named/id'd child
/// anchor element.
fn heading_anchor(heading: &ElementRef) -> Option<String> {
    if let Some(id) = heading.value().attr("id") {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    for child in heading.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if el.value().name() == "a" {
                if let Some(name) = el.value().attr("name").or_else(|| el.value().attr("id")) {
                    if !name.is_empty() {
                        return Some(name.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Parse a reply/comment count out of display text like "12 replies".
fn parse_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12 replies"), 12);
        assert_eq!(parse_count("Replies: 3"), 3);
        assert_eq!(parse_count("no replies"), 0);
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[nope").is_err());
    }

    #[test]
    fn test_page_to_source_heading_walk() {
        let html = Html::parse_document(
            r#"<html><body><div class="content">
                <p>Beta on July 4, 2026 and production on July 18, 2026.</p>
                <h2>New Features</h2>
                <h3>Gradebook</h3>
                <h4 id="toc-override">Final Grade Override</h4>
                <p>Graders can override final grades.</p>
                <p>Feature Option Name: Final Grade Override</p>
            </div></body></html>"#,
        );

        let page = page_to_source(
            &html,
            "https://community.example.com/release-notes/td-p/900100",
            "Release Notes",
            Some("div.content"),
        )
        .unwrap();

        assert!(page.intro.contains("Beta on July 4, 2026"));
        assert_eq!(page.nodes.len(), 3);
        assert_eq!(page.nodes[0].level, 2);
        assert_eq!(page.nodes[2].anchor.as_deref(), Some("toc-override"));
        assert!(page.nodes[2].body.contains("Feature Option Name"));
    }

    #[test]
    fn test_page_to_source_named_anchor() {
        let html = Html::parse_document(
            r#"<html><body>
                <h4><a name="toc-quiz-logs"></a>Quiz Logs</h4>
                <p>Details.</p>
            </body></html>"#,
        );

        let page = page_to_source(&html, "https://example.com/notes/1", "notes", None).unwrap();
        assert_eq!(page.nodes[0].anchor.as_deref(), Some("toc-quiz-logs"));
    }

    #[test]
    fn test_page_to_source_missing_region() {
        let html = Html::parse_document("<html><body></body></html>");
        assert!(page_to_source(&html, "u", "t", Some("div.nope")).is_err());
    }

    #[test]
    fn test_extract_comments_drops_author_markup() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="reply">
                    <span class="author">Jane Doe</span>
                    <time datetime="2026-07-20T10:30:00Z"></time>
                    <p class="reply-body">Same here, fixed after the deploy.</p>
                </div>
                <div class="reply">
                    <span class="author">J. Smith</span>
                    <time datetime="2026-07-21T08:00:00Z"></time>
                    <p class="reply-body">Still broken for our courses.</p>
                </div>
            </body></html>"#,
        );

        let comments = extract_comments(&html, "div.reply", Some("p.reply-body")).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].position, 1);
        assert_eq!(comments[0].body, "Same here, fixed after the deploy.");
        assert_eq!(comments[1].position, 2);
        for comment in &comments {
            assert!(!comment.body.contains("Jane"));
            assert!(!comment.body.contains("Smith"));
        }
        assert_eq!(
            comments[0].posted_at,
            chrono::DateTime::parse_from_rfc3339("2026-07-20T10:30:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_extract_comments_date_from_text() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="reply"><p>Posted July 20, 2026. Works for me.</p></div>
                <div class="reply"><p>No date in this one.</p></div>
            </body></html>"#,
        );

        let comments = extract_comments(&html, "div.reply", None).unwrap();
        // The dateless row is dropped; positions still reflect thread order
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].position, 1);
        assert!(comments[0].body.contains("Works for me"));
    }
}
