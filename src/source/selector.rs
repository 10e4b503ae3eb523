//! Selector-driven generic source
//!
//! Many novel sites share the same shape: a search page listing novel links, a
//! novel page with a title, a cover and a chapter list, and chapter pages with
//! a single content container. `SelectorSource` covers that shape with CSS
//! selectors taken from configuration, so new sites can be added without code.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::SourceConfig;
use crate::types::{ChapterContent, ChapterRef, NovelMetadata, SourceHit};
use crate::util::quote_plus;

use super::{SourceAdapter, SourceError};

/// Compiled selectors for one source
struct Selectors {
    search_item: Option<Selector>,
    search_info: Option<Selector>,
    novel_title: Selector,
    novel_author: Option<Selector>,
    novel_cover: Option<Selector>,
    chapter_link: Selector,
    chapter_body: Selector,
    image: Selector,
}

fn parse_selector(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector).map_err(|e| SourceError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn parse_optional(selector: Option<&str>) -> Result<Option<Selector>, SourceError> {
    selector.map(parse_selector).transpose()
}

/// Collapse the text content of an element into a single line
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generic source configured with CSS selectors
pub struct SelectorSource {
    config: SourceConfig,
    selectors: Selectors,
    client: reqwest::Client,
}

impl SelectorSource {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let selectors = Selectors {
            search_item: parse_optional(config.search_item.as_deref())?,
            search_info: parse_optional(config.search_info.as_deref())?,
            novel_title: parse_selector(&config.novel_title)?,
            novel_author: parse_optional(config.novel_author.as_deref())?,
            novel_cover: parse_optional(config.novel_cover.as_deref())?,
            chapter_link: parse_selector(&config.chapter_link)?,
            chapter_body: parse_selector(&config.chapter_body)?,
            image: parse_selector("img[src]")?,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            config,
            selectors,
            client,
        })
    }

    async fn get_text(&self, url: &str) -> Result<(Url, String), SourceError> {
        debug!("{}: GET {}", self.config.name, url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok((final_url, body))
    }

    fn parse_search(&self, html: &str, page_url: &Url) -> Vec<SourceHit> {
        let Some(item_selector) = &self.selectors.search_item else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        document
            .select(item_selector)
            .filter_map(|item| {
                let href = item.value().attr("href")?;
                let url = page_url.join(href).ok()?;
                let title = element_text(item);
                if title.is_empty() {
                    return None;
                }
                let info = self
                    .selectors
                    .search_info
                    .as_ref()
                    .and_then(|s| item.select(s).next())
                    .map(element_text)
                    .unwrap_or_default();
                Some(SourceHit {
                    title,
                    url: url.to_string(),
                    info,
                })
            })
            .collect()
    }

    fn parse_novel(&self, html: &str, page_url: &Url) -> Result<NovelMetadata, SourceError> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.selectors.novel_title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::Parse {
                url: page_url.to_string(),
                reason: "novel title not found".to_string(),
            })?;

        let author = self
            .selectors
            .novel_author
            .as_ref()
            .and_then(|s| document.select(s).next())
            .map(element_text)
            .filter(|a| !a.is_empty());

        let cover_url = self
            .selectors
            .novel_cover
            .as_ref()
            .and_then(|s| document.select(s).next())
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| page_url.join(src).ok())
            .map(|u| u.to_string());

        let mut chapters: Vec<ChapterRef> = Vec::new();
        for link in document.select(&self.selectors.chapter_link) {
            let Some(url) = link
                .value()
                .attr("href")
                .and_then(|href| page_url.join(href).ok())
                .map(|u| u.to_string())
            else {
                continue;
            };
            if chapters.iter().any(|c| c.url == url) {
                continue;
            }
            let id = chapters.len() as u32 + 1;
            let title = element_text(link);
            chapters.push(ChapterRef {
                id,
                title: if title.is_empty() { format!("Chapter {}", id) } else { title },
                url,
            });
        }

        let home_url = page_url
            .join("/")
            .map_err(|e| SourceError::InvalidUrl(e.to_string()))?
            .to_string();

        Ok(NovelMetadata {
            title,
            author,
            cover_url,
            home_url,
            novel_url: page_url.to_string(),
            chapters,
        })
    }

    fn parse_chapter(&self, html: &str, page_url: &Url) -> Result<ChapterContent, SourceError> {
        let document = Html::parse_document(html);

        let body = document
            .select(&self.selectors.chapter_body)
            .next()
            .ok_or_else(|| SourceError::Parse {
                url: page_url.to_string(),
                reason: "chapter content not found".to_string(),
            })?;

        let images = body
            .select(&self.selectors.image)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| page_url.join(src).ok())
            .map(|u| u.to_string())
            .collect();

        Ok(ChapterContent {
            body: body.inner_html().trim().to_string(),
            images,
        })
    }
}

#[async_trait]
impl SourceAdapter for SelectorSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn base_urls(&self) -> &[String] {
        &self.config.base_urls
    }

    fn can_search(&self) -> bool {
        self.config.search_url.is_some() && self.selectors.search_item.is_some()
    }

    async fn search(&self, query: &str) -> Result<Vec<SourceHit>, SourceError> {
        let template = self
            .config
            .search_url
            .as_deref()
            .ok_or_else(|| SourceError::SearchUnsupported(self.config.name.clone()))?;
        let url = template.replace("{query}", &quote_plus(query));
        let (page_url, html) = self.get_text(&url).await?;
        Ok(self.parse_search(&html, &page_url))
    }

    async fn fetch_novel(&self, url: &str) -> Result<NovelMetadata, SourceError> {
        let (page_url, html) = self.get_text(url).await?;
        self.parse_novel(&html, &page_url)
    }

    async fn fetch_chapter(&self, chapter: &ChapterRef) -> Result<ChapterContent, SourceError> {
        let (page_url, html) = self.get_text(&chapter.url).await?;
        self.parse_chapter(&html, &page_url)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
