//! Core types for shelfd
//!
//! Search hits, novel metadata and chapter references exchanged between the
//! content sources, the job state machine and the HTTP API.

use serde::{Deserialize, Serialize};

/// A single hit returned by one source's search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHit {
    /// Novel title as displayed by the source
    pub title: String,
    /// Novel page on the source
    pub url: String,
    /// Free-form extra information (latest chapter, author, ...)
    pub info: String,
}

/// A place where a novel can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub url: String,
    #[serde(default)]
    pub info: String,
}

/// A novel found during search, grouped across every source that has it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelHit {
    pub title: String,
    pub sources: Vec<SourceLink>,
}

/// Client-facing summary of one search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelSummary {
    /// Index into the search results, used as `novel_id` by clients
    pub id: usize,
    pub title: String,
    /// Number of sources carrying the novel
    pub sources: usize,
}

/// Search results as returned by `get_novels_founds`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub found: usize,
    pub content: Vec<NovelSummary>,
    pub query: String,
}

impl SearchResults {
    pub fn from_hits(query: &str, hits: &[NovelHit]) -> Self {
        Self {
            found: hits.len(),
            content: hits
                .iter()
                .enumerate()
                .map(|(id, hit)| NovelSummary {
                    id,
                    title: hit.title.clone(),
                    sources: hit.sources.len(),
                })
                .collect(),
            query: query.to_string(),
        }
    }
}

/// Sources available for the selected novel, as returned by `get_sources_founds`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceListing {
    pub novel: String,
    pub content: Vec<SourceLink>,
}

impl From<&NovelHit> for SourceListing {
    fn from(hit: &NovelHit) -> Self {
        Self {
            novel: hit.title.clone(),
            content: hit.sources.clone(),
        }
    }
}

/// Reference to a chapter on a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    /// 1-based chapter number, also used for the stored file name
    pub id: u32,
    pub title: String,
    pub url: String,
}

/// Novel information fetched from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelMetadata {
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    /// Root of the source site, used to derive the source slug
    pub home_url: String,
    /// Novel page the metadata was read from
    pub novel_url: String,
    pub chapters: Vec<ChapterRef>,
}

/// Body of a single chapter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChapterContent {
    /// Chapter body as HTML
    pub body: String,
    /// Absolute URLs of images referenced by the body
    pub images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_results_from_hits() {
        let hits = vec![
            NovelHit {
                title: "First".to_string(),
                sources: vec![
                    SourceLink { url: "https://a.example/1".to_string(), info: String::new() },
                    SourceLink { url: "https://b.example/1".to_string(), info: String::new() },
                ],
            },
            NovelHit {
                title: "Second".to_string(),
                sources: vec![SourceLink { url: "https://a.example/2".to_string(), info: String::new() }],
            },
        ];

        let results = SearchResults::from_hits("query", &hits);
        assert_eq!(results.found, 2);
        assert_eq!(results.content[0].sources, 2);
        assert_eq!(results.content[1].id, 1);
        assert_eq!(results.query, "query");

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["content"][0]["title"], "First");
    }
}
