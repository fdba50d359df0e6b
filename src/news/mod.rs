use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::WatchItem;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const HEADLINE_SELECTOR: &str = "a";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad selector: {0}")]
    Selector(String),
}

/// One watchlist stock mentioned in a headline together with a theme
/// keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeHit {
    pub code: String,
    pub name: String,
    pub keyword: String,
    pub headline: String,
}

/// Keyword scan over news and disclosure list pages. A thin
/// collaborator: every failure degrades to an empty result for that
/// page, the detection pass runs regardless.
pub struct ThemeScanner {
    client: Client,
    keywords: Vec<String>,
    page_urls: Vec<String>,
    max_pages: usize,
}

impl ThemeScanner {
    pub fn new(keywords: Vec<String>, page_urls: Vec<String>, max_pages: usize) -> Self {
        Self {
            client: Client::new(),
            keywords,
            page_urls,
            max_pages: max_pages.max(1),
        }
    }

    pub async fn scan(&self, watchlist: &[WatchItem]) -> Vec<ThemeHit> {
        let mut hits = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for url_template in &self.page_urls {
            for page in 1..=self.max_pages {
                let url = url_template.replace("{page}", &page.to_string());
                let html = match self.fetch_page(&url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(url = %url, "theme page fetch failed: {e}");
                        break;
                    }
                };

                match extract_hits(&html, &self.keywords, watchlist) {
                    Ok(page_hits) => {
                        for hit in page_hits {
                            let key = (hit.code.clone(), hit.keyword.clone());
                            if seen.insert(key) {
                                hits.push(hit);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(url = %url, "theme page parse failed: {e}");
                    }
                }
            }
        }

        debug!(hits = hits.len(), "theme scan complete");
        hits
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let resp = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.text().await?)
    }
}

/// Pure headline matching: a hit needs the stock's name and one theme
/// keyword in the same headline.
pub fn extract_hits(
    html: &str,
    keywords: &[String],
    watchlist: &[WatchItem],
) -> Result<Vec<ThemeHit>, ScrapeError> {
    let selector = Selector::parse(HEADLINE_SELECTOR)
        .map_err(|e| ScrapeError::Selector(e.to_string()))?;
    let document = Html::parse_document(html);

    let mut hits = Vec::new();
    for element in document.select(&selector) {
        let headline = element.text().collect::<String>();
        let headline = headline.trim();
        if headline.is_empty() {
            continue;
        }

        for item in watchlist {
            if item.name.is_empty() || !headline.contains(&item.name) {
                continue;
            }
            for keyword in keywords {
                if headline.contains(keyword.as_str()) {
                    hits.push(ThemeHit {
                        code: item.code.clone(),
                        name: item.name.clone(),
                        keyword: keyword.clone(),
                        headline: headline.to_string(),
                    });
                }
            }
        }
    }

    Ok(hits)
}
