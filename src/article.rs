//! Article download and extraction.
//!
//! Fetches a page, pulls the body text out with Readability and the metadata
//! (authors, publish date, publication) out of meta tags, bylines and
//! JSON-LD with Scraper, then builds an extractive summary.

use crate::config::AppConfig;
use crate::error::AnalyzeError;
use crate::summary::summarize;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{info, warn};
use utoipa::ToSchema;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    ]
});

static PUBLICATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    vec![
        ("bbc.co.uk", "BBC News"),
        ("bbc.com", "BBC News"),
        ("cnn.com", "CNN"),
        ("nytimes.com", "The New York Times"),
        ("washingtonpost.com", "The Washington Post"),
        ("theguardian.com", "The Guardian"),
        ("reuters.com", "Reuters"),
        ("apnews.com", "Associated Press"),
        ("bloomberg.com", "Bloomberg"),
        ("wsj.com", "The Wall Street Journal"),
        ("ft.com", "Financial Times"),
        ("economist.com", "The Economist"),
        ("npr.org", "NPR"),
        ("aljazeera.com", "Al Jazeera"),
        ("foxnews.com", "Fox News"),
        ("nbcnews.com", "NBC News"),
        ("cbsnews.com", "CBS News"),
        ("abcnews.go.com", "ABC News"),
        ("independent.co.uk", "The Independent"),
        ("telegraph.co.uk", "The Telegraph"),
        ("politico.com", "Politico"),
        ("axios.com", "Axios"),
        ("theverge.com", "The Verge"),
        ("techcrunch.com", "TechCrunch"),
        ("lemonde.fr", "Le Monde"),
        ("spiegel.de", "Der Spiegel"),
    ]
    .into_iter()
    .collect()
});

static BY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:written\s+|posted\s+)?by[:\s]+").expect("by-prefix pattern compiles"));

static AUTHOR_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:,|&|\||\band\b)\s*").expect("separator pattern compiles"));

/// An extracted news article.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub publication: String,
    pub text: String,
    pub summary: String,
}

/// Unwrap Google redirect links (`google.com/url?...&url=...`) to the real
/// destination. Other URLs are returned unchanged.
pub fn decode_redirect_url(url: &str) -> String {
    if url.contains("google.com/url") {
        if let Some(param) = url.split("&url=").nth(1).or_else(|| url.split("?url=").nth(1)) {
            let encoded = param.split('&').next().unwrap_or(param);
            return urlencoding::decode(encoded)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| encoded.to_string());
        }
    }
    url.to_string()
}

pub fn validate_url(raw: &str) -> Result<Url, AnalyzeError> {
    let url = Url::parse(raw.trim()).map_err(|e| AnalyzeError::InvalidUrl(format!("{} ({})", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(AnalyzeError::InvalidUrl(format!("{} (only http/https URLs)", raw))),
    }
}

/// Reusable HTTP client for article downloads.
pub struct ArticleFetcher {
    client: reqwest::Client,
    summary_sentences: usize,
}

impl ArticleFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(config.fetch_timeout)
            .build()?;
        Ok(Self {
            client,
            summary_sentences: config.summary_sentences,
        })
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<Article, AnalyzeError> {
        let url = validate_url(&decode_redirect_url(raw_url))?;
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Mozilla/5.0");
        info!("📰 Fetching article: {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("⚠️ Article request failed: {}", response.status());
            return Err(AnalyzeError::Status(response.status().as_u16()));
        }
        let final_url = response.url().clone();
        let html = response.text().await?;
        info!("Fetched {} bytes from {}", html.len(), final_url);

        parse_article(&html, &final_url, self.summary_sentences)
    }
}

/// Extract an [`Article`] from already-downloaded HTML.
pub fn parse_article(html: &str, url: &Url, summary_sentences: usize) -> Result<Article, AnalyzeError> {
    let mut reader = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut reader, url).ok();
    let document = Html::parse_document(html);

    let text = product
        .as_ref()
        .map(|p| p.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| paragraph_text(&document));
    if text.is_empty() {
        return Err(AnalyzeError::EmptyArticle);
    }

    let json_ld = extract_json_ld(&document);
    let title = meta_content(&document, "meta[property='og:title']")
        .or_else(|| first_text(&document, "title"))
        .or_else(|| product.as_ref().map(|p| p.title.trim().to_string()))
        .filter(|t| !t.is_empty())
        .unwrap_or_default();
    let authors = clean_authors(author_candidates(&document, &json_ld));
    let publish_date = date_candidates(&document, &json_ld)
        .iter()
        .find_map(|raw| parse_date(raw));
    let host = url.host_str().unwrap_or_default();
    let publication = publication_for_host(host)
        .map(str::to_string)
        .or_else(|| meta_content(&document, "meta[property='og:site_name']"))
        .unwrap_or_else(|| host.trim_start_matches("www.").to_string());

    let summary = summarize(&text, &title, summary_sentences);

    Ok(Article {
        url: url.to_string(),
        title,
        authors,
        publish_date,
        publication,
        text,
        summary,
    })
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|e| e.value().attr("content"))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(|e| e.text().collect::<String>().trim().to_string())
        .find(|s| !s.is_empty())
}

fn paragraph_text(document: &Html) -> String {
    let Some(sel) = selector("p") else {
        return String::new();
    };
    document
        .select(&sel)
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Every JSON-LD object in the page, with `@graph` arrays flattened.
fn extract_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let Some(sel) = selector("script[type='application/ld+json']") else {
        return Vec::new();
    };
    let mut objects = Vec::new();
    for el in document.select(&sel) {
        let raw = el.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let mut stack = vec![value];
        while let Some(value) = stack.pop() {
            match value {
                serde_json::Value::Array(items) => stack.extend(items),
                serde_json::Value::Object(mut map) => {
                    if let Some(graph) = map.remove("@graph") {
                        stack.push(graph);
                    }
                    objects.push(serde_json::Value::Object(map));
                }
                _ => {}
            }
        }
    }
    objects
}

fn json_ld_names(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| json_ld_names(v, out)),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(name)) = map.get("name") {
                out.push(name.clone());
            }
        }
        _ => {}
    }
}

fn author_candidates(document: &Html, json_ld: &[serde_json::Value]) -> Vec<String> {
    let mut candidates = Vec::new();
    for css in [
        "meta[name='author']",
        "meta[property='article:author']",
        "meta[name='byl']",
        "meta[name='parsely-author']",
    ] {
        if let Some(sel) = selector(css) {
            candidates.extend(
                document
                    .select(&sel)
                    .filter_map(|e| e.value().attr("content"))
                    .map(str::to_string),
            );
        }
    }
    for object in json_ld {
        if let Some(author) = object.get("author") {
            json_ld_names(author, &mut candidates);
        }
    }
    for css in ["a[rel~='author']", "[itemprop~='author']", ".byline", ".author"] {
        if let Some(sel) = selector(css) {
            candidates.extend(
                document
                    .select(&sel)
                    .take(5)
                    .map(|e| e.text().collect::<Vec<_>>().join(" ")),
            );
        }
    }
    candidates
}

/// Normalise a raw author list: strip "By", split joint bylines, drop junk
/// (URLs, emails, dates, long phrases), dedupe case-insensitively and drop
/// names contained in a longer kept name.
pub fn clean_authors(candidates: Vec<String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for candidate in candidates {
        let collapsed = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.contains("http") || collapsed.contains('@') {
            continue;
        }
        let stripped = BY_PREFIX.replace(&collapsed, "");
        for part in AUTHOR_SEPARATOR.split(&stripped) {
            let name = part.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_string();
            let word_count = name.split_whitespace().count();
            if name.chars().count() < 2
                || word_count > 5
                || name.chars().any(|c| c.is_ascii_digit())
            {
                continue;
            }
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
    }

    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    names
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            !lowered
                .iter()
                .enumerate()
                .any(|(j, other)| *i != j && other.len() > lowered[*i].len() && other.contains(&lowered[*i]))
        })
        .map(|(_, n)| n.clone())
        .collect()
}

fn date_candidates(document: &Html, json_ld: &[serde_json::Value]) -> Vec<String> {
    let mut candidates = Vec::new();
    for css in [
        "meta[property='article:published_time']",
        "meta[name='pubdate']",
        "meta[name='publish-date']",
        "meta[itemprop='datePublished']",
        "meta[name='date']",
    ] {
        candidates.extend(meta_content(document, css));
    }
    for object in json_ld {
        if let Some(serde_json::Value::String(date)) = object.get("datePublished") {
            candidates.push(date.clone());
        }
    }
    if let Some(sel) = selector("time[datetime]") {
        candidates.extend(
            document
                .select(&sel)
                .filter_map(|e| e.value().attr("datetime"))
                .map(str::to_string),
        );
    }
    candidates
}

/// Parse the date formats news sites put in metadata. Naive times are UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Publication name for a host, matching parent domains too
/// (`edition.cnn.com` → CNN).
pub fn publication_for_host(host: &str) -> Option<&'static str> {
    let host = host.trim_start_matches("www.").to_lowercase();
    let mut candidate = host.as_str();
    loop {
        if let Some(name) = PUBLICATIONS.get(candidate) {
            return Some(*name);
        }
        let (_, parent) = candidate.split_once('.')?;
        if !parent.contains('.') {
            return None;
        }
        candidate = parent;
    }
}
