//! Science news listing scrapers.
//!
//! Five listing pages are indexed for headline/link/date triples:
//!
//! | Source | Layout | Date taken from |
//! |--------|--------|-----------------|
//! | Nature News | `div.c-article-item__content` cards | `span.c-article-item__date` ("03 Dec 2025") |
//! | Nature Research | `article` cards | `time[datetime]` |
//! | ScienceDaily, Top, Brain | `a[href*="/releases/"]` anchors | the release URL (`/releases/YYYY/MM/YYMMDD…`) |
//!
//! Only the listing pages are fetched; article bodies are never downloaded.
//! A source that fails is logged and skipped. The combined list is
//! de-duplicated by link and then cut to the recency window by
//! [`filter_recent`].

use crate::error::FetchError;
use crate::models::NewsItem;
use crate::scrapers::fetch_html;
use crate::utils::squash_whitespace;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, error, info, instrument};
use url::Url;

/// How a listing page is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    NatureNews,
    NatureResearch,
    ScienceDaily,
}

/// One listing page to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsSource {
    /// Name shown in the prompt and the report, e.g. "ScienceDaily Brain".
    pub name: String,
    pub url: String,
    pub kind: ListingKind,
    /// Maximum number of items taken from this page.
    pub limit: usize,
}

impl NewsSource {
    pub fn new(name: &str, url: &str, kind: ListingKind, limit: usize) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind,
            limit,
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static listing selector")
}

static NATURE_CARD: Lazy<Selector> = Lazy::new(|| selector("div.c-article-item__content"));
static NATURE_CARD_TITLE: Lazy<Selector> = Lazy::new(|| selector("h3.c-article-item__title"));
static NATURE_CARD_DATE: Lazy<Selector> = Lazy::new(|| selector("span.c-article-item__date"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static ARTICLE: Lazy<Selector> = Lazy::new(|| selector("article"));
static ARTICLE_LINK: Lazy<Selector> = Lazy::new(|| selector("h3 a, h2 a"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time"));
static RELEASE_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="/releases/"]"#));

static RELEASE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/releases/(\d{4})/(\d{2})/\d{2}(\d{2})(\d{2})\d{6}\.htm")
        .expect("static release date regex")
});

/// ScienceDaily anchors shorter than this are thumbnails or "more" links.
const MIN_TITLE_CHARS: usize = 10;

/// Normalize a listing date to a calendar day.
///
/// Accepts `2025-12-03`, ISO date-times (`2025-12-03T10:00:00Z`, with or
/// without fraction/zone), `03 Dec 2025` and `December 3, 2025`. Empty or
/// unrecognized input yields `today`, so undated items stay eligible.
pub fn parse_listing_date(raw: &str, today: NaiveDate) -> NaiveDate {
    let raw = raw.trim();
    if raw.is_empty() {
        return today;
    }

    if raw.contains('T') {
        let head: String = raw.chars().take(19).collect();
        if let Ok(dt) = NaiveDateTime::parse_from_str(&head, "%Y-%m-%dT%H:%M:%S") {
            return dt.date();
        }
        if let Some(date_part) = raw.split('T').next() {
            if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                return d;
            }
        }
    }

    ["%Y-%m-%d", "%d %b %Y", "%d %B %Y", "%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .unwrap_or_else(|| {
            debug!(raw, "Unrecognized listing date; using today");
            today
        })
}

/// Date encoded in a ScienceDaily release URL, e.g.
/// `/releases/2025/12/251203101530.htm` → 2025-12-03.
fn release_date(url: &str) -> Option<NaiveDate> {
    let caps = RELEASE_DATE.captures(url)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[4].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

fn parse_nature_news(document: &Html, source: &NewsSource, base: &Url, today: NaiveDate) -> Vec<NewsItem> {
    document
        .select(&NATURE_CARD)
        .take(source.limit)
        .filter_map(|card| {
            let title = card
                .select(&NATURE_CARD_TITLE)
                .next()
                .map(|t| squash_whitespace(&t.text().collect::<String>()))
                .filter(|t| !t.is_empty())?;
            let link = card
                .select(&ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(base, href))?;
            let date = card
                .select(&NATURE_CARD_DATE)
                .next()
                .map(|d| d.text().collect::<String>())
                .unwrap_or_default();
            Some(NewsItem::candidate(
                &source.name,
                &title,
                &link,
                parse_listing_date(&date, today),
            ))
        })
        .collect()
}

fn parse_nature_research(document: &Html, source: &NewsSource, base: &Url, today: NaiveDate) -> Vec<NewsItem> {
    document
        .select(&ARTICLE)
        .take(source.limit)
        .filter_map(|article| {
            let anchor = article.select(&ARTICLE_LINK).next()?;
            let title = squash_whitespace(&anchor.text().collect::<String>());
            if title.is_empty() {
                return None;
            }
            let link = anchor.value().attr("href").and_then(|href| resolve(base, href))?;
            let date = article
                .select(&TIME)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .unwrap_or_default();
            Some(NewsItem::candidate(
                &source.name,
                &title,
                &link,
                parse_listing_date(date, today),
            ))
        })
        .collect()
}

fn parse_sciencedaily(document: &Html, source: &NewsSource, base: &Url, today: NaiveDate) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for anchor in document.select(&RELEASE_LINK) {
        let Some(link) = anchor.value().attr("href").and_then(|href| resolve(base, href)) else {
            continue;
        };
        if seen.contains(&link) {
            continue;
        }
        let title = squash_whitespace(&anchor.text().collect::<String>());
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        let date = release_date(&link).unwrap_or(today);
        seen.insert(link.clone());
        items.push(NewsItem::candidate(&source.name, &title, &link, date));

        if items.len() >= source.limit {
            break;
        }
    }
    items
}

/// Extract candidate items from one listing page.
pub fn parse_listing(html: &str, source: &NewsSource, today: NaiveDate) -> Result<Vec<NewsItem>, FetchError> {
    let base = Url::parse(&source.url)?;
    let document = Html::parse_document(html);
    let items = match source.kind {
        ListingKind::NatureNews => parse_nature_news(&document, source, &base, today),
        ListingKind::NatureResearch => parse_nature_research(&document, source, &base, today),
        ListingKind::ScienceDaily => parse_sciencedaily(&document, source, &base, today),
    };
    Ok(items)
}

/// Fetch and parse one listing page.
#[instrument(level = "info", skip(client, today), fields(source = %source.name, url = %source.url))]
pub async fn fetch_listing(
    client: &Client,
    source: &NewsSource,
    today: NaiveDate,
) -> Result<Vec<NewsItem>, FetchError> {
    let html = fetch_html(client, &source.url).await?;
    let items = parse_listing(&html, source, today)?;
    info!(count = items.len(), "Indexed listing");
    Ok(items)
}

/// Index every source in turn and merge the results.
///
/// Failing sources are logged and contribute nothing. The merged list keeps
/// source order and drops repeated links (the ScienceDaily pages overlap).
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn collect_news(client: &Client, sources: &[NewsSource], today: NaiveDate) -> Vec<NewsItem> {
    let per_source: Vec<Vec<NewsItem>> = stream::iter(sources)
        .then(|source| async move {
            match fetch_listing(client, source, today).await {
                Ok(items) => items,
                Err(e) => {
                    error!(source = %source.name, error = %e, "News source failed; skipping");
                    Vec::new()
                }
            }
        })
        .collect()
        .await;

    let total: usize = per_source.iter().map(Vec::len).sum();
    let merged = per_source
        .into_iter()
        .flatten()
        .unique_by(|item| item.link.clone())
        .collect::<Vec<_>>();
    info!(total, unique = merged.len(), "Collected news candidates");
    merged
}

/// Keep the items published within `days` days of `today` (inclusive).
///
/// A window reaching past the earliest representable date keeps everything.
pub fn filter_recent(items: Vec<NewsItem>, today: NaiveDate, days: i64) -> Vec<NewsItem> {
    let Some(cutoff) = Duration::try_days(days).and_then(|d| today.checked_sub_signed(d)) else {
        info!(days, count = items.len(), "Recency window unbounded; keeping all items");
        return items;
    };
    let before = items.len();
    let recent: Vec<NewsItem> = items.into_iter().filter(|item| item.date >= cutoff).collect();
    info!(%cutoff, before, after = recent.len(), "Applied recency window");
    recent
}
