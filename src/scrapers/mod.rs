//! Page scrapers for the two inputs of the daily report.
//!
//! | Input | Module | Failure policy |
//! |-------|--------|----------------|
//! | City weather (weather.com.cn) | [`weather`] | fatal, weather is mandatory |
//! | Science news listings (Nature, ScienceDaily) | [`news`] | per source, failing sources are skipped |
//!
//! Both collectors share one [`reqwest::Client`] built by [`http_client`],
//! which sends a desktop browser User-Agent (the listing pages reject bare
//! clients) and applies a per-request timeout. Pages are fetched one after
//! another; parsing is split from fetching so the parsers can be tested on
//! static HTML.

pub mod news;
pub mod weather;

use crate::error::FetchError;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Per-request timeout for weather and news pages.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the HTTP client used for all page fetches.
pub fn http_client() -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(PAGE_TIMEOUT)
        .build()
}

/// GET a page and return its body as text.
///
/// Non-2xx answers are reported as [`FetchError::Status`].
#[instrument(level = "debug", skip(client))]
pub async fn fetch_html(client: &Client, url: &str) -> Result<String, FetchError> {
    let http_err = |source| FetchError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.text().await.map_err(http_err)?;
    debug!(bytes = body.len(), "Fetched page");
    Ok(body)
}
