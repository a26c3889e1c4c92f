//! The linear driver of one run, after collection.
//!
//! recency filter → one AI request → render → optional file copy → optional send
//!
//! Every stage consumes the previous stage's value; the first error stops
//! the run, so a failed AI request or render never reaches the mailer.

use crate::api::AskAsync;
use crate::config::Config;
use crate::error::ReportError;
use crate::models::{NewsItem, WeatherRecord};
use crate::orchestrator::orchestrate;
use crate::outputs::email::{report_subject, test_subject, write_report_file, Mailer};
use crate::outputs::html::{render_report, render_test_email};
use crate::scrapers::news::filter_recent;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::{info, instrument};

/// What to do with the rendered page.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Local time the run started; sets the recency window, subject and file name.
    pub now: NaiveDateTime,
    pub recency_days: i64,
    /// Directory for the HTML copy, if one should be written.
    pub save_dir: Option<PathBuf>,
    pub recipients: Vec<String>,
}

impl RunOptions {
    pub fn from_config(config: &Config, save_html: bool, now: NaiveDateTime) -> Self {
        Self {
            now,
            recency_days: config.recency_days,
            save_dir: save_html.then(|| config.output_dir.clone()),
            recipients: config
                .smtp
                .as_ref()
                .map(|smtp| smtp.recipients.clone())
                .unwrap_or_default(),
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub selected: usize,
    pub saved_to: Option<PathBuf>,
    pub sent: bool,
}

/// Run the report from collected weather and news.
///
/// The page is sent only when `mailer` is given.
///
/// # Errors
///
/// The first failing stage's error, wrapped in [`ReportError`].
#[instrument(level = "info", skip_all, fields(persona = %persona))]
pub async fn run_daily_report<A, M>(
    ask: &A,
    mailer: Option<&M>,
    options: &RunOptions,
    persona: &str,
    weather: &[WeatherRecord],
    news: Vec<NewsItem>,
) -> Result<RunSummary, ReportError>
where
    A: AskAsync<Response = String>,
    M: Mailer,
{
    let today = options.now.date();
    let candidates = filter_recent(news, today, options.recency_days);
    if candidates.is_empty() {
        info!("No recent news; asking for the greeting only");
    }

    let response = orchestrate(ask, persona, weather, &candidates).await?;
    let html = render_report(&response, weather)?;

    let saved_to = match &options.save_dir {
        Some(dir) => Some(write_report_file(dir, options.now, &html).await?),
        None => None,
    };

    let sent = match mailer {
        Some(mailer) => {
            mailer
                .send_html(&options.recipients, &report_subject(today), &html)
                .await?;
            true
        }
        None => {
            info!("Sending disabled; report not e-mailed");
            false
        }
    };

    Ok(RunSummary {
        candidates: candidates.len(),
        selected: response.items.len(),
        saved_to,
        sent,
    })
}

/// Send the connectivity-check message.
///
/// # Errors
///
/// [`ReportError::Delivery`] when sending fails.
#[instrument(level = "info", skip_all)]
pub async fn send_test_email<M: Mailer>(mailer: &M, recipients: &[String], now: NaiveDateTime) -> Result<(), ReportError> {
    mailer
        .send_html(recipients, &test_subject(now), &render_test_email(now))
        .await?;
    Ok(())
}
