//! # Daily Magic Report
//!
//! A once-a-day pipeline that scrapes the weather for a few cities and the
//! latest science headlines, lets an LLM write a Harry Potter themed
//! greeting and pick, translate and summarize the best stories, and e-mails
//! the result as an HTML page.
//!
//! ## Features
//!
//! - Scrapes weather.com.cn city pages (temperature, wind, sunrise, alerts)
//! - Scrapes Nature and ScienceDaily listing pages for candidate headlines
//! - Sends everything to Gemini in a single request
//! - Renders a responsive HTML report grouped by topic
//! - Delivers over SMTP, or writes the page to disk in test mode
//!
//! ## Usage
//!
//! ```sh
//! daily_magic_report                   # scheduled run
//! daily_magic_report --test --no-send  # preview only
//! daily_magic_report --email-test      # check SMTP settings
//! ```
//!
//! ## Architecture
//!
//! The application runs strictly in order:
//! 1. **Weather**: fetch every city page (any failure is fatal)
//! 2. **News**: index every listing page (failing sources are skipped)
//! 3. **AI**: one request producing greeting, advice and selection
//! 4. **Output**: render HTML, optionally save it, optionally send it

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod orchestrator;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use api::GeminiClient;
use cli::Cli;
use config::Config;
use error::{ConfigError, FetchError, ReportError};
use outputs::email::SmtpMailer;
use pipeline::{run_daily_report, send_test_email, RunOptions};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_magic_report starting up");

    if dotenv::dotenv().is_ok() {
        debug!("Loaded .env file");
    }
    let args = Cli::parse();
    debug!(test = args.test, no_send = args.no_send, email_test = args.email_test, "Parsed CLI arguments");

    let result = run(&args).await;
    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(
            ?elapsed,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete"
        ),
        Err(ReportError::Ai(e)) if e.is_quota() => {
            error!(?elapsed, error = %e, "Gemini quota exhausted; try again later or switch GEMINI_MODEL")
        }
        Err(e) => error!(?elapsed, error = %e, "Execution failed"),
    }
    result.map_err(Into::into)
}

async fn run(args: &Cli) -> Result<(), ReportError> {
    let config = Config::from_cli(args)?;
    let now = Local::now().naive_local();
    let mailer = config.smtp.as_ref().map(SmtpMailer::new).transpose()?;

    // ---- SMTP check only ----
    if args.email_test {
        let (Some(mailer), Some(smtp)) = (&mailer, &config.smtp) else {
            return Err(ConfigError::Missing {
                name: "SMTP settings",
                env: "SENDER_EMAIL",
                flag: "sender-email",
            }
            .into());
        };
        send_test_email(mailer, &smtp.recipients, now).await?;
        info!(recipients = smtp.recipients.len(), "Test e-mail sent");
        return Ok(());
    }

    let Some(gemini_config) = &config.gemini else {
        return Err(ConfigError::Missing {
            name: "Gemini API key",
            env: "GEMINI_API_KEY",
            flag: "gemini-api-key",
        }
        .into());
    };

    // ---- Collect ----
    let client = scrapers::http_client().map_err(|source| FetchError::Http {
        url: "(client setup)".to_string(),
        source,
    })?;
    let weather = scrapers::weather::collect_weather(&client, &config.cities).await?;
    info!(cities = weather.len(), "Weather collected");
    let news = scrapers::news::collect_news(&client, &config.news_sources, now.date()).await;

    // ---- Ask, render, deliver ----
    let persona = orchestrator::pick_persona(&config.personas);
    info!(%persona, "Persona chosen");
    let gemini = GeminiClient::new(gemini_config)?;
    let options = RunOptions::from_config(&config, args.test, now);

    let summary = run_daily_report(&gemini, mailer.as_ref(), &options, &persona, &weather, news).await?;
    if let Some(path) = &summary.saved_to {
        info!(path = %path.display(), "Report saved");
    }
    info!(
        candidates = summary.candidates,
        selected = summary.selected,
        sent = summary.sent,
        "Daily report finished"
    );
    Ok(())
}
