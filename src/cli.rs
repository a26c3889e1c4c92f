//! Command-line interface definitions for the daily report.
//!
//! Every setting can come from a flag or from the environment (a `.env`
//! file in the working directory is loaded first). Secrets are normally
//! supplied through the environment only.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the daily report.
///
/// # Examples
///
/// ```sh
/// # Normal scheduled run: build the report and e-mail it
/// daily_magic_report
///
/// # Build the report, keep a copy in the temp dir, do not send
/// daily_magic_report --test --no-send
///
/// # Check SMTP settings without spending LLM tokens
/// daily_magic_report --email-test
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Save the rendered HTML report to the output directory
    #[arg(long)]
    pub test: bool,

    /// Do not send the e-mail
    #[arg(long)]
    pub no_send: bool,

    /// Send a trivial message to check SMTP settings; skips scraping and the AI step
    #[arg(long)]
    pub email_test: bool,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash")]
    pub gemini_model: String,

    /// Base URL of the Gemini API
    #[arg(long, env = "GEMINI_BASE_URL", default_value = "https://generativelanguage.googleapis.com")]
    pub gemini_base_url: String,

    /// SMTP server host
    #[arg(long, env = "SMTP_SERVER", default_value = "smtp.gmail.com")]
    pub smtp_server: String,

    /// SMTP server port (465 uses implicit TLS, anything else STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// Sender address, also the SMTP login
    #[arg(long, env = "SENDER_EMAIL")]
    pub sender_email: Option<String>,

    /// SMTP password (app password)
    #[arg(long, env = "SENDER_PASSWORD", hide_env_values = true)]
    pub sender_password: Option<String>,

    /// Comma-separated recipient addresses
    #[arg(long, env = "RECEIVER_EMAILS")]
    pub receiver_emails: Option<String>,

    /// Directory for the HTML copy written with --test (default: system temp dir)
    #[arg(long, env = "REPORT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Only news published within this many days is offered to the AI
    #[arg(long, env = "RECENCY_DAYS", default_value_t = 2)]
    pub recency_days: i64,
}

impl Cli {
    /// Whether this run will talk to the SMTP server.
    pub fn sends_mail(&self) -> bool {
        self.email_test || !self.no_send
    }
}
