//! Run configuration.
//!
//! [`Config`] is built once at startup from the parsed [`Cli`] and then
//! passed by reference through the pipeline; nothing reads the environment
//! after that. The fixed tables (city pages, news listings, personas) live
//! here too.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::scrapers::news::{ListingKind, NewsSource};
use crate::scrapers::weather::CitySource;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for the single Gemini request; the reply for ~130 headlines
/// takes a while.
const AI_TIMEOUT: Duration = Duration::from_secs(120);

const BEIJING_WEATHER_URL: &str = "https://www.weather.com.cn/weather1d/101011700.shtml";
const JINAN_WEATHER_URL: &str = "https://www.weather.com.cn/weather1d/101120107.shtml";

/// Characters whose voice the greeting is written in; one is drawn per run.
pub const PERSONAS: [&str; 18] = [
    "多比",
    "哈利·波特",
    "麦格教授",
    "邓布利多",
    "赫敏·格兰杰",
    "罗恩·韦斯莱",
    "斯内普教授",
    "海格",
    "卢娜·洛夫古德",
    "纳威·隆巴顿",
    "金妮·韦斯莱",
    "小天狼星布莱克",
    "卢平教授",
    "韦斯莱先生",
    "韦斯莱夫人",
    "德拉科·马尔福",
    "伏地魔",
    "奇洛教授",
];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    /// Sender address, also used as the SMTP login.
    pub sender: String,
    pub password: String,
    pub recipients: Vec<String>,
}

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` in `--email-test` mode, where the AI step never runs.
    pub gemini: Option<GeminiConfig>,
    /// `None` when nothing will be sent.
    pub smtp: Option<SmtpConfig>,
    pub cities: Vec<CitySource>,
    pub news_sources: Vec<NewsSource>,
    pub personas: Vec<String>,
    pub recency_days: i64,
    pub output_dir: PathBuf,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn default_cities() -> Vec<CitySource> {
    vec![
        CitySource::new("北京", BEIJING_WEATHER_URL),
        CitySource::new("济南", JINAN_WEATHER_URL),
    ]
}

pub fn default_news_sources() -> Vec<NewsSource> {
    vec![
        NewsSource::new(
            "Nature News",
            "https://www.nature.com/latest-news",
            ListingKind::NatureNews,
            30,
        ),
        NewsSource::new(
            "Nature Research",
            "https://www.nature.com/nature/research-articles",
            ListingKind::NatureResearch,
            30,
        ),
        NewsSource::new(
            "ScienceDaily",
            "https://www.sciencedaily.com/",
            ListingKind::ScienceDaily,
            50,
        ),
        NewsSource::new(
            "ScienceDaily Top",
            "https://www.sciencedaily.com/news/top/science/",
            ListingKind::ScienceDaily,
            30,
        ),
        NewsSource::new(
            "ScienceDaily Brain",
            "https://www.sciencedaily.com/news/mind_brain/",
            ListingKind::ScienceDaily,
            30,
        ),
    ]
}

impl Config {
    /// Validate the CLI/env settings for the selected mode and freeze them.
    ///
    /// The Gemini key is required unless `--email-test` is given; SMTP
    /// credentials and recipients are required whenever mail will be sent.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid setting.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let gemini = if cli.email_test {
            None
        } else {
            let api_key = non_blank(&cli.gemini_api_key).ok_or(ConfigError::Missing {
                name: "Gemini API key",
                env: "GEMINI_API_KEY",
                flag: "gemini-api-key",
            })?;
            Some(GeminiConfig {
                api_key,
                model: cli.gemini_model.trim().to_string(),
                base_url: cli.gemini_base_url.trim().to_string(),
                timeout: AI_TIMEOUT,
            })
        };

        let smtp = if cli.sends_mail() {
            let sender = non_blank(&cli.sender_email).ok_or(ConfigError::Missing {
                name: "sender address",
                env: "SENDER_EMAIL",
                flag: "sender-email",
            })?;
            let password = non_blank(&cli.sender_password).ok_or(ConfigError::Missing {
                name: "SMTP password",
                env: "SENDER_PASSWORD",
                flag: "sender-password",
            })?;
            let recipients = cli
                .receiver_emails
                .as_deref()
                .map(parse_recipients)
                .unwrap_or_default();
            if recipients.is_empty() {
                return Err(ConfigError::Missing {
                    name: "recipients",
                    env: "RECEIVER_EMAILS",
                    flag: "receiver-emails",
                });
            }
            Some(SmtpConfig {
                server: cli.smtp_server.trim().to_string(),
                port: cli.smtp_port,
                sender,
                password,
                recipients,
            })
        } else {
            None
        };

        if cli.recency_days < 0 {
            return Err(ConfigError::Invalid {
                name: "recency days",
                reason: format!("must not be negative, got {}", cli.recency_days),
            });
        }

        Ok(Self {
            gemini,
            smtp,
            cities: default_cities(),
            news_sources: default_news_sources(),
            personas: PERSONAS.iter().map(|p| p.to_string()).collect(),
            recency_days: cli.recency_days,
            output_dir: cli.output_dir.clone().unwrap_or_else(std::env::temp_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["daily_magic_report"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    const SMTP_ARGS: [&str; 6] = [
        "--sender-email",
        "bot@example.com",
        "--sender-password",
        "secret",
        "--receiver-emails",
        " a@example.com , ,b@example.com ",
    ];

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients("a@x.com, b@x.com,,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
        assert!(parse_recipients(" , ").is_empty());
    }

    #[test]
    fn test_full_run_config() {
        let mut args = vec!["--gemini-api-key", "k"];
        args.extend_from_slice(&SMTP_ARGS);
        let config = Config::from_cli(&cli(&args)).unwrap();

        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key, "k");
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.recipients, vec!["a@example.com", "b@example.com"]);
        assert_eq!(config.cities.len(), 2);
        assert_eq!(config.news_sources.len(), 5);
        assert_eq!(config.personas.len(), 18);
    }

    #[test]
    fn test_no_send_does_not_need_smtp() {
        let config = Config::from_cli(&cli(&["--gemini-api-key", "k", "--test", "--no-send"])).unwrap();
        assert!(config.smtp.is_none());
        assert!(config.gemini.is_some());
    }

    #[test]
    fn test_email_test_does_not_need_gemini() {
        let mut args = vec!["--email-test", "--gemini-api-key", ""];
        args.extend_from_slice(&SMTP_ARGS);
        let config = Config::from_cli(&cli(&args)).unwrap();
        assert!(config.gemini.is_none());
        assert!(config.smtp.is_some());
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let err = Config::from_cli(&cli(&["--gemini-api-key", "  ", "--no-send"])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { env: "GEMINI_API_KEY", .. }));
    }

    #[test]
    fn test_sending_requires_recipients() {
        let err = Config::from_cli(&cli(&[
            "--gemini-api-key",
            "k",
            "--sender-email",
            "bot@example.com",
            "--sender-password",
            "secret",
            "--receiver-emails",
            " , ",
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { env: "RECEIVER_EMAILS", .. }));
    }

    #[test]
    fn test_negative_recency_rejected() {
        let err = Config::from_cli(&cli(&["--gemini-api-key", "k", "--no-send", "--recency-days=-1"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
