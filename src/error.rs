//! Error types for every stage of the daily report pipeline.
//!
//! Each stage owns one enum so callers can decide what is fatal:
//! - [`FetchError`]: a weather or news page could not be fetched or parsed
//! - [`AiRequestError`]: the unified LLM request failed or its reply was unusable
//! - [`TemplateError`]: the report could not be assembled into HTML
//! - [`DeliveryError`]: the e-mail or the local report file could not be written
//! - [`ConfigError`]: required settings are missing for the selected mode
//!
//! [`ReportError`] wraps all of them for the top-level driver.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("could not parse {url}: {reason}")]
    Unparsable { url: String, reason: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Error, Debug)]
pub enum AiRequestError {
    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM quota exhausted (HTTP 429): {0}")]
    QuotaExceeded(String),

    #[error("LLM endpoint answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM reply contained no text")]
    EmptyResponse,

    #[error("LLM reply could not be parsed: {0}")]
    Unparseable(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("report has no greeting text")]
    MissingGreeting,

    #[error("report has no weather records")]
    MissingWeather,
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("invalid e-mail address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("no recipients configured")]
    NoRecipients,

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("could not write report file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing setting {name} (set {env} or pass --{flag})")]
    Missing {
        name: &'static str,
        env: &'static str,
        flag: &'static str,
    },

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("weather collection failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("AI request failed: {0}")]
    Ai(#[from] AiRequestError),

    #[error("report rendering failed: {0}")]
    Template(#[from] TemplateError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl AiRequestError {
    /// Whether the endpoint refused the request for quota reasons.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_env_and_flag() {
        let err = ConfigError::Missing {
            name: "Gemini API key",
            env: "GEMINI_API_KEY",
            flag: "gemini-api-key",
        };
        let msg = err.to_string();
        assert!(msg.contains("GEMINI_API_KEY"));
        assert!(msg.contains("--gemini-api-key"));
    }

    #[test]
    fn test_report_error_wraps_stage_errors() {
        let err: ReportError = TemplateError::MissingGreeting.into();
        assert!(err.to_string().contains("no greeting"));

        let err: ReportError = AiRequestError::EmptyResponse.into();
        assert!(matches!(err, ReportError::Ai(_)));
    }

    #[test]
    fn test_is_quota() {
        assert!(AiRequestError::QuotaExceeded("slow down".into()).is_quota());
        assert!(!AiRequestError::EmptyResponse.is_quota());
    }
}
