//! Delivery of the rendered report.
//!
//! [`Mailer`] is the seam the pipeline sends through; [`SmtpMailer`] is the
//! lettre-backed implementation. Test runs can also keep a copy of the
//! page on disk with [`write_report_file`].

use crate::config::SmtpConfig;
use crate::error::DeliveryError;
use crate::utils::ensure_writable_dir;
use chrono::{NaiveDate, NaiveDateTime};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Port that speaks TLS from the first byte; every other port uses STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends one HTML message to a list of recipients.
pub trait Mailer {
    async fn send_html(&self, recipients: &[String], subject: &str, html: &str) -> Result<(), DeliveryError>;
}

/// Subject line of the daily report.
pub fn report_subject(date: NaiveDate) -> String {
    format!("每日魔法报告-{}", date.format("%Y-%m-%d"))
}

/// Subject line of the SMTP connectivity check.
pub fn test_subject(now: NaiveDateTime) -> String {
    format!("邮件测试 - {}", now.format("%Y-%m-%d %H:%M"))
}

fn mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.trim().parse().map_err(|source| DeliveryError::Address {
        address: address.to_string(),
        source,
    })
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. Nothing is sent and no connection is opened yet.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Address`] for an invalid sender and
    /// [`DeliveryError::Smtp`] if the relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let from = mailbox(&config.sender)?;
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.sender.clone(), config.password.clone()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    #[instrument(level = "info", skip_all, fields(recipients = recipients.len(), subject = %subject))]
    async fn send_html(&self, recipients: &[String], subject: &str, html: &str) -> Result<(), DeliveryError> {
        if recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            builder = builder.to(mailbox(recipient)?);
        }
        let message = builder.header(ContentType::TEXT_HTML).body(html.to_string())?;

        self.transport.send(message).await?;
        info!(to = %recipients.join(", "), "E-mail sent");
        Ok(())
    }
}

/// Write `html` as `daily_report_YYYYMMDD_HHMMSS.html` into `dir`.
///
/// # Errors
///
/// [`DeliveryError::Io`] if the directory is not writable or the write fails.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_report_file(dir: &Path, now: NaiveDateTime, html: &str) -> Result<PathBuf, DeliveryError> {
    ensure_writable_dir(dir).await?;
    let path = dir.join(format!("daily_report_{}.html", now.format("%Y%m%d_%H%M%S")));
    tokio::fs::write(&path, html).await?;
    info!(path = %path.display(), bytes = html.len(), "Wrote report file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 3).unwrap().and_hms_opt(7, 5, 9).unwrap()
    }

    fn smtp(port: u16, sender: &str) -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".to_string(),
            port,
            sender: sender.to_string(),
            password: "secret".to_string(),
            recipients: vec!["a@example.com".to_string()],
        }
    }

    #[test]
    fn test_subjects() {
        assert_eq!(report_subject(now().date()), "每日魔法报告-2025-12-03");
        assert_eq!(test_subject(now()), "邮件测试 - 2025-12-03 07:05");
    }

    #[test]
    fn test_smtp_mailer_builds_for_both_tls_modes() {
        assert!(SmtpMailer::new(&smtp(465, "bot@example.com")).is_ok());
        assert!(SmtpMailer::new(&smtp(587, "bot@example.com")).is_ok());
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let err = SmtpMailer::new(&smtp(587, "not an address")).err().unwrap();
        assert!(matches!(err, DeliveryError::Address { .. }));
    }

    #[tokio::test]
    async fn test_send_requires_recipients() {
        let mailer = SmtpMailer::new(&smtp(587, "bot@example.com")).unwrap();
        let err = mailer.send_html(&[], "s", "<p>x</p>").await.unwrap_err();
        assert!(matches!(err, DeliveryError::NoRecipients));
    }

    #[tokio::test]
    async fn test_send_rejects_bad_recipient_before_connecting() {
        let mailer = SmtpMailer::new(&smtp(587, "bot@example.com")).unwrap();
        let err = mailer
            .send_html(&["nobody".to_string()], "s", "<p>x</p>")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Address { ref address, .. } if address == "nobody"));
    }

    #[tokio::test]
    async fn test_write_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");
        let path = write_report_file(&target, now(), "<html></html>").await.unwrap();
        assert_eq!(path, target.join("daily_report_20251203_070509.html"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "<html></html>");
    }
}
