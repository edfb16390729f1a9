use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::{Config, SmtpSettings};

/// What the hiring team learns when a candidate finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub candidate_id: String,
    pub name: String,
    pub email: String,
    pub score: f64,
    pub max_score: f64,
    pub report_id: String,
    pub report_url: String,
}

impl CompletionReport {
    pub fn subject(&self) -> String {
        format!(
            "Candidate {} scored {:.1}/{:.1} in the screening quiz",
            self.name, self.score, self.max_score
        )
    }
}

/// Called exactly once per quiz, after completion has been persisted.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_completion(&self, report: &CompletionReport) -> Result<()>;
}

/// Writes the report to the log; used when mail is not configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_completion(&self, report: &CompletionReport) -> Result<()> {
        tracing::info!(
            candidate = %report.candidate_id,
            report_url = %report.report_url,
            "{}",
            report.subject()
        );
        Ok(())
    }
}

pub struct EmailNotifier {
    settings: SmtpSettings,
}

impl EmailNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let settings = &self.settings;
        let creds = Credentials::new(settings.login.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_completion(&self, report: &CompletionReport) -> Result<()> {
        let from: Mailbox = self
            .settings
            .from
            .parse()
            .context("Invalid from email address")?;
        let to: Mailbox = self
            .settings
            .report_to
            .parse()
            .context("Invalid report recipient address")?;

        let body = format!(
            "<html><body>{} ({}) finished the screening quiz with {:.2} out of {:.1}.<br/><br/>\
             You can view the full report at <a href=\"{url}\">{url}</a>.</body></html>",
            report.name,
            report.email,
            report.score,
            report.max_score,
            url = report.report_url
        );

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(report.subject())
            .header(ContentType::TEXT_HTML)
            .body(body)
            .context("Failed to build report email")?;

        self.build_mailer()?
            .send(email)
            .await
            .context("Failed to send report email")?;

        tracing::info!("Completion report mailed for candidate {}", report.candidate_id);
        Ok(())
    }
}

pub fn sending_disabled() -> bool {
    std::env::var("EMAIL_SEND_DISABLED")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Mail when SMTP is configured and sending is enabled, the log otherwise.
pub fn notifier_from_config(config: &Config) -> Arc<dyn Notifier> {
    match &config.smtp {
        Some(settings) if !sending_disabled() => {
            tracing::info!("Completion reports will be mailed via {}", settings.server);
            Arc::new(EmailNotifier::new(settings.clone()))
        }
        _ => {
            tracing::info!("SMTP not configured or disabled; completion reports go to the log");
            Arc::new(LogNotifier)
        }
    }
}
