//! SMTP problem digest mailer

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::checker::ProblemRecord;
use crate::config::EmailConfig;
use crate::notifier::MailNotifier;

/// Emails the problem digest over SMTP.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn transport(&self) -> crate::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
        }
        .map_err(|e| crate::WatchtowerError::Notifier(format!("SMTP transport: {}", e)))?;

        Ok(builder
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.login.clone(),
                self.config.password.clone(),
            ))
            .build())
    }
}

/// One HTML table row per problem client, with the failing concerns listed.
pub fn build_html(problems: &[ProblemRecord], now: DateTime<Tz>) -> String {
    let mut rows = String::new();
    for problem in problems {
        let concerns = problem
            .problems
            .keys()
            .map(|key| format!("<span style=\"color:#d32f2f\">❌ {}</span>", key))
            .collect::<Vec<_>>()
            .join("<br>");
        rows.push_str(&format!(
            "<tr><td><strong>{}</strong></td><td>{}</td><td>{}</td></tr>\n",
            problem.client, problem.login, concerns
        ));
    }

    format!(
        "<html><body>\
         <h2>⚠️ Integration problems detected</h2>\
         <p><strong>Date:</strong> {}<br>\
         <strong>Checked at:</strong> {}<br>\
         <strong>Clients with problems:</strong> {}</p>\
         <table border=\"1\" cellpadding=\"8\" style=\"border-collapse:collapse\">\
         <tr><th>Client</th><th>Login</th><th>Failing integrations</th></tr>\n{}\
         </table>\
         <p style=\"color:#999\">Automated notification from the AI Pradavan integration monitor</p>\
         </body></html>",
        now.format("%d.%m.%Y"),
        now.format("%H:%M"),
        problems.len(),
        rows
    )
}

#[async_trait]
impl MailNotifier for SmtpMailer {
    async fn send_problem_report(
        &self,
        problems: &[ProblemRecord],
        now: DateTime<Tz>,
    ) -> crate::Result<()> {
        if problems.is_empty() {
            return Ok(());
        }
        if self.config.recipients.is_empty() {
            tracing::warn!("Email recipient list is empty, skipping problem digest");
            return Ok(());
        }

        let from: Mailbox = self.config.login.parse().map_err(|e| {
            crate::WatchtowerError::Notifier(format!("Bad sender address: {}", e))
        })?;

        let subject = format!(
            "⚠️ Integration problems | {} {}",
            now.format("%d.%m.%Y"),
            now.format("%H:%M")
        );

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in &self.config.recipients {
            let to: Mailbox = recipient.parse().map_err(|e| {
                crate::WatchtowerError::Notifier(format!("Bad recipient address: {}", e))
            })?;
            builder = builder.to(to);
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(build_html(problems, now))
            .map_err(|e| crate::WatchtowerError::Notifier(format!("Building email: {}", e)))?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| crate::WatchtowerError::Notifier(format!("Sending email: {}", e)))?;

        tracing::info!(
            "Problem digest emailed to {}",
            self.config.recipients.join(", ")
        );
        Ok(())
    }
}
