//! Collaborator traits for the notification and report channels

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;

use crate::checker::{ProblemRecord, StatusRow};
use crate::transition::Transition;

/// Sends a single text blob to the operator chat.
#[async_trait]
pub trait ChatNotifier: Send + Sync + std::fmt::Debug {
    async fn send(&self, text: &str) -> crate::Result<()>;
}

/// Writes the full report block to the spreadsheet.
#[async_trait]
pub trait ReportSink: Send + Sync + std::fmt::Debug {
    async fn write_report(
        &self,
        rows: &[StatusRow],
        transitions: &[Transition],
        now: DateTime<Tz>,
    ) -> crate::Result<()>;
}

/// Emails the problem digest to the configured recipients.
#[async_trait]
pub trait MailNotifier: Send + Sync + std::fmt::Debug {
    /// Must succeed as a no-op when `problems` or the recipient list is empty.
    async fn send_problem_report(
        &self,
        problems: &[ProblemRecord],
        now: DateTime<Tz>,
    ) -> crate::Result<()>;
}
