//! Watchtower - integration health monitoring for AI Pradavan clients
//!
//! Polls every client's messaging integrations, detects status transitions
//! against the last snapshot, and notifies operators via chat, spreadsheet,
//! and email.

pub mod channel;
pub mod checker;
pub mod config;
pub mod email;
pub mod engine;
pub mod error;
pub mod io;
pub mod notifier;
pub mod report;
pub mod sheets;
pub mod snapshot;
pub mod status;
pub mod telegram;
pub mod transition;

pub use config::{load_config, Config};
pub use error::{Result, WatchtowerError};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::checker::ClientChecker;
use crate::email::SmtpMailer;
use crate::engine::Engine;
use crate::io::ReqwestHttpClient;
use crate::notifier::{ChatNotifier, MailNotifier, ReportSink};
use crate::report::ReportCycle;
use crate::sheets::SheetsReporter;
use crate::snapshot::SnapshotStore;
use crate::telegram::TelegramNotifier;

/// Run the watchtower service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    let clients = config.load_clients()?;
    if clients.is_empty() {
        return Err(WatchtowerError::Config(
            "no clients configured (set `clients` or `clients_file`)".to_string(),
        ));
    }

    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::new());
    let cancel = CancellationToken::new();

    let cycle = ReportCycle::new(
        ClientChecker::new(config.base_url.clone(), Arc::clone(&http)),
        SnapshotStore::new(config.snapshot_path.clone()),
    );

    let chat: Arc<dyn ChatNotifier> =
        Arc::new(TelegramNotifier::new(&config.telegram, Arc::clone(&http)));
    let sheets: Arc<dyn ReportSink> =
        Arc::new(SheetsReporter::new(&config.sheets, Arc::clone(&http)));
    let mail: Arc<dyn MailNotifier> = Arc::new(SmtpMailer::new(&config.email));

    let engine = Engine::new(
        cycle,
        chat,
        sheets,
        mail,
        clients,
        config.schedule.clone(),
        cancel.clone(),
    );

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    tracing::info!("Watchtower engine started");

    // Run the engine (blocks until cancelled)
    engine.run().await;

    tracing::info!("Watchtower engine stopped");
    Ok(())
}
