//! Report cycle: check every client, diff against the last snapshot

use crate::channel::Channel;
use crate::checker::{ClientChecker, ProblemRecord, StatusRow};
use crate::config::ClientConfig;
use crate::snapshot::{GlobalSnapshot, SnapshotStore};
use crate::status::ChannelStatus;
use crate::transition::{diff, Transition};

/// Everything one orchestration pass produces.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub rows: Vec<StatusRow>,
    pub problems: Vec<ProblemRecord>,
    pub transitions: Vec<Transition>,
}

/// Runs one full check cycle over the configured client list.
#[derive(Debug)]
pub struct ReportCycle {
    checker: ClientChecker,
    store: SnapshotStore,
}

impl ReportCycle {
    pub fn new(checker: ClientChecker, store: SnapshotStore) -> Self {
        Self { checker, store }
    }

    /// Check every client in configured order, detect transitions against
    /// the previous snapshot, and persist the fresh snapshot before
    /// returning so a retried notification phase never re-diffs stale data.
    pub async fn run(&self, clients: &[ClientConfig]) -> crate::Result<CycleOutcome> {
        let previous = self.store.load()?;

        let mut rows = Vec::with_capacity(clients.len());
        let mut problems = Vec::new();

        for (idx, client) in clients.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Checking client '{}' ({})",
                idx + 1,
                clients.len(),
                client.name,
                client.login
            );
            let (row, problem) = self.checker.check(client).await;
            rows.push(row);
            if let Some(problem) = problem {
                problems.push(problem);
            }
        }

        let current = snapshot_from_rows(&rows);
        let transitions = detect_transitions(&previous, &rows);

        for transition in &transitions {
            tracing::info!(
                "Transition for '{}': {} {} -> {} ({})",
                transition.client,
                transition.channel,
                transition.before,
                transition.after,
                transition.kind
            );
        }

        self.store.save(&current)?;

        Ok(CycleOutcome {
            rows,
            problems,
            transitions,
        })
    }
}

/// The fresh global snapshot is derived from the rows wholesale.
pub fn snapshot_from_rows(rows: &[StatusRow]) -> GlobalSnapshot {
    rows.iter()
        .map(|row| (row.client.clone(), row.statuses.clone()))
        .collect()
}

/// Diff each row against the previous snapshot, in row order then channel
/// order. Clients whose login failed this cycle are skipped: their
/// all-error rows would read as mass outages when it was just a login.
/// A channel missing from the previous snapshot counts as `Absent`.
pub fn detect_transitions(previous: &GlobalSnapshot, rows: &[StatusRow]) -> Vec<Transition> {
    let mut transitions = Vec::new();

    for row in rows {
        if !row.auth_ok {
            continue;
        }
        let old_row = previous.get(&row.client);
        for channel in Channel::ALL {
            let before = old_row
                .and_then(|snapshot| snapshot.get(&channel).copied())
                .unwrap_or(ChannelStatus::Absent);
            let after = row
                .statuses
                .get(&channel)
                .copied()
                .unwrap_or(ChannelStatus::Absent);

            if let Some(kind) = diff(before, after) {
                transitions.push(Transition {
                    client: row.client.clone(),
                    channel,
                    before,
                    after,
                    kind,
                });
            }
        }
    }

    transitions
}
