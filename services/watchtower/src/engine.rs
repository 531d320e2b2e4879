//! Engine: the two-cadence scheduling loop

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

use crate::checker::ProblemRecord;
use crate::config::{ClientConfig, ScheduleConfig};
use crate::notifier::{ChatNotifier, MailNotifier, ReportSink};
use crate::report::ReportCycle;

/// At most this many clients are listed in one new-problem alert.
const MAX_ALERT_CLIENTS: usize = 15;

/// Mutable loop state, owned by the engine's run loop and passed into
/// each tick explicitly. Nothing else reads or writes it.
#[derive(Debug, Default)]
pub struct LoopState {
    /// `client:concern` keys from the last quick check.
    pub previous_problems: BTreeSet<String>,
    pub last_full_report: Option<DateTime<Tz>>,
}

/// Drives report cycles on two cadences: a fast changes-only check and a
/// slower full report, gated by a working-hours window. Single-threaded;
/// if a cycle overruns the tick interval the next tick simply starts late.
pub struct Engine {
    cycle: ReportCycle,
    chat: Arc<dyn ChatNotifier>,
    sheets: Arc<dyn ReportSink>,
    mail: Arc<dyn MailNotifier>,
    clients: Vec<ClientConfig>,
    schedule: ScheduleConfig,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        cycle: ReportCycle,
        chat: Arc<dyn ChatNotifier>,
        sheets: Arc<dyn ReportSink>,
        mail: Arc<dyn MailNotifier>,
        clients: Vec<ClientConfig>,
        schedule: ScheduleConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cycle,
            chat,
            sheets,
            mail,
            clients,
            schedule,
            cancel,
        }
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.schedule.timezone)
    }

    fn full_report_due(&self, state: &LoopState, now: DateTime<Tz>) -> bool {
        match state.last_full_report {
            None => true,
            Some(last) => {
                now.signed_duration_since(last).num_minutes()
                    >= self.schedule.report_interval_minutes as i64
            }
        }
    }

    /// Send to chat, logging and swallowing failures; a broken chat
    /// channel must never abort a cycle.
    async fn notify_chat(&self, text: &str) {
        if let Err(e) = self.chat.send(text).await {
            tracing::warn!("Chat notification failed: {}", e);
        }
    }

    /// Fast cadence: alert only on problems that were not present at the
    /// last quick check, plus one recovery message when the problem set
    /// drains to empty.
    pub async fn quick_check(&self, state: &mut LoopState) -> crate::Result<()> {
        tracing::info!("Quick check starting");

        let outcome = self.cycle.run(&self.clients).await?;
        tracing::info!(
            "Checked {} clients, {} with problems",
            outcome.rows.len(),
            outcome.problems.len()
        );

        let current = problem_keys(&outcome.problems);
        let new_keys: BTreeSet<String> = current
            .difference(&state.previous_problems)
            .cloned()
            .collect();
        let fixed_any = state.previous_problems.difference(&current).next().is_some();

        if !new_keys.is_empty() {
            if let Some(text) = new_problem_message(&outcome.problems, &new_keys) {
                self.notify_chat(&text).await;
            }
        }

        if fixed_any && current.is_empty() {
            self.notify_chat("✅ All integrations recovered!").await;
        }

        state.previous_problems = current;
        Ok(())
    }

    /// Slow cadence: spreadsheet block, full chat summary, and the email
    /// digest. Dispatch failures are logged and never abort the cycle.
    pub async fn full_report(
        &self,
        state: &mut LoopState,
        now: DateTime<Tz>,
    ) -> crate::Result<()> {
        tracing::info!("Full report starting");

        let outcome = self.cycle.run(&self.clients).await?;
        tracing::info!(
            "Checked {} clients, {} with problems",
            outcome.rows.len(),
            outcome.problems.len()
        );

        if let Err(e) = self
            .sheets
            .write_report(&outcome.rows, &outcome.transitions, now)
            .await
        {
            tracing::error!("Spreadsheet write failed: {}", e);
        }

        self.notify_chat(&full_summary(&outcome.rows, now)).await;

        if outcome.problems.is_empty() {
            tracing::info!("All integrations healthy");
        }
        if let Err(e) = self.mail.send_problem_report(&outcome.problems, now).await {
            tracing::error!("Email dispatch failed: {}", e);
        }

        state.last_full_report = Some(now);
        tracing::info!("Full report finished");
        Ok(())
    }

    /// Run the loop until cancelled. Every cycle error is caught here;
    /// the process never exits because of one bad cycle.
    pub async fn run(&self) {
        let mut state = LoopState::default();
        let tick = Duration::from_secs(self.schedule.quick_check_interval_minutes * 60);

        tracing::info!(
            "Monitoring {} clients: quick check every {} min, full report every {} min, working hours {}:00-{}:00 ({})",
            self.clients.len(),
            self.schedule.quick_check_interval_minutes,
            self.schedule.report_interval_minutes,
            self.schedule.work_hours_start,
            self.schedule.work_hours_end,
            self.schedule.timezone
        );

        loop {
            let now = self.now();
            if !is_working_hours(
                now.hour(),
                self.schedule.work_hours_start,
                self.schedule.work_hours_end,
            ) {
                tracing::info!("Outside working hours ({}:00), waiting", now.hour());
            } else if self.full_report_due(&state, now) {
                if let Err(e) = self.full_report(&mut state, now).await {
                    tracing::error!("Full report cycle failed: {}", e);
                }
            } else if let Err(e) = self.quick_check(&mut state).await {
                tracing::error!("Quick check cycle failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Monitoring loop cancelled");
                    break;
                }
            }
        }
    }
}

/// True when `hour` falls inside the working window. An end bound of 24
/// means "from start until midnight".
pub fn is_working_hours(hour: u32, start: u32, end: u32) -> bool {
    if end == 24 {
        hour >= start
    } else {
        (start..end).contains(&hour)
    }
}

/// Flatten problem records into comparable `client:concern` keys.
pub fn problem_keys(problems: &[ProblemRecord]) -> BTreeSet<String> {
    problems
        .iter()
        .flat_map(|p| {
            p.problems
                .keys()
                .map(move |key| format!("{}:{}", p.client, key))
        })
        .collect()
}

/// Terse alert listing the clients that own at least one new problem key.
/// Each listed client shows its full current problem set.
fn new_problem_message(
    problems: &[ProblemRecord],
    new_keys: &BTreeSet<String>,
) -> Option<String> {
    let affected: Vec<&ProblemRecord> = problems
        .iter()
        .filter(|p| {
            p.problems
                .keys()
                .any(|key| new_keys.contains(&format!("{}:{}", p.client, key)))
        })
        .collect();

    if affected.is_empty() {
        return None;
    }

    let mut lines = vec![format!("🚨 NEW problems ({}):", affected.len())];
    for problem in affected.iter().take(MAX_ALERT_CLIENTS) {
        let concerns = problem
            .problems
            .keys()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("🆕 {}: {}", problem.client, concerns));
        lines.push(format!("   📧 {} | 🔑 {}", problem.login, problem.password));
    }
    if affected.len() > MAX_ALERT_CLIENTS {
        lines.push(format!("… and {} more", affected.len() - MAX_ALERT_CLIENTS));
    }

    Some(lines.join("\n"))
}

/// Whole-fleet chat summary sent with every full report.
fn full_summary(rows: &[crate::checker::StatusRow], now: DateTime<Tz>) -> String {
    use crate::channel::Channel;
    use crate::config::ClientGroup;

    let mut lines = vec![
        format!("📊 Integration report | {}", now.format("%d.%m.%Y %H:%M")),
        String::new(),
    ];

    for (group, icon) in [(ClientGroup::Custom, "📦"), (ClientGroup::Platform, "🌐")] {
        let group_rows: Vec<_> = rows.iter().filter(|r| r.group == group).collect();
        if group_rows.is_empty() {
            continue;
        }
        let ok_count = group_rows.iter().filter(|r| r.is_healthy()).count();
        lines.push(format!(
            "{} {} ({} clients, ✅ {}):",
            icon,
            group.heading(),
            group_rows.len(),
            ok_count
        ));
        for row in group_rows {
            let channels = Channel::ALL
                .iter()
                .filter_map(|c| {
                    row.statuses
                        .get(c)
                        .map(|status| format!("{}{}", c.display_name(), status.glyph()))
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("  • {}: {}", row.client, channels));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use tokio::sync::Mutex;

    use crate::channel::Channel;
    use crate::checker::{ClientChecker, ProblemKey, StatusRow};
    use crate::config::ClientGroup;
    use crate::io::{HttpResponse, MockHttpClient};
    use crate::notifier::{ChatNotifier, MailNotifier, ReportSink};
    use crate::snapshot::{ClientSnapshot, GlobalSnapshot, SnapshotStore};
    use crate::status::ChannelStatus;
    use crate::transition::Transition;

    // Scenario E: working-hours gate
    #[test]
    fn working_hours_boundaries() {
        assert!(!is_working_hours(8, 9, 24));
        assert!(is_working_hours(9, 9, 24));
        assert!(is_working_hours(23, 9, 24));
        assert!(!is_working_hours(0, 9, 24));

        assert!(is_working_hours(9, 9, 18));
        assert!(is_working_hours(17, 9, 18));
        assert!(!is_working_hours(18, 9, 18));
    }

    #[test]
    fn problem_keys_flatten_client_and_concern() {
        let mut problems = BTreeMap::new();
        problems.insert(ProblemKey::Authentication, "401".to_string());
        problems.insert(
            ProblemKey::Channel(Channel::Waha),
            "down".to_string(),
        );
        let record = ProblemRecord {
            client: "Acme".to_string(),
            login: "a@example.com".to_string(),
            password: "pw".to_string(),
            problems,
        };

        let keys = problem_keys(&[record]);
        assert!(keys.contains("Acme:Authentication"));
        assert!(keys.contains("Acme:Waha"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn alert_lists_only_clients_with_new_keys() {
        let make = |name: &str, channel: Channel| {
            let mut problems = BTreeMap::new();
            problems.insert(ProblemKey::Channel(channel), "err".to_string());
            ProblemRecord {
                client: name.to_string(),
                login: format!("{}@example.com", name.to_lowercase()),
                password: "pw".to_string(),
                problems,
            }
        };
        let records = vec![make("Acme", Channel::Telegram), make("Zenith", Channel::Waha)];
        let new_keys: BTreeSet<String> = ["Zenith:Waha".to_string()].into_iter().collect();

        let text = new_problem_message(&records, &new_keys).unwrap();
        assert!(text.contains("Zenith"));
        assert!(!text.contains("Acme"));
        assert!(text.starts_with("🚨 NEW problems (1):"));
        assert!(text.contains("🔑 pw"));
    }

    /// Chat double that records every message.
    #[derive(Debug, Default)]
    struct RecordingChat {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChatNotifier for RecordingChat {
        async fn send(&self, text: &str) -> crate::Result<()> {
            self.messages.lock().await.push(text.to_string());
            Ok(())
        }
    }

    /// Sink double that counts report writes.
    #[derive(Debug, Default)]
    struct RecordingSink {
        writes: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl ReportSink for RecordingSink {
        async fn write_report(
            &self,
            _rows: &[StatusRow],
            _transitions: &[Transition],
            _now: DateTime<Tz>,
        ) -> crate::Result<()> {
            *self.writes.lock().await += 1;
            Ok(())
        }
    }

    /// Mail double that records the problem counts it was invoked with.
    #[derive(Debug, Default)]
    struct RecordingMail {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl MailNotifier for RecordingMail {
        async fn send_problem_report(
            &self,
            problems: &[ProblemRecord],
            _now: DateTime<Tz>,
        ) -> crate::Result<()> {
            self.calls.lock().await.push(problems.len());
            Ok(())
        }
    }

    struct TestHarness {
        engine: Engine,
        chat: Arc<RecordingChat>,
        sink: Arc<RecordingSink>,
        mail: Arc<RecordingMail>,
        _dir: tempfile::TempDir,
    }

    fn client(name: &str) -> ClientConfig {
        ClientConfig {
            name: name.to_string(),
            login: format!("{}@example.com", name.to_lowercase()),
            password: "pw".to_string(),
            group: ClientGroup::Custom,
        }
    }

    fn token_response() -> HttpResponse {
        HttpResponse {
            status: 200,
            body: r#"{"access_token": "tok"}"#.to_string(),
        }
    }

    /// Probes answer per-channel from a fixed (status, message) table.
    fn harness(
        mock: MockHttpClient,
        clients: Vec<ClientConfig>,
        seed: Option<GlobalSnapshot>,
    ) -> TestHarness {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json"));
        if let Some(seed) = seed {
            store.save(&seed).unwrap();
        }

        let chat = Arc::new(RecordingChat::default());
        let sink = Arc::new(RecordingSink::default());
        let mail = Arc::new(RecordingMail::default());

        let engine = Engine::new(
            ReportCycle::new(
                ClientChecker::new("https://api.test".to_string(), Arc::new(mock)),
                store,
            ),
            Arc::clone(&chat) as Arc<dyn ChatNotifier>,
            Arc::clone(&sink) as Arc<dyn ReportSink>,
            Arc::clone(&mail) as Arc<dyn MailNotifier>,
            clients,
            ScheduleConfig::default(),
            CancellationToken::new(),
        );

        TestHarness {
            engine,
            chat,
            sink,
            mail,
            _dir: dir,
        }
    }

    fn mock_with_auth() -> MockHttpClient {
        let mut mock = MockHttpClient::new();
        mock.expect_post_form()
            .returning(|_, _| Box::pin(async { Ok(token_response()) }));
        mock
    }

    fn status_body(status: &str, message: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: format!(r#"{{"status": {}, "message": "{}"}}"#, status, message),
        }
    }

    fn test_now() -> DateTime<Tz> {
        chrono_tz::Asia::Almaty
            .with_ymd_and_hms(2026, 8, 7, 14, 30, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn quick_check_alerts_on_new_problem_only() {
        // Scenario A: tg was UP and breaks, waha was ABSENT and comes up.
        // Only the broken channel is a problem; the recovery is not.
        let mut seed = GlobalSnapshot::new();
        let mut acme = ClientSnapshot::new();
        acme.insert(Channel::Telegram, ChannelStatus::Up);
        acme.insert(Channel::Waha, ChannelStatus::Absent);
        seed.insert("Acme".to_string(), acme);

        let mut mock = mock_with_auth();
        mock.expect_get().returning(|url, _| {
            let response = if url.ends_with("/telegram") {
                status_body("false", "session expired")
            } else if url.contains("/waha/") {
                status_body("true", "+7 701 555 1234")
            } else {
                status_body("false", "integration not configured")
            };
            Box::pin(async move { Ok(response) })
        });

        let h = harness(mock, vec![client("Acme")], Some(seed));
        let mut state = LoopState::default();
        h.engine.quick_check(&mut state).await.unwrap();

        let messages = h.chat.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("🚨 NEW problems (1):"));
        assert!(messages[0].contains("Acme: Telegram"));
        assert!(state.previous_problems.contains("Acme:Telegram"));
        assert_eq!(state.previous_problems.len(), 1);
    }

    #[tokio::test]
    async fn quick_check_stays_silent_on_known_problems() {
        let mut mock = mock_with_auth();
        mock.expect_get().returning(|url, _| {
            let response = if url.ends_with("/telegram") {
                status_body("false", "session expired")
            } else {
                status_body("true", "")
            };
            Box::pin(async move { Ok(response) })
        });

        let h = harness(mock, vec![client("Acme")], None);
        let mut state = LoopState {
            previous_problems: ["Acme:Telegram".to_string()].into_iter().collect(),
            last_full_report: None,
        };
        h.engine.quick_check(&mut state).await.unwrap();

        assert!(h.chat.messages.lock().await.is_empty());
    }

    #[tokio::test]
    async fn quick_check_sends_recovery_when_problem_set_drains() {
        // Scenario D: previous = {"Acme:Telegram"}, current = {}
        let mut mock = mock_with_auth();
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(status_body("true", "")) }));

        let h = harness(mock, vec![client("Acme")], None);
        let mut state = LoopState {
            previous_problems: ["Acme:Telegram".to_string()].into_iter().collect(),
            last_full_report: None,
        };
        h.engine.quick_check(&mut state).await.unwrap();

        let messages = h.chat.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], "✅ All integrations recovered!");
        assert!(state.previous_problems.is_empty());
    }

    #[tokio::test]
    async fn quick_check_does_not_write_report_or_email() {
        let mut mock = mock_with_auth();
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(status_body("true", "")) }));

        let h = harness(mock, vec![client("Acme")], None);
        let mut state = LoopState::default();
        h.engine.quick_check(&mut state).await.unwrap();

        assert_eq!(*h.sink.writes.lock().await, 0);
        assert!(h.mail.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn full_report_writes_sheet_chat_and_email() {
        // Scenario C: zero problems, the mailer still gets its (empty) call
        let mut mock = mock_with_auth();
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(status_body("true", "")) }));

        let h = harness(mock, vec![client("Acme")], None);
        let mut state = LoopState::default();
        h.engine.full_report(&mut state, test_now()).await.unwrap();

        assert_eq!(*h.sink.writes.lock().await, 1);
        let messages = h.chat.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("📊 Integration report"));
        assert_eq!(*h.mail.calls.lock().await, vec![0]);
        assert_eq!(state.last_full_report, Some(test_now()));
    }

    #[tokio::test]
    async fn full_report_emails_problem_digest() {
        let mut mock = mock_with_auth();
        mock.expect_get().returning(|url, _| {
            let response = if url.ends_with("/telegram") {
                status_body("false", "session expired")
            } else {
                status_body("true", "")
            };
            Box::pin(async move { Ok(response) })
        });

        let h = harness(mock, vec![client("Acme")], None);
        let mut state = LoopState::default();
        h.engine.full_report(&mut state, test_now()).await.unwrap();

        assert_eq!(*h.mail.calls.lock().await, vec![1]);
    }

    #[tokio::test]
    async fn full_report_due_on_first_run_and_after_interval() {
        let mock = mock_with_auth();
        let h = harness(mock, vec![client("Acme")], None);

        let state = LoopState::default();
        assert!(h.engine.full_report_due(&state, test_now()));

        let recent = LoopState {
            previous_problems: BTreeSet::new(),
            last_full_report: Some(test_now() - chrono::Duration::minutes(10)),
        };
        assert!(!h.engine.full_report_due(&recent, test_now()));

        let stale = LoopState {
            previous_problems: BTreeSet::new(),
            last_full_report: Some(test_now() - chrono::Duration::minutes(30)),
        };
        assert!(h.engine.full_report_due(&stale, test_now()));
    }

    #[test]
    fn full_summary_groups_and_glyphs() {
        let statuses: ClientSnapshot = Channel::ALL
            .iter()
            .map(|c| (*c, ChannelStatus::Up))
            .collect();
        let rows = vec![StatusRow {
            client: "Acme".to_string(),
            login: "a@example.com".to_string(),
            password: "pw".to_string(),
            group: ClientGroup::Custom,
            statuses,
            comment: String::new(),
            auth_ok: true,
        }];

        let text = full_summary(&rows, test_now());
        assert!(text.starts_with("📊 Integration report | 07.08.2026 14:30"));
        assert!(text.contains("📦 CUSTOM (1 clients, ✅ 1):"));
        assert!(text.contains("• Acme: Telegram✅"));
    }
}
