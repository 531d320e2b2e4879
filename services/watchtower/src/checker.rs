//! Per-client integration checks against the platform API

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::channel::Channel;
use crate::config::{ClientConfig, ClientGroup};
use crate::io::HttpClient;
use crate::snapshot::ClientSnapshot;
use crate::status::{classify, ChannelStatus};

/// What went wrong for a client, keyed per failing concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProblemKey {
    /// Login against the auth endpoint failed; no channels were probed.
    Authentication,
    Channel(Channel),
}

impl fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemKey::Authentication => write!(f, "Authentication"),
            ProblemKey::Channel(channel) => write!(f, "{}", channel),
        }
    }
}

/// One report row: every channel's status for one client, plus the
/// human-readable comment block.
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub client: String,
    pub login: String,
    pub password: String,
    pub group: ClientGroup,
    pub statuses: ClientSnapshot,
    pub comment: String,
    /// False when login failed this cycle; such rows are excluded from
    /// transition detection (login noise, not integration changes).
    pub auth_ok: bool,
}

impl StatusRow {
    /// A client is healthy when none of its channels is broken.
    pub fn is_healthy(&self) -> bool {
        !self.statuses.values().any(|s| s.is_problem())
    }
}

/// Per-cycle record of a client with at least one broken concern.
#[derive(Debug, Clone)]
pub struct ProblemRecord {
    pub client: String,
    pub login: String,
    pub password: String,
    pub problems: BTreeMap<ProblemKey, String>,
}

/// Platform response body for an integration status probe.
#[derive(Debug, Deserialize)]
struct IntegrationStatusBody {
    #[serde(default)]
    status: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    access_token: Option<String>,
}

/// Outcome of probing one channel.
#[derive(Debug, Clone)]
struct Probe {
    status: ChannelStatus,
    message: Option<String>,
}

/// Checks one client credential: authenticates, probes every channel,
/// and assembles the status row plus an optional problem record.
pub struct ClientChecker {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for ClientChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientChecker")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ClientChecker {
    pub fn new(base_url: String, http: Arc<dyn HttpClient>) -> Self {
        Self { base_url, http }
    }

    /// Check one client. Never fails: every transport problem becomes an
    /// `Error` status on the affected channels.
    pub async fn check(&self, client: &ClientConfig) -> (StatusRow, Option<ProblemRecord>) {
        tracing::debug!("Checking client '{}' ({})", client.name, client.login);

        let token = match self.authenticate(&client.login, &client.password).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Login failed for '{}': {}", client.name, e);
                return auth_failed_outcome(client, &e.to_string());
            }
        };

        let mut statuses = ClientSnapshot::new();
        let mut comments = Vec::new();
        let mut problems = BTreeMap::new();

        // Channels are probed independently; one failure never blocks the rest.
        for channel in Channel::ALL {
            let probe = self.probe_channel(channel, &token).await;
            comments.push(channel_comment(
                channel,
                probe.status,
                probe.message.as_deref(),
            ));
            if probe.status.is_problem() {
                problems.insert(
                    ProblemKey::Channel(channel),
                    probe
                        .message
                        .unwrap_or_else(|| "integration error".to_string()),
                );
            }
            statuses.insert(channel, probe.status);
        }

        let row = StatusRow {
            client: client.name.clone(),
            login: client.login.clone(),
            password: client.password.clone(),
            group: client.group,
            statuses,
            comment: comments.join("\n"),
            auth_ok: true,
        };

        let problem = (!problems.is_empty()).then(|| ProblemRecord {
            client: client.name.clone(),
            login: client.login.clone(),
            password: client.password.clone(),
            problems,
        });

        (row, problem)
    }

    /// Obtain a bearer token from the auth endpoint.
    async fn authenticate(&self, username: &str, password: &str) -> crate::Result<String> {
        let url = format!("{}/api/v1/auth/login", self.base_url);
        let params = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", ""),
            ("client_id", ""),
            ("client_secret", ""),
        ];

        let response = self
            .http
            .post_form(&url, &params)
            .await
            .map_err(|e| crate::WatchtowerError::Auth(e.to_string()))?;

        if !response.ok() {
            return Err(crate::WatchtowerError::Auth(format!(
                "login returned {}: {}",
                response.status, response.body
            )));
        }

        let body: TokenBody = serde_json::from_str(&response.body)
            .map_err(|e| crate::WatchtowerError::Auth(format!("unreadable token body: {}", e)))?;

        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                crate::WatchtowerError::Auth(format!("no access_token in response: {}", response.body))
            })
    }

    async fn probe_channel(&self, channel: Channel, token: &str) -> Probe {
        let url = format!("{}{}", self.base_url, channel.endpoint());

        let response = match self.http.get(&url, Some(token)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", channel, e);
                return Probe {
                    status: classify(false, None, None),
                    message: Some(format!("request error: {}", e)),
                };
            }
        };

        if !response.ok() {
            // Non-200 body is the message, with the probe marked failed
            return Probe {
                status: classify(false, Some(false), Some(&response.body)),
                message: Some(response.body),
            };
        }

        let body: IntegrationStatusBody = match serde_json::from_str(&response.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Probe {} returned non-JSON body: {}", channel, e);
                return Probe {
                    status: classify(false, None, None),
                    message: Some(format!("malformed body: {}", e)),
                };
            }
        };

        Probe {
            status: classify(true, body.status, body.message.as_deref()),
            message: body.message,
        }
    }
}

/// Row and problem record for a client whose login failed: every channel
/// is marked `Error` and no channel probe is attempted.
fn auth_failed_outcome(
    client: &ClientConfig,
    error: &str,
) -> (StatusRow, Option<ProblemRecord>) {
    let statuses: ClientSnapshot = Channel::ALL
        .iter()
        .map(|channel| (*channel, ChannelStatus::Error))
        .collect();

    let row = StatusRow {
        client: client.name.clone(),
        login: client.login.clone(),
        password: client.password.clone(),
        group: client.group,
        statuses,
        comment: format!("login failed: {}", error),
        auth_ok: false,
    };

    let mut problems = BTreeMap::new();
    problems.insert(ProblemKey::Authentication, error.to_string());

    let problem = ProblemRecord {
        client: client.name.clone(),
        login: client.login.clone(),
        password: client.password.clone(),
        problems,
    };

    (row, Some(problem))
}

/// One comment line per channel for the report's comment column.
fn channel_comment(channel: Channel, status: ChannelStatus, message: Option<&str>) -> String {
    match status {
        ChannelStatus::Absent => format!("{}: no integration", channel),
        ChannelStatus::Down | ChannelStatus::Error => match message {
            Some(msg) if !msg.is_empty() => format!("{}: integration error ({})", channel, msg),
            _ => format!("{}: integration error", channel),
        },
        ChannelStatus::Up => match extract_identifier(channel, message) {
            Some(id) => format!("{}: {}", channel, id),
            None => format!("{}: has integration", channel),
        },
    }
}

/// Pull the connected-account identifier out of a success message.
///
/// Channel-specific heuristics against the platform's free-text success
/// messages: `@handle` for the Telegram family, the after-colon value for
/// Instagram, phone digits for Waha, and the raw message otherwise as
/// long as it does not look like an error.
fn extract_identifier(channel: Channel, message: Option<&str>) -> Option<String> {
    static HANDLE_RE: OnceLock<Regex> = OnceLock::new();

    let msg = message?.trim();
    if msg.is_empty() {
        return None;
    }

    match channel {
        Channel::Telegram | Channel::TelegramWeb => {
            let re = HANDLE_RE.get_or_init(|| Regex::new(r"@[\w_]+").expect("valid regex"));
            if let Some(m) = re.find(msg) {
                return Some(m.as_str().to_string());
            }
        }
        Channel::Instagram => {
            if let Some((_, value)) = msg.split_once(':') {
                return Some(value.trim().to_string());
            }
        }
        Channel::Waha => {
            let clean: String = msg
                .chars()
                .filter(|ch| ch.is_ascii_digit() || *ch == '+' || *ch == ' ')
                .collect();
            let clean = clean.trim().to_string();
            if !clean.is_empty() {
                return Some(clean);
            }
        }
        Channel::WhatsappBusiness => {}
    }

    if !msg.to_lowercase().contains("error") {
        return Some(msg.to_string());
    }

    None
}
