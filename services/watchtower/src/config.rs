//! Configuration types for the watchtower service

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the AI Pradavan backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Clients declared inline in the config file.
    #[serde(default)]
    pub clients: Vec<ClientConfig>,

    /// Optional roster file with one `name, login, password[, group]` line
    /// per client. Merged after the inline list, in file order.
    #[serde(default)]
    pub clients_file: Option<PathBuf>,

    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            clients: Vec::new(),
            clients_file: None,
            snapshot_path: default_snapshot_path(),
            schedule: ScheduleConfig::default(),
            telegram: TelegramConfig::default(),
            email: EmailConfig::default(),
            sheets: SheetsConfig::default(),
        }
    }
}

/// One monitored tenant account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub group: ClientGroup,
}

/// Report grouping: clients on a custom deployment vs the shared platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientGroup {
    #[default]
    Custom,
    Platform,
}

impl ClientGroup {
    pub fn heading(&self) -> &'static str {
        match self {
            ClientGroup::Custom => "CUSTOM",
            ClientGroup::Platform => "PLATFORM",
        }
    }
}

/// Cadence and working-hours settings for the scheduling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Tick interval; quick checks run at this cadence.
    #[serde(default = "default_quick_check_interval")]
    pub quick_check_interval_minutes: u64,

    /// Minimum time between full reports.
    #[serde(default = "default_report_interval")]
    pub report_interval_minutes: u64,

    /// First active hour of the day, in `timezone`.
    #[serde(default = "default_work_hours_start")]
    pub work_hours_start: u32,

    /// End bound; 24 means "until midnight".
    #[serde(default = "default_work_hours_end")]
    pub work_hours_end: u32,

    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            quick_check_interval_minutes: default_quick_check_interval(),
            report_interval_minutes: default_report_interval(),
            work_hours_start: default_work_hours_start(),
            work_hours_end: default_work_hours_end(),
            timezone: default_timezone(),
        }
    }
}

/// Telegram bot credentials; empty fields disable the chat channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

/// SMTP settings for the email collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_server")]
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise.
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            server: default_smtp_server(),
            port: default_smtp_port(),
            use_ssl: true,
            login: String::new(),
            password: String::new(),
            recipients: Vec::new(),
        }
    }
}

/// Google Sheets report target; an empty spreadsheet id disables it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub access_token: String,
}

fn default_base_url() -> String {
    "https://backbackpradavan.city-innovation.kz".to_string()
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("reports/last_snapshot.json")
}

fn default_quick_check_interval() -> u64 {
    5
}

fn default_report_interval() -> u64 {
    30
}

fn default_work_hours_start() -> u32 {
    9
}

fn default_work_hours_end() -> u32 {
    24
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Almaty
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Fill unset secrets from the environment, once at startup.
    pub fn resolve_secrets(&mut self) {
        fill_from_env(&mut self.telegram.bot_token, "TG_BOT_TOKEN");
        fill_from_env(&mut self.telegram.chat_id, "TG_CHAT_ID");
        fill_from_env(&mut self.email.login, "SMTP_LOGIN");
        fill_from_env(&mut self.email.password, "SMTP_PASSWORD");
        fill_from_env(&mut self.sheets.access_token, "SHEETS_ACCESS_TOKEN");

        if self.email.recipients.is_empty() {
            if let Ok(raw) = std::env::var("EMAIL_RECIPIENTS") {
                self.email.recipients = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
    }

    /// Inline clients plus the roster file, in declaration order.
    pub fn load_clients(&self) -> crate::Result<Vec<ClientConfig>> {
        let mut clients = self.clients.clone();
        if let Some(path) = &self.clients_file {
            clients.extend(load_roster(path)?);
        }
        Ok(clients)
    }
}

fn fill_from_env(field: &mut String, var: &str) {
    if field.is_empty() {
        if let Ok(value) = std::env::var(var) {
            *field = value;
        }
    }
}

/// Parse a roster file: `name, login, password[, group]` per line, with
/// `#` comments and blank lines skipped. Malformed lines are logged and
/// skipped rather than failing the whole roster.
fn load_roster(path: &Path) -> crate::Result<Vec<ClientConfig>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::WatchtowerError::Config(format!("Failed to read roster file {:?}: {}", path, e))
    })?;

    let mut clients = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_roster_line(line) {
            Some(client) => clients.push(client),
            None => tracing::warn!("Skipping malformed roster line: {}", line),
        }
    }
    Ok(clients)
}

fn parse_roster_line(line: &str) -> Option<ClientConfig> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
        return None;
    }
    let group = match parts.get(3) {
        Some(&"platform") => ClientGroup::Platform,
        _ => ClientGroup::Custom,
    };
    Some(ClientConfig {
        name: parts[0].to_string(),
        login: parts[1].to_string(),
        password: parts[2].to_string(),
        group,
    })
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::WatchtowerError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
