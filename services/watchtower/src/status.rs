//! Channel status classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a single channel integration.
///
/// `Down` means the integration is configured but broken (the platform
/// answered, said `status: false`, and the message is not one of the
/// "not configured" phrases). `Error` means the probe itself failed
/// (transport, auth, non-200, unparseable body). The two render as the
/// same glyph externally and both count as problems; the distinction
/// only exists so logs say which one happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Up,
    Down,
    Absent,
    Error,
}

impl ChannelStatus {
    /// The glyph shown in spreadsheets and chat messages.
    pub fn glyph(&self) -> &'static str {
        match self {
            ChannelStatus::Up => "✅",
            ChannelStatus::Down | ChannelStatus::Error => "❌",
            ChannelStatus::Absent => "—",
        }
    }

    /// Broken statuses count as problems; absent ones do not.
    pub fn is_problem(&self) -> bool {
        matches!(self, ChannelStatus::Down | ChannelStatus::Error)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Up => write!(f, "Up"),
            ChannelStatus::Down => write!(f, "Down"),
            ChannelStatus::Absent => write!(f, "Absent"),
            ChannelStatus::Error => write!(f, "Error"),
        }
    }
}

/// Phrases the platform uses when an integration was never configured.
/// Matched as case-folded substrings, in this order. This couples us to
/// the upstream API's English error wording; a wording change upstream
/// silently turns Absent into Down.
const NOT_CONFIGURED_PHRASES: [&str; 5] = [
    "not found",
    "no telegram web integration",
    "integration not configured",
    "integration not found",
    "not configured",
];

/// Classify a raw probe response into a [`ChannelStatus`].
///
/// Strict ordered rule list; the first matching rule wins:
/// 1. probe failed (`http_ok == false`) → `Error`, whatever the body said
/// 2. `status == true` → `Up`
/// 3. message contains a "not configured" phrase → `Absent`
/// 4. `status == false` with an empty message → `Absent`
/// 5. everything else → `Down`
///
/// Rule 5 deliberately catches an HTTP 200 with `status: false` and a
/// non-empty message outside the phrase list: that is "configured but
/// broken", not "never configured".
pub fn classify(http_ok: bool, status: Option<bool>, message: Option<&str>) -> ChannelStatus {
    if !http_ok {
        return ChannelStatus::Error;
    }

    if status == Some(true) {
        return ChannelStatus::Up;
    }

    let msg = message.unwrap_or("").to_lowercase();

    if NOT_CONFIGURED_PHRASES.iter().any(|kw| msg.contains(kw)) {
        return ChannelStatus::Absent;
    }

    if status == Some(false) && msg.is_empty() {
        return ChannelStatus::Absent;
    }

    ChannelStatus::Down
}
