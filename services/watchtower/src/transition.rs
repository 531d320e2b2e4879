//! Change detection between two status snapshots

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::Channel;
use crate::status::ChannelStatus;

/// Kind of a detected status change for one (client, channel) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// An integration started working.
    Up,
    /// A working integration broke.
    Down,
    /// A working integration was removed or disconnected.
    Disabled,
    /// Any other change; the generic bucket.
    Changed,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Up => write!(f, "came up"),
            TransitionKind::Down => write!(f, "went down"),
            TransitionKind::Disabled => write!(f, "disabled"),
            TransitionKind::Changed => write!(f, "changed"),
        }
    }
}

/// A detected change for one (client, channel) pair between two cycles.
#[derive(Debug, Clone)]
pub struct Transition {
    pub client: String,
    pub channel: Channel,
    pub before: ChannelStatus,
    pub after: ChannelStatus,
    pub kind: TransitionKind,
}

impl Transition {
    /// One-line rendering used in the report's changes column.
    pub fn describe(&self) -> String {
        format!(
            "{}: {}→{} ({})",
            self.channel,
            self.before.glyph(),
            self.after.glyph(),
            self.kind
        )
    }
}

/// Classify the difference between two statuses.
///
/// Fixed lookup table, not a state machine. `Down` and `Error` render as
/// the same glyph, so a move between them is not a change. Operators care
/// asymmetrically: regressions get their own kinds (`Down`, `Disabled`),
/// recoveries collapse into `Up`, and everything else is `Changed`.
pub fn diff(before: ChannelStatus, after: ChannelStatus) -> Option<TransitionKind> {
    use ChannelStatus::*;

    if before == after || (before.is_problem() && after.is_problem()) {
        return None;
    }

    Some(match (before, after) {
        (Up, b) if b.is_problem() => TransitionKind::Down,
        (b, Up) if b.is_problem() || b == Absent => TransitionKind::Up,
        (Up, Absent) => TransitionKind::Disabled,
        _ => TransitionKind::Changed,
    })
}
