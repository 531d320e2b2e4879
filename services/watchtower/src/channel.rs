//! The fixed set of messaging channels monitored per client

use serde::{Deserialize, Serialize};
use std::fmt;

/// One messaging integration type on the AI Pradavan platform.
///
/// The set is closed: the platform exposes exactly these five integration
/// endpoints. Report order follows `Channel::ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Telegram,
    TelegramWeb,
    WhatsappBusiness,
    Waha,
    Instagram,
}

impl Channel {
    /// All channels, in the order they appear in reports.
    pub const ALL: [Channel; 5] = [
        Channel::Telegram,
        Channel::TelegramWeb,
        Channel::WhatsappBusiness,
        Channel::Waha,
        Channel::Instagram,
    ];

    /// Stable key used in the snapshot file.
    pub fn key(&self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::TelegramWeb => "telegram_web",
            Channel::WhatsappBusiness => "whatsapp_business",
            Channel::Waha => "waha",
            Channel::Instagram => "instagram",
        }
    }

    /// Human-readable name used in reports and notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Channel::Telegram => "Telegram",
            Channel::TelegramWeb => "Telegram-Web",
            Channel::WhatsappBusiness => "WhatsApp Business",
            Channel::Waha => "Waha",
            Channel::Instagram => "Instagram",
        }
    }

    /// Status endpoint path on the platform API.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Channel::Telegram => "/api/v1/integrations/telegram",
            Channel::TelegramWeb => "/api/v1/integrations/telegram_web/status",
            Channel::WhatsappBusiness => "/api/v1/integrations/whatsapp",
            Channel::Waha => "/api/v1/integrations/waha/status",
            Channel::Instagram => "/api/v1/integrations/instagram/status",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
