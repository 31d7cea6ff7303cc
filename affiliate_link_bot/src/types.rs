use std::fmt::Display;

use teloxide::types::{ChatId, Recipient};

/// A parsed `/setchannel` argument: either a public `@username` or a
/// numeric channel id. Validation is superficial on purpose; whether the
/// bot can actually post there is only found out by trying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    /// A public channel username, stored with the leading `@`.
    Username(String),
    /// A raw channel chat id, the `-100…` kind.
    Id(ChatId),
}

impl ChannelTarget {
    /// Parse user input into a target, or [`None`] if it has the wrong
    /// shape. Channel ids as Telegram hands them out always start with
    /// `-100`, so anything else numeric is likely a user or group id
    /// pasted by mistake.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();

        if let Some(name) = input.strip_prefix('@') {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            return valid.then(|| ChannelTarget::Username(input.to_string()));
        }

        if input.starts_with("-100") {
            if let Ok(id) = input.parse::<i64>() {
                return Some(ChannelTarget::Id(ChatId(id)));
            }
        }

        None
    }

    /// The target as something teloxide can send a message to.
    #[must_use]
    pub fn recipient(&self) -> Recipient {
        match self {
            ChannelTarget::Username(name) => Recipient::ChannelUsername(name.clone()),
            ChannelTarget::Id(id) => Recipient::Id(*id),
        }
    }
}

impl Display for ChannelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelTarget::Username(name) => f.write_str(name),
            ChannelTarget::Id(id) => Display::fmt(&id.0, f),
        }
    }
}
