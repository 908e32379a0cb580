//! The core's entire view of the chat platform.
//!
//! Inbound events carry only (sender, chat, text); outbound replies are
//! "send text T to recipient R". Formatting, editing and delivery receipts
//! stay with the transport collaborator.

/// One inbound chat message, already reduced to what the core needs.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub user_id: i64,
    pub chat_id: i64,
    pub text: String,
    /// Quiz taking and authoring happen in private chats only.
    pub is_private: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Chat(i64),
    /// Expanded to the configured admin allow-list at delivery time.
    AdminBroadcast,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub text: String,
}

impl Outbound {
    pub fn chat(chat_id: i64, text: impl Into<String>) -> Self {
        Self { recipient: Recipient::Chat(chat_id), text: text.into() }
    }

    pub fn admins(text: impl Into<String>) -> Self {
        Self { recipient: Recipient::AdminBroadcast, text: text.into() }
    }
}
