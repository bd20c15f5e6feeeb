//! Bot API wire types.

use serde::Deserialize;

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload when `ok` is true.
    pub result: Option<T>,
    /// Human-readable error when `ok` is false.
    pub description: Option<String>,
    /// Error code when `ok` is false; mirrors the HTTP status.
    pub error_code: Option<i64>,
    /// Extra error details.
    pub parameters: Option<ResponseParameters>,
}

/// Error details attached to some failures.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating the request.
    pub retry_after: Option<u64>,
    /// Chat was migrated to a supergroup with this id.
    pub migrate_to_chat_id: Option<i64>,
}

/// The subset of `Message` this crate reads.
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    /// Message identifier inside the chat.
    pub message_id: i64,
}

/// A chat as reported in updates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    /// Chat identifier, negative for groups and channels.
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Title for groups and channels.
    pub title: Option<String>,
    /// Public username, if any.
    pub username: Option<String>,
}

impl Chat {
    /// Whether documents can be deployed here by chat id.
    #[must_use]
    pub fn is_group_or_channel(&self) -> bool {
        matches!(self.kind.as_str(), "group" | "supergroup" | "channel")
    }
}

#[derive(Debug, Deserialize)]
struct ChatHolder {
    chat: Chat,
}

/// An incoming update; only the chat-bearing parts are decoded.
#[derive(Debug, Deserialize)]
pub struct Update {
    /// Update identifier.
    pub update_id: i64,
    message: Option<ChatHolder>,
    channel_post: Option<ChatHolder>,
    my_chat_member: Option<ChatHolder>,
}

impl Update {
    /// The chat this update happened in.
    #[must_use]
    pub fn chat(&self) -> Option<&Chat> {
        self.message
            .as_ref()
            .or(self.channel_post.as_ref())
            .or(self.my_chat_member.as_ref())
            .map(|holder| &holder.chat)
    }
}
