//! Bot API wire types, limited to the fields the bot reads.

use serde::{Deserialize, Serialize};

use crate::models::{ChatId, InboundEvent, IncomingFile, RemoteHandle};
use crate::settings::UserId;

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Attachment>,
    #[serde(default)]
    pub video: Option<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Documents and videos share the fields used here.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GetFileRequest<'a> {
    pub file_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SetWebhookRequest<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
    pub allowed_updates: Vec<&'static str>,
}

impl Update {
    /// Converts the update into a bot event. Updates without a sender,
    /// or that carry neither a file nor text, yield `None`.
    pub fn into_event(self) -> Option<InboundEvent> {
        let message = self.message?;
        let session = UserId(message.from?.id);
        let chat = ChatId(message.chat.id);

        if let Some(attachment) = message.document.or(message.video) {
            let original_name = attachment
                .file_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| fallback_name(attachment.mime_type.as_deref()));
            return Some(InboundEvent::FileReceived {
                session,
                chat,
                file: IncomingFile {
                    handle: RemoteHandle(attachment.file_id),
                    original_name,
                },
            });
        }

        let text = message.text?;
        Some(InboundEvent::from_text(session, chat, &text))
    }
}

/// Extensions for types whose first table entry is not the common one.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("video/x-matroska", "mkv"),
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
];

/// Name for an attachment that arrived without one, e.g. `file.mp4`.
fn fallback_name(mime_type: Option<&str>) -> String {
    match mime_type.and_then(extension_for) {
        Some(ext) => format!("file.{ext}"),
        None => "file".to_string(),
    }
}

/// Picks an extension that maps back to `mime_type`, falling back to the
/// first registered one.
fn extension_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(m, _)| *m == essence) {
        return Some(*ext);
    }

    let exts = mime_guess::get_mime_extensions_str(&essence)?;
    exts.iter()
        .copied()
        .find(|ext| {
            mime_guess::from_ext(ext)
                .first()
                .is_some_and(|m| m.essence_str() == essence)
        })
        .or_else(|| exts.first().copied())
}
