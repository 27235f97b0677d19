use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings::UserId;

/// A rename exchange is keyed by the requesting user.
pub type SessionId = UserId;

/// Conversation that replies go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque gateway reference used to fetch a file's bytes later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteHandle(pub String);

/// A file the user uploaded, before anything has been downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub handle: RemoteHandle,
    pub original_name: String,
}

/// Events delivered by the chat gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    FileReceived {
        session: SessionId,
        chat: ChatId,
        file: IncomingFile,
    },
    TextReceived {
        session: SessionId,
        chat: ChatId,
        text: String,
    },
    Command {
        session: SessionId,
        chat: ChatId,
        name: String,
        args: Vec<String>,
    },
}

impl InboundEvent {
    pub fn session(&self) -> SessionId {
        match self {
            InboundEvent::FileReceived { session, .. }
            | InboundEvent::TextReceived { session, .. }
            | InboundEvent::Command { session, .. } => *session,
        }
    }

    /// Parses a message body into a command or plain text event.
    ///
    /// `/name@botname a b` becomes `Command { name: "name", args: ["a", "b"] }`.
    pub fn from_text(session: SessionId, chat: ChatId, text: &str) -> Self {
        let Some(rest) = text.strip_prefix('/') else {
            return InboundEvent::TextReceived {
                session,
                chat,
                text: text.to_string(),
            };
        };

        let mut parts = rest.split_whitespace();
        let head = parts.next().unwrap_or("");
        let name = head.split('@').next().unwrap_or("").to_lowercase();
        let args = parts.map(str::to_string).collect();

        InboundEvent::Command {
            session,
            chat,
            name,
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let event = InboundEvent::from_text(UserId(1), ChatId(1), "  episode 1 ");
        assert_eq!(
            event,
            InboundEvent::TextReceived {
                session: UserId(1),
                chat: ChatId(1),
                text: "  episode 1 ".to_string(),
            }
        );
    }

    #[test]
    fn test_command_with_bot_mention_and_args() {
        let event = InboundEvent::from_text(UserId(1), ChatId(9), "/SetPrefix@renamer_bot S01  E ");
        assert_eq!(
            event,
            InboundEvent::Command {
                session: UserId(1),
                chat: ChatId(9),
                name: "setprefix".to_string(),
                args: vec!["S01".to_string(), "E".to_string()],
            }
        );
    }

    #[test]
    fn test_bare_command() {
        let event = InboundEvent::from_text(UserId(3), ChatId(3), "/start");
        assert!(matches!(
            event,
            InboundEvent::Command { ref name, ref args, .. } if name == "start" && args.is_empty()
        ));
        assert_eq!(event.session(), UserId(3));
    }
}
