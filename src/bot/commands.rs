use super::{Bot, BotError};
use crate::models::{ChatId, SessionId};
use crate::settings::UserId;

pub const WELCOME: &str = "Welcome! Send me any file to rename it.";
pub const INVALID_USER_ID: &str = "Invalid user ID.";

/// Owner-only configuration commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    SetPrefix(String),
    SetSuffix(String),
    ToggleConversion,
    /// Raw first argument; parsed when the command runs so a bad value
    /// can be reported.
    Approve(Option<String>),
}

impl Command {
    /// Returns `None` for names the bot does not handle.
    pub fn parse(name: &str, args: Vec<String>) -> Option<Self> {
        let command = match name {
            "start" => Command::Start,
            "setprefix" => Command::SetPrefix(args.join(" ")),
            "setsuffix" => Command::SetSuffix(args.join(" ")),
            "toggleconversion" => Command::ToggleConversion,
            "approve" => Command::Approve(args.into_iter().next()),
            _ => return None,
        };
        Some(command)
    }
}

impl Bot {
    pub(super) async fn on_command(
        &self,
        session: SessionId,
        chat: ChatId,
        command: Command,
    ) -> Result<(), BotError> {
        if !self.access.is_owner(session) {
            tracing::debug!(%session, ?command, "Ignoring command from non-owner");
            return Ok(());
        }

        let reply = match command {
            Command::Start => WELCOME.to_string(),
            Command::SetPrefix(prefix) => {
                self.settings.set_prefix(&prefix)?;
                format!("Prefix set to: {prefix}")
            }
            Command::SetSuffix(suffix) => {
                self.settings.set_suffix(&suffix)?;
                format!("Suffix set to: {suffix}")
            }
            Command::ToggleConversion => {
                let enabled = self.settings.toggle_convert_mkv()?;
                let status = if enabled { "enabled" } else { "disabled" };
                format!("MKV conversion is now {status}.")
            }
            Command::Approve(None) => return Ok(()),
            Command::Approve(Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(id) => {
                    let user = UserId(id);
                    if self.settings.approve(user)? {
                        tracing::info!(%user, "Approved user");
                        format!("User {user} approved.")
                    } else {
                        format!("User {user} is already approved.")
                    }
                }
                Err(_) => INVALID_USER_ID.to_string(),
            },
        };

        self.gateway.send_text(chat, &reply).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InboundEvent;
    use crate::settings::Settings;
    use crate::testutil::{self, OWNER};

    fn command(session: UserId, text: &str) -> InboundEvent {
        InboundEvent::from_text(session, ChatId(session.0), text)
    }

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("start", vec![]), Some(Command::Start));
        assert_eq!(
            Command::parse("setprefix", vec!["[HD]".into(), "S01".into()]),
            Some(Command::SetPrefix("[HD] S01".to_string()))
        );
        assert_eq!(
            Command::parse("setsuffix", vec![]),
            Some(Command::SetSuffix(String::new()))
        );
        assert_eq!(
            Command::parse("approve", vec!["5".into(), "6".into()]),
            Some(Command::Approve(Some("5".to_string())))
        );
        assert_eq!(Command::parse("help", vec![]), None);
    }

    #[tokio::test]
    async fn test_owner_configures_prefix_suffix_and_conversion() {
        let h = testutil::harness(Settings::defaults(OWNER), true);

        h.bot.handle(command(OWNER, "/setprefix S01_")).await.unwrap();
        h.bot.handle(command(OWNER, "/setsuffix _final")).await.unwrap();
        h.bot.handle(command(OWNER, "/toggleconversion")).await.unwrap();

        let settings = h.settings.load().unwrap();
        assert_eq!(settings.prefix, "S01_");
        assert_eq!(settings.suffix, "_final");
        assert!(settings.convert_mkv);
        assert_eq!(
            h.gateway.texts(),
            vec![
                "Prefix set to: S01_",
                "Suffix set to: _final",
                "MKV conversion is now enabled.",
            ]
        );

        h.bot.handle(command(OWNER, "/toggleconversion")).await.unwrap();
        assert!(!h.settings.load().unwrap().convert_mkv);
    }

    #[tokio::test]
    async fn test_owner_approves_user() {
        let h = testutil::harness(Settings::defaults(OWNER), true);

        h.bot.handle(command(OWNER, "/approve 555")).await.unwrap();
        h.bot.handle(command(OWNER, "/approve 555")).await.unwrap();

        assert!(h.settings.load().unwrap().approved_users.contains(&UserId(555)));
        assert_eq!(
            h.gateway.texts(),
            vec!["User 555 approved.", "User 555 is already approved."]
        );
    }

    #[tokio::test]
    async fn test_non_owner_commands_are_ignored() {
        let h = testutil::harness(Settings::defaults(OWNER), true);
        h.bot.handle(command(OWNER, "/approve 555")).await.unwrap();
        let before = h.settings.load().unwrap();

        for text in [
            "/start",
            "/approve 777",
            "/setprefix X",
            "/setsuffix Y",
            "/toggleconversion",
        ] {
            h.bot.handle(command(UserId(555), text)).await.unwrap();
        }

        assert_eq!(h.settings.load().unwrap(), before);
        assert_eq!(h.gateway.texts(), vec!["User 555 approved."]);
    }

    #[tokio::test]
    async fn test_invalid_approve_argument() {
        let h = testutil::harness(Settings::defaults(OWNER), true);

        h.bot.handle(command(OWNER, "/approve bob")).await.unwrap();
        h.bot.handle(command(OWNER, "/approve")).await.unwrap();

        assert_eq!(h.settings.load().unwrap(), Settings::defaults(OWNER));
        assert_eq!(h.gateway.texts(), vec![INVALID_USER_ID]);
    }

    #[tokio::test]
    async fn test_start_welcomes_owner_only() {
        let h = testutil::harness(Settings::defaults(OWNER), true);

        h.bot.handle(command(OWNER, "/start")).await.unwrap();
        h.bot.handle(command(UserId(2), "/start")).await.unwrap();

        assert_eq!(h.gateway.texts(), vec![WELCOME]);
    }
}
