//! Maps inbound chat events onto the rename workflow and owner commands.

mod commands;
mod router;

pub use commands::Command;
pub use router::SessionRouter;

use std::sync::Arc;

use thiserror::Error;

use crate::access::AccessControl;
use crate::gateway::{Gateway, GatewayError};
use crate::models::{ChatId, InboundEvent, IncomingFile, SessionId};
use crate::pending::PendingRenameRegistry;
use crate::pipeline::{Outcome, PipelineError, RenamePipeline};
use crate::settings::{SettingsError, SettingsStore};

pub const ASK_FOR_NAME: &str = "Send the new name (without extension):";
pub const NOT_APPROVED: &str = "You're not approved to use this bot.";
pub const DELIVERY_FAILED: &str = "Sorry, the renamed file could not be sent.";

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl BotError {
    /// Settings failures leave the bot in an unknown configuration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::Settings(_) | BotError::Pipeline(PipelineError::Settings(_))
        )
    }
}

pub struct Bot {
    access: AccessControl,
    gateway: Arc<dyn Gateway>,
    pending: Arc<PendingRenameRegistry>,
    pipeline: Arc<RenamePipeline>,
    settings: Arc<dyn SettingsStore>,
}

impl Bot {
    pub fn new(
        access: AccessControl,
        gateway: Arc<dyn Gateway>,
        pending: Arc<PendingRenameRegistry>,
        pipeline: Arc<RenamePipeline>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            access,
            gateway,
            pending,
            pipeline,
            settings,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<(), BotError> {
        match event {
            InboundEvent::FileReceived {
                session,
                chat,
                file,
            } => self.on_file(session, chat, file).await,
            InboundEvent::TextReceived {
                session,
                chat,
                text,
            } => self.on_text(session, chat, &text).await,
            InboundEvent::Command {
                session,
                chat,
                name,
                args,
            } => match Command::parse(&name, args) {
                Some(command) => self.on_command(session, chat, command).await,
                None => {
                    tracing::debug!(%session, command = %name, "Ignoring unknown command");
                    Ok(())
                }
            },
        }
    }

    async fn on_file(
        &self,
        session: SessionId,
        chat: ChatId,
        file: IncomingFile,
    ) -> Result<(), BotError> {
        if !self.access.is_approved(session)? {
            tracing::info!(%session, "Rejected file from unapproved user");
            self.gateway.send_text(chat, NOT_APPROVED).await?;
            return Ok(());
        }

        tracing::debug!(%session, file_name = %file.original_name, "Staged file");
        self.pending.stage(session, file);
        self.gateway.send_text(chat, ASK_FOR_NAME).await?;
        Ok(())
    }

    async fn on_text(&self, session: SessionId, chat: ChatId, text: &str) -> Result<(), BotError> {
        match self.pipeline.finalize(session, chat, text).await {
            Ok(Outcome::Delivered(_)) | Ok(Outcome::EmptyName) => Ok(()),
            Ok(outcome) => {
                tracing::debug!(%session, ?outcome, "Ignored text message");
                Ok(())
            }
            Err(e @ PipelineError::Delivery(_)) | Err(e @ PipelineError::Download(_)) => {
                if let Err(notify) = self.gateway.send_text(chat, DELIVERY_FAILED).await {
                    tracing::warn!(%session, error = %notify, "Failed to report delivery failure");
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
