//! The second half of a rename: turn a pending file and a new base name
//! into a delivered document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;

use crate::access::AccessControl;
use crate::gateway::{Gateway, GatewayError};
use crate::models::{ChatId, IncomingFile, SessionId};
use crate::pending::PendingRenameRegistry;
use crate::settings::{Settings, SettingsError, SettingsStore};
use crate::transcoder::{CodecPolicy, Container, TranscodeRequest, Transcoder};

pub const CONVERSION_FAILED: &str = "Conversion failed. Sending original file.";
pub const EMPTY_NAME: &str = "The new name must not be empty.";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Delivery failed: {0}")]
    Delivery(GatewayError),
    #[error("Download failed: {0}")]
    Download(GatewayError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NotApproved,
    NothingPending,
    /// The name was blank; the pending file stays staged.
    EmptyName,
    Delivered(Delivery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: String,
    pub converted: bool,
    pub conversion_failed: bool,
}

/// `prefix + base + suffix` plus the original extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    stem: String,
    extension: String,
}

impl RenamePlan {
    pub fn new(settings: &Settings, base_name: &str, original_name: &str) -> Self {
        Self {
            stem: format!("{}{}{}", settings.prefix, base_name, settings.suffix),
            extension: extension_of(original_name),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn final_name(&self) -> String {
        format!("{}{}", self.stem, self.extension)
    }

    /// Final name with the extension replaced by the container's.
    pub fn converted_name(&self, container: Container) -> String {
        format!("{}{}", self.stem, container.extension())
    }

    pub fn is_mkv(&self) -> bool {
        self.extension.eq_ignore_ascii_case(".mkv")
    }
}

/// Extension including the leading dot, or empty. `archive.tar.gz` yields
/// `.gz`; dotfiles such as `.env` have none.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

pub struct RenamePipeline {
    access: AccessControl,
    gateway: Arc<dyn Gateway>,
    pending: Arc<PendingRenameRegistry>,
    settings: Arc<dyn SettingsStore>,
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
}

impl RenamePipeline {
    pub fn new(
        access: AccessControl,
        gateway: Arc<dyn Gateway>,
        pending: Arc<PendingRenameRegistry>,
        settings: Arc<dyn SettingsStore>,
        transcoder: Arc<dyn Transcoder>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            access,
            gateway,
            pending,
            settings,
            transcoder,
            work_dir: work_dir.into(),
        }
    }

    /// Consumes the session's pending file and delivers it under the new name.
    ///
    /// Downloaded and converted bytes live in a scratch directory that is
    /// removed on every return path, including delivery failure.
    pub async fn finalize(
        &self,
        session: SessionId,
        chat: ChatId,
        base_name: &str,
    ) -> Result<Outcome, PipelineError> {
        if !self.access.is_approved(session)? {
            return Ok(Outcome::NotApproved);
        }

        let base_name = base_name.trim();
        if base_name.is_empty() {
            if !self.pending.is_pending(session) {
                return Ok(Outcome::NothingPending);
            }
            self.gateway
                .send_text(chat, EMPTY_NAME)
                .await
                .map_err(PipelineError::Delivery)?;
            return Ok(Outcome::EmptyName);
        }

        let Some(file) = self.pending.consume(session) else {
            return Ok(Outcome::NothingPending);
        };

        let settings = self.settings.load()?;
        let plan = RenamePlan::new(&settings, base_name, &file.original_name);

        let span = tracing::info_span!(
            "rename",
            rename_id = %uuid::Uuid::new_v4(),
            %session,
            original = %file.original_name,
        );
        self.deliver(chat, &file, &plan, settings.convert_mkv)
            .instrument(span)
            .await
            .map(Outcome::Delivered)
    }

    async fn deliver(
        &self,
        chat: ChatId,
        file: &IncomingFile,
        plan: &RenamePlan,
        convert_mkv: bool,
    ) -> Result<Delivery, PipelineError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("rename-")
            .tempdir_in(&self.work_dir)?;

        // Local names never include user input.
        let source = scratch.path().join(format!("source{}", plan.extension()));
        let bytes = self
            .gateway
            .download(&file.handle, &source)
            .await
            .map_err(PipelineError::Download)?;
        tracing::debug!(bytes, "Downloaded file");

        let delivery = if convert_mkv && plan.is_mkv() {
            self.convert_and_send(chat, &source, scratch.path(), plan)
                .await?
        } else {
            let file_name = plan.final_name();
            self.send(chat, &source, &file_name).await?;
            Delivery {
                file_name,
                converted: false,
                conversion_failed: false,
            }
        };

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "Failed to remove scratch directory");
        }

        tracing::info!(file_name = %delivery.file_name, converted = delivery.converted, "Delivered file");
        Ok(delivery)
    }

    async fn convert_and_send(
        &self,
        chat: ChatId,
        source: &Path,
        scratch: &Path,
        plan: &RenamePlan,
    ) -> Result<Delivery, PipelineError> {
        let request = TranscodeRequest {
            input: source.to_path_buf(),
            output: scratch.join(format!("converted{}", Container::Mp4.extension())),
            container: Container::Mp4,
            codec: CodecPolicy::StreamCopy,
        };

        match self.transcoder.transcode(&request).await {
            Ok(()) => {
                let file_name = plan.converted_name(Container::Mp4);
                self.send(chat, &request.output, &file_name).await?;
                Ok(Delivery {
                    file_name,
                    converted: true,
                    conversion_failed: false,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Conversion failed, sending original");
                if let Err(e) = self.gateway.send_text(chat, CONVERSION_FAILED).await {
                    tracing::warn!(error = %e, "Failed to send conversion failure notice");
                }
                let file_name = plan.final_name();
                self.send(chat, source, &file_name).await?;
                Ok(Delivery {
                    file_name,
                    converted: false,
                    conversion_failed: true,
                })
            }
        }
    }

    async fn send(&self, chat: ChatId, path: &Path, file_name: &str) -> Result<(), PipelineError> {
        self.gateway
            .send_document(chat, path, file_name)
            .await
            .map_err(PipelineError::Delivery)
    }
}
