//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::access::AccessControl;
use crate::bot::Bot;
use crate::gateway::{Gateway, GatewayError};
use crate::models::{ChatId, IncomingFile, RemoteHandle};
use crate::pending::PendingRenameRegistry;
use crate::pipeline::RenamePipeline;
use crate::settings::{MemoryStore, Settings, SettingsError, SettingsStore, UserId};
use crate::transcoder::{TranscodeError, TranscodeRequest, Transcoder};

pub const OWNER: UserId = UserId(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat: ChatId,
        text: String,
    },
    Document {
        chat: ChatId,
        file_name: String,
        data: Vec<u8>,
    },
}

/// Gateway that serves canned downloads and records everything sent.
#[derive(Default)]
pub struct RecordingGateway {
    downloads: AtomicUsize,
    fail_documents: AtomicBool,
    files: Mutex<HashMap<RemoteHandle, Vec<u8>>>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingGateway {
    pub fn add_file(&self, handle: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(RemoteHandle(handle.to_string()), data.to_vec());
    }

    pub fn fail_documents(&self, fail: bool) {
        self.fail_documents.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                Sent::Document { .. } => None,
            })
            .collect()
    }

    pub fn document_names(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Document { file_name, .. } => Some(file_name),
                Sent::Text { .. } => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn download(&self, handle: &RemoteHandle, dest: &Path) -> Result<u64, GatewayError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let data = self.files.lock().unwrap().get(handle).cloned();
        let data = data.ok_or_else(|| GatewayError::Api {
            method: "getFile",
            code: Some(400),
            description: "Bad Request: invalid file_id".to_string(),
        })?;
        tokio::fs::write(dest, &data).await?;
        Ok(data.len() as u64)
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        file_name: &str,
    ) -> Result<(), GatewayError> {
        let data = tokio::fs::read(path).await?;
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                method: "sendDocument",
                code: Some(502),
                description: "Bad Gateway".to_string(),
            });
        }
        self.sent.lock().unwrap().push(Sent::Document {
            chat,
            file_name: file_name.to_string(),
            data,
        });
        Ok(())
    }
}

/// Transcoder that prefixes the input with `mp4:` or fails on demand.
pub struct FakeTranscoder {
    requests: Mutex<Vec<TranscodeRequest>>,
    succeed: bool,
}

impl FakeTranscoder {
    pub fn new(succeed: bool) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            succeed,
        }
    }

    pub fn requests(&self) -> Vec<TranscodeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.succeed {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        let input = tokio::fs::read(&request.input)
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: "fake".to_string(),
                source,
            })?;
        let mut output = b"mp4:".to_vec();
        output.extend_from_slice(&input);
        tokio::fs::write(&request.output, output)
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: "fake".to_string(),
                source,
            })?;
        Ok(())
    }
}

/// Settings store whose document can never be read.
pub struct CorruptStore;

impl SettingsStore for CorruptStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let source = serde_json::from_str::<Settings>("{").unwrap_err();
        Err(SettingsError::Corrupt {
            path: "settings.json".to_string(),
            source,
        })
    }

    fn save(&self, _settings: &Settings) -> Result<(), SettingsError> {
        Ok(())
    }
}

pub struct Harness {
    _dir: tempfile::TempDir,
    pub bot: Arc<Bot>,
    pub gateway: Arc<RecordingGateway>,
    pub pending: Arc<PendingRenameRegistry>,
    pub pipeline: Arc<RenamePipeline>,
    pub settings: Arc<dyn SettingsStore>,
    pub transcoder: Arc<FakeTranscoder>,
    pub work_dir: PathBuf,
}

impl Harness {
    pub fn work_dir_is_empty(&self) -> bool {
        std::fs::read_dir(&self.work_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

pub fn harness(settings: Settings, transcode_ok: bool) -> Harness {
    harness_with_store(
        Arc::new(MemoryStore::with_settings(OWNER, settings)),
        transcode_ok,
    )
}

pub fn harness_with_store(settings: Arc<dyn SettingsStore>, transcode_ok: bool) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let work_dir = dir.path().join("work");

    let gateway = Arc::new(RecordingGateway::default());
    let transcoder = Arc::new(FakeTranscoder::new(transcode_ok));
    let pending = Arc::new(PendingRenameRegistry::new(0));
    let access = AccessControl::new(OWNER, Arc::clone(&settings));

    let pipeline = Arc::new(RenamePipeline::new(
        access.clone(),
        gateway.clone(),
        Arc::clone(&pending),
        Arc::clone(&settings),
        transcoder.clone(),
        &work_dir,
    ));

    let bot = Arc::new(Bot::new(
        access,
        gateway.clone(),
        Arc::clone(&pending),
        Arc::clone(&pipeline),
        Arc::clone(&settings),
    ));

    Harness {
        _dir: dir,
        bot,
        gateway,
        pending,
        pipeline,
        settings,
        transcoder,
        work_dir,
    }
}

pub fn file(handle: &str, name: &str) -> IncomingFile {
    IncomingFile {
        handle: RemoteHandle(handle.to_string()),
        original_name: name.to_string(),
    }
}
