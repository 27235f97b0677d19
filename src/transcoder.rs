use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Transcoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("Transcoder produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
}

impl Container {
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => ".mp4",
        }
    }

    fn ffmpeg_format(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPolicy {
    /// Repackage streams without re-encoding.
    StreamCopy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub container: Container,
    pub codec: CodecPolicy,
}

/// Container conversion capability. Callers only learn success or failure.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError>;
}

/// Runs the `ffmpeg` binary as a child process.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn args(request: &TranscodeRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path_arg(&request.input),
        ];

        match request.codec {
            CodecPolicy::StreamCopy => {
                args.extend_from_slice(&[
                    "-c:v".to_string(),
                    "copy".to_string(),
                    "-c:a".to_string(),
                    "copy".to_string(),
                ]);
            }
        }

        args.extend_from_slice(&["-f".to_string(), request.container.ffmpeg_format().to_string()]);
        args.push(path_arg(&request.output));
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError> {
        let output = Command::new(&self.ffmpeg_path)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // ffmpeg prints its banner first; the tail carries the error.
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
            });
        }

        if !tokio::fs::try_exists(&request.output).await.unwrap_or(false) {
            return Err(TranscodeError::MissingOutput(request.output.clone()));
        }

        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
