//! Common types for the Sproochmaschinn API.

use std::{collections::BTreeMap, fmt, path::Path};

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ================== Session ==================

/// Lifecycle state of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has been requested yet, or it was torn down.
    #[default]
    Uninitialized,
    /// A creation request is in flight.
    Connecting,
    /// A session id is held.
    Connected,
    /// The last creation attempt failed.
    Error,
}

impl SessionStatus {
    /// Returns the status as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }

    /// Returns a short label suitable for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "Not connected",
            SessionStatus::Connecting => "Connecting...",
            SessionStatus::Connected => "Connected",
            SessionStatus::Error => "Disconnected",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ================== Jobs ==================

/// Kind of asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Text-to-speech synthesis.
    Tts,
    /// Speech-to-text transcription.
    Stt,
}

impl JobKind {
    /// Returns the kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Tts => "tts",
            JobKind::Stt => "stt",
        }
    }

    /// Message used when the server fails a job without saying why.
    pub fn fallback_failure_message(&self) -> &'static str {
        match self {
            JobKind::Tts => "TTS processing failed",
            JobKind::Stt => "Transcription failed",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status as reported by the result endpoint.
///
/// The wire value `error` maps to [`JobStatus::Failed`]; anything else the
/// client does not know (`processing`, `null`, a non-string) is treated as
/// still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "completed" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(Value::as_str)
            .map(JobStatus::from)
            .unwrap_or_default())
    }
}

impl JobStatus {
    /// Returns true if polling should stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Raw response of `GET /api/result/{request_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ================== TTS ==================

/// Default voice model.
pub const DEFAULT_VOICE_MODEL: &str = "claude";

/// Content type of synthesized audio.
pub const SPEECH_CONTENT_TYPE: &str = "audio/wav";

/// Voice model identifier for synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceModel(String);

impl VoiceModel {
    /// Creates a voice model identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the identifier is usable on the wire.
    pub fn validate(&self) -> crate::Result<()> {
        if self.0.is_empty() {
            return Err(crate::Error::Validation(
                "voice model must not be empty".to_string(),
            ));
        }
        if self.0.chars().any(char::is_whitespace) {
            return Err(crate::Error::Validation(format!(
                "voice model '{}' must not contain whitespace",
                self.0
            )));
        }
        Ok(())
    }
}

impl Default for VoiceModel {
    fn default() -> Self {
        Self(DEFAULT_VOICE_MODEL.to_string())
    }
}

impl From<&str> for VoiceModel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VoiceModel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for VoiceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Synthesized speech.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    /// Raw audio bytes.
    pub data: Bytes,
    /// MIME type of `data`.
    pub content_type: String,
}

impl SpeechAudio {
    /// Returns the audio length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there is no audio.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ================== STT ==================

/// Transcription result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<Segment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub words: Vec<Word>,
    /// Audio duration in seconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
}

impl Transcript {
    /// Returns the number of recognized words.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Returns true if no speech was recognized.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A timed transcript segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub start: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A timed word.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Word {
    #[serde(default, alias = "text", deserialize_with = "null_as_default")]
    pub word: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Reads `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Audio submitted for transcription.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub data: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioUpload {
    /// Wraps raw bytes as `recording.wav`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            file_name: "recording.wav".to_string(),
            mime_type: "audio/wav".to_string(),
        }
    }

    /// Overrides the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Overrides the file name.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Reads an audio file, guessing its MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recording.wav")
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav");

        Ok(Self {
            data: Bytes::from(data),
            file_name,
            mime_type: mime_for_extension(ext).to_string(),
        })
    }

    /// Returns the audio length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there is no audio.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for AudioUpload {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for AudioUpload {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

/// Maps a file extension to the MIME type browsers record with.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "webm" => "audio/webm",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "mp4" | "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        _ => "audio/wav",
    }
}

// ================== Live channel ==================

/// A decoded live-channel notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMessage(pub Value);

impl ChannelMessage {
    /// Returns the `type` field, if present.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Returns the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}
