//! Sproochmaschinn SDK for Rust.
//!
//! Client for the Luxembourgish speech service: text-to-speech and
//! speech-to-text as asynchronous jobs on an ephemeral session.
//!
//! - [`SessionManager`] creates the session, keeps it alive, replaces it when a
//!   keep-alive fails and maintains the optional live channel.
//! - [`JobClient`] submits jobs on that session and polls them to a result.
//! - [`Transport`] is the network seam; [`HttpTransport`] is the real one.

mod channel;
mod client;
mod decode;
mod error;
mod job;
mod session;
mod transport;
mod types;

pub use channel::{PING_MESSAGE, decode_message};
pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, DEFAULT_WS_URL};
pub use decode::{decode_base64_audio, decode_speech, decode_transcript};
pub use error::{Error, Result};
pub use job::{Backoff, JobClient, JobOutcome, PollPolicy};
pub use session::{
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_PING_INTERVAL, DEFAULT_RECONNECT_DELAY,
    DEFAULT_SESSION_EXPIRY, MessageHandler, SessionConfig, SessionManager, StatusCallback,
};
pub use transport::{ChannelLink, HttpTransport, Transport, TtsSubmission};
pub use types::{
    AudioUpload, ChannelMessage, DEFAULT_VOICE_MODEL, JobKind, JobStatus, ResultEnvelope,
    SPEECH_CONTENT_TYPE, Segment, SessionStatus, SpeechAudio, Transcript, VoiceModel, Word,
    mime_for_extension,
};
