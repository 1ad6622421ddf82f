//! In-memory transport for lifecycle tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use sproochmaschinn::{
    AudioUpload, ChannelLink, Client, Error, JobStatus, ResultEnvelope, Result, Transport,
    TtsSubmission,
};

#[derive(Default)]
pub struct FakeTransport {
    pub create_calls: AtomicUsize,
    pub ping_calls: AtomicUsize,
    pub tts_calls: AtomicUsize,
    pub stt_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub open_calls: AtomicUsize,

    /// Delay applied inside `create_session`.
    pub create_delay: Mutex<Duration>,
    /// HTTP status returned by the next `create_session` calls.
    pub create_failure: Mutex<Option<u16>>,
    /// Number of upcoming pings that fail with 404.
    pub ping_failures: AtomicUsize,
    /// HTTP status returned by submissions.
    pub submit_failure: Mutex<Option<u16>>,
    /// HTTP status returned by result queries.
    pub fetch_failure: Mutex<Option<u16>>,
    /// Makes `open_channel` fail.
    pub channel_failure: AtomicBool,

    pub tts_requests: Mutex<Vec<(String, TtsSubmission)>>,
    pub stt_requests: Mutex<Vec<(String, usize, bool)>>,
    pub fetched: Mutex<Vec<String>>,
    pub opened_for: Mutex<Vec<String>>,

    /// Remote ends of opened channels, in open order.
    pub remotes: Mutex<Vec<ChannelLink>>,

    /// Scripted envelopes per request id; the last one repeats.
    results: Mutex<HashMap<String, VecDeque<ResultEnvelope>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, request_id: &str, envelopes: Vec<ResultEnvelope>) {
        self.results
            .lock()
            .insert(request_id.to_string(), envelopes.into());
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Takes the remote end of the most recently opened channel.
    pub fn take_remote(&self) -> ChannelLink {
        self.remotes.lock().pop().expect("no channel opened")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn create_session(&self) -> Result<String> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.create_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = *self.create_failure.lock() {
            return Err(Error::transport(status, format!("session failed: {status}")));
        }
        Ok(format!("session-{n}"))
    }

    async fn ping_session(&self, _session_id: &str) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .ping_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::transport(404, "keep-alive failed: 404"));
        }
        Ok(())
    }

    async fn submit_tts(&self, session_id: &str, req: &TtsSubmission) -> Result<String> {
        let n = self.tts_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(status) = *self.submit_failure.lock() {
            return Err(Error::transport(status, format!("TTS failed: {status}")));
        }
        self.tts_requests
            .lock()
            .push((session_id.to_string(), req.clone()));
        Ok(format!("tts-{n}"))
    }

    async fn submit_stt(
        &self,
        session_id: &str,
        audio: &AudioUpload,
        enable_speaker_identification: bool,
    ) -> Result<String> {
        let n = self.stt_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(status) = *self.submit_failure.lock() {
            return Err(Error::transport(status, format!("STT failed: {status}")));
        }
        self.stt_requests.lock().push((
            session_id.to_string(),
            audio.len(),
            enable_speaker_identification,
        ));
        Ok(format!("stt-{n}"))
    }

    async fn fetch_result(&self, request_id: &str) -> Result<ResultEnvelope> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().push(request_id.to_string());
        if let Some(status) = *self.fetch_failure.lock() {
            return Err(Error::transport(status, format!("result failed: {status}")));
        }

        let mut results = self.results.lock();
        let Some(queue) = results.get_mut(request_id) else {
            return Ok(pending());
        };
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap_or_default())
        } else {
            Ok(queue.front().cloned().unwrap_or_default())
        }
    }

    async fn open_channel(&self, session_id: &str) -> Result<ChannelLink> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.opened_for.lock().push(session_id.to_string());
        if self.channel_failure.load(Ordering::SeqCst) {
            return Err(Error::Channel("connection refused".to_string()));
        }
        let (client, remote) = ChannelLink::pair();
        self.remotes.lock().push(remote);
        Ok(client)
    }
}

pub fn pending() -> ResultEnvelope {
    ResultEnvelope::default()
}

pub fn progress(p: f64) -> ResultEnvelope {
    ResultEnvelope {
        status: JobStatus::Pending,
        progress: Some(p),
        ..Default::default()
    }
}

pub fn completed(result: Value) -> ResultEnvelope {
    ResultEnvelope {
        status: JobStatus::Completed,
        result: Some(result),
        ..Default::default()
    }
}

pub fn failed(message: Option<&str>) -> ResultEnvelope {
    ResultEnvelope {
        status: JobStatus::Failed,
        error: message.map(str::to_string),
        ..Default::default()
    }
}

/// `RIFF` as base64.
pub fn wav_result() -> Value {
    json!({"data": "UklGRg=="})
}

pub fn transcript_result() -> Value {
    json!({
        "text": "Moien, wéi geet et?",
        "segments": [{"start": 0.0, "end": 1.4, "text": "Moien, wéi geet et?", "speaker": "SPEAKER_00"}],
        "words": [
            {"word": "Moien", "start": 0.0, "end": 0.5},
            {"word": "wéi", "start": 0.6, "end": 0.8},
            {"word": "geet", "start": 0.8, "end": 1.0},
            {"word": "et", "start": 1.1, "end": 1.4}
        ],
        "duration": 1.5
    })
}

/// Client over `transport` without the live channel.
pub fn polling_client(transport: Arc<FakeTransport>) -> Client {
    Client::builder()
        .transport(transport)
        .live_channel(false)
        .build()
        .expect("build client")
}

/// Client over `transport` with the live channel enabled.
pub fn live_client(transport: Arc<FakeTransport>) -> Client {
    Client::builder()
        .transport(transport)
        .build()
        .expect("build client")
}

/// Lets spawned tasks run without advancing the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
