//! Job submission and result polling.

use std::{future::Future, sync::Arc, time::Duration};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    decode::{decode_speech, decode_transcript},
    error::{Error, Result},
    session::SessionManager,
    transport::{TtsSubmission, Transport},
    types::{AudioUpload, JobKind, JobStatus, ResultEnvelope, SpeechAudio, Transcript, VoiceModel},
};

/// Growth of the delay between polls.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Backoff {
    /// Same delay before every poll.
    #[default]
    Fixed,
    /// Delay multiplied by `factor` after every poll, capped at `max_interval`.
    Exponential { factor: f64, max_interval: Duration },
}

/// Bounded polling schedule for one job kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first poll.
    pub interval: Duration,
    /// Total number of result queries before giving up.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl PollPolicy {
    /// 500 ms × 60 attempts.
    pub fn tts() -> Self {
        Self::fixed(Duration::from_millis(500), 60)
    }

    /// 1 s × 120 attempts.
    pub fn stt() -> Self {
        Self::fixed(Duration::from_secs(1), 120)
    }

    /// Fixed-interval policy.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    /// Sets the backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the delay that follows poll number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                factor,
                max_interval,
            } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.interval.as_secs_f64() * factor.max(1.0).powi(exp);
                if !secs.is_finite() || secs >= max_interval.as_secs_f64() {
                    max_interval
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }

    /// Total time spent sleeping when every attempt is used.
    ///
    /// No sleep follows the final attempt.
    pub fn max_wait(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }

    /// Checks that the policy can terminate.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("poll max_attempts must be at least 1".to_string()));
        }
        if let Backoff::Exponential { factor, .. } = self.backoff {
            if !factor.is_finite() || factor < 1.0 {
                return Err(Error::Config(format!(
                    "backoff factor must be >= 1.0, got {}",
                    factor
                )));
            }
        }
        Ok(())
    }
}

/// Result of a single status query.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Not finished yet.
    Pending { progress: Option<f64> },
    /// Completed synthesis.
    Speech(SpeechAudio),
    /// Completed transcription.
    Transcript(Transcript),
}

impl JobOutcome {
    /// Returns true if the job has finished.
    pub fn is_complete(&self) -> bool {
        !matches!(self, JobOutcome::Pending { .. })
    }
}

/// Submits TTS/STT jobs on the shared session and waits for their results.
///
/// Each call polls its own request id sequentially; concurrent calls do not
/// interact beyond reading the session id.
#[derive(Clone)]
pub struct JobClient {
    session: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    tts_policy: PollPolicy,
    stt_policy: PollPolicy,
}

impl JobClient {
    /// Creates a job client with the default poll policies.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_policies(session, PollPolicy::tts(), PollPolicy::stt())
    }

    /// Creates a job client with explicit poll policies.
    pub fn with_policies(
        session: Arc<SessionManager>,
        tts_policy: PollPolicy,
        stt_policy: PollPolicy,
    ) -> Self {
        let transport = session.transport();
        Self {
            session,
            transport,
            tts_policy,
            stt_policy,
        }
    }

    /// Returns the session manager this client submits on.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Returns the TTS poll policy.
    pub fn tts_policy(&self) -> PollPolicy {
        self.tts_policy
    }

    /// Returns the STT poll policy.
    pub fn stt_policy(&self) -> PollPolicy {
        self.stt_policy
    }

    /// Synthesizes `text` and returns WAV audio.
    ///
    /// `model` defaults to [`VoiceModel::default`]. Never returns empty audio.
    pub async fn submit_speech(&self, text: &str, model: Option<VoiceModel>) -> Result<SpeechAudio> {
        self.submit_speech_with_cancel(text, model, &CancellationToken::new())
            .await
    }

    /// Like [`submit_speech`](Self::submit_speech), ending with
    /// [`Error::Cancelled`] once `cancel` fires.
    pub async fn submit_speech_with_cancel(
        &self,
        text: &str,
        model: Option<VoiceModel>,
        cancel: &CancellationToken,
    ) -> Result<SpeechAudio> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("text must not be empty".to_string()));
        }
        let model = model.unwrap_or_default();
        model.validate()?;

        let session_id = cancellable(cancel, self.session.ensure_session()).await?;
        let req = TtsSubmission {
            text: text.to_string(),
            model,
        };
        let request_id = cancellable(cancel, self.transport.submit_tts(&session_id, &req))
            .await
            .map_err(submission_error)?;
        info!(
            "tts job {} submitted ({} chars, model {})",
            request_id,
            req.text.chars().count(),
            req.model
        );

        let result = self
            .wait_for_result(&request_id, JobKind::Tts, self.tts_policy, cancel, &mut |_: f64| {})
            .await?;
        decode_speech(result.as_ref())
    }

    /// Transcribes `audio`.
    ///
    /// `on_progress` receives clamped, non-decreasing progress in 0..=100
    /// from each poll that reports one.
    pub async fn submit_transcription<F>(
        &self,
        audio: impl Into<AudioUpload>,
        enable_speaker_identification: bool,
        on_progress: F,
    ) -> Result<Transcript>
    where
        F: FnMut(f64) + Send,
    {
        self.submit_transcription_with_cancel(
            audio,
            enable_speaker_identification,
            on_progress,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`submit_transcription`](Self::submit_transcription), ending
    /// with [`Error::Cancelled`] once `cancel` fires.
    pub async fn submit_transcription_with_cancel<F>(
        &self,
        audio: impl Into<AudioUpload>,
        enable_speaker_identification: bool,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Transcript>
    where
        F: FnMut(f64) + Send,
    {
        let audio = audio.into();
        if audio.is_empty() {
            return Err(Error::Validation("audio must not be empty".to_string()));
        }

        let session_id = cancellable(cancel, self.session.ensure_session()).await?;
        let request_id = cancellable(
            cancel,
            self.transport
                .submit_stt(&session_id, &audio, enable_speaker_identification),
        )
        .await
        .map_err(submission_error)?;
        info!(
            "stt job {} submitted ({} bytes, {})",
            request_id,
            audio.len(),
            audio.mime_type
        );

        let mut progress = ProgressTracker::default();
        let mut report = |p: f64| on_progress(progress.observe(p));
        let result = self
            .wait_for_result(&request_id, JobKind::Stt, self.stt_policy, cancel, &mut report)
            .await?;
        decode_transcript(result.as_ref())
    }

    /// Queries a job once without waiting.
    ///
    /// A failed job is returned as [`Error::JobFailed`].
    pub async fn poll_result(&self, request_id: &str, kind: JobKind) -> Result<JobOutcome> {
        let env = self.transport.fetch_result(request_id).await?;
        let progress = env.progress.map(clamp_progress);
        match check_terminal(kind, env)? {
            None => Ok(JobOutcome::Pending { progress }),
            Some(result) => match kind {
                JobKind::Tts => decode_speech(result.as_ref()).map(JobOutcome::Speech),
                JobKind::Stt => decode_transcript(result.as_ref()).map(JobOutcome::Transcript),
            },
        }
    }

    /// Polls until the job is terminal and returns the `result` of a
    /// completed job.
    async fn wait_for_result(
        &self,
        request_id: &str,
        kind: JobKind,
        policy: PollPolicy,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<Option<Value>> {
        let mut waited = Duration::ZERO;

        for attempt in 1..=policy.max_attempts {
            let env = cancellable(cancel, self.transport.fetch_result(request_id)).await?;
            debug!(
                "{} job {} poll {}/{}: {:?}",
                kind, request_id, attempt, policy.max_attempts, env.status
            );

            if let Some(p) = env.progress {
                on_progress(p);
            }
            if let Some(result) = check_terminal(kind, env)? {
                info!("{} job {} completed after {} polls", kind, request_id, attempt);
                return Ok(result);
            }

            if attempt < policy.max_attempts {
                let delay = policy.delay_for(attempt);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                waited += delay;
            }
        }

        Err(Error::JobTimeout {
            kind,
            attempts: policy.max_attempts,
            waited,
        })
    }
}

/// Ok(None) while pending, Ok(Some(result)) once completed.
fn check_terminal(kind: JobKind, env: ResultEnvelope) -> Result<Option<Option<Value>>> {
    match env.status {
        JobStatus::Pending => Ok(None),
        JobStatus::Completed => Ok(Some(env.result)),
        JobStatus::Failed => {
            let message = env
                .error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| kind.fallback_failure_message().to_string());
            Err(Error::JobFailed { kind, message })
        }
    }
}

/// 429 at submission is reported as a rate limit, not a transport error.
fn submission_error(e: Error) -> Error {
    match e {
        Error::Transport { status: 429, .. } => Error::rate_limited(),
        Error::Http(ref inner) if inner.status().is_some_and(|s| s.as_u16() == 429) => {
            Error::rate_limited()
        }
        other => other,
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn clamp_progress(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}

/// Keeps reported progress in 0..=100 and non-decreasing.
#[derive(Debug, Default)]
struct ProgressTracker {
    last: Option<f64>,
}

impl ProgressTracker {
    fn observe(&mut self, raw: f64) -> f64 {
        let p = clamp_progress(raw);
        let p = match self.last {
            Some(last) if p < last => last,
            _ => p,
        };
        self.last = Some(p);
        p
    }
}
