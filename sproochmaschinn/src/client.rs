//! Sproochmaschinn API client.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use super::{
    error::{Error, Result},
    job::{JobClient, PollPolicy},
    session::{
        DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_PING_INTERVAL, DEFAULT_RECONNECT_DELAY,
        DEFAULT_SESSION_EXPIRY, SessionConfig, SessionManager,
    },
    transport::{HttpTransport, Transport},
    types::{AudioUpload, SessionStatus, SpeechAudio, Transcript, VoiceModel},
};

/// Default Sproochmaschinn API base URL.
pub const DEFAULT_BASE_URL: &str = "https://sproochmaschinn.lu";

/// Default live channel URL. The channel never goes through a relay.
pub const DEFAULT_WS_URL: &str = "wss://sproochmaschinn.lu";

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sproochmaschinn API client.
///
/// Owns one [`SessionManager`] and hands out [`JobClient`]s bound to it.
/// Dropping the client does not tear the session down; call
/// [`Client::teardown`] for that.
///
/// # Example
///
/// ```rust,no_run
/// use sproochmaschinn::Client;
///
/// # async fn run() -> sproochmaschinn::Result<()> {
/// let client = Client::new()?;
/// client.initialize(|status| println!("{}", status.label())).await?;
///
/// let audio = client.submit_speech("Moien, wéi geet et?", None).await?;
/// std::fs::write("moien.wav", &audio.data)?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    session: Arc<SessionManager>,
    jobs: JobClient,
    config: ClientConfig,
}

#[derive(Clone)]
struct ClientConfig {
    base_url: String,
    ws_url: String,
}

impl Client {
    /// Creates a client with the default endpoints and timings.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Creates a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Returns the configured live channel URL.
    pub fn ws_url(&self) -> &str {
        &self.config.ws_url
    }

    /// Returns the session manager.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Returns a job client bound to this client's session.
    pub fn jobs(&self) -> JobClient {
        self.jobs.clone()
    }

    /// Establishes the session. See [`SessionManager::initialize`].
    pub async fn initialize<F>(&self, on_status: F) -> Result<String>
    where
        F: Fn(SessionStatus) + Send + Sync + 'static,
    {
        self.session.initialize(on_status).await
    }

    /// Returns the current session status.
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Synthesizes speech. See [`JobClient::submit_speech`].
    pub async fn submit_speech(&self, text: &str, model: Option<VoiceModel>) -> Result<SpeechAudio> {
        self.jobs.submit_speech(text, model).await
    }

    /// Synthesizes speech until `cancel` fires.
    pub async fn submit_speech_with_cancel(
        &self,
        text: &str,
        model: Option<VoiceModel>,
        cancel: &CancellationToken,
    ) -> Result<SpeechAudio> {
        self.jobs.submit_speech_with_cancel(text, model, cancel).await
    }

    /// Transcribes audio. See [`JobClient::submit_transcription`].
    pub async fn submit_transcription<F>(
        &self,
        audio: impl Into<AudioUpload>,
        enable_speaker_identification: bool,
        on_progress: F,
    ) -> Result<Transcript>
    where
        F: FnMut(f64) + Send,
    {
        self.jobs
            .submit_transcription(audio, enable_speaker_identification, on_progress)
            .await
    }

    /// Cancels timers, closes the live channel and forgets the session.
    pub fn teardown(&self) {
        self.session.teardown();
    }
}

/// Builder for creating a Sproochmaschinn API client.
pub struct ClientBuilder {
    base_url: String,
    ws_url: String,
    timeout: Duration,
    session: SessionConfig,
    tts_policy: PollPolicy,
    stt_policy: PollPolicy,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            session: SessionConfig {
                session_expiry: DEFAULT_SESSION_EXPIRY,
                keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
                ping_interval: DEFAULT_PING_INTERVAL,
                reconnect_delay: DEFAULT_RECONNECT_DELAY,
                live_channel: true,
            },
            tts_policy: PollPolicy::tts(),
            stt_policy: PollPolicy::stt(),
            transport: None,
        }
    }

    /// Sets the HTTP base URL. May point at a relay.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the live channel URL (`ws://` or `wss://`).
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Sets the per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the server-side session expiry window.
    pub fn session_expiry(mut self, expiry: Duration) -> Self {
        self.session.session_expiry = expiry;
        self
    }

    /// Sets the keep-alive interval.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.session.keepalive_interval = interval;
        self
    }

    /// Sets the live channel ping interval.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.session.ping_interval = interval;
        self
    }

    /// Sets the delay before a dropped live channel is reconnected.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.session.reconnect_delay = delay;
        self
    }

    /// Enables or disables the live channel.
    pub fn live_channel(mut self, enabled: bool) -> Self {
        self.session.live_channel = enabled;
        self
    }

    /// Sets the TTS poll policy.
    pub fn tts_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.tts_policy = policy;
        self
    }

    /// Sets the STT poll policy.
    pub fn stt_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.stt_policy = policy;
        self
    }

    /// Uses a custom transport instead of HTTP. URLs and timeout are ignored.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<Client> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must be non-empty".to_string()));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "ws_url must start with ws:// or wss://, got '{}'",
                self.ws_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".to_string()));
        }
        self.session.validate()?;
        self.tts_policy.validate()?;
        self.stt_policy.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(
                self.base_url.clone(),
                self.ws_url.clone(),
                self.timeout,
            )?),
        };

        let session = SessionManager::new(transport, self.session);
        let jobs = JobClient::with_policies(session.clone(), self.tts_policy, self.stt_policy);

        Ok(Client {
            session,
            jobs,
            config: ClientConfig {
                base_url: self.base_url,
                ws_url: self.ws_url,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = Client::builder().build().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.ws_url(), DEFAULT_WS_URL);
        assert_eq!(client.status(), SessionStatus::Uninitialized);
        assert!(client.session().session_id().is_none());
        assert_eq!(client.jobs().tts_policy(), PollPolicy::tts());
        assert_eq!(
            client.session().config().keepalive_interval,
            Duration::from_secs(240)
        );
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let err = Client::builder()
            .keepalive_interval(Duration::from_secs(700))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        assert!(Client::builder().ws_url("https://x").build().is_err());
        assert!(Client::builder().base_url("").build().is_err());
        assert!(
            Client::builder()
                .tts_poll_policy(PollPolicy::fixed(Duration::from_millis(1), 0))
                .build()
                .is_err()
        );
    }
}
