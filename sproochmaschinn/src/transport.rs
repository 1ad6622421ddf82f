//! Wire transport for the Sproochmaschinn API.
//!
//! [`Transport`] is the seam between the session/job lifecycle and the network.
//! [`HttpTransport`] talks to the real service (directly or through a relay);
//! tests substitute an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{
    Client as ReqwestClient, Response,
    header::{HeaderMap, HeaderValue, USER_AGENT},
    multipart,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    types::{AudioUpload, ResultEnvelope, VoiceModel},
};

/// Capacity of the live channel message queues.
const CHANNEL_BUFFER: usize = 64;

/// Remote operations the client lifecycle depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST /api/session`; returns the issued session id.
    async fn create_session(&self) -> Result<String>;

    /// `GET /api/session/{id}`; any 2xx is success.
    async fn ping_session(&self, session_id: &str) -> Result<()>;

    /// `POST /api/tts/{id}`; returns the request id.
    async fn submit_tts(&self, session_id: &str, req: &TtsSubmission) -> Result<String>;

    /// `POST /api/stt/{id}` (multipart); returns the request id.
    async fn submit_stt(
        &self,
        session_id: &str,
        audio: &AudioUpload,
        enable_speaker_identification: bool,
    ) -> Result<String>;

    /// `GET /api/result/{request_id}`.
    async fn fetch_result(&self, request_id: &str) -> Result<ResultEnvelope>;

    /// Opens the live channel for a session.
    async fn open_channel(&self, session_id: &str) -> Result<ChannelLink>;
}

/// Body of a TTS submission.
#[derive(Debug, Clone, Serialize)]
pub struct TtsSubmission {
    pub text: String,
    pub model: VoiceModel,
}

/// An open live channel, as a pair of text queues.
///
/// The channel is closed when `incoming` yields `None`. Dropping `outgoing`
/// closes the underlying connection.
pub struct ChannelLink {
    pub outgoing: mpsc::Sender<String>,
    pub incoming: mpsc::Receiver<String>,
}

impl ChannelLink {
    /// Creates a linked pair: the channel handed to the client and the
    /// remote end that feeds it.
    pub fn pair() -> (ChannelLink, ChannelLink) {
        let (client_tx, remote_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (remote_tx, client_rx) = mpsc::channel(CHANNEL_BUFFER);
        (
            ChannelLink {
                outgoing: client_tx,
                incoming: client_rx,
            },
            ChannelLink {
                outgoing: remote_tx,
                incoming: remote_rx,
            },
        )
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
}

/// HTTP + WebSocket transport backed by reqwest and tokio-tungstenite.
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
    ws_url: String,
}

impl HttpTransport {
    /// Creates a new transport.
    ///
    /// `base_url` may point at the service or at a relay; `ws_url` always
    /// points at the service.
    pub fn new(base_url: impl Into<String>, ws_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .default_headers(default_headers())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the WebSocket URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decodes a JSON body, or fails with the HTTP status and an `op` label.
    async fn decode<R: DeserializeOwned>(op: &str, response: Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("{} failed: {} {}", op, status, truncate_for_log(&body, 200));
            return Err(Error::transport(
                status.as_u16(),
                format!("{} failed: {}", op, status.as_u16()),
            ));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(Error::from)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn create_session(&self) -> Result<String> {
        let response = self.client.post(self.url("/api/session")).send().await?;
        let resp: SessionResponse = Self::decode("session", response).await?;
        Ok(resp.session_id)
    }

    async fn ping_session(&self, session_id: &str) -> Result<()> {
        let url = self.url(&format!("/api/session/{}", session_id));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(
                status.as_u16(),
                format!("keep-alive failed: {}", status.as_u16()),
            ));
        }
        Ok(())
    }

    async fn submit_tts(&self, session_id: &str, req: &TtsSubmission) -> Result<String> {
        let url = self.url(&format!("/api/tts/{}", session_id));
        let response = self.client.post(url).json(req).send().await?;
        let resp: SubmitResponse = Self::decode("TTS", response).await?;
        Ok(resp.request_id)
    }

    async fn submit_stt(
        &self,
        session_id: &str,
        audio: &AudioUpload,
        enable_speaker_identification: bool,
    ) -> Result<String> {
        let url = self.url(&format!("/api/stt/{}", session_id));

        let part = multipart::Part::bytes(audio.data.to_vec())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)?;
        let form = multipart::Form::new().part("audio", part).text(
            "enable_speaker_identification",
            enable_speaker_identification.to_string(),
        );

        let response = self.client.post(url).multipart(form).send().await?;
        let resp: SubmitResponse = Self::decode("STT", response).await?;
        Ok(resp.request_id)
    }

    async fn fetch_result(&self, request_id: &str) -> Result<ResultEnvelope> {
        let url = self.url(&format!("/api/result/{}", request_id));
        let response = self.client.get(url).send().await?;
        Self::decode("result", response).await
    }

    async fn open_channel(&self, session_id: &str) -> Result<ChannelLink> {
        let url = format!("{}/api/ws/{}", self.ws_url, session_id);
        debug!("connecting live channel: {}", url);

        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| Error::Channel(format!("failed to connect: {}", e)))?;
        let (mut write, mut read) = ws_stream.split();

        let (link, mut remote) = ChannelLink::pair();

        // Write loop: forwards queued text frames until the client side drops.
        tokio::spawn(async move {
            while let Some(text) = remote.incoming.recv().await {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!("live channel write error: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Read loop: forwards text frames until the server closes.
        let tx = remote.outgoing;
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if tx.send(text.as_str().to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            if tx.send(text).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => debug!("dropping non-utf8 binary frame ({} bytes)", data.len()),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!("live channel closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("{}", Error::Channel(e.to_string()));
                        break;
                    }
                }
            }
        });

        Ok(link)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("sproochmaschinn-rust/", env!("CARGO_PKG_VERSION"))),
    );
    headers
}

pub(crate) fn truncate_for_log(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("abc", 10), "abc");
        assert_eq!(truncate_for_log("abcdef", 3), "abc");
        // 'ë' is two bytes; cutting inside it must back off.
        assert_eq!(truncate_for_log("Lëtzebuergesch", 2), "L");
    }

    #[test]
    fn test_http_transport_trims_trailing_slash() {
        let t = HttpTransport::new(
            "http://127.0.0.1:3456/",
            "ws://127.0.0.1:3456/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(t.base_url(), "http://127.0.0.1:3456");
        assert_eq!(t.ws_url(), "ws://127.0.0.1:3456");
        assert_eq!(t.url("/api/session"), "http://127.0.0.1:3456/api/session");
    }

    #[tokio::test]
    async fn test_channel_link_pair_is_crossed() {
        let (mut client, mut remote) = ChannelLink::pair();
        client.outgoing.send("ping".to_string()).await.unwrap();
        assert_eq!(remote.incoming.recv().await.as_deref(), Some("ping"));
        remote.outgoing.send("{}".to_string()).await.unwrap();
        assert_eq!(client.incoming.recv().await.as_deref(), Some("{}"));
        drop(remote);
        assert!(client.incoming.recv().await.is_none());
    }
}
