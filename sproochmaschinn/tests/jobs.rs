mod common;

use std::{sync::atomic::Ordering, time::Duration};

use common::*;
use sproochmaschinn::{
    AudioUpload, Backoff, Client, Error, JobKind, JobOutcome, PollPolicy, VoiceModel,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_submit_speech_returns_audio() {
    let transport = FakeTransport::new();
    transport.script("tts-1", vec![pending(), pending(), completed(wav_result())]);
    let client = polling_client(transport.clone());

    let audio = client.submit_speech("  Moien  ", None).await.unwrap();
    assert_eq!(&audio.data[..], b"RIFF");
    assert_eq!(audio.content_type, "audio/wav");
    assert!(!audio.is_empty());

    let requests = transport.tts_requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "session-1");
    assert_eq!(requests[0].1.text, "Moien");
    assert_eq!(requests[0].1.model.as_str(), "claude");
    assert_eq!(transport.fetches(), 3);
}

#[tokio::test]
async fn test_submit_speech_validates_before_network() {
    let transport = FakeTransport::new();
    let client = polling_client(transport.clone());

    let err = client.submit_speech("   ", None).await.unwrap_err();
    assert!(err.is_validation());

    let err = client
        .submit_speech("Moien", Some(VoiceModel::new("two words")))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(transport.creates(), 0);
    assert_eq!(transport.tts_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_audio_fails_fast() {
    let transport = FakeTransport::new();
    let client = polling_client(transport.clone());

    let err = client
        .submit_transcription(Vec::new(), true, |_| {})
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(transport.creates(), 0);
    assert_eq!(transport.stt_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_speech_times_out_after_sixty_polls() {
    let transport = FakeTransport::new();
    let client = polling_client(transport.clone());

    let start = Instant::now();
    let err = client.submit_speech("Moien", None).await.unwrap_err();
    let elapsed = start.elapsed();

    match err {
        Error::JobTimeout {
            kind,
            attempts,
            waited,
        } => {
            assert_eq!(kind, JobKind::Tts);
            assert_eq!(attempts, 60);
            assert_eq!(waited, Duration::from_millis(29_500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.fetches(), 60);
    assert!(elapsed >= Duration::from_millis(29_500));
    assert!(elapsed < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_transcription_times_out_after_120_polls() {
    let transport = FakeTransport::new();
    let client = polling_client(transport.clone());

    let err = client
        .submit_transcription(vec![1u8; 16], false, |_| {})
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(transport.fetches(), 120);
}

#[tokio::test]
async fn test_rate_limit_at_submission() {
    let transport = FakeTransport::new();
    *transport.submit_failure.lock() = Some(429);
    let client = polling_client(transport.clone());

    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert!(err.is_rate_limit());
    assert!(!matches!(err, Error::Transport { .. }));
    assert_eq!(err.to_string(), "rate limit exceeded, please wait a moment");

    *transport.submit_failure.lock() = Some(500);
    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert!(matches!(err, Error::Transport { status: 500, .. }));
    assert_eq!(transport.fetches(), 0);
}

#[tokio::test]
async fn test_poll_transport_error_propagates() {
    let transport = FakeTransport::new();
    *transport.fetch_failure.lock() = Some(404);
    let client = polling_client(transport.clone());

    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_rate_limit());
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_carries_server_message() {
    let transport = FakeTransport::new();
    transport.script("stt-1", vec![pending(), failed(Some("no speech"))]);
    let client = polling_client(transport.clone());

    let err = client
        .submit_transcription(vec![0u8; 44], true, |_| {})
        .await
        .unwrap_err();
    match err {
        Error::JobFailed { kind, message } => {
            assert_eq!(kind, JobKind::Stt);
            assert_eq!(message, "no speech");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_without_message_uses_fallback() {
    let transport = FakeTransport::new();
    transport.script("tts-1", vec![failed(None)]);
    transport.script("stt-1", vec![failed(Some(""))]);
    let client = polling_client(transport.clone());

    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert_eq!(err.to_string(), "TTS processing failed");

    let err = client
        .submit_transcription(vec![0u8; 44], true, |_| {})
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Transcription failed");
}

#[tokio::test(start_paused = true)]
async fn test_completed_speech_without_audio_is_an_error() {
    let transport = FakeTransport::new();
    transport.script("tts-1", vec![completed(serde_json::json!({"data": ""}))]);
    transport.script("tts-2", vec![completed(serde_json::json!({}))]);
    let client = polling_client(transport.clone());

    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert!(err.is_job_failed());
    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert!(err.is_job_failed());
}

#[tokio::test(start_paused = true)]
async fn test_transcription_progress_is_monotonic() {
    let transport = FakeTransport::new();
    transport.script(
        "stt-1",
        vec![
            pending(),
            progress(10.0),
            progress(35.0),
            progress(20.0),
            progress(140.0),
            completed(transcript_result()),
        ],
    );
    let client = polling_client(transport.clone());

    let mut seen = Vec::new();
    let transcript = client
        .submit_transcription(
            AudioUpload::new(vec![0u8; 44]).with_mime_type("audio/webm"),
            true,
            |p| seen.push(p),
        )
        .await
        .unwrap();

    assert_eq!(seen, vec![10.0, 35.0, 35.0, 100.0]);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(transcript.text, "Moien, wéi geet et?");
    assert_eq!(transcript.segments.len(), 1);
    assert_eq!(transcript.word_count(), 4);
    assert_eq!(transcript.duration, 1.5);

    let requests = transport.stt_requests.lock().clone();
    assert_eq!(requests, vec![("session-1".to_string(), 44, true)]);
}

#[tokio::test(start_paused = true)]
async fn test_completed_transcription_without_result_is_an_error() {
    let transport = FakeTransport::new();
    transport.script(
        "stt-1",
        vec![sproochmaschinn::ResultEnvelope {
            status: sproochmaschinn::JobStatus::Completed,
            ..Default::default()
        }],
    );
    let client = polling_client(transport.clone());

    let err = client
        .submit_transcription(vec![0u8; 44], false, |_| {})
        .await
        .unwrap_err();
    assert!(err.is_job_failed());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_ends_wait_promptly() {
    let transport = FakeTransport::new();
    let client = polling_client(transport.clone());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = client
        .submit_speech_with_cancel("Moien", None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(start.elapsed() < Duration::from_millis(1_500));
    assert_eq!(transport.fetches(), 3);
}

#[tokio::test]
async fn test_cancelled_before_submission_sends_nothing() {
    let transport = FakeTransport::new();
    let client = polling_client(transport.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client
        .jobs()
        .submit_transcription_with_cancel(vec![1u8; 8], true, |_| {}, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(transport.stt_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_poll_result_single_query() {
    let transport = FakeTransport::new();
    transport.script("stt-9", vec![progress(42.0), completed(transcript_result())]);
    transport.script("tts-9", vec![failed(Some("model unavailable"))]);
    let client = polling_client(transport.clone());
    let jobs = client.jobs();

    match jobs.poll_result("stt-9", JobKind::Stt).await.unwrap() {
        JobOutcome::Pending { progress } => assert_eq!(progress, Some(42.0)),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let outcome = jobs.poll_result("stt-9", JobKind::Stt).await.unwrap();
    assert!(outcome.is_complete());
    assert!(matches!(outcome, JobOutcome::Transcript(t) if t.word_count() == 4));

    let err = jobs.poll_result("tts-9", JobKind::Tts).await.unwrap_err();
    assert_eq!(err.to_string(), "model unavailable");
    assert_eq!(transport.fetches(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_shortens_attempt_budget_in_time() {
    let transport = FakeTransport::new();
    let policy = PollPolicy::fixed(Duration::from_millis(100), 5).with_backoff(
        Backoff::Exponential {
            factor: 2.0,
            max_interval: Duration::from_millis(300),
        },
    );
    let client = Client::builder()
        .transport(transport.clone())
        .live_channel(false)
        .tts_poll_policy(policy)
        .build()
        .unwrap();

    let start = Instant::now();
    let err = client.submit_speech("Moien", None).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(transport.fetches(), 5);
    // 100 + 200 + 300 + 300
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(900));
    assert!(elapsed < Duration::from_millis(950));
    assert_eq!(policy.max_wait(), Duration::from_millis(900));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_jobs_share_one_session() {
    let transport = FakeTransport::new();
    transport.script("tts-1", vec![pending(), completed(wav_result())]);
    transport.script("tts-2", vec![pending(), pending(), completed(wav_result())]);
    let client = polling_client(transport.clone());
    let jobs = client.jobs();

    let (a, b) = tokio::join!(
        jobs.submit_speech("Moien", None),
        jobs.submit_speech("Äddi", Some(VoiceModel::from("claude"))),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(transport.creates(), 1);
}
