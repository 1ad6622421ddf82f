//! Decoding of terminal job results.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use bytes::Bytes;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    types::{JobKind, SPEECH_CONTENT_TYPE, SpeechAudio, Transcript},
};

/// Standard alphabet, accepting payloads with or without trailing padding.
const AUDIO_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes a base64 audio payload into raw bytes.
///
/// Surrounding whitespace and a `data:...;base64,` prefix are tolerated.
pub fn decode_base64_audio(encoded: &str) -> Result<Bytes> {
    let mut payload = encoded.trim();
    if payload.starts_with("data:") {
        if let Some(idx) = payload.find(',') {
            payload = &payload[idx + 1..];
        }
    }
    let bytes = AUDIO_BASE64.decode(payload)?;
    Ok(Bytes::from(bytes))
}

/// Decodes the `result` of a completed TTS job.
pub fn decode_speech(result: Option<&Value>) -> Result<SpeechAudio> {
    let encoded = result
        .and_then(|r| r.get("data"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::JobFailed {
            kind: JobKind::Tts,
            message: "completed without audio payload".to_string(),
        })?;

    let data = decode_base64_audio(encoded)?;
    if data.is_empty() {
        return Err(Error::JobFailed {
            kind: JobKind::Tts,
            message: "empty audio payload".to_string(),
        });
    }

    Ok(SpeechAudio {
        data,
        content_type: SPEECH_CONTENT_TYPE.to_string(),
    })
}

/// Decodes the `result` of a completed STT job.
pub fn decode_transcript(result: Option<&Value>) -> Result<Transcript> {
    let result = result
        .filter(|r| r.is_object())
        .ok_or_else(|| Error::JobFailed {
            kind: JobKind::Stt,
            message: "completed without transcript".to_string(),
        })?;
    Ok(serde_json::from_value(result.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;

    #[test]
    fn test_base64_boundary_lengths() {
        for n in [0usize, 1, 2, 3, 4, 5, 1023, 1024, 1025] {
            let input: Vec<u8> = (0..n).map(|i| (i * 7 % 256) as u8).collect();
            let encoded = STANDARD.encode(&input);
            let decoded = decode_base64_audio(&encoded).unwrap();
            assert_eq!(decoded.len(), n, "length mismatch for n={n}");
            assert_eq!(&decoded[..], &input[..]);
        }
    }

    #[test]
    fn test_base64_without_padding() {
        // "RIFF" followed by one extra byte encodes with "==" padding.
        let decoded = decode_base64_audio("UklGRgA").unwrap();
        assert_eq!(&decoded[..], b"RIFF\0");
        let decoded = decode_base64_audio("UklGRgA=").unwrap();
        assert_eq!(&decoded[..], b"RIFF\0");
    }

    #[test]
    fn test_base64_data_url_and_whitespace() {
        let decoded = decode_base64_audio("  data:audio/wav;base64,UklGRg==\n").unwrap();
        assert_eq!(&decoded[..], b"RIFF");
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(matches!(
            decode_base64_audio("not base64!"),
            Err(Error::Base64Decode(_))
        ));
    }

    #[test]
    fn test_decode_speech() {
        let result = json!({"data": "UklGRg=="});
        let audio = decode_speech(Some(&result)).unwrap();
        assert_eq!(audio.len(), 4);
        assert_eq!(audio.content_type, "audio/wav");
    }

    #[test]
    fn test_decode_speech_never_returns_empty() {
        let result = json!({"data": ""});
        let err = decode_speech(Some(&result)).unwrap_err();
        assert!(err.is_job_failed());

        let err = decode_speech(None).unwrap_err();
        assert!(err.is_job_failed());
    }

    #[test]
    fn test_decode_transcript() {
        let result = json!({"text": "Gudde Moien", "segments": [], "words": [], "duration": 2.5});
        let t = decode_transcript(Some(&result)).unwrap();
        assert_eq!(t.text, "Gudde Moien");
        assert_eq!(t.duration, 2.5);

        assert!(decode_transcript(None).unwrap_err().is_job_failed());
        assert!(decode_transcript(Some(&json!("text"))).is_err());
    }

    #[test]
    fn test_decode_transcript_with_null_fields() {
        let result = json!({"text": "Moien", "segments": null, "words": null, "duration": null});
        let t = decode_transcript(Some(&result)).unwrap();
        assert_eq!(t.text, "Moien");
        assert!(t.segments.is_empty());
        assert_eq!(t.word_count(), 0);
        assert_eq!(t.duration, 0.0);

        let result = json!({
            "text": null,
            "segments": [{"start": null, "end": 1.0, "text": null}],
            "words": [{"word": null, "start": 0.2, "end": null}],
            "duration": 1.0
        });
        let t = decode_transcript(Some(&result)).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.segments[0].start, 0.0);
        assert_eq!(t.segments[0].text, "");
        assert_eq!(t.words[0].word, "");
        assert_eq!(t.words[0].start, 0.2);
        assert_eq!(t.words[0].end, 0.0);
    }
}
