//! 外部の文字起こしHTTPサービスを呼び出す認識アダプタ
//!
//! 生PCMをWAVコンテナに包み、`POST {endpoint}/transcribe` へ multipart (`file`) で送る。
//! 応答は `{ "text": "...", ... }` 形式のJSON。
use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::client::{normalize_transcript, SpeechRecognizer};
use super::error::{AsrError, RecognitionFailure};
use crate::audio::AudioFormat;
use crate::config::AsrPipelineConfig;

/// 文字起こしサービスの応答（必要なフィールドのみ）
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    processing_time_ms: Option<u64>,
}

/// HTTPベースの認識クライアント
///
/// 内部の `reqwest::Client` はコネクションプールを持ち、全セッションで共有される。
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    client: reqwest::Client,
    transcribe_url: String,
    language: String,
}

impl HttpRecognizer {
    pub fn new(config: &AsrPipelineConfig) -> Result<Self, AsrError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AsrError::Initialization {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            transcribe_url: format!(
                "{}/transcribe",
                config.service.endpoint.trim_end_matches('/')
            ),
            language: config.model.language.clone(),
        })
    }

    pub fn transcribe_url(&self) -> &str {
        &self.transcribe_url
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    async fn recognize(
        &self,
        audio: Bytes,
        format: AudioFormat,
    ) -> Result<String, RecognitionFailure> {
        let wav = encode_wav(&audio, format)?;

        let form = Form::new()
            .part("file", Part::bytes(wav).file_name("chunk.wav"))
            .text("language", self.language.clone());

        let response = self
            .client
            .post(&self.transcribe_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecognitionFailure::upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionFailure::upstream(format!("HTTP {status}: {body}")));
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| RecognitionFailure::upstream(format!("invalid response body: {e}")))?;

        debug!(
            language = ?body.language,
            processing_time_ms = ?body.processing_time_ms,
            "transcription service responded"
        );
        normalize_transcript(&body.text)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// 生PCMをWAVへ変換。端数バイトは捨てる
///
/// 8bit は符号なしPCMとして受け取り、hound の符号付き表現へ変換して書き込む。
pub fn encode_wav(audio: &[u8], format: AudioFormat) -> Result<Vec<u8>, RecognitionFailure> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate_hz,
        bits_per_sample: format.sample_width_bytes * 8,
        sample_format: hound::SampleFormat::Int,
    };
    let whole = format.frame_count(audio.len()) * format.frame_bytes();
    let audio = &audio[..whole];

    let mut cursor = Cursor::new(Vec::with_capacity(whole + 44));
    write_samples(&mut cursor, spec, audio, format.sample_width_bytes)
        .map_err(|e| RecognitionFailure::upstream(format!("failed to encode WAV payload: {e}")))?;
    Ok(cursor.into_inner())
}

fn write_samples(
    cursor: &mut Cursor<Vec<u8>>,
    spec: hound::WavSpec,
    audio: &[u8],
    sample_width_bytes: u16,
) -> Result<(), hound::Error> {
    let mut writer = hound::WavWriter::new(cursor, spec)?;
    match sample_width_bytes {
        1 => {
            for b in audio {
                writer.write_sample((*b as i16 - 128) as i8)?;
            }
        }
        2 => {
            for b in audio.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([b[0], b[1]]))?;
            }
        }
        4 => {
            for b in audio.chunks_exact(4) {
                writer.write_sample(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))?;
            }
        }
        _ => return Err(hound::Error::Unsupported),
    }
    writer.finalize()
}
