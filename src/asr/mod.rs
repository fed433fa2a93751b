//! 音声認識アダプタ
//!
//! `SpeechRecognizer` は生PCMチャンク1つを文字列へ変換する最小インタフェース。
//! 失敗は `RecognitionFailure` で型付けされ、セッション側で明示的に分岐される。
//!
//! - `HttpRecognizer`: 外部の文字起こしHTTPサービス
//! - `MockRecognizer`: オフライン用の決定的な実装
//! - `WhisperRecognizer`: whisper.cpp によるローカル推論（`whisper` feature）
mod client;
mod error;
pub mod http_client;
mod mock;
#[cfg(feature = "whisper")]
pub mod whisper_engine;

use std::sync::Arc;

use tracing::info;

use crate::config::{AsrBackend, ConfigSet};

pub use client::{normalize_transcript, SharedRecognizer, SpeechRecognizer};
pub use error::{AsrError, RecognitionFailure};
pub use http_client::HttpRecognizer;
pub use mock::MockRecognizer;

/// 設定に従って共有認識ハンドルを生成
pub fn build_recognizer(config: &ConfigSet) -> Result<SharedRecognizer, AsrError> {
    let recognizer: SharedRecognizer = match config.asr.backend {
        AsrBackend::Http => {
            let client = HttpRecognizer::new(&config.asr)?;
            info!(url = %client.transcribe_url(), "using HTTP transcription service");
            Arc::new(client)
        }
        AsrBackend::Mock => {
            info!("using mock recognizer");
            Arc::new(MockRecognizer::new(&config.asr.mock))
        }
        AsrBackend::Whisper => build_whisper(config)?,
    };
    Ok(recognizer)
}

#[cfg(feature = "whisper")]
fn build_whisper(config: &ConfigSet) -> Result<SharedRecognizer, AsrError> {
    let engine = whisper_engine::WhisperRecognizer::load(config.whisper.clone())?;
    info!(model = %config.whisper.model_path, "whisper model loaded");
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "whisper"))]
fn build_whisper(_config: &ConfigSet) -> Result<SharedRecognizer, AsrError> {
    Err(AsrError::Unsupported { name: "whisper" })
}
