use async_trait::async_trait;
use bytes::Bytes;

use super::client::SpeechRecognizer;
use super::error::RecognitionFailure;
use crate::audio::{rms_dbfs, to_mono, AudioFormat};
use crate::config::MockConfig;

/// 外部サービス無しで動作する決定的な認識器
///
/// 無音判定のみを行い、発話らしいチャンクにはその長さを説明する文字列を返す。
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    silence_threshold_db: f32,
}

impl MockRecognizer {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            silence_threshold_db: config.silence_threshold_db,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn recognize(
        &self,
        audio: Bytes,
        format: AudioFormat,
    ) -> Result<String, RecognitionFailure> {
        let samples = to_mono(&audio, format);
        if samples.is_empty() || rms_dbfs(&samples) < self.silence_threshold_db {
            return Err(RecognitionFailure::Unintelligible);
        }

        let duration = format.duration_of(audio.len());
        Ok(format!(
            "{} samples ({} ms) of audio",
            samples.len(),
            duration.as_millis()
        ))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
