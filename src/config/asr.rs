//! ASRパイプライン設定
use std::time::Duration;

use serde::Deserialize;

/// 使用する認識バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrBackend {
    /// 外部の文字起こしHTTPサービス
    Http,
    /// オフライン用の決定的なモック
    Mock,
    /// whisper.cpp によるローカル推論（`whisper` feature）
    Whisper,
}

/// ASRサービス、モデル、モックに関する設定
#[derive(Debug, Clone, Deserialize)]
pub struct AsrPipelineConfig {
    pub backend: AsrBackend,
    pub service: ServiceConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub mock: MockConfig,
}

impl AsrPipelineConfig {
    /// リクエストタイムアウト（ミリ秒→Duration）
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MockConfig {
    /// これ未満のRMSレベル(dBFS)は無音として扱う
    pub silence_threshold_db: f32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: -50.0,
        }
    }
}
