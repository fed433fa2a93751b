//! 音声入力フォーマットに関する設定値
use serde::Deserialize;

use crate::audio::AudioFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct AudioProcessingConfig {
    pub input: InputFormat,
}

impl AudioProcessingConfig {
    /// 認識アダプタへ渡すフォーマット記述子
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate_hz: self.input.sample_rate_hz,
            sample_width_bytes: self.input.sample_width_bytes,
            channels: self.input.channels,
        }
    }
}

/// クライアントと事前に合意した生PCMの形式（メッセージ毎には宣言されない）
#[derive(Debug, Clone, Deserialize)]
pub struct InputFormat {
    pub sample_rate_hz: u32,
    pub sample_width_bytes: u16,
    pub channels: u16,
}
