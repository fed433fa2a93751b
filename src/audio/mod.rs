//! 生PCM音声の形式記述子と補助関数
//!
//! 受信チャンクは再構成せず、1メッセージ = 1つの独立した発話単位として扱う。
mod level;
mod pcm;

use std::time::Duration;

pub use level::{rms_dbfs, root_mean_square};
pub use pcm::{decode_samples, to_mono};

/// whisper系モデルが受け付ける唯一のサンプルレート
pub const WHISPER_SAMPLE_RATE_HZ: u32 = 16_000;

/// 認識呼び出しに添えるPCMフォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub sample_width_bytes: u16,
    pub channels: u16,
}

impl AudioFormat {
    /// 16kHz / 16bit signed little-endian / モノラル
    pub const PCM16_MONO_16K: Self = Self {
        sample_rate_hz: WHISPER_SAMPLE_RATE_HZ,
        sample_width_bytes: 2,
        channels: 1,
    };

    /// 1フレーム（全チャネル分の1サンプル）のバイト数
    pub fn frame_bytes(&self) -> usize {
        self.sample_width_bytes as usize * self.channels as usize
    }

    /// バッファに含まれる完全なフレーム数（端数バイトは切り捨て）
    pub fn frame_count(&self, byte_len: usize) -> usize {
        match self.frame_bytes() {
            0 => 0,
            frame => byte_len / frame,
        }
    }

    /// バッファの再生時間
    pub fn duration_of(&self, byte_len: usize) -> Duration {
        if self.sample_rate_hz == 0 {
            return Duration::ZERO;
        }
        let frames = self.frame_count(byte_len) as u64;
        Duration::from_micros(frames * 1_000_000 / self.sample_rate_hz as u64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::PCM16_MONO_16K
    }
}
