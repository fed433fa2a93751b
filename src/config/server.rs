use std::time::Duration;

use serde::Deserialize;

use crate::session::DEFAULT_MAX_MESSAGE_BYTES;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// WebSocketサーバのバインドアドレス（例: 127.0.0.1:8765）
    pub bind_addr: String,
    /// 1メッセージ（音声チャンク）の最大バイト数
    #[serde(default = "ServerConfig::default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// シャットダウン後に既存セッションの終了を待つ時間（0 = 無期限）
    #[serde(default)]
    pub drain_timeout_ms: u64,
}

impl ServerConfig {
    const fn default_max_message_bytes() -> usize {
        DEFAULT_MAX_MESSAGE_BYTES
    }

    /// ドレイン上限（ミリ秒→Duration、0なら None）
    pub fn drain_timeout(&self) -> Option<Duration> {
        (self.drain_timeout_ms > 0).then(|| Duration::from_millis(self.drain_timeout_ms))
    }
}
