use thiserror::Error;

/// 1チャンクの認識失敗。セッションを終了させない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionFailure {
    /// 発話を抽出できなかった（無音・雑音など）。頻繁に起こる想定内の結果
    #[error("audio could not be understood")]
    Unintelligible,
    /// 認識サービスに到達できない、またはサービス側のエラー
    #[error("recognition service unavailable: {message}")]
    UpstreamUnavailable { message: String },
}

impl RecognitionFailure {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }
}

/// 認識バックエンドの構築時エラー
#[derive(Debug, Error)]
pub enum AsrError {
    #[error("backend initialization failed: {message}")]
    Initialization { message: String },
    #[error("backend `{name}` is not compiled into this build")]
    Unsupported { name: &'static str },
}
