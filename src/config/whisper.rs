use serde::Deserialize;

/// `whisper` バックエンド用のローカルモデル設定
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperModelConfig {
    /// whisper.cpp ggml/gguf モデルファイルパス
    pub model_path: String,
    /// 推論スレッド数
    pub threads: usize,
    /// 言語（"auto" で自動判定）
    pub language: String,
    /// true: 多言語→英語に翻訳
    #[serde(default)]
    pub translate: bool,
}
