//! 認識アダプタの共通インタフェース
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::RecognitionFailure;
use crate::audio::AudioFormat;

/// 全セッションで共有する認識ハンドル（起動後は読み取り専用）
pub type SharedRecognizer = Arc<dyn SpeechRecognizer>;

/// 生PCMバッファを文字列へ変換する外部認識機能
///
/// 実装は独立した複数セッションから同時に呼ばれるため、共有状態を変更してはならない。
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// 成功時は空でない文字列を返す
    async fn recognize(&self, audio: Bytes, format: AudioFormat)
        -> Result<String, RecognitionFailure>;

    /// ログ出力用のバックエンド名
    fn name(&self) -> &'static str;
}

/// バックエンドの生出力を正規化。空白のみの結果は `Unintelligible`
pub fn normalize_transcript(raw: &str) -> Result<String, RecognitionFailure> {
    let text = raw.trim();
    if text.is_empty() {
        Err(RecognitionFailure::Unintelligible)
    } else {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_backend_output() {
        assert_eq!(normalize_transcript("  hello world \n"), Ok("hello world".into()));
    }

    #[test]
    fn blank_output_is_unintelligible() {
        assert_eq!(normalize_transcript(""), Err(RecognitionFailure::Unintelligible));
        assert_eq!(normalize_transcript(" \t"), Err(RecognitionFailure::Unintelligible));
    }
}
