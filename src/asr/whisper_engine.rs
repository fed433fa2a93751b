use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::client::{normalize_transcript, SpeechRecognizer};
use super::error::{AsrError, RecognitionFailure};
use crate::audio::{to_mono, AudioFormat, WHISPER_SAMPLE_RATE_HZ};
use crate::config::WhisperModelConfig;

/// whisper.cpp によるローカル認識
///
/// コンテキストは読み取り専用で共有し、呼び出し毎に state を生成して推論する。
pub struct WhisperRecognizer {
    ctx: Arc<whisper_rs::WhisperContext>,
    cfg: WhisperModelConfig,
}

impl WhisperRecognizer {
    pub fn load(cfg: WhisperModelConfig) -> Result<Self, AsrError> {
        let path = Path::new(&cfg.model_path);
        let path_str = path.to_str().ok_or_else(|| AsrError::Initialization {
            message: "invalid model path".to_string(),
        })?;
        let ctx = whisper_rs::WhisperContext::new(path_str).map_err(|e| {
            AsrError::Initialization {
                message: format!("failed to load whisper model: {e}"),
            }
        })?;
        Ok(Self {
            ctx: Arc::new(ctx),
            cfg,
        })
    }
}

fn transcribe_blocking(
    ctx: &whisper_rs::WhisperContext,
    cfg: &WhisperModelConfig,
    pcm: &[f32],
) -> Result<String, RecognitionFailure> {
    let mut state = ctx
        .create_state()
        .map_err(|e| RecognitionFailure::upstream(format!("failed to create whisper state: {e}")))?;

    let mut params =
        whisper_rs::FullParams::new(whisper_rs::SamplingStrategy::Greedy { best_of: 1 });
    params.set_n_threads(cfg.threads as i32);
    if !cfg.language.eq_ignore_ascii_case("auto") {
        params.set_language(Some(&cfg.language));
    }
    params.set_translate(cfg.translate);
    params.set_print_progress(false);

    state
        .full(params, pcm)
        .map_err(|e| RecognitionFailure::upstream(format!("whisper inference failed: {e}")))?;

    let num = state
        .full_n_segments()
        .map_err(|e| RecognitionFailure::upstream(format!("segment count failed: {e}")))?;
    let mut text = String::new();
    for i in 0..num {
        let segment = state
            .full_get_segment_text(i)
            .map_err(|e| RecognitionFailure::upstream(format!("get segment failed: {e}")))?;
        text.push_str(&segment);
    }
    Ok(text)
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn recognize(
        &self,
        audio: Bytes,
        format: AudioFormat,
    ) -> Result<String, RecognitionFailure> {
        if format.sample_rate_hz != WHISPER_SAMPLE_RATE_HZ {
            return Err(RecognitionFailure::upstream(format!(
                "unsupported sample rate {} Hz (whisper requires {} Hz)",
                format.sample_rate_hz, WHISPER_SAMPLE_RATE_HZ
            )));
        }

        let pcm = to_mono(&audio, format);
        if pcm.is_empty() {
            return Err(RecognitionFailure::Unintelligible);
        }

        let ctx = self.ctx.clone();
        let cfg = self.cfg.clone();
        let text = tokio::task::spawn_blocking(move || transcribe_blocking(&ctx, &cfg, &pcm))
            .await
            .map_err(|e| RecognitionFailure::upstream(format!("inference task failed: {e}")))??;

        normalize_transcript(&text)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}
