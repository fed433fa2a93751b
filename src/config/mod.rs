//! 設定モジュール（YAML 読み込み）
//!
//! `ConfigSet` はルートディレクトリ配下の複数YAMLファイルを読み込み、
//! 起動時に必要な設定値を型安全に提供します。
mod asr;
mod audio;
mod error;
mod server;
mod whisper;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::audio::WHISPER_SAMPLE_RATE_HZ;

pub use asr::*;
pub use audio::*;
pub use error::ConfigError;
pub use server::*;
pub use whisper::*;

/// 設定ディレクトリを指す環境変数名
pub const CONFIG_DIR_ENV: &str = "VOICE_SERVICE_CONFIG_DIR";

/// すべての設定をひとまとめにした構造体
#[derive(Debug, Clone)]
pub struct ConfigSet {
    pub server: ServerConfig,
    pub audio: AudioProcessingConfig,
    pub asr: AsrPipelineConfig,
    pub whisper: WhisperModelConfig,
    root: PathBuf,
}

impl ConfigSet {
    /// ルートディレクトリから各YAMLを読み込み、値を検証
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root));
        }

        let server = load_yaml(root.join("server.yaml"))?;
        let audio = load_yaml(root.join("audio_processing.yaml"))?;
        let asr = load_yaml(root.join("asr_pipeline.yaml"))?;
        let whisper = load_yaml(root.join("whisper_model.yaml"))?;

        let config = Self {
            server,
            audio,
            asr,
            whisper,
            root,
        };
        config.validate()?;
        Ok(config)
    }

    /// 環境変数（未設定時は `config/`）から設定を読み込み
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from_dir(dir)
    }

    /// 設定ルートのパス（デバッグ等に利用）
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 起動前に検出できる設定ミスを拒否
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("server.bind_addr", e.to_string()))?;

        if self.server.max_message_bytes == 0 {
            return Err(ConfigError::invalid(
                "server.max_message_bytes",
                "must be greater than zero",
            ));
        }

        let input = &self.audio.input;
        if input.sample_rate_hz == 0 {
            return Err(ConfigError::invalid(
                "audio.input.sample_rate_hz",
                "must be greater than zero",
            ));
        }
        if !matches!(input.sample_width_bytes, 1 | 2 | 4) {
            return Err(ConfigError::invalid(
                "audio.input.sample_width_bytes",
                format!("unsupported sample width {}", input.sample_width_bytes),
            ));
        }
        if input.channels == 0 {
            return Err(ConfigError::invalid(
                "audio.input.channels",
                "must be at least one",
            ));
        }

        match self.asr.backend {
            AsrBackend::Http => self.validate_http()?,
            AsrBackend::Whisper => {
                if self.whisper.threads == 0 {
                    return Err(ConfigError::invalid(
                        "whisper.threads",
                        "must be at least one",
                    ));
                }
                if input.sample_rate_hz != WHISPER_SAMPLE_RATE_HZ {
                    return Err(ConfigError::invalid(
                        "audio.input.sample_rate_hz",
                        format!(
                            "whisper backend requires {} Hz, got {}",
                            WHISPER_SAMPLE_RATE_HZ, input.sample_rate_hz
                        ),
                    ));
                }
            }
            AsrBackend::Mock => {}
        }

        Ok(())
    }

    /// HTTPバックエンド固有の検証
    ///
    /// ドレイン上限はリクエストタイムアウト以上でなければならない。
    /// 下回ると処理中のチャンクがドレイン中に中断される。
    fn validate_http(&self) -> Result<(), ConfigError> {
        let service = &self.asr.service;
        if service.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid(
                "asr.service.endpoint",
                "required for the http backend",
            ));
        }
        if service.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "asr.service.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        let drain_ms = self.server.drain_timeout_ms;
        if drain_ms != 0 && drain_ms < service.request_timeout_ms {
            return Err(ConfigError::invalid(
                "server.drain_timeout_ms",
                format!(
                    "{} ms is shorter than asr.service.request_timeout_ms ({} ms); use 0 or a larger value",
                    drain_ms, service.request_timeout_ms
                ),
            ));
        }
        Ok(())
    }
}

/// YAMLファイルを読み込み、型 `T` へデシリアライズ
fn load_yaml<T>(path: PathBuf) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let data = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
}
