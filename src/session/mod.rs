//! 接続ごとの文字起こしセッション
//!
//! 1接続 = 1タスク。受信した音声チャンクを1つずつ認識し、成功した結果だけを
//! 到着順に `{"transcript": "..."}` として返す。認識失敗はこの境界で吸収され、
//! セッションを終了させるのはトランスポートの切断（またはシャットダウン）のみ。
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::asr::{RecognitionFailure, SharedRecognizer};
use crate::audio::AudioFormat;
use crate::shutdown::ShutdownSignal;

/// 受信メッセージの既定上限（1 MiB）
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1 << 20;

/// シャットダウン時にクローズ応答を待つ上限
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// クライアントへ送る認識結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub transcript: String,
}

/// セッション終了理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// クライアントがクローズフレームを送った、またはストリームが終端した
    PeerClosed,
    /// 受信中のトランスポートエラー（異常切断を含む）
    TransportError(String),
    /// 結果の書き込みに失敗した
    WriteFailed(String),
    /// 待機中にシャットダウンを検知した
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => f.write_str("closed by peer"),
            SessionEnd::TransportError(e) => write!(f, "transport error: {e}"),
            SessionEnd::WriteFailed(e) => write!(f, "write failed: {e}"),
            SessionEnd::Shutdown => f.write_str("server shutdown"),
        }
    }
}

/// セッション単位の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub units_received: u64,
    pub transcripts_sent: u64,
    pub unintelligible: u64,
    pub upstream_failures: u64,
    /// シャットダウン時に未処理のまま破棄したチャンク数
    pub discarded: u64,
}

/// 1接続の受信→認識→応答ループを駆動するハンドラ
///
/// 認識ハンドルは全セッションで共有し、それ以外の状態は持たない。
#[derive(Clone)]
pub struct SessionHandler {
    recognizer: SharedRecognizer,
    format: AudioFormat,
    ws_config: WebSocketConfig,
    shutdown: ShutdownSignal,
}

impl SessionHandler {
    pub fn new(recognizer: SharedRecognizer, format: AudioFormat, shutdown: ShutdownSignal) -> Self {
        Self {
            recognizer,
            format,
            ws_config: message_limits(DEFAULT_MAX_MESSAGE_BYTES),
            shutdown,
        }
    }

    /// 1メッセージの上限を変更。超過したメッセージはプロトコルエラーとして接続を閉じる
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.ws_config = message_limits(max_message_bytes);
        self
    }

    /// 受け付けたTCPストリームでハンドシェイクを行い、セッションを最後まで処理
    pub async fn serve<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let session_id = Uuid::new_v4();
        let span = info_span!("session", %session_id, %peer);

        async move {
            let handshake = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    debug!("shutdown before websocket handshake completed");
                    return;
                }
                handshake = accept_async_with_config(stream, Some(self.ws_config)) => handshake,
            };
            let ws = match handshake {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(error = %e, "websocket handshake failed");
                    return;
                }
            };

            info!(recognizer = self.recognizer.name(), "connection established for voice transcription");
            let (end, summary) = self.run(ws).await;
            info!(
                reason = %end,
                units = summary.units_received,
                transcripts = summary.transcripts_sent,
                unintelligible = summary.unintelligible,
                upstream_failures = summary.upstream_failures,
                discarded = summary.discarded,
                "connection for voice transcription closed"
            );
        }
        .instrument(span)
        .await
    }

    /// ハンドシェイク済みの接続でループを実行し、終了理由と集計を返す
    ///
    /// チャンクは厳密に逐次処理され、処理中のチャンクはシャットダウンで中断されない。
    pub async fn run<S>(&self, ws: WebSocketStream<S>) -> (SessionEnd, SessionSummary)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();
        let mut summary = SessionSummary::default();

        let end = loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    let frame = CloseFrame {
                        code: CloseCode::Away,
                        reason: "server shutting down".into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        debug!(error = %e, "failed to send close frame");
                    }
                    summary.discarded = discard_until_closed(&mut stream).await;
                    if summary.discarded > 0 {
                        debug!(discarded = summary.discarded, "unprocessed audio dropped at shutdown");
                    }
                    break SessionEnd::Shutdown;
                }
                next = stream.next() => next,
            };

            let audio = match next {
                Some(Ok(Message::Binary(data))) => Bytes::from(data),
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "ignoring text message, audio must be binary");
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "close frame received");
                    break SessionEnd::PeerClosed;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => break SessionEnd::TransportError(e.to_string()),
                None => break SessionEnd::PeerClosed,
            };

            summary.units_received += 1;
            let Some(reply) = self.process_unit(audio, &mut summary).await else {
                continue;
            };
            if let Err(e) = sink.send(Message::Text(reply)).await {
                break SessionEnd::WriteFailed(e.to_string());
            }
            summary.transcripts_sent += 1;
        };

        // 相手側のクローズに応答し、接続を解放する
        let _ = sink.close().await;
        (end, summary)
    }

    /// 1チャンクを認識し、送信すべきJSONを返す。失敗時は診断ログのみ
    async fn process_unit(&self, audio: Bytes, summary: &mut SessionSummary) -> Option<String> {
        let unit = summary.units_received;
        let bytes = audio.len();

        match self.recognizer.recognize(audio, self.format).await {
            Ok(transcript) => {
                info!(unit, %transcript, "recognized");
                match serde_json::to_string(&TranscriptMessage { transcript }) {
                    Ok(json) => Some(json),
                    Err(e) => {
                        warn!(unit, error = %e, "failed to encode transcript");
                        None
                    }
                }
            }
            Err(RecognitionFailure::Unintelligible) => {
                summary.unintelligible += 1;
                info!(unit, bytes, "could not understand audio");
                None
            }
            Err(RecognitionFailure::UpstreamUnavailable { message }) => {
                summary.upstream_failures += 1;
                warn!(unit, bytes, error = %message, "recognition service error");
                None
            }
        }
    }
}

/// クローズ送信後、相手の応答まで読み捨てて破棄したバイナリの数を返す
async fn discard_until_closed<S>(stream: &mut SplitStream<WebSocketStream<S>>) -> u64
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut discarded = 0;
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Binary(_) => discarded += 1,
                Message::Close(_) => break,
                _ => {}
            }
        }
    })
    .await;
    discarded
}

fn message_limits(max_message_bytes: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_bytes);
    config.max_frame_size = Some(max_message_bytes);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_message_has_single_key() {
        let json = serde_json::to_string(&TranscriptMessage {
            transcript: "hello".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"transcript":"hello"}"#);
    }

    #[test]
    fn end_reason_is_readable() {
        assert_eq!(SessionEnd::PeerClosed.to_string(), "closed by peer");
        assert_eq!(
            SessionEnd::WriteFailed("broken pipe".into()).to_string(),
            "write failed: broken pipe"
        );
    }
}
