#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use voice_transcribe_service::asr::{
    normalize_transcript, RecognitionFailure, SharedRecognizer, SpeechRecognizer,
};
use voice_transcribe_service::audio::AudioFormat;
use voice_transcribe_service::server::{Server, ServerState};
use voice_transcribe_service::session::{SessionHandler, TranscriptMessage, DEFAULT_MAX_MESSAGE_BYTES};
use voice_transcribe_service::shutdown::{self, ShutdownTrigger};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const WAIT: Duration = Duration::from_secs(5);

/// ペイロードをUTF-8の「発話内容」として扱うテスト用認識器
///
/// - 全バイト0（空を含む）: 無音 → `Unintelligible`
/// - `fail:<理由>`: `UpstreamUnavailable`
/// - `hold:<text>`: `entered` を通知し、`release` まで待ってから `<text>` を返す
/// - それ以外: その文字列
#[derive(Default)]
pub struct PhraseRecognizer {
    pub entered: Notify,
    pub release: Notify,
    pub calls: AtomicUsize,
}

impl PhraseRecognizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for PhraseRecognizer {
    async fn recognize(
        &self,
        audio: Bytes,
        _format: AudioFormat,
    ) -> Result<String, RecognitionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if audio.iter().all(|b| *b == 0) {
            return Err(RecognitionFailure::Unintelligible);
        }

        let text = String::from_utf8_lossy(&audio).into_owned();
        if let Some(reason) = text.strip_prefix("fail:") {
            return Err(RecognitionFailure::upstream(reason));
        }
        if let Some(rest) = text.strip_prefix("hold:") {
            self.entered.notify_one();
            self.release.notified().await;
            return normalize_transcript(rest);
        }
        normalize_transcript(&text)
    }

    fn name(&self) -> &'static str {
        "phrase"
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub trigger: ShutdownTrigger,
    pub state: watch::Receiver<ServerState>,
    pub task: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub async fn wait_for_state(&mut self, wanted: ServerState) {
        timeout(WAIT, self.state.wait_for(|s| *s == wanted))
            .await
            .expect("state change timed out")
            .expect("server state channel closed");
    }

    pub async fn stopped(self) {
        timeout(WAIT, self.task)
            .await
            .expect("server did not stop")
            .expect("server task failed");
    }
}

pub async fn start(recognizer: SharedRecognizer) -> TestServer {
    start_with(recognizer, DEFAULT_MAX_MESSAGE_BYTES, None).await
}

pub async fn start_with(
    recognizer: SharedRecognizer,
    max_message_bytes: usize,
    drain_timeout: Option<Duration>,
) -> TestServer {
    let (trigger, signal) = shutdown::channel();
    let handler = SessionHandler::new(recognizer, AudioFormat::default(), signal.clone())
        .with_max_message_bytes(max_message_bytes);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Server::from_listener(listener, handler)
        .unwrap()
        .with_drain_timeout(drain_timeout);
    let addr = server.local_addr();
    let state = server.state();
    let task = tokio::spawn(server.run(signal));

    TestServer {
        addr,
        trigger,
        state,
        task,
    }
}

pub async fn connect(url: &str) -> Client {
    let (ws, _resp) = timeout(WAIT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect ok");
    ws
}

pub fn chunk(text: &str) -> Message {
    Message::Binary(text.as_bytes().to_vec())
}

pub fn silence(len: usize) -> Message {
    Message::Binary(vec![0; len])
}

/// 次のテキストメッセージ（生JSON）
pub async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("no message within timeout")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

pub async fn next_transcript(ws: &mut Client) -> String {
    let text = next_text(ws).await;
    let message: TranscriptMessage = serde_json::from_str(&text).expect("transcript json");
    message.transcript
}

/// 接続が閉じられるまで読み進め、クローズフレームがあれば返す
pub async fn expect_closed(ws: &mut Client) -> Option<CloseFrame<'static>> {
    loop {
        match timeout(WAIT, ws.next()).await.expect("connection stayed open") {
            Some(Ok(Message::Close(frame))) => return frame,
            Some(Ok(Message::Text(text))) => panic!("unexpected transcript: {text}"),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}
