//! 接続受付とライフサイクル管理
//!
//! 状態遷移: `Starting → Accepting → Draining → Stopped`
//! - 受け付けた接続ごとに `SessionHandler` をタスクとして起動し、`JoinSet` で追跡
//! - シャットダウン要求で受付を止め、リスナを解放してから既存セッションを待つ
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::session::SessionHandler;
use crate::shutdown::ShutdownSignal;

/// 一時的な accept エラー後の待機時間
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read local address: {0}")]
    LocalAddr(std::io::Error),
}

/// サーバ全体の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Accepting,
    Draining,
    Stopped,
}

/// WebSocket文字起こしサーバ
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: SessionHandler,
    drain_timeout: Option<Duration>,
    state: watch::Sender<ServerState>,
}

impl Server {
    /// 指定アドレスにバインド。失敗は致命的エラーとして呼び出し元へ返す
    pub async fn bind(bind_addr: &str, handler: SessionHandler) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        Self::from_listener(listener, handler)
    }

    /// 既存の`TcpListener`から生成（テストでも使用）
    pub fn from_listener(listener: TcpListener, handler: SessionHandler) -> Result<Self, ServerError> {
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        let (state, _) = watch::channel(ServerState::Starting);
        Ok(Self {
            listener,
            local_addr,
            handler,
            drain_timeout: None,
            state,
        })
    }

    /// シャットダウン後にセッションを待つ上限。経過後は残りを中断する
    pub fn with_drain_timeout(mut self, drain_timeout: Option<Duration>) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 状態遷移の購読
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// シャットダウンまで接続を受け付け、ドレイン完了後に戻る
    pub async fn run(self, shutdown: ShutdownSignal) {
        let Server {
            listener,
            local_addr,
            handler,
            drain_timeout,
            state,
        } = self;

        let mut sessions = JoinSet::new();
        state.send_replace(ServerState::Accepting);
        info!("voice transcription service running on ws://{}", local_addr);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    reap(joined);
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, active = sessions.len() + 1, "accepted tcp connection");
                        let handler = handler.clone();
                        sessions.spawn(async move {
                            handler.serve(stream, peer).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        // 新規接続を拒否するため、待機前にリスナを解放する
        drop(listener);
        state.send_replace(ServerState::Draining);
        info!(active = sessions.len(), "listener closed, draining sessions");

        match drain_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, drain(&mut sessions)).await.is_err() {
                    warn!(
                        remaining = sessions.len(),
                        timeout_ms = limit.as_millis() as u64,
                        "drain timeout elapsed, aborting remaining sessions"
                    );
                    sessions.abort_all();
                    drain(&mut sessions).await;
                }
            }
            None => drain(&mut sessions).await,
        }

        state.send_replace(ServerState::Stopped);
        info!("server stopped");
    }
}

async fn drain(sessions: &mut JoinSet<()>) {
    while let Some(joined) = sessions.join_next().await {
        reap(joined);
    }
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("session aborted"),
        Err(e) => error!(error = %e, "session task panicked"),
    }
}

/// 指定アドレスにバインドしてシャットダウンまで実行
pub async fn bind_and_run(
    bind_addr: &str,
    handler: SessionHandler,
    shutdown: ShutdownSignal,
    drain_timeout: Option<Duration>,
) -> Result<(), ServerError> {
    let server = Server::bind(bind_addr, handler)
        .await?
        .with_drain_timeout(drain_timeout);
    server.run(shutdown).await;
    Ok(())
}

/// 既存の`TcpListener`でシャットダウンまで実行（テストでも使用）
pub async fn run_with_listener(
    listener: TcpListener,
    handler: SessionHandler,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    Server::from_listener(listener, handler)?.run(shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::asr::MockRecognizer;
    use crate::audio::AudioFormat;
    use crate::config::MockConfig;
    use crate::shutdown;

    fn handler(signal: ShutdownSignal) -> SessionHandler {
        SessionHandler::new(
            Arc::new(MockRecognizer::new(&MockConfig::default())),
            AudioFormat::default(),
            signal,
        )
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let (_trigger, signal) = shutdown::channel();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = Server::bind(&addr, handler(signal))
            .await
            .err()
            .expect("second bind must fail");
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn idle_server_walks_through_every_state() {
        let (trigger, signal) = shutdown::channel();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::from_listener(listener, handler(signal.clone())).unwrap();
        let mut state = server.state();
        assert_eq!(*state.borrow(), ServerState::Starting);

        let task = tokio::spawn(server.run(signal));
        state
            .wait_for(|s| *s == ServerState::Accepting)
            .await
            .unwrap();

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server stops")
            .unwrap();
        assert_eq!(*state.borrow(), ServerState::Stopped);
    }
}
