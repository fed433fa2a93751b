//! シャットダウン調停
//!
//! プロセス全体で一度だけ立つフラグ。書き込み側 `ShutdownTrigger` は調停役のみが持ち、
//! 受け手は複製可能な `ShutdownSignal` で待機・参照する。
use std::fmt;

use tokio::sync::watch;
use tracing::{debug, info};

/// 書き込み側（1回だけ有効）
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// 読み取り側
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// 未発火状態のトリガとシグナルを生成
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    /// フラグを立てる。初回のみ true を返し、2回目以降は何もしない
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// シャットダウン要求まで待機
    ///
    /// トリガが発火せずに破棄された場合は永久に待つ。
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let outcome = rx.wait_for(|requested| *requested).await.map(|_| ());
        if outcome.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 受信した終了要求の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Terminate,
    Interrupt,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Terminate => f.write_str("SIGTERM"),
            Termination::Interrupt => f.write_str("SIGINT"),
        }
    }
}

/// SIGTERM / Ctrl-C の待ち受け
///
/// SIGTERM ハンドラは `install` の時点で登録されるため、バインド前に生成すれば
/// 受付開始後に届いたシグナルを取りこぼさない。
pub struct TerminationListener {
    trigger: ShutdownTrigger,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl TerminationListener {
    /// シグナルハンドラを登録。ランタイム内で呼ぶ必要がある
    #[cfg(unix)]
    pub fn install(trigger: ShutdownTrigger) -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm = signal(SignalKind::terminate())?;
        Ok(Self { trigger, sigterm })
    }

    #[cfg(not(unix))]
    pub fn install(trigger: ShutdownTrigger) -> std::io::Result<Self> {
        Ok(Self { trigger })
    }

    /// 最初の要求でトリガを発火する。2回目以降の要求は記録のみ
    pub async fn run(mut self) -> std::io::Result<()> {
        loop {
            let kind = self.next_termination().await?;
            if self.trigger.trigger() {
                info!(signal = %kind, "termination requested, shutting down");
            } else {
                debug!(signal = %kind, "shutdown already in progress");
            }
        }
    }

    #[cfg(unix)]
    async fn next_termination(&mut self) -> std::io::Result<Termination> {
        tokio::select! {
            _ = self.sigterm.recv() => Ok(Termination::Terminate),
            result = tokio::signal::ctrl_c() => result.map(|_| Termination::Interrupt),
        }
    }

    #[cfg(not(unix))]
    async fn next_termination(&mut self) -> std::io::Result<Termination> {
        tokio::signal::ctrl_c().await.map(|_| Termination::Interrupt)
    }
}
