use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voice_transcribe_service::asr::build_recognizer;
use voice_transcribe_service::config::ConfigSet;
use voice_transcribe_service::server;
use voice_transcribe_service::session::SessionHandler;
use voice_transcribe_service::shutdown::{self, TerminationListener};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match ConfigSet::load_from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = ?err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    info!(root = ?config.root(), "configuration loaded");

    let recognizer = match build_recognizer(&config) {
        Ok(recognizer) => recognizer,
        Err(err) => {
            error!(error = %err, "failed to initialize recognizer");
            std::process::exit(1);
        }
    };

    let (trigger, signal) = shutdown::channel();
    let format = config.audio.format();
    info!(
        sample_rate_hz = format.sample_rate_hz,
        sample_width_bytes = format.sample_width_bytes,
        channels = format.channels,
        "expecting raw PCM audio chunks"
    );
    let handler = SessionHandler::new(recognizer, format, signal.clone())
        .with_max_message_bytes(config.server.max_message_bytes);

    let termination = match TerminationListener::install(trigger) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to install termination signal handlers");
            std::process::exit(1);
        }
    };
    tokio::spawn(async move {
        if let Err(e) = termination.run().await {
            error!(error = %e, "failed to listen for termination signals");
        }
    });

    let bind_addr = config.server.bind_addr.clone();
    info!(addr = %bind_addr, "starting websocket transcription server");
    if let Err(e) =
        server::bind_and_run(&bind_addr, handler, signal, config.server.drain_timeout()).await
    {
        error!(error = %e, "failed to start server");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}
