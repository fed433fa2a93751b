pub mod asr;
pub mod audio;
pub mod config;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ConfigSet;
