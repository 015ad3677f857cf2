//! Tracing setup shared by Warden binaries
//!
//! Library code only emits `tracing` events; subscribers are installed by
//! whatever process embeds the session (the CLI, a host application, tests).

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::init_tracing;
