//! Paste text into the focused window by way of the clipboard.
//!
//! Two processes cooperate. The `autopaste` client swaps the text into
//! the clipboard, signals the paste channel and restores the clipboard.
//! The `autopasted` service owns the channel and answers every signal
//! with one synthesized Control+V.

pub mod channel;
pub mod cli;
pub mod client;
pub mod clipboard;
pub mod config;
pub mod injector;
pub mod service;

use tracing_subscriber::EnvFilter;

/// Install the `RUST_LOG`-driven fmt subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
