use clap::Parser;

use crate::config::{DEFAULT_QUEUE_DEPTH, DEFAULT_SETTLE_MS};

#[derive(Parser)]
#[command(
    name = "autopaste",
    about = "Paste text into the focused window through the clipboard"
)]
pub struct PasteCli {
    /// Words to paste, joined with single spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub text: Vec<String>,
}

#[derive(Parser)]
#[command(
    name = "autopasted",
    about = "Inject a paste keystroke whenever the paste channel is signalled"
)]
pub struct ServiceCli {
    /// Pending signals buffered before clients block
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Pause after each injected keystroke, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,
}
