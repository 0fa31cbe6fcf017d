//! InputSink trait: where synthesized events are delivered.

use super::event::SyntheticEvent;

/// Event delivery failures. Logged by the listener, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum InjectionFailure {
    #[error("X11: {0}")]
    X11(String),
    #[error("no keycode for keysym 0x{0:04x}")]
    NoKeycode(u32),
}

/// Accepts synthesized events for the application that has input focus.
///
/// Delivery is fire-and-forget: the sink owns the event once `enqueue`
/// returns, and success means "handed to the input system", not
/// "consumed by an application".
pub trait InputSink: Send + Sync {
    fn enqueue(&self, event: SyntheticEvent) -> Result<(), InjectionFailure>;
}
