//! Synthetic key events and the paste shortcut encoding.
//!
//! [`paste_event`] is the only place that knows what "paste" looks like
//! as a keystroke on this platform.

use std::time::{SystemTime, UNIX_EPOCH};

use x11rb::protocol::xproto::{Keysym, ModMask};

/// XK_v.
pub const XK_V: Keysym = 0x0076;

/// One key-down occurrence handed to an input sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEvent {
    /// Microseconds since the Unix epoch at synthesis time.
    pub when: u64,
    /// Keysym of the key being pressed.
    pub key: Keysym,
    /// X11 modifier mask held during the press.
    pub modifiers: u16,
    /// Pointer button state.
    pub states: u8,
    pub byte: u8,
    pub bytes: String,
    pub raw_char: u32,
}

/// Encode the paste shortcut (Control+V) as a key-down event.
pub fn paste_event(when: u64) -> SyntheticEvent {
    SyntheticEvent {
        when,
        key: XK_V,
        modifiers: u16::from(ModMask::CONTROL),
        states: 0,
        byte: b'v',
        bytes: "v".into(),
        raw_char: u32::from(b'v'),
    }
}

/// Current time in microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
