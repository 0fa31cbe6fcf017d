//! X11 input sink. Synthesizes key events with the XTEST extension.
//!
//! Keysyms are resolved against the server's keyboard mapping on every
//! delivery, so layout changes while the service runs are picked up.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, Keysym, ModMask, Window};
use x11rb::protocol::xtest;
use x11rb::rust_connection::RustConnection;

use super::event::SyntheticEvent;
use super::sink::{InjectionFailure, InputSink};

const XK_SHIFT_L: Keysym = 0xffe1;
const XK_CONTROL_L: Keysym = 0xffe3;
const XK_ALT_L: Keysym = 0xffe9;
const XK_SUPER_L: Keysym = 0xffeb;

/// X11 implementation of [`InputSink`] via `XTestFakeInput`.
pub struct XTestSink {
    conn: RustConnection,
    root: Window,
}

impl XTestSink {
    /// Connect to the display and check that XTEST is available.
    pub fn connect() -> Result<Self, InjectionFailure> {
        let (conn, screen_num) = RustConnection::connect(None)
            .map_err(|e| InjectionFailure::X11(format!("connect failed: {e}")))?;

        let root = conn.setup().roots[screen_num].root;

        let version = xtest::get_version(&conn, 2, 2)
            .map_err(|e| InjectionFailure::X11(format!("XTEST get_version: {e}")))?
            .reply()
            .map_err(|e| InjectionFailure::X11(format!("XTEST unavailable: {e}")))?;

        tracing::debug!(
            screen = screen_num,
            major = version.major_version,
            minor = version.minor_version,
            "XTEST ready"
        );

        Ok(Self { conn, root })
    }

    fn fake_key(&self, kind: u8, keycode: u8) -> Result<(), InjectionFailure> {
        xtest::fake_input(
            &self.conn,
            kind,
            keycode,
            x11rb::CURRENT_TIME,
            self.root,
            0,
            0,
            0,
        )
        .map_err(|e| InjectionFailure::X11(format!("fake_input: {e}")))?
        .ignore_error();
        Ok(())
    }
}

impl InputSink for XTestSink {
    fn enqueue(&self, event: SyntheticEvent) -> Result<(), InjectionFailure> {
        let keymap = Keymap::load(&self.conn)?;

        let key = keymap
            .keycode(event.key)
            .ok_or(InjectionFailure::NoKeycode(event.key))?;
        let modifiers = modifier_keysyms(event.modifiers)
            .into_iter()
            .map(|sym| keymap.keycode(sym).ok_or(InjectionFailure::NoKeycode(sym)))
            .collect::<Result<Vec<u8>, _>>()?;

        for &m in &modifiers {
            self.fake_key(xproto::KEY_PRESS_EVENT, m)?;
        }
        self.fake_key(xproto::KEY_PRESS_EVENT, key)?;
        self.fake_key(xproto::KEY_RELEASE_EVENT, key)?;
        for &m in modifiers.iter().rev() {
            self.fake_key(xproto::KEY_RELEASE_EVENT, m)?;
        }

        self.conn
            .flush()
            .map_err(|e| InjectionFailure::X11(format!("flush: {e}")))?;

        tracing::trace!(when = event.when, keycode = key, ?modifiers, "key event sent");
        Ok(())
    }
}

/// Snapshot of the server's keycode → keysym table.
#[derive(Debug)]
struct Keymap {
    min_keycode: u8,
    keysyms_per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    fn load(conn: &RustConnection) -> Result<Self, InjectionFailure> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;

        let reply = xproto::get_keyboard_mapping(conn, min_keycode, count)
            .map_err(|e| InjectionFailure::X11(format!("get_keyboard_mapping: {e}")))?
            .reply()
            .map_err(|e| InjectionFailure::X11(format!("get_keyboard_mapping reply: {e}")))?;

        Ok(Self {
            min_keycode,
            keysyms_per_keycode: reply.keysyms_per_keycode as usize,
            keysyms: reply.keysyms,
        })
    }

    /// First keycode producing `keysym` at any shift level.
    fn keycode(&self, keysym: Keysym) -> Option<u8> {
        if self.keysyms_per_keycode == 0 {
            return None;
        }
        let index = self
            .keysyms
            .chunks(self.keysyms_per_keycode)
            .position(|syms| syms.contains(&keysym))?;
        u8::try_from(index)
            .ok()
            .and_then(|i| self.min_keycode.checked_add(i))
    }
}

/// Modifier keys to hold for `mask`, in press order.
fn modifier_keysyms(mask: u16) -> Vec<Keysym> {
    [
        (ModMask::CONTROL, XK_CONTROL_L),
        (ModMask::SHIFT, XK_SHIFT_L),
        (ModMask::M1, XK_ALT_L),
        (ModMask::M4, XK_SUPER_L),
    ]
    .into_iter()
    .filter(|(bit, _)| mask & u16::from(*bit) != 0)
    .map(|(_, sym)| sym)
    .collect()
}
