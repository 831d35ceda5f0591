//! Input events
//!
//! Defines the wire-shaped raw event produced by the input decoder and
//! the typed `Event` it is decoded into, along with the key-code and
//! modifier tables.

use bitflags::bitflags;

/// Raw event kind: a key press.
pub const EVENT_KEY: u8 = 1;
/// Raw event kind: the terminal was resized.
pub const EVENT_RESIZE: u8 = 2;
/// Raw event kind: a mouse report.
pub const EVENT_MOUSE: u8 = 3;

bitflags! {
    /// Key/mouse modifier flags.
    ///
    /// Iteration over a decoded set yields flags in ascending bit-value
    /// order, so tests can assert exact membership.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Mod: u8 {
        const ALT    = 0x01;
        const CTRL   = 0x02;
        const SHIFT  = 0x04;
        const MOTION = 0x08;
    }
}

/// Key codes reported in the `key` field of key and mouse events.
///
/// Control keys use their byte value; special keys count down from
/// `0xffff` so they can never collide with a Unicode codepoint that
/// fits in the `ch` field instead.
pub mod key {
    pub const CTRL_TILDE: u16 = 0x00;
    pub const CTRL_A: u16 = 0x01;
    pub const CTRL_B: u16 = 0x02;
    pub const CTRL_C: u16 = 0x03;
    pub const CTRL_D: u16 = 0x04;
    pub const CTRL_E: u16 = 0x05;
    pub const CTRL_F: u16 = 0x06;
    pub const CTRL_G: u16 = 0x07;
    pub const BACKSPACE: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const CTRL_J: u16 = 0x0a;
    pub const CTRL_K: u16 = 0x0b;
    pub const CTRL_L: u16 = 0x0c;
    pub const ENTER: u16 = 0x0d;
    pub const CTRL_N: u16 = 0x0e;
    pub const CTRL_O: u16 = 0x0f;
    pub const CTRL_P: u16 = 0x10;
    pub const CTRL_Q: u16 = 0x11;
    pub const CTRL_R: u16 = 0x12;
    pub const CTRL_S: u16 = 0x13;
    pub const CTRL_T: u16 = 0x14;
    pub const CTRL_U: u16 = 0x15;
    pub const CTRL_V: u16 = 0x16;
    pub const CTRL_W: u16 = 0x17;
    pub const CTRL_X: u16 = 0x18;
    pub const CTRL_Y: u16 = 0x19;
    pub const CTRL_Z: u16 = 0x1a;
    pub const ESC: u16 = 0x1b;
    pub const CTRL_BACKSLASH: u16 = 0x1c;
    pub const CTRL_RSQ_BRACKET: u16 = 0x1d;
    pub const CTRL_6: u16 = 0x1e;
    pub const CTRL_SLASH: u16 = 0x1f;
    pub const SPACE: u16 = 0x20;
    pub const BACKSPACE2: u16 = 0x7f;

    pub const F1: u16 = 0xffff;
    pub const F2: u16 = 0xffff - 1;
    pub const F3: u16 = 0xffff - 2;
    pub const F4: u16 = 0xffff - 3;
    pub const F5: u16 = 0xffff - 4;
    pub const F6: u16 = 0xffff - 5;
    pub const F7: u16 = 0xffff - 6;
    pub const F8: u16 = 0xffff - 7;
    pub const F9: u16 = 0xffff - 8;
    pub const F10: u16 = 0xffff - 9;
    pub const F11: u16 = 0xffff - 10;
    pub const F12: u16 = 0xffff - 11;
    pub const INSERT: u16 = 0xffff - 12;
    pub const DELETE: u16 = 0xffff - 13;
    pub const HOME: u16 = 0xffff - 14;
    pub const END: u16 = 0xffff - 15;
    pub const PGUP: u16 = 0xffff - 16;
    pub const PGDN: u16 = 0xffff - 17;
    pub const ARROW_UP: u16 = 0xffff - 18;
    pub const ARROW_DOWN: u16 = 0xffff - 19;
    pub const ARROW_LEFT: u16 = 0xffff - 20;
    pub const ARROW_RIGHT: u16 = 0xffff - 21;
    pub const BACK_TAB: u16 = 0xffff - 22;
    pub const MOUSE_LEFT: u16 = 0xffff - 23;
    pub const MOUSE_RIGHT: u16 = 0xffff - 24;
    pub const MOUSE_MIDDLE: u16 = 0xffff - 25;
    pub const MOUSE_RELEASE: u16 = 0xffff - 26;
    pub const MOUSE_WHEEL_UP: u16 = 0xffff - 27;
    pub const MOUSE_WHEEL_DOWN: u16 = 0xffff - 28;
}

/// The uniform wire shape every decoded input unit is carried in.
///
/// Fields that do not apply to a given kind stay at their zero default,
/// keeping the shape identical across kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u8,
    pub mods: u8,
    pub key: u16,
    pub ch: u32,
    pub w: i32,
    pub h: i32,
    pub x: i32,
    pub y: i32,
}

impl RawEvent {
    pub fn key(key: u16, ch: u32, mods: u8) -> Self {
        Self {
            kind: EVENT_KEY,
            mods,
            key,
            ch,
            ..Self::default()
        }
    }

    pub fn mouse(key: u16, x: i32, y: i32, mods: u8) -> Self {
        Self {
            kind: EVENT_MOUSE,
            mods,
            key,
            x,
            y,
            ..Self::default()
        }
    }

    pub fn resize(w: i32, h: i32) -> Self {
        Self {
            kind: EVENT_RESIZE,
            w,
            h,
            ..Self::default()
        }
    }
}

/// A decoded terminal input event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A key press. `ch` is present exactly when the raw codepoint is
    /// nonzero (printable keys); special keys carry a `key` code only.
    Key { mods: Mod, key: u16, ch: Option<char> },
    /// A mouse report. `key` identifies the button or wheel action;
    /// coordinates are zero-based cells.
    Mouse { mods: Mod, key: u16, x: i32, y: i32 },
    /// The terminal changed size.
    Resize { w: i32, h: i32 },
    /// Anything the decoder does not recognize. Never an error.
    Unknown,
}

impl Event {
    /// Decode a raw event. Unrecognized kinds map to [`Event::Unknown`].
    pub fn from_raw(raw: &RawEvent) -> Self {
        match raw.kind {
            EVENT_KEY => Event::Key {
                mods: Mod::from_bits_truncate(raw.mods),
                key: raw.key,
                ch: if raw.ch == 0 {
                    None
                } else {
                    char::from_u32(raw.ch)
                },
            },
            EVENT_RESIZE => Event::Resize { w: raw.w, h: raw.h },
            EVENT_MOUSE => Event::Mouse {
                mods: Mod::from_bits_truncate(raw.mods),
                key: raw.key,
                x: raw.x,
                y: raw.y,
            },
            _ => Event::Unknown,
        }
    }
}
