//! Input sequence decoder
//!
//! Parses raw terminal input bytes into [`RawEvent`]s: UTF-8 text, C0
//! controls, CSI key sequences with xterm modifiers, SS3 function keys,
//! SGR and X10 mouse reports, and in-band resize reports. Unrecognized
//! but well-formed sequences decode to a zero-kind raw event (which the
//! event layer maps to `Unknown`) rather than an error.

use crate::event::{key, RawEvent, Mod};

/// Longest CSI parameter run accepted before the sequence is dropped.
const MAX_CSI_LEN: usize = 24;

/// Outcome of one parse attempt against the front of the buffer.
enum Parse {
    /// A complete unit consuming this many bytes.
    Event(RawEvent, usize),
    /// Malformed bytes to discard.
    Skip(usize),
    /// The buffer holds the prefix of a longer sequence.
    Incomplete,
    /// Nothing buffered.
    Empty,
}

/// Incremental decoder of terminal input bytes.
///
/// Feed arbitrary chunks with [`InputParser::feed`]; pull complete
/// events with [`InputParser::next_event`]. Sequences split across
/// chunks are held until the rest arrives.
#[derive(Default)]
pub struct InputParser {
    buf: Vec<u8>,
}

impl InputParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Whether undecoded bytes remain (an incomplete sequence prefix).
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Decode the next complete event, or `None` if the buffer is
    /// empty or holds only an incomplete sequence.
    pub fn next_event(&mut self) -> Option<RawEvent> {
        loop {
            match try_parse(&self.buf) {
                Parse::Event(ev, n) => {
                    self.buf.drain(..n);
                    return Some(ev);
                }
                Parse::Skip(n) => {
                    self.buf.drain(..n.min(self.buf.len()));
                }
                Parse::Incomplete | Parse::Empty => return None,
            }
        }
    }

    /// Resolve a pending prefix after the caller decided no more bytes
    /// are coming: a buffered ESC is reported as a bare ESC key press;
    /// any other stuck byte is dropped so decoding can make progress.
    pub fn flush_pending(&mut self) -> Option<RawEvent> {
        if self.buf.first() == Some(&0x1b) {
            self.buf.drain(..1);
            return Some(RawEvent::key(key::ESC, 0, 0));
        }
        if !self.buf.is_empty() {
            self.buf.drain(..1);
        }
        None
    }
}

fn try_parse(buf: &[u8]) -> Parse {
    let Some(&b0) = buf.first() else {
        return Parse::Empty;
    };
    if b0 != 0x1b {
        return parse_plain(buf);
    }
    if buf.len() == 1 {
        return Parse::Incomplete;
    }
    match buf[1] {
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        // ESC followed by a plain unit is that unit with ALT held.
        _ => match parse_plain(&buf[1..]) {
            Parse::Event(mut ev, n) => {
                ev.mods |= Mod::ALT.bits();
                Parse::Event(ev, n + 1)
            }
            Parse::Skip(n) => Parse::Skip(n + 1),
            Parse::Incomplete => Parse::Incomplete,
            Parse::Empty => Parse::Incomplete,
        },
    }
}

/// A unit that is not an escape sequence: a control byte or one UTF-8
/// encoded character.
fn parse_plain(buf: &[u8]) -> Parse {
    let b = buf[0];
    // ESC only reaches here behind another ESC (alt-ESC).
    if b == 0x1b {
        return Parse::Event(RawEvent::key(key::ESC, 0, 0), 1);
    }
    // Control bytes and space report as key codes with no character.
    if b <= 0x20 || b == 0x7f {
        return Parse::Event(RawEvent::key(u16::from(b), 0, 0), 1);
    }
    let Some(len) = utf8_len(b) else {
        return Parse::Skip(1);
    };
    if buf.len() < len {
        return Parse::Incomplete;
    }
    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => {
            let ch = s.chars().next().map(|c| c as u32).unwrap_or(0);
            Parse::Event(RawEvent::key(0, ch, 0), len)
        }
        Err(_) => Parse::Skip(1),
    }
}

fn utf8_len(b: u8) -> Option<usize> {
    if b < 0x80 {
        Some(1)
    } else if b & 0xe0 == 0xc0 {
        Some(2)
    } else if b & 0xf0 == 0xe0 {
        Some(3)
    } else if b & 0xf8 == 0xf0 {
        Some(4)
    } else {
        None
    }
}

/// Parse a CSI sequence; `buf` starts at the ESC.
fn parse_csi(buf: &[u8]) -> Parse {
    let mut params: Vec<u16> = Vec::new();
    let mut current: Option<u16> = None;
    let mut sgr_mouse = false;
    let mut private = false;

    let mut i = 2;
    while i < buf.len() {
        let b = buf[i];
        match b {
            b'0'..=b'9' => {
                let digit = u16::from(b - b'0');
                current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
            }
            b';' => params.push(current.take().unwrap_or(0)),
            b'<' if i == 2 => sgr_mouse = true,
            b'?' | b'>' | b'=' if i == 2 => private = true,
            0x40..=0x7e => {
                if let Some(p) = current.take() {
                    params.push(p);
                }
                return finish_csi(buf, b, &params, sgr_mouse, private, i + 1);
            }
            _ => return Parse::Skip(i + 1),
        }
        i += 1;
        if i - 2 > MAX_CSI_LEN {
            return Parse::Skip(i);
        }
    }
    Parse::Incomplete
}

fn finish_csi(
    buf: &[u8],
    final_byte: u8,
    params: &[u16],
    sgr_mouse: bool,
    private: bool,
    consumed: usize,
) -> Parse {
    // Private-marker sequences (mode reports and the like) are not
    // input events; surface them as an unknown unit.
    if private {
        return Parse::Event(RawEvent::default(), consumed);
    }
    match final_byte {
        b'A' | b'B' | b'C' | b'D' | b'H' | b'F' if !sgr_mouse => {
            let code = match final_byte {
                b'A' => key::ARROW_UP,
                b'B' => key::ARROW_DOWN,
                b'C' => key::ARROW_RIGHT,
                b'D' => key::ARROW_LEFT,
                b'H' => key::HOME,
                _ => key::END,
            };
            let mods = params.get(1).map(|&m| xterm_mods(m)).unwrap_or(0);
            Parse::Event(RawEvent::key(code, 0, mods), consumed)
        }
        b'Z' => Parse::Event(RawEvent::key(key::BACK_TAB, 0, 0), consumed),
        b'~' => {
            let code = match params.first().copied() {
                Some(1) | Some(7) => key::HOME,
                Some(2) => key::INSERT,
                Some(3) => key::DELETE,
                Some(4) | Some(8) => key::END,
                Some(5) => key::PGUP,
                Some(6) => key::PGDN,
                Some(11) => key::F1,
                Some(12) => key::F2,
                Some(13) => key::F3,
                Some(14) => key::F4,
                Some(15) => key::F5,
                Some(17) => key::F6,
                Some(18) => key::F7,
                Some(19) => key::F8,
                Some(20) => key::F9,
                Some(21) => key::F10,
                Some(23) => key::F11,
                Some(24) => key::F12,
                _ => return Parse::Event(RawEvent::default(), consumed),
            };
            let mods = params.get(1).map(|&m| xterm_mods(m)).unwrap_or(0);
            Parse::Event(RawEvent::key(code, 0, mods), consumed)
        }
        // SGR extended mouse report: CSI < Cb ; Cx ; Cy M (press) or m (release).
        b'M' | b'm' if sgr_mouse => {
            if params.len() < 3 {
                return Parse::Event(RawEvent::default(), consumed);
            }
            let cb = params[0] as u8;
            let x = i32::from(params[1]) - 1;
            let y = i32::from(params[2]) - 1;
            Parse::Event(mouse_event(cb, x, y, final_byte == b'm'), consumed)
        }
        // X10 mouse report: CSI M followed by three offset-32 bytes.
        b'M' if params.is_empty() => {
            if buf.len() < consumed + 3 {
                return Parse::Incomplete;
            }
            let cb = buf[consumed].wrapping_sub(32);
            let x = i32::from(buf[consumed + 1]) - 33;
            let y = i32::from(buf[consumed + 2]) - 33;
            Parse::Event(mouse_event(cb, x, y, false), consumed + 3)
        }
        // In-band resize report: CSI 48 ; height ; width ; ... t.
        b't' if params.first() == Some(&48) && params.len() >= 3 => {
            let h = i32::from(params[1]);
            let w = i32::from(params[2]);
            Parse::Event(RawEvent::resize(w, h), consumed)
        }
        _ => Parse::Event(RawEvent::default(), consumed),
    }
}

/// SS3 sequences: ESC O followed by one final byte (F1-F4, application
/// cursor keys).
fn parse_ss3(buf: &[u8]) -> Parse {
    if buf.len() < 3 {
        return Parse::Incomplete;
    }
    let code = match buf[2] {
        b'P' => key::F1,
        b'Q' => key::F2,
        b'R' => key::F3,
        b'S' => key::F4,
        b'A' => key::ARROW_UP,
        b'B' => key::ARROW_DOWN,
        b'C' => key::ARROW_RIGHT,
        b'D' => key::ARROW_LEFT,
        b'H' => key::HOME,
        b'F' => key::END,
        _ => return Parse::Event(RawEvent::default(), 3),
    };
    Parse::Event(RawEvent::key(code, 0, 0), 3)
}

/// xterm encodes modifiers as (bitmask + 1): 1=shift, 2=alt, 4=ctrl.
fn xterm_mods(code: u16) -> u8 {
    let bits = code.saturating_sub(1);
    let mut mods = 0u8;
    if bits & 1 != 0 {
        mods |= Mod::SHIFT.bits();
    }
    if bits & 2 != 0 {
        mods |= Mod::ALT.bits();
    }
    if bits & 4 != 0 {
        mods |= Mod::CTRL.bits();
    }
    mods
}

/// Shared button decode for SGR and X10 reports.
fn mouse_event(cb: u8, x: i32, y: i32, release: bool) -> RawEvent {
    let mut mods = 0u8;
    if cb & 4 != 0 {
        mods |= Mod::SHIFT.bits();
    }
    if cb & 8 != 0 {
        mods |= Mod::ALT.bits();
    }
    if cb & 16 != 0 {
        mods |= Mod::CTRL.bits();
    }
    if cb & 32 != 0 {
        mods |= Mod::MOTION.bits();
    }
    let button = if cb & 64 != 0 {
        if cb & 3 == 0 {
            key::MOUSE_WHEEL_UP
        } else {
            key::MOUSE_WHEEL_DOWN
        }
    } else if release {
        key::MOUSE_RELEASE
    } else {
        match cb & 3 {
            0 => key::MOUSE_LEFT,
            1 => key::MOUSE_MIDDLE,
            2 => key::MOUSE_RIGHT,
            _ => key::MOUSE_RELEASE,
        }
    };
    RawEvent::mouse(button, x, y, mods)
}
