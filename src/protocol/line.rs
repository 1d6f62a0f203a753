//! Bounded line buffer: bytes accumulate until `\n`, at which point the
//! accumulated line is handed back for tokenizing.

use arrayvec::ArrayString;

/// Line buffer capacity; at least 100 bytes for the longest valid command
/// line (`RGB` plus a full hex row).
pub const LINE_CAPACITY: usize = 100;

/// What happened as a result of feeding one byte into the buffer.
pub enum LineEvent {
    /// A complete line, with any trailing `\r` already stripped.
    Line(ArrayString<LINE_CAPACITY>),
    /// The line exceeded [`LINE_CAPACITY`] before its terminating `\n`.
    TooLong,
}

/// Accumulates bytes into lines, capped at [`LINE_CAPACITY`].
#[derive(Default)]
pub struct LineBuffer {
    buf: ArrayString<LINE_CAPACITY>,
    overflowed: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        LineBuffer { buf: ArrayString::new(), overflowed: false }
    }

    /// Feeds one byte. Returns `Some` exactly when a `\n` completes (or
    /// overflows) the current line; the buffer is cleared either way.
    pub fn push_byte(&mut self, byte: u8) -> Option<LineEvent> {
        if byte == b'\n' {
            let overflowed = self.overflowed;
            self.overflowed = false;
            if overflowed {
                self.buf.clear();
                return Some(LineEvent::TooLong);
            }
            let line = self.buf;
            self.buf.clear();
            return Some(LineEvent::Line(line));
        }

        // Ignored rather than buffered: a maximal-length line (e.g. a full
        // `RGB` row) plus `\r\n` would otherwise overflow the buffer by one
        // byte before the `\r` could be stripped at `\n` time.
        if byte == b'\r' {
            return None;
        }

        if self.overflowed {
            return None; // discard until the next newline
        }

        // Non-ASCII bytes can't appear in a well-formed command line; stash
        // them as a replacement so the overflow/length accounting still
        // works, and let tokenizing/dispatch reject the resulting garbage.
        let c = byte as char;
        if self.buf.try_push(c).is_err() {
            self.overflowed = true;
        }
        None
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}
