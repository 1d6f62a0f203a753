//! On-device animation engine and protocol front end for a 16x16 RGB LED
//! matrix.
//!
//! The crate is organized leaf-first, mirroring the data flow: bytes arrive
//! over a [`transport::Transport`], are tokenized by [`protocol`], mutate the
//! [`pool::AnimationPool`], and are consulted each tick by [`player::Player`]
//! to hand a [`frame::Frame`] to the [`matrix::MatrixDriver`]. [`power`]
//! independently gates whether the matrix rails are energised, and
//! [`mainloop`] ties the whole thing into one 30 ms cooperative tick.
//!
//! Board bring-up (the physical LED string, Bluetooth stack, analog pins,
//! and persistent storage) is out of scope here and expressed purely as
//! capability traits that a concrete board crate implements.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod clock;
pub mod error;
pub mod frame;
pub mod matrix;
pub mod mainloop;
pub mod player;
pub mod pool;
pub mod power;
pub mod prefs;
pub mod protocol;
pub mod transport;

/// Matrix width in pixels.
pub const MATRIX_WIDTH: usize = 16;
/// Matrix height in pixels.
pub const MATRIX_HEIGHT: usize = 16;
/// Bytes per pixel (RGB, 8 bits each).
pub const BYTES_PER_PIXEL: usize = 3;
/// Total pixel bytes in one frame.
pub const FRAME_BYTES: usize = MATRIX_WIDTH * MATRIX_HEIGHT * BYTES_PER_PIXEL;

/// Frame pool capacity (firmware default).
pub const MAX_FRAMES: usize = 16;
/// Animation pool capacity (firmware default).
pub const MAX_ANIMATIONS: usize = 32;

/// Firmware version string reported by `VER`.
pub const FIRMWARE_VERSION: &str = "1.0";

/// Log-and-continue sink for invariant violations that the type system
/// cannot rule out from ring-buffer cursor arithmetic alone. Never panics; callers must still produce *some* safe
/// fallback value at the call site.
pub fn cant_happen(code: &'static str) {
    defmt::error!("cant_happen: {}", code);
}
