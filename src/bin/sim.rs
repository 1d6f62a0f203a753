//! Host simulator: drives the protocol dispatcher and player from stdin,
//! rendering the matrix to stdout as a block of ANSI-colored cells. A
//! development aid for exercising the dispatcher without real hardware,
//! over a terminal instead of a framebuffer.

use std::io::{self, BufRead, Write};

use blinkenlights_fw::clock::{Clock, MonotonicMillis};
use blinkenlights_fw::matrix::{LedStrip, MatrixDriver, Rotation};
use blinkenlights_fw::player::Player;
use blinkenlights_fw::power::PowerController;
use blinkenlights_fw::prefs::MemoryPreferenceStore;
use blinkenlights_fw::protocol::{DispatchContext, Dispatcher};
use blinkenlights_fw::{MATRIX_HEIGHT, MATRIX_WIDTH};

/// Prints each `flush()` as a 16x16 grid of truecolor terminal cells.
struct TerminalStrip {
    pixels: [(u8, u8, u8); MATRIX_WIDTH * MATRIX_HEIGHT],
}

impl TerminalStrip {
    fn new() -> Self {
        TerminalStrip { pixels: [(0, 0, 0); MATRIX_WIDTH * MATRIX_HEIGHT] }
    }
}

impl LedStrip for TerminalStrip {
    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) {
        self.pixels[index] = (r, g, b);
    }

    fn flush(&mut self) {
        // Cursor home plus redraw, so the grid updates in place.
        print!("\x1b[H");
        for row in 0..MATRIX_HEIGHT {
            for col in 0..MATRIX_WIDTH {
                let (r, g, b) = self.pixels[row * MATRIX_WIDTH + col];
                print!("\x1b[48;2;{};{};{}m  ", r, g, b);
            }
            println!("\x1b[0m");
        }
        let _ = io::stdout().flush();
    }

    fn set_brightness(&mut self, _brightness: u8) {}
    fn set_dither(&mut self, _on: bool) {}
    fn set_color_correction(&mut self, _r: u8, _g: u8, _b: u8) {}
}

fn main() {
    println!("blinkenlights-fw simulator. Type protocol lines, Ctrl-D to quit.");

    let mut player = Player::new();
    let mut matrix = MatrixDriver::new(Rotation::Deg0);
    let mut dispatcher = Dispatcher::new();
    let mut power = PowerController::new();
    let mut prefs = MemoryPreferenceStore::new();
    let mut clock = MonotonicMillis::new();
    let mut strip = TerminalStrip::new();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let now_ms = clock.now_ms();

        let mut ctx = DispatchContext {
            pool: player.pool_mut(),
            matrix: &mut matrix,
            power: &mut power,
            prefs: &mut prefs,
            now_ms,
        };
        for byte in line.bytes().chain(std::iter::once(b'\n')) {
            if let Some(resp) = dispatcher.feed_byte(byte, &mut ctx) {
                println!("{}", resp.as_str());
            }
        }

        matrix.apply_config(&mut strip);
        if dispatcher.matrix_clear_pending {
            matrix.clear(&mut strip);
            dispatcher.matrix_clear_pending = false;
        }
        let frame = player.current_frame(&mut clock);
        matrix.render(frame, &mut strip);
    }
}
