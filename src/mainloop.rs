//! The single cooperative tick that ties every other module together: power
//! sampling, pairing UI, playback, and the wire protocol all run from one
//! `MainLoop::tick` call, so there is exactly one place that holds every
//! piece of state and exposes borrowed references to the rest.

use crate::clock::Clock;
use crate::frame::Frame;
use crate::matrix::{LedStrip, MatrixDriver, Rotation};
use crate::player::Player;
use crate::power::{CcSample, PowerController, PowerRail, StatusLed};
use crate::prefs::{unpack_color_correction, PrefKey, PreferenceStore};
use crate::protocol::dispatch::{self, DispatchContext, Dispatcher};
use crate::transport::{PairingState, Transport, TransportMux};

/// Base tick budget; shortened to 15 ms while the power controller is
/// debouncing a CC-pin change, per the USB-C compliance window.
const BASE_TICK_BUDGET_MS: u32 = 30;
const DEBOUNCE_TICK_BUDGET_MS: u32 = 15;

/// The three capacitive touch inputs: a simultaneous hold starts pairing,
/// and a single press confirms the pairing PIN.
pub trait ButtonPad {
    /// `true` while all three pairing buttons are held down.
    fn pairing_buttons_held(&mut self) -> bool;
    /// Edge-triggered: `true` at most once per physical press.
    fn confirm_pressed(&mut self) -> bool;
}

/// Owns every piece of state the firmware needs across ticks. Board
/// bring-up is injected through capability traits at each `tick` call rather
/// than stored, since those handles are often singletons the caller already
/// owns (peripherals, not data).
pub struct MainLoop<W, B, P> {
    player: Player,
    matrix: MatrixDriver,
    dispatcher: Dispatcher,
    power: PowerController,
    transport: TransportMux<W, B>,
    prefs: P,
}

impl<W: Transport, B: Transport, P: PreferenceStore> MainLoop<W, B, P> {
    pub const fn new(wired: W, wireless: B, prefs: P) -> Self {
        MainLoop {
            player: Player::new(),
            matrix: MatrixDriver::new(Rotation::Deg0),
            dispatcher: Dispatcher::new(),
            power: PowerController::new(),
            transport: TransportMux::new(wired, wireless),
            prefs,
        }
    }

    /// Restores rotation, color correction, brightness, dither, and the
    /// power override from the preference store. Call once at boot.
    pub fn load_preferences(&mut self) {
        if let Some(v) = self.prefs.get(PrefKey::Rotation) {
            if let Some(r) = dispatch::rotation_from_pref(v) {
                self.matrix.set_rotation(r);
            }
        }
        if let Some(v) = self.prefs.get(PrefKey::ColorCorrection) {
            let (r, g, b) = unpack_color_correction(v);
            self.matrix.set_color_correction(r, g, b);
        }
        if let Some(v) = self.prefs.get(PrefKey::Dim) {
            if v <= 255 {
                self.matrix.set_brightness(v as u8);
            }
        }
        if let Some(v) = self.prefs.get(PrefKey::Dither) {
            self.matrix.set_dither(v != 0);
        }
        if let Some(v) = self.prefs.get(PrefKey::PowerOverride) {
            self.power.set_override(dispatch::current_budget_from_pref(v));
        }
    }

    /// One cooperative iteration. Returns how many milliseconds the caller
    /// should sleep before the next call.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        now_ms: u32,
        clock: &mut impl Clock,
        buttons: &mut impl ButtonPad,
        cc: &mut impl CcSample,
        rail: &mut impl PowerRail,
        status_led: &mut impl StatusLed,
        strip: &mut impl LedStrip,
    ) -> u32 {
        self.power.update(now_ms, cc);
        self.power.apply(rail);
        self.power.drive_status_led(now_ms, status_led);

        let held = buttons.pairing_buttons_held();
        self.transport.update_pairing_hold(now_ms, held);
        // Read the state before transitioning it, so the tick that first
        // detects a hold still renders the BT logo for it rather than
        // jumping straight to the pairing-PIN display.
        let display_state = self.transport.pairing_state();
        if display_state == PairingState::HoldDetected {
            self.transport.begin_pairing();
        }

        match display_state {
            PairingState::HoldDetected => {
                self.matrix.apply_config(strip);
                self.matrix.render(&bt_logo_frame(), strip);
            }
            PairingState::Pairing => {
                if buttons.confirm_pressed() {
                    self.transport.confirm_pairing();
                }
                self.matrix.apply_config(strip);
                self.matrix.render(&pairing_pin_frame(), strip);
            }
            PairingState::Idle | PairingState::Paired => {
                self.service_protocol(now_ms);
                self.matrix.apply_config(strip);
                if self.dispatcher.matrix_clear_pending {
                    self.matrix.clear(strip);
                    self.dispatcher.matrix_clear_pending = false;
                }
                let frame = self.player.current_frame(clock);
                self.matrix.render(frame, strip);
            }
        }

        if self.power.is_debouncing() {
            DEBOUNCE_TICK_BUDGET_MS
        } else {
            BASE_TICK_BUDGET_MS
        }
    }

    /// Drains every byte currently available on the active transport,
    /// writing back one `ACK`/`NAK` line per completed command — before the
    /// next line is read, per the ordering guarantee on response emission.
    fn service_protocol(&mut self, now_ms: u32) {
        let mut ctx = DispatchContext {
            pool: self.player.pool_mut(),
            matrix: &mut self.matrix,
            power: &mut self.power,
            prefs: &mut self.prefs,
            now_ms,
        };
        while self.transport.available() > 0 {
            let Some(byte) = self.transport.read_byte() else { break };
            if let Some(resp) = self.dispatcher.feed_byte(byte, &mut ctx) {
                self.transport.write_str(resp.as_str());
                self.transport.write_str("\n");
            }
        }
    }
}

/// Stand-in for the Bluetooth logo shown while a pairing hold has been
/// detected but pairing hasn't formally begun. The exact glyph is a
/// board/branding concern; a solid swatch carries the state-machine
/// behavior without depending on a font.
fn bt_logo_frame() -> Frame {
    solid_frame(0, 0x40, 0xFF)
}

/// Stand-in for the pairing-PIN display. See [`bt_logo_frame`].
fn pairing_pin_frame() -> Frame {
    solid_frame(0xFF, 0x00, 0xFF)
}

fn solid_frame(r: u8, g: u8, b: u8) -> Frame {
    let mut f = Frame::black();
    f.rewind();
    for y in 0..crate::MATRIX_HEIGHT {
        for x in 0..crate::MATRIX_WIDTH {
            f.set_pixel(y, x, r, g, b);
        }
    }
    f
}
