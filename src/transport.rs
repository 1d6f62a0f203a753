//! Two byte-stream capabilities behind a common contract; the multiplexer
//! picks one and hides the choice from higher layers, and
//! the pairing sub-state machine that drives that choice.

/// A line-oriented byte stream: wired serial or a Bluetooth link.
pub trait Transport {
    /// Number of bytes currently available to read without blocking.
    fn available(&mut self) -> usize;
    /// Reads a single byte. Only called when `available() > 0`.
    fn read_byte(&mut self) -> Option<u8>;
    fn write_str(&mut self, s: &str);
}

/// Pairing sub-state machine: drives which transport is
/// active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PairingState {
    Idle,
    HoldDetected,
    Pairing,
    Paired,
}

/// Minimum time the three capacitive buttons must be held together before
/// pairing begins.
pub const PAIRING_HOLD_MS: u32 = 3000;

/// Selects between a wired and a wireless transport based on whether
/// Bluetooth is active: the wireless stream iff active,
/// otherwise the wired stream.
pub struct TransportMux<W, B> {
    wired: W,
    wireless: B,
    pairing: PairingState,
    hold_started_ms: Option<u32>,
}

impl<W: Transport, B: Transport> TransportMux<W, B> {
    pub const fn new(wired: W, wireless: B) -> Self {
        TransportMux { wired, wireless, pairing: PairingState::Idle, hold_started_ms: None }
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing
    }

    /// `true` iff Bluetooth is the active transport.
    pub fn bluetooth_active(&self) -> bool {
        self.pairing == PairingState::Paired
    }

    fn active(&mut self) -> &mut dyn Transport {
        if self.bluetooth_active() {
            &mut self.wireless
        } else {
            &mut self.wired
        }
    }

    pub fn available(&mut self) -> usize {
        self.active().available()
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.active().read_byte()
    }

    pub fn write_str(&mut self, s: &str) {
        self.active().write_str(s);
    }

    /// Main-loop step 2: tracks the three-button hold and
    /// starts pairing once it's been held continuously for
    /// [`PAIRING_HOLD_MS`].
    pub fn update_pairing_hold(&mut self, now_ms: u32, all_three_held: bool) {
        if self.pairing != PairingState::Idle {
            if !all_three_held {
                // Releasing early while merely detecting a hold aborts it;
                // once actively pairing, only `confirm`/`cancel` end it.
                if self.pairing == PairingState::HoldDetected {
                    self.pairing = PairingState::Idle;
                    self.hold_started_ms = None;
                }
            }
            return;
        }
        if !all_three_held {
            self.hold_started_ms = None;
            return;
        }
        let started = *self.hold_started_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(started) >= PAIRING_HOLD_MS {
            self.pairing = PairingState::HoldDetected;
        }
    }

    /// Transitions from a detected hold into active pairing UI.
    pub fn begin_pairing(&mut self) {
        if self.pairing == PairingState::HoldDetected {
            self.pairing = PairingState::Pairing;
        }
    }

    /// A single button press accepts the pairing PIN.
    pub fn confirm_pairing(&mut self) {
        if self.pairing == PairingState::Pairing {
            self.pairing = PairingState::Paired;
        }
    }

    pub fn cancel_pairing(&mut self) {
        self.pairing = PairingState::Idle;
        self.hold_started_ms = None;
    }
}
