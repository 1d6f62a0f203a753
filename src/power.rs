//! USB-C current-negotiation control loop: CC-pin sampling, debounce,
//! brightness clamping, matrix power-rail gating.

/// CC1/CC2 voltage boundary between legacy (<=0.5 A) and 1.5 A, in
/// millivolts.
pub const CC_THRESHOLD_LEGACY_1_5A_MV: u16 = 660;
/// CC1/CC2 voltage boundary between 1.5 A and 3.0 A, in millivolts.
pub const CC_THRESHOLD_1_5A_3A_MV: u16 = 1230;

/// Two consecutive samples must agree this many milliseconds apart before
/// an advertised current is accepted (a 15 ms confirmation sample).
pub const DEBOUNCE_INTERVAL_MS: u32 = 15;

/// Status-LED breathing period while at 1.5 A.
pub const BREATHING_PERIOD_MS: u32 = 3000;

/// The USB-C current budget the host advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum CurrentBudget {
    Unknown,
    Legacy0_5A,
    Current1_5A,
    Current3_0A,
}

impl CurrentBudget {
    /// Classifies the higher of the two CC-pin voltages per the classification thresholds.
    pub fn classify(cc1_mv: u16, cc2_mv: u16) -> CurrentBudget {
        let mv = cc1_mv.max(cc2_mv);
        if mv >= CC_THRESHOLD_1_5A_3A_MV {
            CurrentBudget::Current3_0A
        } else if mv >= CC_THRESHOLD_LEGACY_1_5A_MV {
            CurrentBudget::Current1_5A
        } else {
            CurrentBudget::Legacy0_5A
        }
    }

    /// Parses the `PWR` command's override token.
    pub fn from_token(token: &str) -> Option<CurrentBudget> {
        match token {
            "3.0A" => Some(CurrentBudget::Current3_0A),
            "1.5A" => Some(CurrentBudget::Current1_5A),
            "0.5A" => Some(CurrentBudget::Legacy0_5A),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            CurrentBudget::Unknown => "UNK",
            CurrentBudget::Legacy0_5A => "0.5A",
            CurrentBudget::Current1_5A => "1.5A",
            CurrentBudget::Current3_0A => "3.0A",
        }
    }
}

/// Samples the two USB-C CC sense pins.
pub trait CcSample {
    fn read_cc1_mv(&mut self) -> u16;
    fn read_cc2_mv(&mut self) -> u16;
}

/// The matrix's power-rail enable and the onboard status LED PWM duty.
pub trait PowerRail {
    fn set_rail_enabled(&mut self, enabled: bool);
}

pub trait StatusLed {
    /// `duty` is a fraction of full scale, `0..=255`.
    fn set_duty(&mut self, duty: u8);
}

#[derive(Debug, Clone, Copy)]
enum Debounce {
    Unconfirmed { candidate: CurrentBudget, since_ms: u32 },
    Confirmed(CurrentBudget),
}

/// USB-C current negotiation state machine. A preferences override bypasses
/// sampling entirely.
pub struct PowerController {
    state: Debounce,
    override_budget: Option<CurrentBudget>,
}

impl PowerController {
    pub const fn new() -> Self {
        PowerController {
            state: Debounce::Confirmed(CurrentBudget::Unknown),
            override_budget: None,
        }
    }

    pub fn set_override(&mut self, budget: Option<CurrentBudget>) {
        self.override_budget = budget;
    }

    pub fn override_budget(&self) -> Option<CurrentBudget> {
        self.override_budget
    }

    /// Current accepted budget, whether from an override or debounced
    /// sampling.
    pub fn current_budget(&self) -> CurrentBudget {
        if let Some(b) = self.override_budget {
            return b;
        }
        match self.state {
            Debounce::Confirmed(b) => b,
            Debounce::Unconfirmed { .. } => CurrentBudget::Unknown,
        }
    }

    /// One 30 ms (or 15 ms while debouncing) sampling step. No-op when an
    /// override is active.
    pub fn update(&mut self, now_ms: u32, cc: &mut impl CcSample) {
        if self.override_budget.is_some() {
            return;
        }
        let observed = CurrentBudget::classify(cc.read_cc1_mv(), cc.read_cc2_mv());
        self.state = match self.state {
            Debounce::Confirmed(current) if current == observed => Debounce::Confirmed(current),
            Debounce::Confirmed(_) => {
                Debounce::Unconfirmed { candidate: observed, since_ms: now_ms }
            }
            Debounce::Unconfirmed { candidate, since_ms } if candidate == observed => {
                if now_ms.saturating_sub(since_ms) >= DEBOUNCE_INTERVAL_MS {
                    Debounce::Confirmed(observed)
                } else {
                    Debounce::Unconfirmed { candidate, since_ms }
                }
            }
            Debounce::Unconfirmed { .. } => {
                Debounce::Unconfirmed { candidate: observed, since_ms: now_ms }
            }
        };
    }

    /// `true` while a confirmation sample (rather than the full 30 ms base
    /// loop) should be used.
    pub fn is_debouncing(&self) -> bool {
        matches!(self.state, Debounce::Unconfirmed { .. })
    }

    /// Applies the current budget to the matrix power rail and FastLED-style
    /// software brightness cap.
    pub fn apply(&self, rail: &mut impl PowerRail) {
        let enabled = !matches!(self.current_budget(), CurrentBudget::Unknown);
        rail.set_rail_enabled(enabled);
    }

    /// Software brightness cap matching the accepted current budget.
    pub fn brightness_cap(&self) -> u8 {
        match self.current_budget() {
            CurrentBudget::Unknown => 0,
            CurrentBudget::Legacy0_5A => 64,
            CurrentBudget::Current1_5A => 160,
            CurrentBudget::Current3_0A => 255,
        }
    }

    /// Drives the status LED: steady at 3 A, a Gaussian "breathing" pattern
    /// at 1.5 A, off otherwise.
    pub fn drive_status_led(&self, now_ms: u32, led: &mut impl StatusLed) {
        let duty = match self.current_budget() {
            CurrentBudget::Current3_0A => (255 * 3) / 4,
            CurrentBudget::Current1_5A => breathing_level(now_ms),
            _ => 0,
        };
        led.set_duty(duty);
    }
}

impl Default for PowerController {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure function: a Gaussian breathing pattern with period
/// [`BREATHING_PERIOD_MS`], floor 1/4 of full scale, peak 3/4 of full scale.
/// Exposed standalone so it's testable without a real PWM pin.
pub fn breathing_level(now_ms: u32) -> u8 {
    const FLOOR: f32 = 255.0 / 4.0;
    const PEAK: f32 = 255.0 * 3.0 / 4.0;
    const SIGMA: f32 = 0.22; // shapes the Gaussian so it reaches near-floor at the period edges

    let phase = (now_ms % BREATHING_PERIOD_MS) as f32 / BREATHING_PERIOD_MS as f32; // 0..1
    let centered = phase - 0.5; // -0.5..0.5, peak brightness at the midpoint
    let gaussian = libm::expf(-(centered * centered) / (2.0 * SIGMA * SIGMA));
    (FLOOR + (PEAK - FLOOR) * gaussian) as u8
}
