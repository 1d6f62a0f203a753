//! Device-binary entry point. Board bring-up — the CC-pin ADC, UART/BLE
//! transports, LED-string driver, button GPIOs, and flash-backed preference
//! store — is out of scope for this crate and expressed only as the
//! capability traits in [`blinkenlights_fw`]. A real product provides a
//! board-support crate that implements those traits against its concrete
//! peripherals and constructs a [`blinkenlights_fw::mainloop::MainLoop`]
//! from them; this entry point is the seam where that wiring happens and is
//! deliberately left as a stub here.
#![no_std]
#![no_main]

use panic_probe as _;

#[cfg(feature = "board")]
use defmt_rtt as _;

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("blinkenlights-fw: no board-support crate linked, idling");
    loop {
        cortex_m::asm::wfi();
    }
}
