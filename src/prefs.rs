//! Persistent key/value store contract: three keys, each
//! an optional 32-bit unsigned integer, absence meaning default.
//!
//! The crate does not own a storage medium — a board crate backs
//! [`PreferenceStore`] with its actual flash/NVS implementation. An
//! in-memory reference implementation is provided for tests and the
//! simulator.

/// The three persisted keys. `Dim` and `Dither` are carried
/// here too for consistency with `CLC`/`ROT` — see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PrefKey {
    PowerOverride,
    ColorCorrection,
    Rotation,
    Dim,
    Dither,
}

/// Namespaced key/value store: each key holds a raw `u32`, absent meaning
/// "use the default".
pub trait PreferenceStore {
    fn get(&self, key: PrefKey) -> Option<u32>;
    fn set(&mut self, key: PrefKey, value: u32);
    fn clear(&mut self, key: PrefKey);
}

/// In-memory reference implementation for tests and the host simulator.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    power_override: Option<u32>,
    color_correction: Option<u32>,
    rotation: Option<u32>,
    dim: Option<u32>,
    dither: Option<u32>,
}

impl MemoryPreferenceStore {
    pub const fn new() -> Self {
        MemoryPreferenceStore {
            power_override: None,
            color_correction: None,
            rotation: None,
            dim: None,
            dither: None,
        }
    }

    fn slot(&mut self, key: PrefKey) -> &mut Option<u32> {
        match key {
            PrefKey::PowerOverride => &mut self.power_override,
            PrefKey::ColorCorrection => &mut self.color_correction,
            PrefKey::Rotation => &mut self.rotation,
            PrefKey::Dim => &mut self.dim,
            PrefKey::Dither => &mut self.dither,
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: PrefKey) -> Option<u32> {
        match key {
            PrefKey::PowerOverride => self.power_override,
            PrefKey::ColorCorrection => self.color_correction,
            PrefKey::Rotation => self.rotation,
            PrefKey::Dim => self.dim,
            PrefKey::Dither => self.dither,
        }
    }

    fn set(&mut self, key: PrefKey, value: u32) {
        *self.slot(key) = Some(value);
    }

    fn clear(&mut self, key: PrefKey) {
        *self.slot(key) = None;
    }
}

/// Packs an RGB color-correction triple into the 24-bit `R<<16|G<<8|B`
/// wire/storage representation.
pub fn pack_color_correction(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

pub fn unpack_color_correction(value: u32) -> (u8, u8, u8) {
    (((value >> 16) & 0xFF) as u8, ((value >> 8) & 0xFF) as u8, (value & 0xFF) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r3_color_correction_round_trips() {
        let mut store = MemoryPreferenceStore::new();
        assert_eq!(store.get(PrefKey::ColorCorrection), None);
        store.set(PrefKey::ColorCorrection, pack_color_correction(0x11, 0x22, 0x33));
        // Simulated power-cycle: a fresh handle backed by the same store
        // would read the same bytes; here we just re-read the same store.
        assert_eq!(unpack_color_correction(store.get(PrefKey::ColorCorrection).unwrap()), (0x11, 0x22, 0x33));
    }

    #[test]
    fn clear_restores_default() {
        let mut store = MemoryPreferenceStore::new();
        store.set(PrefKey::Rotation, 90);
        store.clear(PrefKey::Rotation);
        assert_eq!(store.get(PrefKey::Rotation), None);
    }
}
