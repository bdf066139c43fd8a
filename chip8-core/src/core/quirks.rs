//! Behavioral toggles reflecting historic CHIP-8 implementation divergence.
//!
//! Per §9, these belong in a single configuration record passed at
//! construction rather than as process-wide constants.

use crate::core::types::C8Addr;

/// Quirk/strictness configuration for a [`crate::core::cpu::Cpu`].
#[derive(Debug, Clone, Copy)]
pub struct Quirks {
    /// `add I,Vx` sets VF on overflow past 0xFF. Used by e.g. Spacefight
    /// 2019; off by default like the historical implementations.
    pub set_vf_on_gfx_overflow: bool,
    /// `shr`/`shl` operate on Vy and store into Vx, instead of operating on
    /// Vx in place.
    pub enable_legacy_shift: bool,
    /// Reject unofficial mnemonics and banned (writes-VF) encodings at
    /// decode time instead of only flagging them.
    pub strict: bool,
    /// Legacy option: also mirror the pushed return address into RAM at a
    /// fixed address on `call`. Disabled by default.
    pub stack_address_shadow: Option<C8Addr>,
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks {
            set_vf_on_gfx_overflow: false,
            enable_legacy_shift: false,
            strict: false,
            stack_address_shadow: None,
        }
    }
}

impl Quirks {
    /// The default, non-strict configuration.
    pub fn new() -> Self {
        Quirks::default()
    }

    /// The same configuration, with strict mode turned on.
    pub fn strict() -> Self {
        Quirks {
            strict: true,
            ..Quirks::default()
        }
    }
}
