//! Top-level scheduler: three independent wall-clock-driven periods (CPU,
//! audio, delay) wrapped around one [`Cpu`], per §4.4/§5.

use std::time::{Duration, Instant};

use crate::core::cpu::Cpu;
use crate::core::quirks::Quirks;
use crate::error::CResult;

/// The default shared audio/delay tick rate, in Hz.
pub const DEFAULT_TIMER_HZ: u64 = 60;

/// Drives a [`Cpu`] at a configured CPU frequency, decrementing the audio
/// and delay timers at their own fixed 60 Hz rate. A host calls [`run`]
/// from its own event loop; each call executes at most one CPU tick plus
/// at most one timer tick per independent clock.
///
/// [`run`]: Emulator::run
pub struct Emulator {
    cpu: Cpu,
    cpu_period: Duration,
    audio_period: Duration,
    delay_period: Duration,
    last_cpu_tick: Instant,
    last_audio_tick: Instant,
    last_delay_tick: Instant,
}

impl Emulator {
    /// A fresh emulator, ticking its CPU at `cpu_hz` and its timers at
    /// [`DEFAULT_TIMER_HZ`].
    pub fn new(quirks: Quirks, cpu_hz: u64) -> Self {
        let now = Instant::now();
        Emulator {
            cpu: Cpu::new(quirks),
            cpu_period: Duration::from_secs_f64(1.0 / cpu_hz as f64),
            audio_period: Duration::from_secs_f64(1.0 / DEFAULT_TIMER_HZ as f64),
            delay_period: Duration::from_secs_f64(1.0 / DEFAULT_TIMER_HZ as f64),
            last_cpu_tick: now,
            last_audio_tick: now,
            last_delay_tick: now,
        }
    }

    /// Load a ROM image at 0x200.
    pub fn load_rom(&mut self, rom: &[u8]) -> CResult<()> {
        self.cpu.load_rom(rom)
    }

    /// The wrapped CPU, for host inspection (framebuffer, registers).
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable access to the wrapped CPU, for host keypad input.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Advance by at most one CPU tick and at most one tick of each timer
    /// clock, based on wall-clock time elapsed since each clock's last
    /// tick. Returns promptly.
    pub fn run(&mut self) -> CResult<()> {
        let now = Instant::now();

        if now.duration_since(self.last_cpu_tick) >= self.cpu_period {
            self.cpu.tick()?;
            self.last_cpu_tick = now;
        }
        if now.duration_since(self.last_audio_tick) >= self.audio_period {
            self.cpu.tick_sound_timer();
            self.last_audio_tick = now;
        }
        if now.duration_since(self.last_delay_tick) >= self.delay_period {
            self.cpu.tick_delay_timer();
            self.last_delay_tick = now;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PROGRAM_START;

    #[test]
    fn run_does_not_tick_before_the_cpu_period_elapses() {
        let mut emulator = Emulator::new(Quirks::default(), 60);
        emulator.run().unwrap();
        assert_eq!(emulator.cpu().pc(), PROGRAM_START);
        assert_eq!(emulator.cpu().instruction_count(), 0);
    }

    #[test]
    fn load_rom_is_visible_to_the_cpu() {
        let mut emulator = Emulator::new(Quirks::default(), 60);
        emulator.load_rom(&[0x00, 0xe0]).unwrap();
        assert_eq!(emulator.cpu().memory().fetch(PROGRAM_START), [0x00, 0xe0]);
    }
}
