//! The CPU: fetch/decode/execute dispatch and instruction semantics, per
//! §4.4/§4.5.

use crate::core::disassembler;
use crate::core::keypad::Keypad;
use crate::core::memory::Memory;
use crate::core::opcodes::{self, OpTag};
use crate::core::quirks::Quirks;
use crate::core::registers::Registers;
use crate::core::stack::Stack;
use crate::core::timer::Timer;
use crate::core::types::{
    C8Addr, C8RegIdx, FONT_ADDRESS, FONT_GLYPH_HEIGHT, GFX_HEIGHT_PX, GFX_RESOLUTION, GFX_WIDTH,
    GFX_WIDTH_PX, MAX_ROM_SIZE, PROGRAM_START,
};
use crate::error::{CResult, Error};

fn vx_index(bytes: [u8; 2]) -> C8RegIdx {
    bytes[0] & 0x0F
}

fn vy_index(bytes: [u8; 2]) -> C8RegIdx {
    (bytes[1] >> 4) & 0x0F
}

fn kk(bytes: [u8; 2]) -> u8 {
    bytes[1]
}

fn n_nibble(bytes: [u8; 2]) -> u8 {
    bytes[1] & 0x0F
}

fn nnn(bytes: [u8; 2]) -> C8Addr {
    opcodes::extract_addr(u16::from_be_bytes(bytes))
}

/// A single CHIP-8 core: RAM, registers, stack, timers, keypad, and the
/// fetch/decode/execute loop.
#[derive(Debug, Clone)]
pub struct Cpu {
    memory: Memory,
    registers: Registers,
    stack: Stack,
    delay_timer: Timer,
    sound_timer: Timer,
    keypad: Keypad,
    quirks: Quirks,
    pc: C8Addr,
    draw_flag: bool,
    waiting_for_key: Option<C8RegIdx>,
    spinning: bool,
    instruction_count: u64,
}

impl Cpu {
    /// A freshly reset CPU: font loaded, PC at [`PROGRAM_START`], no ROM.
    pub fn new(quirks: Quirks) -> Self {
        Cpu {
            memory: Memory::new(),
            registers: Registers::new(),
            stack: Stack::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),
            keypad: Keypad::new(),
            quirks,
            pc: PROGRAM_START,
            draw_flag: false,
            waiting_for_key: None,
            spinning: false,
            instruction_count: 0,
        }
    }

    /// Load a ROM image at [`PROGRAM_START`]. Errors if it exceeds
    /// [`MAX_ROM_SIZE`].
    pub fn load_rom(&mut self, rom: &[u8]) -> CResult<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Error::RomLoad(format!(
                "rom is {} bytes, exceeds max of {}",
                rom.len(),
                MAX_ROM_SIZE
            )));
        }
        self.memory.load_rom(rom);
        Ok(())
    }

    /// Reset to power-on state, keeping the configured quirks.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.registers.reset();
        self.stack.reset();
        self.delay_timer.reset();
        self.sound_timer.reset();
        self.keypad.reset();
        self.pc = PROGRAM_START;
        self.draw_flag = false;
        self.waiting_for_key = None;
        self.spinning = false;
        self.instruction_count = 0;
    }

    /// RAM, for host inspection (framebuffer, diagnostics dump).
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// V0-VF and I, for host inspection.
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Current program counter.
    pub fn pc(&self) -> C8Addr {
        self.pc
    }

    /// True once `cls`/`drw` has run since the flag was last cleared.
    pub fn draw_flag(&self) -> bool {
        self.draw_flag
    }

    /// Read and clear the draw flag in one step, for a host render loop.
    pub fn take_draw_flag(&mut self) -> bool {
        std::mem::replace(&mut self.draw_flag, false)
    }

    /// True once a `jp` instruction has targeted its own address.
    pub fn spinning(&self) -> bool {
        self.spinning
    }

    /// Number of ticks that executed a handler (key-wait parks don't count).
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// True while blocked on `ld Vx,K`.
    pub fn waiting_for_key(&self) -> bool {
        self.waiting_for_key.is_some()
    }

    /// Sound timer state, for a host audio device.
    pub fn audio_on(&self) -> bool {
        self.sound_timer.active()
    }

    /// Replace the full keypad state. The host calls this before ticking.
    pub fn set_keys(&mut self, keys: [bool; 16]) {
        self.keypad.set_state(keys);
    }

    /// Decrement the sound timer by one, saturating at zero. Driven by the
    /// audio clock, independent of the CPU clock.
    pub fn tick_sound_timer(&mut self) {
        self.sound_timer.decrement();
    }

    /// Decrement the delay timer by one, saturating at zero. Driven by the
    /// delay clock, independent of the CPU clock.
    pub fn tick_delay_timer(&mut self) {
        self.delay_timer.decrement();
    }

    /// Run one CPU tick per §4.4's six-step algorithm.
    pub fn tick(&mut self) -> CResult<()> {
        if let Some(dest) = self.waiting_for_key {
            return match self.keypad.newly_pressed() {
                Some(key) => {
                    self.registers.set(dest, key);
                    self.waiting_for_key = None;
                    self.pc = self.pc.wrapping_add(2);
                    self.instruction_count += 1;
                    Ok(())
                }
                None => Ok(()),
            };
        }

        self.keypad.snapshot();

        let bytes = self.memory.fetch(self.pc);
        let record = disassembler::disassemble(bytes);

        if !record.valid {
            return Err(Error::InvalidInstruction { pc: self.pc, bytes });
        }
        if record.banned && self.quirks.strict {
            return Err(Error::InvalidInstruction { pc: self.pc, bytes });
        }
        if record.unofficial {
            log::warn!(
                "unofficial opcode '{}' executed at {:#06x}",
                record.mnemonic.as_deref().unwrap_or(""),
                self.pc
            );
        }

        let tag = record.tag.expect("a valid record always carries a tag");
        self.execute(tag, bytes)?;

        self.pc = self.pc.wrapping_add(2);
        self.instruction_count += 1;
        Ok(())
    }

    fn xor_framebuffer_byte(&mut self, index: usize, layer: u8) -> bool {
        let before = self.memory.framebuffer_byte(index);
        let collided = (before & layer) != 0;
        self.memory.set_framebuffer_byte(index, before ^ layer);
        collided
    }

    fn execute(&mut self, tag: OpTag, bytes: [u8; 2]) -> CResult<()> {
        let vx_idx = vx_index(bytes);
        let vy_idx = vy_index(bytes);
        let vx = self.registers.get(vx_idx);
        let vy = self.registers.get(vy_idx);
        let kk = kk(bytes);
        let n = n_nibble(bytes);
        let nnn = nnn(bytes);

        match tag {
            OpTag::Cls => {
                self.memory.clear_framebuffer();
                self.draw_flag = true;
            }
            OpTag::Ret => {
                let addr = self.stack.pop()?;
                self.pc = addr.wrapping_sub(2);
            }
            OpTag::Sys => {
                log::warn!("RCA 1802 call to {:#06x} was ignored.", nnn);
            }
            OpTag::Call => {
                let return_addr = self.pc.wrapping_add(2);
                if let Some(shadow) = self.quirks.stack_address_shadow {
                    self.memory.write_data_at_offset(shadow, &return_addr.to_be_bytes());
                }
                self.stack.push(return_addr)?;
                self.pc = nnn.wrapping_sub(2);
            }
            OpTag::Skp => {
                if self.keypad.is_down(vx & 0x0F) {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            OpTag::Sknp => {
                if !self.keypad.is_down(vx & 0x0F) {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            OpTag::SeReg => {
                if vx == vy {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            OpTag::SeByte => {
                if vx == kk {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            OpTag::SneReg => {
                if vx != vy {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            OpTag::SneByte => {
                if vx != kk {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            OpTag::AddByte => {
                self.registers.set(vx_idx, vx.wrapping_add(kk));
            }
            OpTag::AddReg => {
                let (sum, carry) = vx.overflowing_add(vy);
                self.registers.set(vx_idx, sum);
                self.registers.set_flag(carry as u8);
            }
            OpTag::AddI => {
                let sum = self.registers.i() as u32 + vx as u32;
                if self.quirks.set_vf_on_gfx_overflow && sum > 0xFF {
                    self.registers.set_flag(1);
                }
                self.registers.set_i(sum as C8Addr);
            }
            OpTag::Or => {
                self.registers.set(vx_idx, vx | vy);
            }
            OpTag::And => {
                self.registers.set(vx_idx, vx & vy);
            }
            OpTag::Xor => {
                self.registers.set(vx_idx, vx ^ vy);
            }
            OpTag::Sub => {
                self.registers.set_flag(if vx >= vy { 1 } else { 0 });
                self.registers.set(vx_idx, vx.wrapping_sub(vy));
            }
            OpTag::Subn => {
                self.registers.set_flag(if vy >= vx { 1 } else { 0 });
                self.registers.set(vx_idx, vy.wrapping_sub(vx));
            }
            OpTag::Shr => {
                if self.quirks.enable_legacy_shift {
                    self.registers.set_flag(vy & 0x1);
                    self.registers.set(vx_idx, vy >> 1);
                } else {
                    self.registers.set_flag(vx & 0x1);
                    self.registers.set(vx_idx, vx >> 1);
                }
            }
            OpTag::Shl => {
                if self.quirks.enable_legacy_shift {
                    self.registers.set_flag((vy >> 7) & 0x1);
                    self.registers.set(vx_idx, vy << 1);
                } else {
                    self.registers.set_flag((vx >> 7) & 0x1);
                    self.registers.set(vx_idx, vx << 1);
                }
            }
            OpTag::Rnd => {
                let byte: u8 = rand::random();
                self.registers.set(vx_idx, byte & kk);
            }
            OpTag::JpV0 => {
                let v0 = self.registers.get(0) as C8Addr;
                self.pc = nnn.wrapping_add(v0).wrapping_sub(2);
            }
            OpTag::Jp => {
                self.spinning = nnn == self.pc;
                self.pc = nnn.wrapping_sub(2);
            }
            OpTag::LdByte => {
                self.registers.set(vx_idx, kk);
            }
            OpTag::LdReg => {
                self.registers.set(vx_idx, vy);
            }
            OpTag::LdGetDt => {
                self.registers.set(vx_idx, self.delay_timer.get());
            }
            OpTag::LdSetDt => {
                self.delay_timer.set(vx);
            }
            OpTag::LdSetSt => {
                self.sound_timer.set(vx);
            }
            OpTag::LdKey => {
                self.waiting_for_key = Some(vx_idx);
                self.pc = self.pc.wrapping_sub(2);
            }
            OpTag::LdLoadI => {
                let i = self.registers.i();
                let data = self.memory.read_data_at_offset(i, vx_idx as C8Addr + 1).to_vec();
                self.registers.set_slice(vx_idx, &data);
            }
            OpTag::LdStoreI => {
                let values = self.registers.slice(vx_idx).to_vec();
                self.memory.write_data_at_offset(self.registers.i(), &values);
            }
            OpTag::LdI => {
                self.registers.set_i(nnn);
            }
            OpTag::LdF => {
                self.registers.set_i(FONT_ADDRESS + FONT_GLYPH_HEIGHT * vx as C8Addr);
            }
            OpTag::LdB => {
                let i = self.registers.i();
                self.memory.write_byte_at_offset(i, vx / 100);
                self.memory.write_byte_at_offset(i + 1, (vx / 10) % 10);
                self.memory.write_byte_at_offset(i + 2, vx % 10);
            }
            OpTag::Drw => self.execute_drw(vx_idx, vy_idx, n),
        }
        Ok(())
    }

    fn execute_drw(&mut self, vx_idx: C8RegIdx, vy_idx: C8RegIdx, n: u8) {
        let vx = self.registers.get(vx_idx) as usize;
        let vy = self.registers.get(vy_idx) as usize;

        if vx >= GFX_WIDTH_PX as usize || vy >= GFX_HEIGHT_PX as usize {
            log::warn!("sprite draw coordinates ({}, {}) out of bounds before wrap", vx, vy);
        }

        let x = vx % GFX_WIDTH_PX as usize;
        let y = vy % GFX_HEIGHT_PX as usize;
        let shift = x % 8;
        let byte_col = x / 8;
        let i = self.registers.i();

        let mut collision = false;
        for row in 0..n as usize {
            let sprite_byte = self.memory.read_byte_at_offset(i + row as C8Addr);
            let y_row = (y + row) % GFX_HEIGHT_PX as usize;
            let row_start = y_row * GFX_WIDTH;

            let combined = (sprite_byte as u16) << (8 - shift);
            let left_byte = (combined >> 8) as u8;
            let right_byte = (combined & 0xFF) as u8;

            let left_idx = (row_start + byte_col) % GFX_RESOLUTION;
            let right_idx = (row_start + (byte_col + 1) % GFX_WIDTH) % GFX_RESOLUTION;

            collision |= self.xor_framebuffer_byte(left_idx, left_byte);
            collision |= self.xor_framebuffer_byte(right_idx, right_byte);
        }

        self.registers.set_flag(collision as u8);
        self.draw_flag = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_xor_sets_collision() {
        let mut cpu = Cpu::new(Quirks::default());
        cpu.registers.set_i(0x300);
        cpu.memory.write_byte_at_offset(0x300, 0xFF);
        cpu.memory.set_framebuffer_byte(0, 0x0F);
        cpu.execute_drw(0, 1, 1);
        assert_eq!(cpu.memory.framebuffer_byte(0), 0xF0);
        assert_eq!(cpu.registers.get(0xF), 1);
    }

    #[test]
    fn jump_to_self_sets_spinning() {
        let mut cpu = Cpu::new(Quirks::default());
        cpu.memory.write_data_at_offset(PROGRAM_START, &[0x12, 0x00]);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc(), PROGRAM_START);
        assert!(cpu.spinning());
    }

    #[test]
    fn bcd_splits_register_value() {
        let mut cpu = Cpu::new(Quirks::default());
        cpu.registers.set(2, 234);
        cpu.registers.set_i(0x300);
        cpu.execute(OpTag::LdB, [0xf2, 0x33]).unwrap();
        assert_eq!(cpu.memory.read_byte_at_offset(0x300), 2);
        assert_eq!(cpu.memory.read_byte_at_offset(0x301), 3);
        assert_eq!(cpu.memory.read_byte_at_offset(0x302), 4);
    }

    #[test]
    fn call_then_ret_restores_pc() {
        let mut cpu = Cpu::new(Quirks::default());
        cpu.memory.write_data_at_offset(PROGRAM_START, &[0x24, 0x00]);
        cpu.memory.write_data_at_offset(0x400, &[0x00, 0xee]);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc(), 0x400);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc(), 0x202);
        assert_eq!(cpu.stack.len(), 0);
    }

    #[test]
    fn key_wait_parks_until_a_key_is_pressed() {
        let mut cpu = Cpu::new(Quirks::default());
        cpu.memory.write_data_at_offset(PROGRAM_START, &[0xf5, 0x0a]);
        cpu.tick().unwrap();
        assert!(cpu.waiting_for_key());
        assert_eq!(cpu.pc(), PROGRAM_START);

        cpu.set_keys({
            let mut keys = [false; 16];
            keys[7] = true;
            keys
        });
        cpu.tick().unwrap();
        assert!(!cpu.waiting_for_key());
        assert_eq!(cpu.registers.get(5), 7);
        assert_eq!(cpu.pc(), PROGRAM_START + 2);
    }
}
