//! RAM, including the font glyph table and the memory-mapped framebuffer.

use std::fmt;

use crate::core::{
    font::Font,
    types::{
        C8Addr, C8Byte, FONT_ADDRESS, GFX_ADDRESS, GFX_RESOLUTION, GFX_WIDTH, MEMORY_SIZE,
        PROGRAM_START,
    },
};

const CHUNK_SIZE: usize = 64;

/// CHIP-8 RAM. The framebuffer is simply the tail 256 bytes of this array
/// (0xF00-0xFFF), per §3: it is not a separate buffer.
#[derive(Clone)]
pub struct Memory {
    data: Vec<C8Byte>,
}

impl Memory {
    /// Fresh RAM with the font glyph table loaded and the screen cleared.
    pub fn new() -> Self {
        let mut memory = Memory {
            data: vec![0; MEMORY_SIZE],
        };
        memory.load_font();
        memory
    }

    fn load_font(&mut self) {
        let font = Font::new_system_font();
        self.write_data_at_offset(FONT_ADDRESS, font.get_data());
    }

    /// Write a slice of bytes starting at `offset`.
    pub fn write_data_at_offset(&mut self, offset: C8Addr, data: &[C8Byte]) {
        let offset = offset as usize;
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Write a single byte at `offset`.
    pub fn write_byte_at_offset(&mut self, offset: C8Addr, byte: C8Byte) {
        self.data[offset as usize] = byte;
    }

    /// Read `count` bytes starting at `offset`.
    pub fn read_data_at_offset(&self, offset: C8Addr, count: C8Addr) -> &[C8Byte] {
        let offset = offset as usize;
        &self.data[offset..offset + count as usize]
    }

    /// Read a single byte at `offset`.
    pub fn read_byte_at_offset(&self, offset: C8Addr) -> C8Byte {
        self.data[offset as usize]
    }

    /// Load a ROM image at [`PROGRAM_START`].
    pub fn load_rom(&mut self, rom: &[C8Byte]) {
        self.write_data_at_offset(PROGRAM_START, rom);
    }

    /// Fetch the two bytes at `pc`.
    pub fn fetch(&self, pc: C8Addr) -> [C8Byte; 2] {
        [
            self.read_byte_at_offset(pc),
            self.read_byte_at_offset(pc + 1),
        ]
    }

    /// Zero the framebuffer region.
    pub fn clear_framebuffer(&mut self) {
        let zeros = [0u8; GFX_RESOLUTION];
        self.write_data_at_offset(GFX_ADDRESS, &zeros);
    }

    /// Read one framebuffer byte by its row-major byte index (0..256).
    pub fn framebuffer_byte(&self, index: usize) -> C8Byte {
        self.read_byte_at_offset(GFX_ADDRESS + index as C8Addr)
    }

    /// Write one framebuffer byte by its row-major byte index (0..256).
    pub fn set_framebuffer_byte(&mut self, index: usize, value: C8Byte) {
        self.write_byte_at_offset(GFX_ADDRESS + index as C8Addr, value);
    }

    /// A read-only snapshot of the full framebuffer, one byte per column
    /// group, row-major, `GFX_WIDTH` bytes per row.
    pub fn framebuffer(&self) -> &[C8Byte] {
        self.read_data_at_offset(GFX_ADDRESS, GFX_RESOLUTION as C8Addr)
    }

    /// Bytes per framebuffer row, exposed for host renderers.
    pub fn framebuffer_row_width() -> usize {
        GFX_WIDTH
    }

    /// Full memory snapshot, for diagnostics.
    pub fn get_data(&self) -> &[C8Byte] {
        &self.data
    }

    /// Reset RAM to its just-constructed state.
    pub fn reset(&mut self) {
        self.data = vec![0; MEMORY_SIZE];
        self.load_font();
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, chunk) in self.data.chunks(CHUNK_SIZE).enumerate() {
            write!(f, "{:04X}-{:04X} | ", idx * CHUNK_SIZE, (idx + 1) * CHUNK_SIZE)?;
            for byte in chunk {
                write!(f, "{:02X} ", byte)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memory_has_font_loaded() {
        let mem = Memory::new();
        assert_eq!(mem.read_byte_at_offset(FONT_ADDRESS), 0xF0);
    }

    #[test]
    fn framebuffer_starts_cleared() {
        let mem = Memory::new();
        assert!(mem.framebuffer().iter().all(|&b| b == 0));
    }

    #[test]
    fn rom_loads_at_program_start() {
        let mut mem = Memory::new();
        mem.load_rom(&[0x12, 0x34]);
        assert_eq!(mem.fetch(PROGRAM_START), [0x12, 0x34]);
    }
}
