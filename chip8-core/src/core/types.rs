//! Core types and shared numeric constants.

/// CHIP-8 byte type.
pub type C8Byte = u8;

/// CHIP-8 address type.
pub type C8Addr = u16;

/// CHIP-8 register index.
pub type C8RegIdx = u8;

/// Number of general-purpose registers (V0..VF).
pub const REGISTER_COUNT: usize = 16;

/// Total RAM size.
pub const MEMORY_SIZE: usize = 4096;

/// Program load address.
pub const PROGRAM_START: C8Addr = 0x200;

/// Maximum ROM size (MEMORY_SIZE minus the reserved low region).
pub const MAX_ROM_SIZE: usize = 3232;

/// Font glyph table base address.
pub const FONT_ADDRESS: C8Addr = 0x050;

/// Bytes per font glyph.
pub const FONT_GLYPH_HEIGHT: C8Addr = 5;

/// Framebuffer base address (last 256 bytes of RAM).
pub const GFX_ADDRESS: C8Addr = 0xF00;

/// Framebuffer size in bytes (64x32 packed, 1 bit per pixel).
pub const GFX_RESOLUTION: usize = 256;

/// Framebuffer bytes per row.
pub const GFX_WIDTH: usize = 8;

/// Framebuffer width in pixels.
pub const GFX_WIDTH_PX: u8 = 64;

/// Framebuffer height in pixels.
pub const GFX_HEIGHT_PX: u8 = 32;

/// Maximum call-stack depth.
pub const STACK_SIZE: usize = 12;
