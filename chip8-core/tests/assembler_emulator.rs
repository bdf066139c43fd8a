//! Cross-module scenarios: assemble source, load the image into a CPU, run
//! a handful of ticks, and inspect the resulting state.

use chip8_core::core::cpu::Cpu;
use chip8_core::core::disassembler;
use chip8_core::core::assembler::Assembler;
use chip8_core::core::quirks::Quirks;

fn assemble(src: &str) -> Vec<u8> {
    let mut asm = Assembler::new(Quirks::default());
    asm.assemble(src).expect("source assembles");
    asm.binary()
}

#[test]
fn sprite_draw_then_spin_loop() {
    let src = "
        ld i, sprite
        ld v0, #00
        ld v1, #00
        drw v0, v1, 1
        halt: jp halt
        sprite: db #ff
    ";
    let rom = assemble(src);

    let mut cpu = Cpu::new(Quirks::default());
    cpu.load_rom(&rom).unwrap();

    for _ in 0..5 {
        cpu.tick().unwrap();
    }

    assert_eq!(cpu.memory().framebuffer_byte(0), 0xff);
    assert_eq!(cpu.registers().get(0xF), 0);
    assert!(cpu.spinning());
}

#[test]
fn sprite_collision_sets_vf() {
    let src = "
        ld i, sprite
        ld v0, #00
        ld v1, #00
        drw v0, v1, 1
        drw v0, v1, 1
        sprite: db #ff
    ";
    let rom = assemble(src);

    let mut cpu = Cpu::new(Quirks::default());
    cpu.load_rom(&rom).unwrap();
    for _ in 0..5 {
        cpu.tick().unwrap();
    }

    // Second draw of the same sprite over itself clears every pixel it set:
    // that's a collision on every bit, and the framebuffer byte goes back to 0.
    assert_eq!(cpu.memory().framebuffer_byte(0), 0x00);
    assert_eq!(cpu.registers().get(0xF), 1);
}

#[test]
fn assembler_round_trips_through_the_disassembler() {
    let rom = assemble("ld v0, #2a");
    assert_eq!(rom, vec![0x60, 0x2a]);

    let record = disassembler::disassemble([rom[0], rom[1]]);
    assert_eq!(record.mnemonic.as_deref(), Some("ld"));
    assert!(record.rendered_text.contains("v0"));
    assert!(record.rendered_text.contains("#2a"));
}

#[test]
fn key_wait_resolves_across_two_ticks() {
    let rom = assemble("ld v5, k");

    let mut cpu = Cpu::new(Quirks::default());
    cpu.load_rom(&rom).unwrap();

    cpu.tick().unwrap();
    assert!(cpu.waiting_for_key());

    let mut keys = [false; 16];
    keys[7] = true;
    cpu.set_keys(keys);
    cpu.tick().unwrap();

    assert!(!cpu.waiting_for_key());
    assert_eq!(cpu.registers().get(5), 7);
}

#[test]
fn strict_mode_rejects_unofficial_and_banned_source() {
    let mut asm = Assembler::new(Quirks::strict());
    assert!(asm.assemble("xor v0, v1").is_err());

    let mut asm = Assembler::new(Quirks::strict());
    assert!(asm.assemble("add vf, #01").is_err());
}
