//! Converts a pair of bytes into a structured, classified record.

use crate::core::opcodes::{self, ArgKind, OpTag};

/// Immutable disassembly record for one 2-byte instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 4 lowercase hex digits, e.g. `"00e0"`.
    pub hex_instruction: String,
    /// False if the bytes don't decode to a known instruction (i.e. data).
    pub valid: bool,
    /// Lowercase mnemonic, or `"SPR"` for a detected Super-Chip opcode.
    pub mnemonic: Option<String>,
    /// Argument kinds of the matched variant, in source order.
    pub arg_kinds: Vec<ArgKind>,
    /// Formatted disassembly text (mnemonic + padded, comma-joined args).
    pub rendered_text: String,
    /// One of the four unofficial mnemonics (`xor`, `shr`, `shl`, `subn`).
    pub unofficial: bool,
    /// Destination register resolves to VF.
    pub banned: bool,
    /// A Super-Chip/XO-Chip opcode: detected, not executed.
    pub super_chip: bool,
    /// Semantic operation tag of the matched variant, if any. Lets the CPU
    /// dispatch on a closed enum instead of re-parsing `mnemonic`.
    pub tag: Option<OpTag>,
}

/// Format two bytes as 4 lowercase hex digits.
pub fn format_hex(bytes: [u8; 2]) -> String {
    format!("{:02x}{:02x}", bytes[0], bytes[1])
}

/// Disassemble one instruction per §4.2.
pub fn disassemble(bytes: [u8; 2]) -> Record {
    let hex = format_hex(bytes);

    if opcodes::is_super_chip(&hex) {
        return Record {
            hex_instruction: hex,
            valid: false,
            mnemonic: Some("SPR".to_string()),
            arg_kinds: Vec::new(),
            rendered_text: String::new(),
            unofficial: false,
            banned: false,
            super_chip: true,
            tag: None,
        };
    }

    let matched = opcodes::lookup_by_pattern(&hex);

    let Some(m) = matched else {
        return Record {
            hex_instruction: hex.clone(),
            valid: false,
            mnemonic: None,
            arg_kinds: Vec::new(),
            rendered_text: hex,
            unofficial: false,
            banned: false,
            super_chip: false,
            tag: None,
        };
    };

    let banned = opcodes::is_banned(&hex);
    if banned {
        return Record {
            hex_instruction: hex,
            valid: true,
            mnemonic: Some(m.mnemonic.to_string()),
            arg_kinds: m.variant.args.to_vec(),
            rendered_text: String::new(),
            unofficial: false,
            banned: true,
            super_chip: false,
            tag: Some(m.variant.tag),
        };
    }

    let unofficial = opcodes::is_unofficial(m.mnemonic);

    let rendered_text = if m.variant.args.is_empty() {
        m.mnemonic.to_string()
    } else {
        let args = opcodes::render_args(m.variant.args, &hex);
        let mut text = format!("{:<5}", m.mnemonic);
        let joined = args
            .iter()
            .map(|a| format!("{:<5}", a))
            .collect::<Vec<_>>()
            .join(",");
        text.push_str(&joined);
        text.trim_end().to_string()
    };

    Record {
        hex_instruction: hex,
        valid: true,
        mnemonic: Some(m.mnemonic.to_string()),
        arg_kinds: m.variant.args.to_vec(),
        rendered_text,
        unofficial,
        banned: false,
        super_chip: false,
        tag: Some(m.variant.tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembles_cls() {
        let r = disassemble([0x00, 0xe0]);
        assert!(r.valid);
        assert_eq!(r.mnemonic.as_deref(), Some("cls"));
        assert_eq!(r.rendered_text, "cls");
    }

    #[test]
    fn disassembles_ld_with_args() {
        let r = disassemble([0x6a, 0x2a]);
        assert!(r.valid);
        assert_eq!(r.mnemonic.as_deref(), Some("ld"));
        assert!(r.rendered_text.trim_start().starts_with("ld"));
        assert!(r.rendered_text.contains("va"));
        assert!(r.rendered_text.contains("#2a"));
    }

    #[test]
    fn unofficial_flag_set_for_xor() {
        let r = disassemble([0x8a, 0xb3]);
        assert!(r.unofficial);
    }

    #[test]
    fn banned_stops_argument_rendering() {
        let r = disassemble([0x7f, 0x10]);
        assert!(r.banned);
        assert_eq!(r.rendered_text, "");
    }

    #[test]
    fn super_chip_detected_not_valid() {
        let r = disassemble([0x00, 0xfb]);
        assert!(r.super_chip);
        assert!(!r.valid);
    }

    #[test]
    fn unknown_bytes_classify_as_data() {
        let r = disassemble([0x51, 0x23]);
        assert!(!r.valid);
        assert_eq!(r.rendered_text, "5123");
    }
}
