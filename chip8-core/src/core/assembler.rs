//! Two-pass assembler: source text to a binary image, listing, or stripped
//! source, per §4.3.
//!
//! Pass 1 tokenizes each line and assigns addresses (resolving labels to the
//! address of the next encoded line). Pass 2 resolves every instruction and
//! data declaration against the opcode table and label map.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::opcodes::{self, ArgKind, Variant};
use crate::core::quirks::Quirks;
use crate::core::types::{C8Addr, PROGRAM_START};
use crate::error::{CResult, Error, ParseErrorKind};

lazy_static! {
    static ref LABEL_RE: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):(.*)$").unwrap();
}

#[derive(Debug, Clone)]
enum LineKind {
    Empty,
    Instruction { mnemonic: String, args: Vec<String> },
    Data { width: u8, values: Vec<String> },
}

#[derive(Debug, Clone)]
enum Encoded {
    Instruction([u8; 2]),
    Data(Vec<u8>),
}

#[derive(Debug, Clone)]
struct AsmLine {
    line_no: usize,
    original: String,
    label: Option<String>,
    kind: LineKind,
    address: Option<C8Addr>,
    encoded: Option<Encoded>,
}

/// Maps a data directive keyword to its element width in bytes.
fn data_width(directive: &str) -> Option<u8> {
    match directive {
        "db" => Some(1),
        "dw" => Some(2),
        "dt3" => Some(3),
        _ => None,
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(i) => &line[..i],
        None => line,
    }
}

fn tokenize_line(line_no: usize, raw: &str) -> AsmLine {
    let original = raw.to_string();
    let code = strip_comment(raw).trim();

    if code.is_empty() {
        return AsmLine {
            line_no,
            original,
            label: None,
            kind: LineKind::Empty,
            address: None,
            encoded: None,
        };
    }

    let (label, rest) = match LABEL_RE.captures(code) {
        Some(caps) => (
            Some(caps[1].to_string()),
            caps[2].trim().to_string(),
        ),
        None => (None, code.to_string()),
    };

    if rest.is_empty() {
        return AsmLine {
            line_no,
            original,
            label,
            kind: LineKind::Empty,
            address: None,
            encoded: None,
        };
    }

    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("").to_lowercase();
    let tail = parts.next().unwrap_or("").trim();

    let kind = if let Some(width) = data_width(&head) {
        let values = tail
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        LineKind::Data { width, values }
    } else {
        let args = if tail.is_empty() {
            Vec::new()
        } else {
            tail.split(',').map(|s| s.trim().to_string()).collect()
        };
        LineKind::Instruction { mnemonic: head, args }
    };

    AsmLine {
        line_no,
        original,
        label,
        kind,
        address: None,
        encoded: None,
    }
}

fn assign_addresses(lines: &mut [AsmLine], labels: &mut HashMap<String, C8Addr>) -> CResult<()> {
    let mut addr = PROGRAM_START;
    for line in lines.iter_mut() {
        if let Some(label) = &line.label {
            if labels.insert(label.clone(), addr).is_some() {
                return Err(Error::Parse {
                    line: line.line_no,
                    kind: ParseErrorKind::DuplicateLabel,
                });
            }
        }
        match &line.kind {
            LineKind::Empty => {}
            LineKind::Instruction { .. } => {
                line.address = Some(addr);
                addr += 2;
            }
            LineKind::Data { width, values } => {
                line.address = Some(addr);
                addr += *width as C8Addr * values.len() as C8Addr;
            }
        }
    }
    Ok(())
}

fn parse_addr_token(token: &str, labels: &HashMap<String, C8Addr>) -> Option<C8Addr> {
    if let Some(hex) = token.strip_prefix('#') {
        C8Addr::from_str_radix(hex, 16).ok()
    } else if let Some(&addr) = labels.get(token) {
        Some(addr)
    } else {
        token.parse::<C8Addr>().ok()
    }
}

fn parse_byte_token(token: &str) -> Option<u8> {
    if let Some(hex) = token.strip_prefix('#') {
        u8::from_str_radix(hex, 16).ok()
    } else {
        token.parse::<u16>().ok().filter(|&v| v <= 0xFF).map(|v| v as u8)
    }
}

fn parse_nibble_token(token: &str) -> Option<u8> {
    if let Some(hex) = token.strip_prefix('#') {
        u8::from_str_radix(hex, 16).ok().filter(|&v| v <= 0xF)
    } else {
        token.parse::<u8>().ok().filter(|&v| v <= 0xF)
    }
}

fn parse_data_value(token: &str) -> Option<u64> {
    if let Some(hex) = token.strip_prefix('#') {
        u64::from_str_radix(hex, 16).ok()
    } else {
        token.parse::<u64>().ok()
    }
}

/// Why a single variant failed to match `tokens`, distinguishing the three
/// spec-visible failure modes so the caller can report the right
/// [`ParseErrorKind`] instead of collapsing everything into "no match".
enum VariantFail {
    /// This variant doesn't take this many arguments at all.
    ArgCount,
    /// The argument shape (count, register/literal syntax) matched, but a
    /// `#`-prefixed or bare numeric literal failed to parse.
    BadHexLiteral,
    /// The argument shape matched but a register or literal token's
    /// spelling didn't (e.g. `vg`, or a literal keyword typo).
    NoMatch,
}

/// Try to encode `tokens` against a single variant. Returns the 4-hex-digit
/// encoding on success, or the specific reason it didn't match so the caller
/// can distinguish an argument-count mismatch from a malformed literal from
/// a wrong-shape match (not a hard error on its own: the caller tries the
/// next variant before deciding which failure to report).
fn try_encode_variant(
    variant: &Variant,
    tokens: &[String],
    labels: &HashMap<String, C8Addr>,
) -> Result<String, VariantFail> {
    if variant.args.len() != tokens.len() {
        return Err(VariantFail::ArgCount);
    }
    let mut chars: Vec<char> = variant.pattern.chars().collect();
    let mut reg_nibble = 1usize;

    for (kind, token) in variant.args.iter().zip(tokens.iter()) {
        let token = token.trim();
        match kind {
            ArgKind::Reg => {
                let t = token.to_lowercase();
                if t.len() != 2 || !t.starts_with('v') {
                    return Err(VariantFail::NoMatch);
                }
                let digit = t.as_bytes()[1] as char;
                if !digit.is_ascii_hexdigit() {
                    return Err(VariantFail::NoMatch);
                }
                chars[reg_nibble] = digit;
                reg_nibble = 2;
            }
            ArgKind::Addr => {
                let addr = parse_addr_token(token, labels).ok_or(VariantFail::BadHexLiteral)? & 0x0FFF;
                let s = format!("{:03x}", addr);
                let sc: Vec<char> = s.chars().collect();
                chars[1] = sc[0];
                chars[2] = sc[1];
                chars[3] = sc[2];
            }
            ArgKind::Byte => {
                let byte = parse_byte_token(token).ok_or(VariantFail::BadHexLiteral)?;
                let s = format!("{:02x}", byte);
                let sc: Vec<char> = s.chars().collect();
                chars[2] = sc[0];
                chars[3] = sc[1];
            }
            ArgKind::Nibble => {
                let nibble = parse_nibble_token(token).ok_or(VariantFail::BadHexLiteral)?;
                chars[3] = std::char::from_digit(nibble as u32, 16).ok_or(VariantFail::BadHexLiteral)?;
            }
            other => {
                let lit = other.literal().ok_or(VariantFail::NoMatch)?;
                if token.to_lowercase() != lit {
                    return Err(VariantFail::NoMatch);
                }
            }
        }
    }
    Ok(chars.into_iter().collect())
}

fn encode_instruction(
    line_no: usize,
    mnemonic: &str,
    args: &[String],
    labels: &HashMap<String, C8Addr>,
    quirks: &Quirks,
) -> CResult<[u8; 2]> {
    let spec = opcodes::spec_for_mnemonic(mnemonic).ok_or(Error::Parse {
        line: line_no,
        kind: ParseErrorKind::UnknownMnemonic,
    })?;

    let mut shape_matched = false;
    let mut bad_hex_literal = false;

    for variant in spec.variants {
        let hex = match try_encode_variant(variant, args, labels) {
            Ok(hex) => hex,
            Err(VariantFail::ArgCount) => continue,
            Err(VariantFail::BadHexLiteral) => {
                shape_matched = true;
                bad_hex_literal = true;
                continue;
            }
            Err(VariantFail::NoMatch) => {
                shape_matched = true;
                continue;
            }
        };
        if quirks.strict && (opcodes::is_unofficial(mnemonic) || opcodes::is_banned(&hex)) {
            shape_matched = true;
            continue;
        }
        let value = u16::from_str_radix(&hex, 16).expect("encoded hex is well-formed");
        return Ok(value.to_be_bytes());
    }

    if bad_hex_literal {
        return Err(Error::Parse { line: line_no, kind: ParseErrorKind::BadHexLiteral });
    }
    if shape_matched {
        return Err(Error::UnknownMnemonicArgs { line: line_no });
    }
    Err(Error::Parse { line: line_no, kind: ParseErrorKind::ArgCountMismatch })
}

fn encode_data(line_no: usize, width: u8, values: &[String]) -> CResult<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len() * width as usize);
    let max = 1u64 << (8 * width as u32);
    for v in values {
        let value = parse_data_value(v).ok_or(Error::Parse {
            line: line_no,
            kind: ParseErrorKind::BadDataLiteral,
        })?;
        if value >= max {
            return Err(Error::Parse {
                line: line_no,
                kind: ParseErrorKind::DataDeclarationOverflow,
            });
        }
        let bytes = value.to_be_bytes();
        out.extend_from_slice(&bytes[8 - width as usize..]);
    }
    Ok(out)
}

/// Assembles CHIP-8 source text, tracking per-line addresses and encodings
/// so the result can be rendered as a binary image, an annotated listing, or
/// comment-stripped source.
#[derive(Debug, Clone)]
pub struct Assembler {
    quirks: Quirks,
    lines: Vec<AsmLine>,
    labels: HashMap<String, C8Addr>,
}

impl Assembler {
    /// An assembler with no source loaded yet.
    pub fn new(quirks: Quirks) -> Self {
        Assembler {
            quirks,
            lines: Vec::new(),
            labels: HashMap::new(),
        }
    }

    /// Run both passes over `source`, replacing any previously assembled
    /// state. On error, the partial pass-1 state (addresses, labels) from
    /// the failing line onward is not meaningful.
    pub fn assemble(&mut self, source: &str) -> CResult<()> {
        self.lines = source
            .lines()
            .enumerate()
            .map(|(i, raw)| tokenize_line(i + 1, raw))
            .collect();
        self.labels.clear();
        assign_addresses(&mut self.lines, &mut self.labels)?;

        for idx in 0..self.lines.len() {
            let (line_no, kind) = {
                let line = &self.lines[idx];
                (line.line_no, line.kind.clone())
            };
            match kind {
                LineKind::Empty => {}
                LineKind::Instruction { mnemonic, args } => {
                    let bytes =
                        encode_instruction(line_no, &mnemonic, &args, &self.labels, &self.quirks)?;
                    self.lines[idx].encoded = Some(Encoded::Instruction(bytes));
                }
                LineKind::Data { width, values } => {
                    let bytes = encode_data(line_no, width, &values)?;
                    self.lines[idx].encoded = Some(Encoded::Data(bytes));
                }
            }
        }
        Ok(())
    }

    /// The resolved label table, for tooling.
    pub fn labels(&self) -> &HashMap<String, C8Addr> {
        &self.labels
    }

    /// The assembled binary image, in source order.
    pub fn binary(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.lines {
            match &line.encoded {
                Some(Encoded::Instruction(bytes)) => out.extend_from_slice(bytes),
                Some(Encoded::Data(bytes)) => out.extend_from_slice(bytes),
                None => {}
            }
        }
        out
    }

    /// An address/encoding-annotated listing, one line of output per line of
    /// input. Data declarations show an address but no single encoding;
    /// blank and label-only lines show neither.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match (line.address, &line.encoded) {
                (Some(addr), Some(Encoded::Instruction(bytes))) => {
                    let word = u16::from_be_bytes(*bytes);
                    out.push_str(&format!("{:#06x}  {:#06x}  {}\n", addr, word, line.original));
                }
                (Some(addr), _) => {
                    out.push_str(&format!("{:#06x}          {}\n", addr, line.original));
                }
                (None, _) => {
                    out.push_str(&format!("{}{}\n", " ".repeat(16), line.original));
                }
            }
        }
        out
    }

    /// Source with comments removed and blank lines dropped.
    pub fn stripped(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let code = strip_comment(&line.original).trim();
            if !code.is_empty() {
                out.push_str(code);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(src: &str) -> Assembler {
        let mut asm = Assembler::new(Quirks::default());
        asm.assemble(src).unwrap();
        asm
    }

    #[test]
    fn assembles_cls() {
        let asm = assemble("cls");
        assert_eq!(asm.binary(), vec![0x00, 0xe0]);
    }

    #[test]
    fn assembles_ld_byte_with_hex_literal() {
        let asm = assemble("ld va,#2a");
        assert_eq!(asm.binary(), vec![0x6a, 0x2a]);
    }

    #[test]
    fn label_resolves_to_its_line_address() {
        let asm = assemble("loop: jp loop");
        assert_eq!(asm.labels().get("loop"), Some(&PROGRAM_START));
        assert_eq!(asm.binary(), vec![0x12, 0x00]);
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let mut asm = Assembler::new(Quirks::default());
        let err = asm.assemble("a: cls\na: cls\n").unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                line: 2,
                kind: ParseErrorKind::DuplicateLabel,
            }
        );
    }

    #[test]
    fn data_directive_packs_bytes() {
        let asm = assemble("db #01, #02, 3");
        assert_eq!(asm.binary(), vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn data_directive_overflow_is_an_error() {
        let mut asm = Assembler::new(Quirks::default());
        let err = asm.assemble("db 256").unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                line: 1,
                kind: ParseErrorKind::DataDeclarationOverflow,
            }
        );
    }

    #[test]
    fn wrong_arg_count_is_reported_distinctly() {
        let mut asm = Assembler::new(Quirks::default());
        let err = asm.assemble("cls v0").unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                line: 1,
                kind: ParseErrorKind::ArgCountMismatch,
            }
        );
    }

    #[test]
    fn bad_hex_literal_is_reported_distinctly() {
        let mut asm = Assembler::new(Quirks::default());
        let err = asm.assemble("ld va,#zz").unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                line: 1,
                kind: ParseErrorKind::BadHexLiteral,
            }
        );
    }

    #[test]
    fn strict_mode_rejects_unofficial_mnemonic() {
        let mut asm = Assembler::new(Quirks::strict());
        let err = asm.assemble("xor va,vb").unwrap_err();
        assert_eq!(err, Error::UnknownMnemonicArgs { line: 1 });
    }

    #[test]
    fn comments_and_blank_lines_are_ignored_and_stripped() {
        let asm = assemble("cls ; clear the screen\n\n  \nret");
        assert_eq!(asm.binary(), vec![0x00, 0xe0, 0x00, 0xee]);
        assert_eq!(asm.stripped(), "cls\nret\n");
    }
}
