//! CHIP-8 command-line front-ends: `assemble` and `emulate`.

use std::{
    fs,
    path::{Path, PathBuf},
    process,
    time::{Duration, Instant},
};

use argh::FromArgs;
use chip8_core::{core::assembler::Assembler, core::quirks::Quirks, emulator::Emulator};

/// CHIP-8 toolchain
#[derive(FromArgs)]
struct Args {
    /// subcommand
    #[argh(subcommand)]
    nested: SubCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommands {
    Assemble(AssembleCommand),
    Emulate(EmulateCommand),
}

/// assemble a source file into a ROM image
#[derive(FromArgs)]
#[argh(subcommand, name = "assemble")]
struct AssembleCommand {
    /// source assembly path
    #[argh(positional)]
    input: PathBuf,

    /// binary output path (default: input with its `.src` suffix stripped, else `.bin` appended)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// also write `<output>.lst`, an address/encoding-annotated listing
    #[argh(switch, short = 'l')]
    listing: bool,

    /// also write `<output>.strip`, comment-stripped source
    #[argh(switch, short = 's')]
    strip: bool,

    /// strict mode: reject unofficial mnemonics and banned (writes-VF) encodings
    #[argh(switch, short = 'e')]
    strict: bool,
}

/// run a ROM image headlessly, reporting diagnostics on exit
#[derive(FromArgs)]
#[argh(subcommand, name = "emulate")]
struct EmulateCommand {
    /// ROM file (at most 3,232 bytes)
    #[argh(positional)]
    rom: PathBuf,

    /// target CPU (and shared audio/delay) frequency in Hz
    #[argh(option, short = 'f', default = "60")]
    frequency: u64,
}

fn default_output_path(input: &Path) -> PathBuf {
    if input.extension().map(|ext| ext == "src").unwrap_or(false) {
        input.with_extension("")
    } else {
        let mut path = input.to_path_buf();
        let name = match path.file_name() {
            Some(name) => format!("{}.bin", name.to_string_lossy()),
            None => "a.bin".to_string(),
        };
        path.set_file_name(name);
        path
    }
}

fn run_assemble(cmd: AssembleCommand) -> process::ExitCode {
    let source = match fs::read_to_string(&cmd.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: could not read {}: {}", cmd.input.display(), e);
            return process::ExitCode::from(1);
        }
    };

    let quirks = if cmd.strict { Quirks::strict() } else { Quirks::default() };
    let mut assembler = Assembler::new(quirks);

    if let Err(e) = assembler.assemble(&source) {
        eprintln!("error: {}", e);
        return process::ExitCode::from(1);
    }

    let output = cmd.output.unwrap_or_else(|| default_output_path(&cmd.input));

    if let Err(e) = fs::write(&output, assembler.binary()) {
        eprintln!("error: could not write {}: {}", output.display(), e);
        return process::ExitCode::from(2);
    }

    if cmd.listing {
        let path = PathBuf::from(format!("{}.lst", output.display()));
        if let Err(e) = fs::write(&path, assembler.listing()) {
            eprintln!("error: could not write {}: {}", path.display(), e);
            return process::ExitCode::from(2);
        }
    }
    if cmd.strip {
        let path = PathBuf::from(format!("{}.strip", output.display()));
        if let Err(e) = fs::write(&path, assembler.stripped()) {
            eprintln!("error: could not write {}: {}", path.display(), e);
            return process::ExitCode::from(2);
        }
    }

    process::ExitCode::SUCCESS
}

fn run_emulate(cmd: EmulateCommand) -> process::ExitCode {
    let rom = match fs::read(&cmd.rom) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: could not read {}: {}", cmd.rom.display(), e);
            return process::ExitCode::from(1);
        }
    };

    let mut emulator = Emulator::new(Quirks::default(), cmd.frequency);
    if let Err(e) = emulator.load_rom(&rom) {
        eprintln!("error: {}", e);
        return process::ExitCode::from(1);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Err(e) = emulator.run() {
            eprintln!("error: {}", e);
            return process::ExitCode::from(1);
        }
        if emulator.cpu().spinning() || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    log::info!(
        "executed {} instructions, spinning={}",
        emulator.cpu().instruction_count(),
        emulator.cpu().spinning()
    );
    println!("{:?}", emulator.cpu().memory());

    process::ExitCode::SUCCESS
}

fn main() -> process::ExitCode {
    env_logger::init();
    let args: Args = argh::from_env();
    match args.nested {
        SubCommands::Assemble(cmd) => run_assemble(cmd),
        SubCommands::Emulate(cmd) => run_emulate(cmd),
    }
}
