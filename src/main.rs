//! MISC Emulator - CLI Entry Point
//!
//! Commands:
//! - `misc-emu run <program>` - Run an image or ASM file
//! - `misc-emu debug <program>` - Interactive debugger
//! - `misc-emu asm <source>` - Assemble to a binary image
//! - `misc-emu disasm <image>` - Disassemble a binary image

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use misc::cpu::{PulseObserver, StopReason, TraceObserver, BANK_SIZE};
use misc::{Bank, Cpu, Word};

#[derive(Parser)]
#[command(name = "misc-emu")]
#[command(version)]
#[command(about = "An emulator of a minimal 16-bit instruction-set computer")]
struct Cli {
    /// Increase the level of verbosity. Can be used multiple times.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "misc=debug,misc_emu=debug,info",
            2 => "misc=trace,misc_emu=trace,info",
            _ => "trace",
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse log level from env, or infer from args
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_filter()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it idles or the cycle budget runs out
    Run {
        /// Path to the binary image or ASM file to execute
        program: String,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Log every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
        /// Preload a register bank, e.g. `--reg r=1,2,0x10`
        #[arg(long = "reg", value_parser = parse_bank_preload)]
        regs: Vec<(Bank, [Word; BANK_SIZE])>,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the binary image or ASM file to debug
        program: String,
    },
    /// Assemble source to a binary image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a binary image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(cli.filter_layer())
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, json, regs }) => {
            run_program(&program, max_cycles, trace, json, &regs);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        None => {
            println!("MISC Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!("A minimal 16-bit instruction-set computer");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Parse `BANK=v0,v1,...`; missing registers are zero.
fn parse_bank_preload(arg: &str) -> Result<(Bank, [Word; BANK_SIZE]), String> {
    let (bank, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected BANK=values, got '{arg}'"))?;

    let bank = match bank.trim().to_ascii_lowercase().as_str() {
        "r" => Bank::R,
        "s" => Bank::S,
        "t" => Bank::T,
        other => return Err(format!("unknown register bank '{other}'")),
    };

    let mut words = [0; BANK_SIZE];
    for (i, value) in values.split(',').enumerate() {
        if i >= BANK_SIZE {
            return Err(format!("a bank holds at most {BANK_SIZE} registers"));
        }
        let value = value.trim();
        let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            Some(hex) => Word::from_str_radix(hex, 16),
            None => value.parse::<Word>(),
        };
        words[i] = parsed.map_err(|e| format!("invalid register value '{value}': {e}"))?;
    }

    Ok((bank, words))
}

/// Print a progress line; goes to stderr when stdout is reserved for output.
macro_rules! status {
    ($to_stderr:expr, $($arg:tt)*) => {
        if $to_stderr {
            eprintln!($($arg)*);
        } else {
            println!($($arg)*);
        }
    };
}

/// Load a program, assembling `.asm` sources.
fn load_program(path: &str, to_stderr: bool) -> Vec<Word> {
    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match misc::assemble(&source) {
            Ok(words) => {
                status!(to_stderr, "📝 Assembled {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match misc::load_image(path) {
            Ok(words) => {
                status!(to_stderr, "📂 Loaded {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Final machine state for `run --json`.
#[derive(Serialize)]
struct Report<'a> {
    cycles: u64,
    stop: Option<StopReason>,
    error: Option<String>,
    pc: usize,
    stack_top: usize,
    registers: &'a [[Word; BANK_SIZE]; 3],
}

impl<'a> Report<'a> {
    fn new(cpu: &'a Cpu, result: &Result<StopReason, misc::CpuError>) -> Self {
        Self {
            cycles: cpu.cycles,
            stop: result.as_ref().ok().copied(),
            error: result.as_ref().err().map(|e| e.to_string()),
            pc: cpu.pc(),
            stack_top: cpu.stack().last(),
            registers: cpu.regs.banks(),
        }
    }
}

fn run_program(
    path: &str,
    max_cycles: u64,
    trace: bool,
    json: bool,
    regs: &[(Bank, [Word; BANK_SIZE])],
) {
    status!(json, "🔧 Running: {}", path);
    let program = load_program(path, json);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load(&program, 0) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    for &(bank, values) in regs {
        cpu.load_registers(bank, values);
    }

    let mut tracer = TraceObserver::new();
    let mut silent = ();
    let observer: &mut dyn PulseObserver = if trace { &mut tracer } else { &mut silent };

    let result = cpu.run_until_idle(max_cycles, observer);

    if json {
        match serde_json::to_string_pretty(&Report::new(&cpu, &result)) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("❌ Failed to encode report: {}", e),
        }
    } else {
        print_state(&cpu);
    }

    match result {
        Ok(StopReason::Idle) => {}
        Ok(StopReason::CycleLimit) => {
            status!(json, "");
            status!(json, "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
        }
        Err(e) => {
            eprintln!("❌ CPU error at PC={:04x}: {}", cpu.pc(), e);
            std::process::exit(1);
        }
    }
}

fn print_state(cpu: &Cpu) {
    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles);
    println!("PC:     {:04x}", cpu.pc());
    println!("Stack:  top {:04x}, depth {}", cpu.stack().last(), cpu.stack().depth());
    for bank in Bank::ALL {
        let values: Vec<String> = cpu.regs.bank(bank).iter().map(|w| format!("{w:04x}")).collect();
        println!("{}:      {}", bank, values.join(" "));
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    println!("🔍 Loading: {}", path);
    let program = load_program(path, false);

    println!("🚀 Launching debugger...");

    if let Err(e) = misc::run_debugger(program) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| {
        match source_path.strip_suffix(".asm") {
            Some(stem) => format!("{stem}.bin"),
            None => format!("{source_path}.bin"),
        }
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let words = match misc::assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} words", words.len());

    if let Err(e) = misc::save_image(&out_path, &words) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    println!("📖 Disassembling: {}", image_path);
    println!();

    let words = match misc::load_image(image_path) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", misc::disassemble(&words));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bank_preload() {
        let (bank, values) = parse_bank_preload("s=1,0x10, 3").unwrap();
        assert_eq!(bank, Bank::S);
        assert_eq!(&values[..4], &[1, 16, 3, 0]);

        assert!(parse_bank_preload("x=1").is_err());
        assert!(parse_bank_preload("r").is_err());
        assert!(parse_bank_preload("r=70000").is_err());
        let too_many = format!("t={}", vec!["1"; 17].join(","));
        assert!(parse_bank_preload(&too_many).is_err());
    }

    #[test]
    fn test_json_report() {
        let mut cpu = Cpu::new();
        cpu.load(&misc::assemble("not r0, 0\nhalt: jmp halt").unwrap(), 0).unwrap();
        let result = cpu.run_until_idle(10, &mut ());

        let text = serde_json::to_string_pretty(&Report::new(&cpu, &result)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["stop"], "Idle");
        assert_eq!(value["cycles"], 2);
        assert_eq!(value["pc"], 2);
        assert!(value["error"].is_null());
        assert_eq!(value["registers"][0][0], 0xFFFF);
    }

    #[test]
    fn test_json_report_on_fault() {
        let mut cpu = Cpu::new();
        cpu.load(&[0xF000, 0], 0).unwrap();
        let result = cpu.run_until_idle(10, &mut ());

        let value = serde_json::to_value(Report::new(&cpu, &result)).unwrap();

        assert!(value["stop"].is_null());
        assert_eq!(value["error"], "undefined opcode 15");
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
