mod loader;

use clap::Parser;
use iron_hart_core::core::{Config, Hart, StepOutcome};
use iron_hart_core::csr::Misa;
use iron_hart_core::timer::{TimerConfig, DEFAULT_MTIMECMP_ADDRESS, DEFAULT_MTIME_ADDRESS};
use loader::Image;
use log::{debug, info, warn};
use std::error::Error;
use std::fs;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TOHOST_SYMBOL: &str = "tohost";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// ELF executable to run.
    elf: String,
    /// Symbol whose address receives the exit status.
    #[arg(long, default_value = DEFAULT_TOHOST_SYMBOL)]
    tohost_symbol: String,
    /// ISA string reported by `misa`, e.g. `rv32im`.
    #[arg(long, default_value = "rv32imc")]
    isa: Misa,
    /// Map a machine timer into the address space.
    #[arg(long)]
    timer: bool,
    /// Address of the `mtime` register.
    #[arg(long, value_parser = parse_address, default_value_t = DEFAULT_MTIME_ADDRESS)]
    mtime: u32,
    /// Address of the `mtimecmp` register.
    #[arg(long, value_parser = parse_address, default_value_t = DEFAULT_MTIMECMP_ADDRESS)]
    mtimecmp: u32,
    /// Microseconds between two increments of `mtime`.
    #[arg(long, default_value_t = 1000)]
    tick_us: u64,
    /// Stop after this many instructions.
    #[arg(long)]
    max_steps: Option<u64>,
    /// Increase log verbosity (may be repeated).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parse a decimal or `0x`-prefixed hexadecimal address.
fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid address {s:?}: {err}"))
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();

    stderrlog::new()
        // warn by default
        .verbosity(1 + args.verbose as usize)
        .modules([module_path!(), "iron_hart_core"])
        .init()?;

    let buf = fs::read(&args.elf)?;
    let image = Image::parse(&buf)?;

    let tohost = image.symbol(&args.tohost_symbol);
    if tohost.is_none() {
        if args.tohost_symbol != DEFAULT_TOHOST_SYMBOL {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("symbol `{}` not found in {}", args.tohost_symbol, args.elf),
            )
            .into());
        }
        warn!("No `{DEFAULT_TOHOST_SYMBOL}` symbol, only the exit syscall ends the program");
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let timer = args.timer.then(|| TimerConfig {
        mtime_address: args.mtime,
        mtimecmp_address: args.mtimecmp,
        tick_interval: Duration::from_micros(args.tick_us),
        interrupt: Arc::clone(&interrupt),
    });
    let config = Config {
        misa: args.isa,
        reset_vector: image.entry,
        tohost,
        program_ranges: image.ranges.clone(),
        timer,
        ..Config::default()
    };
    debug!("{config:?}");

    let mut hart = Hart::new(config)?;
    image.load_into(&mut hart);

    let steps = run(&mut hart, args.max_steps);
    interrupt.store(true, Ordering::Release);

    if !hart.done() {
        warn!("Stopped after {steps} steps without the program exiting");
        return Ok(ExitCode::FAILURE);
    }
    let status = hart.tohost();
    info!("Program exited with {status:#x} after {steps} steps");
    Ok(ExitCode::from(status as u8))
}

/// Step the hart until the program exits or `max_steps` instructions have been executed.
/// Returns the number of steps taken.
fn run(hart: &mut Hart, max_steps: Option<u64>) -> u64 {
    let mut steps = 0;
    while !hart.done() && max_steps.map_or(true, |max| steps < max) {
        if let StepOutcome::Trapped(cause) = hart.step() {
            debug!("Trapped at {:#010x}: {cause}", hart.state().pc);
        }
        hart.commit();
        steps += 1;
    }
    steps
}
