//! Command-line entry point: runs a batch file through the simulator.
//!
//! Usage: `mos-sim [INPUT] [OUTPUT]`, defaulting to `input.txt` and
//! `output.txt` in the working directory. The `MOS_LOG` environment
//! variable selects the diagnostic level on stderr (`error` through
//! `trace`, default `warn`).

use std::env;
use std::fs;
use std::io::BufWriter;

use anyhow::{anyhow, Context, Result};
use log::{LevelFilter, Metadata, Record};

use mos_sim::err::report;
use mos_sim::parse::parse_deck;
use mos_sim::sim::{SimOutput, System, SystemFlags};

/// Diagnostic logger writing to stderr, kept apart from the batch output.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

fn init_logger() {
    let level = env::var("MOS_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() -> Result<()> {
    init_logger();

    let mut args = env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "input.txt".to_string());
    let output = args.next().unwrap_or_else(|| "output.txt".to_string());

    let src = fs::read_to_string(&input)
        .with_context(|| format!("failed to open input file: {input}"))?;
    let jobs = parse_deck(&src).map_err(|e| anyhow!("{}", report(&e)))?;

    let out_file = fs::File::create(&output)
        .with_context(|| format!("failed to open output file: {output}"))?;
    let mut system = System::new(
        SystemFlags::default(),
        SimOutput::writer(BufWriter::new(out_file)),
    );
    system.load_deck(jobs).map_err(|e| anyhow!("{}", report(&e)))?;
    system.run();
    Ok(())
}
