use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use retro_core::config::{MachineConfig, Preset};
use retro_core::cpu_8086::{Cpu8086, TraceStep};
use retro_core::logging::{LogConfig, LogLevel};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    /// Raw binary image to load (e.g. a .COM file)
    image: PathBuf,

    /// JSON machine description (preset, memory size, register overrides)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Register preset; overrides the config file
    #[arg(long, value_enum)]
    preset: Option<PresetArg>,

    /// Maximum number of instructions to execute
    #[arg(long, default_value_t = 100_000)]
    steps: u64,

    /// Print every executed instruction as a JSON line
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Hex dump of a linear range after the run, e.g. 10200:10300
    #[arg(long)]
    dump: Option<String>,

    /// Core log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Send core log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Core log messages allowed per category per second
    #[arg(long)]
    log_rate_limit: Option<usize>,

    /// Write the final CPU state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Dos,
    Bios,
    None,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Dos => Preset::Dos,
            PresetArg::Bios => Preset::Bios,
            PresetArg::None => Preset::None,
        }
    }
}

/// Parse `START:END` as two hex linear addresses
fn parse_range(range: &str) -> Result<(u32, u32)> {
    let Some((start, end)) = range.split_once(':') else {
        bail!("Dump range must look like START:END, got {}", range);
    };
    let parse = |s: &str| {
        let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
        u32::from_str_radix(digits, 16).with_context(|| format!("Invalid hex address: {}", s))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if end < start {
        bail!("Dump range ends before it starts: {:05X}:{:05X}", start, end);
    }
    Ok((start, end))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MachineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MachineConfig::default(),
    };
    if let Some(preset) = args.preset {
        config.preset = preset.into();
    }
    if args.trace {
        config.trace = true;
    }
    if args.log_level.is_some() {
        config.log_level = args.log_level.clone();
    }

    if let Some(name) = &config.log_level {
        let Some(level) = LogLevel::from_str(name) else {
            bail!("Unknown log level: {}", name);
        };
        LogConfig::global().set_global_level(level);
    }
    if let Some(limit) = args.log_rate_limit {
        LogConfig::global().set_rate_limit(limit);
    }
    if let Some(path) = &args.log_file {
        LogConfig::global()
            .set_log_file(path.clone())
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
    }

    let dump = args.dump.as_deref().map(parse_range).transpose()?;

    let image = fs::read(&args.image)
        .with_context(|| format!("Failed to read image {}", args.image.display()))?;
    let mut cpu = Cpu8086::with_options(config.build_memory()?, config.options());
    let segment = config.load_segment.unwrap_or(cpu.registers().cs());
    let offset = config.load_offset.unwrap_or(cpu.registers().ip());
    cpu.load_program(segment, offset, &image)?;
    info!(
        "Loaded {} bytes at {:04X}:{:04X}",
        image.len(),
        segment,
        offset
    );

    if config.trace {
        cpu.set_tracer(Box::new(|step: &TraceStep| {
            match serde_json::to_string(step) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize trace step: {}", e),
            }
        }));
    }

    let mut executed = 0u64;
    while executed < args.steps && !cpu.halted() {
        let (cs, ip) = (cpu.registers().cs(), cpu.registers().ip());
        cpu.step()
            .with_context(|| format!("Execution failed at {:04X}:{:04X}", cs, ip))?;
        executed += 1;
    }
    if cpu.halted() {
        info!("Halted after {} instructions, {} cycles", executed, cpu.cycles());
    } else {
        warn!("Step limit of {} reached without HLT", args.steps);
    }

    let state = cpu.save_state();
    println!("{}", serde_json::to_string_pretty(&state)?);

    if let Some((start, end)) = dump {
        for line in cpu.memory().dump(start, end) {
            println!("{}", line);
        }
    }

    if let Some(path) = &args.save {
        fs::write(path, serde_json::to_string_pretty(&state)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    // Drops the writer's sender so queued lines reach the file
    LogConfig::global().clear_log_file();
    Ok(())
}
