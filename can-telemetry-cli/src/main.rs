//! CAN Telemetry CLI Application
//!
//! Replays candump logs through the telemetry decoder and prints the
//! resulting vehicle state snapshot. Message definitions come from the
//! built-in controller catalog and/or DBC files.

use anyhow::{Context, Result};
use can_telemetry_decoder::formats::CandumpReader;
use can_telemetry_decoder::signals::dbc;
use can_telemetry_decoder::{catalog, DispatchTable, FrameDispatcher, LengthPolicy, LogSink};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::{CliSink, RunSummary};

/// CAN Telemetry - Decode controller telemetry from CAN logs
#[derive(Parser, Debug)]
#[command(name = "can-telemetry-cli")]
#[command(about = "Decode motor controller telemetry from candump logs", long_about = None)]
#[command(version)]
struct Args {
    /// candump log file(s) to replay (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    log: Vec<PathBuf>,

    /// DBC file(s) with extra message definitions (can be repeated)
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,

    /// Do not load the built-in controller catalog
    #[arg(long)]
    no_builtin: bool,

    /// Reject payloads longer than the message definition
    #[arg(long)]
    exact_length: bool,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Maximum number of frames to replay
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_telemetry_decoder::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let config = apply_overrides(config, &args);

    let table = build_table(&config)?;
    let stats = table.stats();
    log::info!(
        "Dispatch table: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );

    let sink = CliSink::new(LogSink::from_config(&config.decoder));
    let mut dispatcher = FrameDispatcher::with_sink(table, config.decoder.clone(), sink);
    log::info!("Length policy: {:?}", dispatcher.config().length_policy);

    let parse_errors = replay(&mut dispatcher, &config)?;

    let logs = config
        .input
        .logs
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    let summary = RunSummary::new(
        logs,
        parse_errors,
        dispatcher.stats(),
        dispatcher.sink().record(),
        dispatcher.state(),
        config.output.show_unset,
    );

    let mut out: Box<dyn Write> = match &config.output.file {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    match config.output.format {
        OutputFormat::Txt => report::write_txt(&mut out, &summary)?,
        OutputFormat::Json => report::write_json(&mut out, &summary)?,
    }
    out.flush()?;

    Ok(())
}

/// Command line flags win over the config file
fn apply_overrides(mut config: AppConfig, args: &Args) -> AppConfig {
    config.input.logs.extend(args.log.iter().cloned());
    config.input.dbc_files.extend(args.dbc.iter().cloned());
    if args.no_builtin {
        config.input.builtin_catalog = false;
    }
    if args.max_frames.is_some() {
        config.input.max_frames = args.max_frames;
    }
    if args.exact_length {
        config.decoder.length_policy = LengthPolicy::Exact;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.output.is_some() {
        config.output.file = args.output.clone();
    }
    config
}

/// Collect definitions from every configured source
///
/// Any invalid definition aborts startup.
fn build_table(config: &AppConfig) -> Result<DispatchTable> {
    let mut table = DispatchTable::new();

    if config.input.builtin_catalog {
        for message in catalog::messages() {
            table.add_message(message)?;
        }
    }

    for dbc_path in &config.input.dbc_files {
        let messages = dbc::parse_dbc_file(dbc_path)
            .with_context(|| format!("Failed to load DBC {:?}", dbc_path))?;
        for message in messages {
            let (id, name) = (message.id, message.name.clone());
            table
                .add_message(message)
                .with_context(|| format!("Invalid message {} (0x{:X}) in {:?}", name, id, dbc_path))?;
        }
    }

    Ok(table)
}

/// Feed every log through the dispatcher, returning the number of bad lines
fn replay(dispatcher: &mut FrameDispatcher<CliSink>, config: &AppConfig) -> Result<usize> {
    let mut parse_errors = 0;
    let mut frames = 0usize;
    let limit = config.input.max_frames.unwrap_or(usize::MAX);

    for log_path in &config.input.logs {
        log::info!("Replaying log file: {:?}", log_path);
        let reader = CandumpReader::open(log_path)
            .with_context(|| format!("Failed to open log {:?}", log_path))?;

        for frame in reader {
            if frames >= limit {
                log::info!("Frame limit of {} reached", limit);
                return Ok(parse_errors);
            }
            match frame {
                Ok(frame) => {
                    frames += 1;
                    dispatcher.decode_frame(&frame);
                }
                Err(e) => {
                    parse_errors += 1;
                    log::warn!("{:?}: {}", log_path, e);
                }
            }
        }
    }

    if config.input.logs.is_empty() {
        log::warn!("No log files given; reporting an empty snapshot");
    }
    Ok(parse_errors)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
