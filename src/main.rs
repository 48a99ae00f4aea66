//! Binary entrypoint for the enocean-rx CLI.
//!
//! Commands:
//! - `listen [--port <path>] [--baud <rate>] [--json]` - stream readings from a USB gateway until Ctrl-C
//! - `init` - create a starter `config.toml`
//! - `replay <file> [--chunk <n>] [--json]` - run a hex capture through the receiver
//! - `decode <hex>` - take a single ESP3 frame apart
//!
//! See the library crate docs for module‑level details: `enocean_rx::`.
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};

use enocean_rx::config::Config;
use enocean_rx::enocean::{RawFrame, Telegram};
use enocean_rx::metrics::StatsSnapshot;
use enocean_rx::pipeline::Pipeline;
use enocean_rx::receiver::{Receiver, ReceiverOptions};
use enocean_rx::source::replay::parse_hex;
use enocean_rx::source::ReplaySource;
use enocean_rx::Reading;

#[derive(Parser)]
#[command(name = "enocean-rx")]
#[command(about = "Receiver for EnOcean ESP3/ERP2 sensor telegrams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen on the USB gateway and print readings
    Listen {
        /// Serial port of the gateway (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,
        /// Print readings as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Write a default configuration file
    Init,
    /// Feed a recorded hex capture through the receiver
    Replay {
        /// Capture file, one read per line
        file: String,
        /// Re-split the capture into reads of at most N bytes
        #[arg(long)]
        chunk: Option<usize>,
        /// Print readings as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Decode a single ESP3 frame given as hex
    Decode {
        /// Frame bytes, e.g. "55 00 09 02 0A ..."
        hex: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(None, cli.verbose);
        if Path::new(&cli.config).exists() {
            bail!("{} already exists; remove it first", cli.config);
        }
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = load_or_default(&cli.config).await?;
    init_logging(Some(&config), cli.verbose);

    match cli.command {
        Commands::Listen { port, baud, json } => {
            #[cfg(not(feature = "serial"))]
            {
                let _ = (port, baud, json);
                log::error!("Listen requires the 'serial' feature");
                std::process::exit(2);
            }
            #[cfg(feature = "serial")]
            listen(config, port, baud, json).await?;
        }
        Commands::Replay { file, chunk, json } => {
            let mut source = ReplaySource::load(&file).await?;
            if let Some(n) = chunk {
                source = source.rechunk(n);
            }
            info!("Replaying {} ({} bytes)", file, source.remaining());

            let pipeline = Pipeline::new(config.framer_options(), config.registry()?);
            let opts = ReceiverOptions {
                stop_when_exhausted: true,
                ..config.receiver_options()
            };
            let (receiver, sink) = Receiver::start_with_sink(
                source,
                pipeline,
                move |r: Reading| print_reading(&r, json),
                opts,
            )?;
            let stats = receiver.stats();
            let result = tokio::task::spawn_blocking(move || receiver.join())
                .await
                .map_err(|e| anyhow!("reader join failed: {}", e))?;
            let _sink = sink.await.map_err(|e| anyhow!("dispatcher failed: {}", e))?;
            log_stats(&stats.snapshot());
            result?;
        }
        Commands::Decode { hex } => {
            decode_one(&config, &hex)?;
        }
        Commands::Init => {}
    }

    Ok(())
}

#[cfg(feature = "serial")]
async fn listen(config: Config, port: Option<String>, baud: Option<u32>, json: bool) -> Result<()> {
    use enocean_rx::source::SerialSource;
    use std::time::Duration;

    // CLI overrides config
    let port = port.unwrap_or_else(|| config.device.port.clone());
    if port.is_empty() {
        bail!("No --port specified and no device port configured");
    }
    let baud = baud.unwrap_or(config.device.baud_rate);
    info!("Starting enocean-rx v{}", env!("CARGO_PKG_VERSION"));

    let source = SerialSource::open(&port, baud)?;
    let pipeline = Pipeline::new(config.framer_options(), config.registry()?);
    info!("{} sender binding(s) active", pipeline.registry().len());

    let (receiver, sink) = Receiver::start_with_sink(
        source,
        pipeline,
        move |r: Reading| print_reading(&r, json),
        config.receiver_options(),
    )?;
    let handle = receiver.handle();
    let stats = receiver.stats();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupt received, shutting down");
        }
        _ = async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        } => {
            warn!("Reader stopped on its own");
        }
    }

    let result = tokio::task::spawn_blocking(move || receiver.shutdown())
        .await
        .map_err(|e| anyhow!("reader join failed: {}", e))?;
    let _sink = sink.await.map_err(|e| anyhow!("dispatcher failed: {}", e))?;
    log_stats(&stats.snapshot());
    result
}

fn decode_one(config: &Config, hex: &str) -> Result<()> {
    let bytes = parse_hex(hex)?;
    let frame = RawFrame::new(bytes)?;
    let header = frame.header();
    println!(
        "ESP3 type=0x{:02X} data={} optional={} header_crc={} data_crc={}",
        header.packet_type,
        header.data_len,
        header.opt_len,
        crc_status(header.verify_crc().is_ok()),
        crc_status(frame.verify_data_crc().is_ok()),
    );

    let telegram = Telegram::decode(&frame)?;
    println!(
        "ERP2 header=0x{:02X} originator={} destination={} payload=[{}] rssi={} dBm",
        telegram.header.0,
        telegram.originator,
        telegram
            .destination
            .map_or_else(|| "-".to_string(), |d| d.to_string()),
        enocean_rx::logutil::hex_snippet(&telegram.payload, telegram.payload.len()),
        telegram.rssi_dbm
    );

    let registry = config.registry()?;
    match registry.decode(&telegram, Utc::now()) {
        Ok(reading) => println!("{}", reading),
        Err(e) => println!("dropped: {}", e),
    }
    Ok(())
}

fn crc_status(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "BAD"
    }
}

fn print_reading(reading: &Reading, json: bool) {
    if json {
        match serde_json::to_string(reading) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize reading: {}", e),
        }
    } else {
        println!("{} {}", reading.time_label(), reading);
    }
}

fn log_stats(snap: &StatsSnapshot) {
    info!(
        "{} bytes, {} frames, {} readings, {} dropped ({} unknown sender), {} noise bytes, {} read errors",
        snap.bytes_received,
        snap.frames,
        snap.readings,
        snap.dropped(),
        snap.unknown_senders,
        snap.noise_bytes,
        snap.read_errors
    );
}

/// A missing file falls back to defaults; an invalid one is an error.
async fn load_or_default(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::load(path).await
    } else {
        Ok(Config::default())
    }
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config.map_or(log::LevelFilter::Info, |c| c.logging.level_filter()),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Mirror to the console only in the foreground
        let is_tty = atty::is(atty::Stream::Stderr);

        builder.format(move |fmt, record| {
            let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());

            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }

            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
