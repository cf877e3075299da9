mod alert;
mod config;
mod constants;
mod epm_header;
mod error;
mod housekeeping;
mod packet;
mod packet_cache;
mod packet_file;
mod playback;
mod realtime;
mod server;
mod source;
mod synthesis;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use crate::config::{Config, PacketSourceKind};
use crate::error::{CacheError, ServerError};
use crate::packet_cache::PacketCache;
use crate::server::SessionServer;

/// EPM/GRIP CLWS packet server emulator. Waits for a client to connect and then sends out HK and RT packets.
#[derive(Debug, Parser)]
#[command(name = "clws_emulator", version, about)]
struct Cli {
    /// YAML configuration file. Defaults are used for anything it leaves out.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Play back packets from the capture file
    #[arg(long, conflicts_with = "constructed")]
    recorded: bool,

    /// Construct simulated packets
    #[arg(long)]
    constructed: bool,

    /// Debug level logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Serve telemetry to one client at a time (default)
    Serve,
    /// Poll the packet caches and log the latest records
    Monitor,
    /// Write the effective configuration to a YAML file and exit
    WriteConfig { path: PathBuf },
}

fn load_config(cli: &Cli) -> Result<Config, crate::error::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::read_config_file(path)?,
        None => Config::default(),
    };
    if cli.recorded {
        config.packet_source = PacketSourceKind::Recorded;
    } else if cli.constructed {
        config.packet_source = PacketSourceKind::Constructed;
    }
    Ok(config)
}

fn serve(config: &Config) -> Result<(), ServerError> {
    match config.packet_source {
        PacketSourceKind::Recorded => info!("Sending pre-recorded packets from {}", config.playback.capture_file.display()),
        PacketSourceKind::Constructed => info!("Constructing simulated packets"),
    }
    let mut server = SessionServer::new(config)?;
    server.run()
}

fn monitor(config: &Config) -> Result<(), CacheError> {
    let mut cache = PacketCache::from_config(&config.cache);
    info!("Monitoring packet caches at {}", cache.get_root().display());
    loop {
        cache.log_latest()?;
        std::thread::sleep(config.cache.poll_interval());
    }
}

fn fatal(error: &dyn Error, show_dialog: bool) -> ! {
    alert::report_fatal(error, show_dialog);
    std::process::exit(-1)
}

fn main() {
    let cli = Cli::parse();

    //Setup logging
    let level = if cli.verbose { simplelog::LevelFilter::Debug } else { simplelog::LevelFilter::Info };
    if let Err(e) = simplelog::TermLogger::init(level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto)
    {
        eprintln!("Could not start the logger: {}", e);
    }

    info!("CLWS Emulator {} started. This is the EPM/GRIP packet server emulator.", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fatal(&e, false),
    };

    match cli.mode.clone().unwrap_or(Mode::Serve) {
        Mode::Serve => {
            if let Err(e) = serve(&config) {
                fatal(&e, config.alert_on_fatal);
            }
        }
        Mode::Monitor => {
            if let Err(e) = monitor(&config) {
                fatal(&e, config.alert_on_fatal);
            }
        }
        Mode::WriteConfig { path } => {
            if let Err(e) = config.write_config_file(&path) {
                fatal(&e, false);
            }
            info!("Configuration written to {}", path.display());
        }
    }
}
