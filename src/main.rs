//! CamJam CLI
//!
//! Loads the camera configuration, starts capture and serves the selected
//! camera over HTTP until interrupted.

use camjam::capture::{list_devices, SystemDriver};
use camjam::{FileConfig, Server};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "camjam", version, about = "Multi-camera MJPEG streaming server")]
struct Cli {
    /// Configuration file. Defaults to the first file found on the search path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// List video devices and exit.
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.list_devices {
        return print_devices();
    }

    info!("CamJam v{}", camjam::VERSION);

    let config = match FileConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = match config.server.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::start(&config, &SystemDriver) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let token = server.shutdown_token();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutdown requested");
        token.cancel();
    }) {
        warn!("Could not install signal handler: {}", e);
    }

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            server.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    match server.serve(listener).await {
        Ok(()) => {
            info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_devices() -> ExitCode {
    match list_devices() {
        Ok(devices) if devices.is_empty() => {
            println!("No video devices found");
            ExitCode::SUCCESS
        }
        Ok(devices) => {
            for device in devices {
                match device.card {
                    Some(card) => println!("{}\t{}", device.path.display(), card),
                    None => println!("{}", device.path.display()),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to list devices: {}", e);
            ExitCode::FAILURE
        }
    }
}
