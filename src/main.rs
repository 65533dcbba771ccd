// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use fakeit::{
    controller::{Controller, StopHandle},
    devices::{self, DEFAULT_DEVICE_DIR, LISTEN_PREFIX},
    serial::{DeviceSettings, Parity},
    session::DeviceConnector,
    trigger::{LogTrigger, TriggerMap},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=serial drum trigger

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/fakeit
ExecStart=/usr/local/bin/fakeit start "$FAKEIT_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=fakeit.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays drums from bytes arriving on a serial device."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the serial devices in a directory.
    Devices {
        /// The directory to scan.
        #[arg(short, long, default_value = DEFAULT_DEVICE_DIR)]
        dir: PathBuf,
        /// Only list devices whose names start with this prefix (tty. or cu.).
        #[arg(short, long, default_value = LISTEN_PREFIX)]
        prefix: String,
    },
    /// Monitors a serial device until interrupted.
    Monitor {
        /// The device path, e.g. /dev/tty.usbmodem14201.
        device: PathBuf,
        /// Bits per second.
        #[arg(short, long, default_value_t = 9600)]
        baud: i64,
        /// Data bits per character (5-8).
        #[arg(long, default_value_t = 8)]
        data_bits: i64,
        /// Stop bits (1 or 2).
        #[arg(long, default_value_t = 1)]
        stop_bits: i64,
        /// Parity: none, even or odd.
        #[arg(long, default_value = "none")]
        parity: Parity,
        /// VMIN: bytes each read waits for.
        #[arg(long, default_value_t = 0)]
        min_read: i64,
        /// VTIME: read timer in tenths of a second.
        #[arg(short, long, default_value_t = 1)]
        timeout: i64,
        /// Reconnect after this long if the device goes away, e.g. 2s.
        #[arg(short, long)]
        reconnect: Option<String>,
    },
    /// Monitors the device described by a configuration file until interrupted.
    Start {
        /// The path to the configuration file.
        config_path: PathBuf,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices { dir, prefix } => {
            let devices = devices::list_devices(&dir, &prefix)?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", dir.join(device).display());
            }
        }
        Commands::Monitor {
            device,
            baud,
            data_bits,
            stop_bits,
            parity,
            min_read,
            timeout,
            reconnect,
        } => {
            let settings = DeviceSettings::builder()
                .baud_rate(baud)
                .data_bits(data_bits)
                .stop_bits(stop_bits)
                .parity(parity)
                .minimum_read_bytes(min_read)
                .read_timeout_deciseconds(timeout)
                .build()?;
            let reconnect_delay = match reconnect {
                Some(reconnect) => Some(Duration::from(DurationString::from_string(reconnect)?)),
                None => None,
            };

            run_until_interrupted(Controller::new(
                Arc::new(DeviceConnector::new(device)),
                settings,
                TriggerMap::default(),
                Arc::new(LogTrigger::new()),
                reconnect_delay,
            ))
            .await?;
        }
        Commands::Start { config_path } => {
            run_until_interrupted(fakeit::config::init_controller(&config_path)?).await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE);
        }
    }

    Ok(())
}

/// Waits for the controller, stopping it on Ctrl-C.
async fn run_until_interrupted(mut controller: Controller) -> Result<(), Box<dyn Error>> {
    let stop: StopHandle = controller.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted, stopping."),
            Err(e) => error!(err = %e, "Unable to listen for Ctrl-C, stopping."),
        }
        stop.stop();
    });

    controller.join().await?;
    Ok(())
}
