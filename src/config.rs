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
use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;
use tracing::info;

use crate::{
    controller::Controller,
    devices::{self, DEFAULT_DEVICE_DIR, LISTEN_PREFIX},
    serial::DeviceSettings,
    session::DeviceConnector,
    trigger::{Drum, LogTrigger, TriggerMap},
};

mod error;
mod serial;

pub use self::error::ConfigError;
pub use self::serial::Serial;

/// Maps one byte value to a drum.
#[derive(Deserialize, Clone, Debug)]
pub struct TriggerMapping {
    byte: u8,
    drum: Drum,
}

/// The YAML configuration for `fakeit start`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Monitor {
    /// The device to monitor. When unset, the first match of `prefix` in `device_dir`.
    device: Option<String>,

    /// Where to look for devices (default: /dev).
    device_dir: Option<String>,

    /// Device name prefix (default: tty.).
    prefix: Option<String>,

    /// Line settings.
    serial: Option<Serial>,

    /// Byte to drum mappings (default: 107 -> kick).
    triggers: Option<Vec<TriggerMapping>>,

    /// How long to wait before reconnecting. No reconnection when unset.
    reconnect_delay: Option<String>,
}

impl Monitor {
    /// Parse a monitor configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Monitor, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Monitor>()?)
    }

    pub fn device_dir(&self) -> PathBuf {
        PathBuf::from(self.device_dir.as_deref().unwrap_or(DEFAULT_DEVICE_DIR))
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(LISTEN_PREFIX)
    }

    /// Resolves the device path, scanning the device directory if none is configured.
    pub fn device(&self) -> Result<PathBuf, ConfigError> {
        if let Some(device) = &self.device {
            return Ok(PathBuf::from(device));
        }

        let dir = self.device_dir();
        let prefix = self.prefix();
        match devices::list_devices(&dir, prefix)?.into_iter().next() {
            Some(name) => Ok(dir.join(name)),
            None => Err(ConfigError::NoDevice {
                dir,
                prefix: prefix.to_string(),
            }),
        }
    }

    pub fn settings(&self) -> Result<DeviceSettings, ConfigError> {
        match &self.serial {
            Some(serial) => serial.settings(),
            None => Ok(DeviceSettings::default()),
        }
    }

    pub fn triggers(&self) -> TriggerMap {
        match &self.triggers {
            Some(triggers) => triggers
                .iter()
                .map(|mapping| (mapping.byte, mapping.drum))
                .collect(),
            None => TriggerMap::default(),
        }
    }

    pub fn reconnect_delay(&self) -> Result<Option<Duration>, ConfigError> {
        self.reconnect_delay
            .as_deref()
            .map(|delay| parse_duration("reconnect_delay", delay))
            .transpose()
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration {
            field,
            value: value.to_string(),
            message: e.to_string(),
        })
}

/// Loads the configuration file and starts a controller for it. Settings are validated
/// before the device is touched.
pub fn init_controller(path: &Path) -> Result<Controller, Box<dyn Error>> {
    let config = Monitor::deserialize(path)?;
    let settings = config.settings()?;
    let reconnect_delay = config.reconnect_delay()?;
    let device = config.device()?;

    info!(
        device = %device.display(),
        %settings,
        reconnect_delay = ?reconnect_delay,
        "Loaded configuration."
    );

    Ok(Controller::new(
        Arc::new(DeviceConnector::new(device)),
        settings,
        config.triggers(),
        Arc::new(LogTrigger::new()),
        reconnect_delay,
    ))
}
