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
use std::time::Duration;

use serde::Deserialize;

use crate::serial::{DeviceSettings, Parity};

use super::{error::ConfigError, parse_duration};

/// A YAML representation of the serial line settings. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Serial {
    /// Bits per second (default: 9600).
    baud_rate: Option<i64>,

    /// Data bits per character, 5-8 (default: 8).
    data_bits: Option<i64>,

    /// Stop bits, 1 or 2 (default: 1).
    stop_bits: Option<i64>,

    /// none, even or odd (default: none).
    parity: Option<Parity>,

    /// RTS/CTS.
    hardware_flow_control: Option<bool>,

    /// XON/XOFF.
    software_flow_control: Option<bool>,

    /// Output post-processing.
    process_output: Option<bool>,

    /// VMIN (default: 0).
    minimum_read_bytes: Option<i64>,

    /// VTIME as a duration string, e.g. "100ms" (default: 100ms).
    read_timeout: Option<String>,
}

impl Serial {
    /// Converts the configuration into validated device settings.
    pub fn settings(&self) -> Result<DeviceSettings, ConfigError> {
        let mut builder = DeviceSettings::builder();

        if let Some(baud_rate) = self.baud_rate {
            builder = builder.baud_rate(baud_rate);
        }
        if let Some(data_bits) = self.data_bits {
            builder = builder.data_bits(data_bits);
        }
        if let Some(stop_bits) = self.stop_bits {
            builder = builder.stop_bits(stop_bits);
        }
        if let Some(parity) = self.parity {
            builder = builder.parity(parity);
        }
        if let Some(hardware_flow_control) = self.hardware_flow_control {
            builder = builder.hardware_flow_control(hardware_flow_control);
        }
        if let Some(software_flow_control) = self.software_flow_control {
            builder = builder.software_flow_control(software_flow_control);
        }
        if let Some(process_output) = self.process_output {
            builder = builder.process_output(process_output);
        }
        if let Some(minimum_read_bytes) = self.minimum_read_bytes {
            builder = builder.minimum_read_bytes(minimum_read_bytes);
        }
        if let Some(read_timeout) = &self.read_timeout {
            builder = builder.read_timeout_deciseconds(deciseconds(read_timeout)?);
        }

        Ok(builder.build()?)
    }
}

fn deciseconds(value: &str) -> Result<i64, ConfigError> {
    let timeout: Duration = parse_duration("read_timeout", value)?;
    let millis = timeout.as_millis();
    if millis % 100 != 0 || timeout.subsec_nanos() % 1_000_000 != 0 {
        return Err(ConfigError::ReadTimeoutPrecision(value.to_string()));
    }
    // Anything past i64 is far beyond what VTIME holds; let the builder reject it.
    Ok(i64::try_from(millis / 100).unwrap_or(i64::MAX))
}
