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
use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::error::{Error, Setting};

/// Standard line speeds supported by every termios implementation we target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B50,
    B75,
    B110,
    B134,
    B150,
    B200,
    B300,
    B600,
    B1200,
    B1800,
    B2400,
    B4800,
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
    B230400,
}

impl BaudRate {
    const ALL: [BaudRate; 18] = [
        BaudRate::B50,
        BaudRate::B75,
        BaudRate::B110,
        BaudRate::B134,
        BaudRate::B150,
        BaudRate::B200,
        BaudRate::B300,
        BaudRate::B600,
        BaudRate::B1200,
        BaudRate::B1800,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
    ];

    /// Returns the speed in bits per second.
    pub fn bits_per_second(&self) -> u32 {
        match self {
            BaudRate::B50 => 50,
            BaudRate::B75 => 75,
            BaudRate::B110 => 110,
            BaudRate::B134 => 134,
            BaudRate::B150 => 150,
            BaudRate::B200 => 200,
            BaudRate::B300 => 300,
            BaudRate::B600 => 600,
            BaudRate::B1200 => 1200,
            BaudRate::B1800 => 1800,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
        }
    }

    /// Looks up a standard rate by its speed in bits per second.
    pub fn from_bits_per_second(speed: i64) -> Option<BaudRate> {
        BaudRate::ALL
            .into_iter()
            .find(|rate| i64::from(rate.bits_per_second()) == speed)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

/// The number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    fn from_count(count: i64) -> Option<DataBits> {
        match count {
            5 => Some(DataBits::Five),
            6 => Some(DataBits::Six),
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            _ => None,
        }
    }

    /// Returns the number of bits.
    pub fn count(&self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// The number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    fn from_count(count: i64) -> Option<StopBits> {
        match count {
            1 => Some(StopBits::One),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }

    /// Returns the number of bits.
    pub fn count(&self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Parity::None),
            "even" => Ok(Parity::Even),
            "odd" => Ok(Parity::Odd),
            _ => Err(format!("unknown parity '{}'", s)),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "N",
            Parity::Even => "E",
            Parity::Odd => "O",
        };
        f.write_str(name)
    }
}

/// The line configuration to apply to a serial device.
///
/// Settings are validated when they are built, so a `DeviceSettings` value is always
/// representable in the terminal control structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    baud_rate: BaudRate,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    hardware_flow_control: bool,
    software_flow_control: bool,
    process_output: bool,
    minimum_read_bytes: u8,
    read_timeout_deciseconds: u8,
}

impl Default for DeviceSettings {
    /// 9600 8N1 with a 100ms read timer, so reads return regularly even when idle.
    fn default() -> Self {
        DeviceSettings {
            baud_rate: BaudRate::B9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            hardware_flow_control: false,
            software_flow_control: false,
            process_output: false,
            minimum_read_bytes: 0,
            read_timeout_deciseconds: 1,
        }
    }
}

impl DeviceSettings {
    /// Starts building settings from the defaults.
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn hardware_flow_control(&self) -> bool {
        self.hardware_flow_control
    }

    pub fn software_flow_control(&self) -> bool {
        self.software_flow_control
    }

    pub fn process_output(&self) -> bool {
        self.process_output
    }

    /// VMIN: the number of bytes a read waits for.
    pub fn minimum_read_bytes(&self) -> u8 {
        self.minimum_read_bytes
    }

    /// VTIME: the read timer in tenths of a second.
    pub fn read_timeout_deciseconds(&self) -> u8 {
        self.read_timeout_deciseconds
    }

    /// Returns true if a read can block forever when no data arrives. With VMIN and VTIME
    /// both zero the opposite holds, see [`DeviceSettings::polls`].
    pub fn blocks_indefinitely(&self) -> bool {
        self.minimum_read_bytes > 0 && self.read_timeout_deciseconds == 0
    }

    /// Returns true if a read returns at once when nothing is waiting. A monitor on such
    /// a line spins through empty reads, so it is never given realtime scheduling.
    pub fn polls(&self) -> bool {
        self.minimum_read_bytes == 0 && self.read_timeout_deciseconds == 0
    }
}

impl fmt::Display for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}{} (vmin {}, vtime {})",
            self.baud_rate,
            self.data_bits.count(),
            self.parity,
            self.stop_bits.count(),
            self.minimum_read_bytes,
            self.read_timeout_deciseconds,
        )
    }
}

/// Collects raw setting values and validates them all at once in [`Builder::build`].
#[derive(Debug, Clone)]
pub struct Builder {
    baud_rate: i64,
    data_bits: i64,
    stop_bits: i64,
    parity: Parity,
    hardware_flow_control: bool,
    software_flow_control: bool,
    process_output: bool,
    minimum_read_bytes: i64,
    read_timeout_deciseconds: i64,
}

impl Default for Builder {
    fn default() -> Self {
        let defaults = DeviceSettings::default();
        Builder {
            baud_rate: defaults.baud_rate.bits_per_second().into(),
            data_bits: defaults.data_bits.count().into(),
            stop_bits: defaults.stop_bits.count().into(),
            parity: defaults.parity,
            hardware_flow_control: defaults.hardware_flow_control,
            software_flow_control: defaults.software_flow_control,
            process_output: defaults.process_output,
            minimum_read_bytes: defaults.minimum_read_bytes.into(),
            read_timeout_deciseconds: defaults.read_timeout_deciseconds.into(),
        }
    }
}

impl Builder {
    pub fn baud_rate(mut self, baud_rate: i64) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn data_bits(mut self, data_bits: i64) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn stop_bits(mut self, stop_bits: i64) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn hardware_flow_control(mut self, enabled: bool) -> Self {
        self.hardware_flow_control = enabled;
        self
    }

    pub fn software_flow_control(mut self, enabled: bool) -> Self {
        self.software_flow_control = enabled;
        self
    }

    pub fn process_output(mut self, enabled: bool) -> Self {
        self.process_output = enabled;
        self
    }

    pub fn minimum_read_bytes(mut self, count: i64) -> Self {
        self.minimum_read_bytes = count;
        self
    }

    pub fn read_timeout_deciseconds(mut self, deciseconds: i64) -> Self {
        self.read_timeout_deciseconds = deciseconds;
        self
    }

    /// Validates the collected values.
    pub fn build(self) -> Result<DeviceSettings, Error> {
        let invalid = |field: Setting, value: i64| Error::InvalidSetting { field, value };

        Ok(DeviceSettings {
            baud_rate: BaudRate::from_bits_per_second(self.baud_rate)
                .ok_or_else(|| invalid(Setting::BaudRate, self.baud_rate))?,
            data_bits: DataBits::from_count(self.data_bits)
                .ok_or_else(|| invalid(Setting::DataBits, self.data_bits))?,
            stop_bits: StopBits::from_count(self.stop_bits)
                .ok_or_else(|| invalid(Setting::StopBits, self.stop_bits))?,
            parity: self.parity,
            hardware_flow_control: self.hardware_flow_control,
            software_flow_control: self.software_flow_control,
            process_output: self.process_output,
            // VMIN and VTIME are single cc_t slots.
            minimum_read_bytes: u8::try_from(self.minimum_read_bytes)
                .map_err(|_| invalid(Setting::MinimumReadBytes, self.minimum_read_bytes))?,
            read_timeout_deciseconds: u8::try_from(self.read_timeout_deciseconds).map_err(
                |_| invalid(Setting::ReadTimeout, self.read_timeout_deciseconds),
            )?,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::error::{Error, Setting};

    use super::*;

    fn assert_invalid(result: Result<DeviceSettings, Error>, field: Setting, value: i64) {
        match result {
            Err(Error::InvalidSetting {
                field: actual_field,
                value: actual_value,
            }) => {
                assert_eq!(field, actual_field);
                assert_eq!(value, actual_value);
            }
            other => panic!("expected invalid {}, got {:?}", field, other),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = DeviceSettings::builder().build().expect("defaults are valid");
        assert_eq!(DeviceSettings::default(), settings);
        assert_eq!(BaudRate::B9600, settings.baud_rate());
        assert_eq!(DataBits::Eight, settings.data_bits());
        assert_eq!(StopBits::One, settings.stop_bits());
        assert_eq!(Parity::None, settings.parity());
        assert!(!settings.hardware_flow_control());
        assert!(!settings.software_flow_control());
        assert!(!settings.process_output());
        assert_eq!(0, settings.minimum_read_bytes());
        assert_eq!(1, settings.read_timeout_deciseconds());
        assert!(!settings.blocks_indefinitely());
        assert!(!settings.polls());
        assert_eq!("9600 8N1 (vmin 0, vtime 1)", settings.to_string());
    }

    #[test]
    fn test_custom_settings() {
        let settings = DeviceSettings::builder()
            .baud_rate(115200)
            .data_bits(7)
            .stop_bits(2)
            .parity(Parity::Even)
            .hardware_flow_control(true)
            .software_flow_control(true)
            .process_output(true)
            .minimum_read_bytes(1)
            .read_timeout_deciseconds(0)
            .build()
            .expect("settings should be valid");

        assert_eq!(BaudRate::B115200, settings.baud_rate());
        assert_eq!(DataBits::Seven, settings.data_bits());
        assert_eq!(StopBits::Two, settings.stop_bits());
        assert_eq!(Parity::Even, settings.parity());
        assert!(settings.hardware_flow_control());
        assert!(settings.software_flow_control());
        assert!(settings.process_output());
        assert!(settings.blocks_indefinitely());
        assert!(!settings.polls());
        assert_eq!("115200 7E2 (vmin 1, vtime 0)", settings.to_string());
    }

    #[test]
    fn test_polling_line() {
        let settings = DeviceSettings::builder()
            .minimum_read_bytes(0)
            .read_timeout_deciseconds(0)
            .build()
            .expect("settings should be valid");

        assert!(settings.polls());
        assert!(!settings.blocks_indefinitely());
    }

    #[test]
    fn test_every_data_bit_count() {
        for bits in 5..=8 {
            let settings = DeviceSettings::builder().data_bits(bits).build();
            assert!(settings.is_ok(), "{} data bits should be valid", bits);
        }
    }

    #[test]
    fn test_invalid_settings() {
        assert_invalid(
            DeviceSettings::builder().baud_rate(12345).build(),
            Setting::BaudRate,
            12345,
        );
        assert_invalid(
            DeviceSettings::builder().baud_rate(-9600).build(),
            Setting::BaudRate,
            -9600,
        );
        assert_invalid(
            DeviceSettings::builder().data_bits(9).build(),
            Setting::DataBits,
            9,
        );
        assert_invalid(
            DeviceSettings::builder().stop_bits(3).build(),
            Setting::StopBits,
            3,
        );
        assert_invalid(
            DeviceSettings::builder().minimum_read_bytes(-1).build(),
            Setting::MinimumReadBytes,
            -1,
        );
        assert_invalid(
            DeviceSettings::builder().minimum_read_bytes(256).build(),
            Setting::MinimumReadBytes,
            256,
        );
        assert_invalid(
            DeviceSettings::builder().read_timeout_deciseconds(-5).build(),
            Setting::ReadTimeout,
            -5,
        );
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!(Ok(Parity::None), "none".parse::<Parity>());
        assert_eq!(Ok(Parity::Even), "EVEN".parse::<Parity>());
        assert_eq!(Ok(Parity::Odd), "odd".parse::<Parity>());
        assert!("mark".parse::<Parity>().is_err());
    }
}
