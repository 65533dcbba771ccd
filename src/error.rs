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
use std::{fmt, io, path::PathBuf};

/// The setting that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    BaudRate,
    DataBits,
    StopBits,
    MinimumReadBytes,
    ReadTimeout,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Setting::BaudRate => "baud_rate",
            Setting::DataBits => "data_bits",
            Setting::StopBits => "stop_bits",
            Setting::MinimumReadBytes => "minimum_read_bytes",
            Setting::ReadTimeout => "read_timeout_deciseconds",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the serial transport and device scanning.
///
/// None of these abort the process. Lifecycle failures (`Closed`, `Disconnected`)
/// are ordinary values so the owner can log them and offer to reconnect.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device could not be opened exclusively.
    #[error("unable to open {}: {source}", path.display())]
    PathInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line setting is outside of what the terminal driver can represent.
    #[error("invalid setting {field}: {value}")]
    InvalidSetting { field: Setting, value: i64 },

    /// Applying the staged line settings to the device failed.
    #[error("unable to configure {}: {source}", path.display())]
    ConfigurationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read was attempted on a port that has already been closed.
    #[error("{} is closed", path.display())]
    Closed { path: PathBuf },

    /// The device node no longer refers to a live device.
    #[error("{} was disconnected", path.display())]
    Disconnected { path: PathBuf },

    /// The device directory could not be listed.
    #[error("unable to scan {}: {source}", dir.display())]
    ScanFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The read syscall failed for a reason other than a disconnect.
    #[error("error reading {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns true if reconnecting later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::PathInaccessible { .. } | Error::Disconnected { .. }
        )
    }
}
