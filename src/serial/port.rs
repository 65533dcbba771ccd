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
    fmt, io,
    path::{Path, PathBuf},
};

use nix::libc;
use tracing::debug;

use super::{
    line::{Line, Tty},
    settings::DeviceSettings,
};
use crate::error::Error;

/// A serial device opened for reading single bytes.
///
/// Settings are staged with [`SerialPort::configure`] and only reach the device on
/// [`SerialPort::commit`]. The descriptor is released on [`SerialPort::close`], when a
/// disconnect is detected, or when the port is dropped.
pub struct SerialPort {
    path: PathBuf,
    line: Option<Box<dyn Line>>,
    staged: DeviceSettings,
    applied: Option<DeviceSettings>,
}

impl SerialPort {
    /// Opens the device at the given path exclusively.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SerialPort, Error> {
        let path = path.as_ref();
        let tty = Tty::open(path).map_err(|source| Error::PathInaccessible {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Opened serial device.");
        Ok(SerialPort::with_line(path, Box::new(tty)))
    }

    /// Wraps an already open line.
    pub fn with_line<P: Into<PathBuf>>(path: P, line: Box<dyn Line>) -> SerialPort {
        SerialPort {
            path: path.into(),
            line: Some(line),
            staged: DeviceSettings::default(),
            applied: None,
        }
    }

    /// The path the port was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.line.is_some()
    }

    /// The settings staged for the next commit.
    pub fn staged_settings(&self) -> &DeviceSettings {
        &self.staged
    }

    /// The settings from the last successful commit.
    pub fn applied_settings(&self) -> Option<&DeviceSettings> {
        self.applied.as_ref()
    }

    /// Stages settings for the next commit. Nothing is sent to the device.
    pub fn configure(&mut self, settings: &DeviceSettings) {
        self.staged = settings.clone();
    }

    /// Applies the staged settings to the device.
    pub fn commit(&mut self) -> Result<(), Error> {
        let Some(line) = self.line.as_mut() else {
            return Err(Error::Closed {
                path: self.path.clone(),
            });
        };

        line.commit(&self.staged)
            .map_err(|source| Error::ConfigurationFailed {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            settings = %self.staged,
            "Committed line settings."
        );
        self.applied = Some(self.staged.clone());
        Ok(())
    }

    /// Reads a single byte, blocking as the committed VMIN/VTIME policy dictates.
    ///
    /// Returns `Ok(None)` when the read returned no data; callers should retry.
    pub fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let Some(line) = self.line.as_mut() else {
            return Err(Error::Closed {
                path: self.path.clone(),
            });
        };

        // A device node that has been removed drops to zero links. This is a heuristic
        // and is not reliable for every kind of device.
        match line.link_count() {
            Ok(1) => {}
            Ok(links) => {
                debug!(path = %self.path.display(), links, "Device node is gone.");
                return Err(self.disconnected());
            }
            Err(e) => {
                debug!(path = %self.path.display(), err = %e, "Unable to stat device.");
                return Err(self.disconnected());
            }
        }

        let mut buf = [0u8; 1];
        match line.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e)
                if e.kind() == io::ErrorKind::Interrupted
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) if matches!(e.raw_os_error(), Some(libc::EIO) | Some(libc::ENXIO)) => {
                debug!(path = %self.path.display(), err = %e, "Device hung up.");
                Err(self.disconnected())
            }
            Err(source) => Err(Error::ReadFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Releases the device. Safe to call more than once.
    pub fn close(&mut self) {
        if self.line.take().is_some() {
            debug!(path = %self.path.display(), "Closed serial device.");
        }
    }

    fn disconnected(&mut self) -> Error {
        self.close();
        Error::Disconnected {
            path: self.path.clone(),
        }
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.path.display(),
            if self.is_open() { "open" } else { "closed" }
        )
    }
}
