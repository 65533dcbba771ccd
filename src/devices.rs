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
use std::{fs, path::Path};

use tracing::debug;

use crate::error::Error;

/// Where device nodes live.
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

/// Call-in devices. Opening one waits for the other end unless O_NONBLOCK is used.
pub const LISTEN_PREFIX: &str = "tty.";

/// Call-out devices.
pub const DIAL_PREFIX: &str = "cu.";

/// Lists the entries of `dir` whose names start with `prefix`, in the order the
/// directory yields them. No matches is an empty list, not an error.
pub fn list_devices(dir: &Path, prefix: &str) -> Result<Vec<String>, Error> {
    let scan_failed = |source| Error::ScanFailed {
        dir: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_failed)? {
        // Names that aren't valid UTF-8 can't be matched against a string prefix.
        if let Ok(name) = entry.map_err(scan_failed)?.file_name().into_string() {
            names.push(name);
        }
    }

    let devices = filter_devices(names, prefix);
    debug!(dir = %dir.display(), prefix, count = devices.len(), "Scanned for devices.");
    Ok(devices)
}

/// Keeps the names starting with `prefix`, preserving their order.
pub fn filter_devices<I>(names: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    names
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .collect()
}
