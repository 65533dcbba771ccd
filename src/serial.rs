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

//! Serial device transport.
//!
//! This module provides:
//! - Validated line settings (speed, framing, flow control, VMIN/VTIME)
//! - Exclusive device open with staged configuration and an atomic commit
//! - A single-byte blocking read with disconnect detection

mod line;
#[cfg(test)]
pub mod mock;
mod port;
mod settings;

pub use line::{Line, Tty};
pub use port::SerialPort;
pub use settings::{BaudRate, Builder, DataBits, DeviceSettings, Parity, StopBits};
