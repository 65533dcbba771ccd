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
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, span, Level};

use crate::{error::Error, serial::SerialPort};

/// A cancellation token for a monitor loop. Clones share the same flag.
#[derive(Clone, Debug)]
pub struct KillHandle {
    running: Arc<AtomicBool>,
}

impl KillHandle {
    /// Creates an active handle.
    pub fn new() -> KillHandle {
        KillHandle {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Asks the loop to stop before its next read. Returns immediately.
    pub fn kill(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for KillHandle {
    fn default() -> Self {
        KillHandle::new()
    }
}

/// Why a monitor loop ended.
#[derive(Debug)]
pub enum Stopped {
    /// The kill handle was triggered.
    Killed,
    /// The device went away.
    Disconnected,
    /// The port was already closed.
    Closed,
    /// A read failed.
    Failed(Error),
}

impl fmt::Display for Stopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stopped::Killed => write!(f, "killed"),
            Stopped::Disconnected => write!(f, "disconnected"),
            Stopped::Closed => write!(f, "closed"),
            Stopped::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Watches a serial port and hands every byte to a callback.
pub struct SerialMonitor {
    port: SerialPort,
    running: KillHandle,
}

impl SerialMonitor {
    /// Takes ownership of an open, committed port. An uncommitted port is still
    /// non-blocking, and the loop then spins through empty reads.
    pub fn new(port: SerialPort) -> SerialMonitor {
        SerialMonitor::with_kill_handle(port, KillHandle::new())
    }

    /// Uses an existing kill handle. If it has already been killed, `listen` returns
    /// without reading.
    pub fn with_kill_handle(port: SerialPort, running: KillHandle) -> SerialMonitor {
        SerialMonitor { port, running }
    }

    /// Returns a handle that can stop the loop from another thread.
    pub fn kill_handle(&self) -> KillHandle {
        self.running.clone()
    }

    /// Stops the loop at the start of its next iteration. An in-flight read is not
    /// interrupted.
    pub fn kill(&self) {
        self.running.kill();
    }

    /// Reads until killed or until the port fails, calling `on_byte` on this thread for
    /// every byte in the order it was read. The port is closed on return.
    pub fn listen<F>(mut self, mut on_byte: F) -> Stopped
    where
        F: FnMut(u8),
    {
        let span = span!(Level::DEBUG, "serial monitor");
        let _enter = span.enter();

        debug!(port = %self.port, "Monitor started.");

        let stopped = loop {
            if !self.running.is_running() {
                break Stopped::Killed;
            }

            match self.port.read_byte() {
                Ok(Some(byte)) => {
                    debug!(byte, "Read byte.");
                    on_byte(byte);
                }
                Ok(None) => continue,
                Err(Error::Disconnected { .. }) => break Stopped::Disconnected,
                Err(Error::Closed { .. }) => break Stopped::Closed,
                Err(e) => break Stopped::Failed(e),
            }
        };

        self.port.close();
        debug!(reason = %stopped, "Monitor stopped.");
        stopped
    }
}
