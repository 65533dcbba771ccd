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
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::{error::Error, session::Connector};

use super::{settings::DeviceSettings, SerialPort};

/// A mock serial device. Bytes sent to it are handed out one per read call and
/// the VMIN/VTIME policy of the last commit is honoured.
#[derive(Clone)]
pub struct Device {
    name: String,
    bytes_tx: Sender<u8>,
    bytes_rx: Receiver<u8>,
    links: Arc<AtomicU64>,
    reads: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    open_lines: Arc<AtomicUsize>,
    commits: Arc<Mutex<Vec<DeviceSettings>>>,
    fail_commit: Arc<AtomicBool>,
    fail_read: Arc<AtomicBool>,
}

impl Device {
    /// Gets a new mock device.
    pub fn get(name: &str) -> Device {
        let (bytes_tx, bytes_rx) = crossbeam_channel::unbounded();
        Device {
            name: name.to_string(),
            bytes_tx,
            bytes_rx,
            links: Arc::new(AtomicU64::new(1)),
            reads: Arc::new(AtomicUsize::new(0)),
            connects: Arc::new(AtomicUsize::new(0)),
            open_lines: Arc::new(AtomicUsize::new(0)),
            commits: Arc::new(Mutex::new(Vec::new())),
            fail_commit: Arc::new(AtomicBool::new(false)),
            fail_read: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens a port over this device.
    pub fn open(&self) -> SerialPort {
        self.open_lines.fetch_add(1, Ordering::SeqCst);
        SerialPort::with_line(
            &self.name,
            Box::new(Line {
                device: self.clone(),
                settings: None,
            }),
        )
    }

    /// Queues bytes for the reader.
    pub fn send(&self, bytes: &[u8]) {
        for byte in bytes {
            // The device holds the receiver too, so this never fails.
            let _ = self.bytes_tx.send(*byte);
        }
    }

    /// Simulates the device node being removed.
    pub fn unplug(&self) {
        self.links.store(0, Ordering::SeqCst);
    }

    /// Brings an unplugged device back.
    pub fn replug(&self) {
        self.links.store(1, Ordering::SeqCst);
    }

    /// Makes the next commits fail.
    pub fn fail_commits(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next reads fail with an error that is not a hang-up.
    pub fn fail_reads(&self) {
        self.fail_read.store(true, Ordering::SeqCst);
    }

    /// The number of read calls issued against the device.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// The number of connection attempts made through [`Connector`].
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Returns true if no port holds the device open.
    pub fn is_closed(&self) -> bool {
        self.open_lines.load(Ordering::SeqCst) == 0
    }

    /// Every settings block committed so far.
    pub fn commits(&self) -> Vec<DeviceSettings> {
        self.commits.lock().clone()
    }
}

impl Connector for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// Fails like a missing device node while unplugged.
    fn connect(&self) -> Result<SerialPort, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.links.load(Ordering::SeqCst) == 0 {
            return Err(Error::PathInaccessible {
                path: self.name.clone().into(),
                source: io::ErrorKind::NotFound.into(),
            });
        }
        Ok(self.open())
    }
}

struct Line {
    device: Device,
    settings: Option<DeviceSettings>,
}

impl super::Line for Line {
    fn link_count(&self) -> io::Result<u64> {
        Ok(self.device.links.load(Ordering::SeqCst))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.device.reads.fetch_add(1, Ordering::SeqCst);
        if self.device.fail_read.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(nix::libc::EINVAL));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let settings = self.settings.clone().unwrap_or_default();
        let vmin = settings.minimum_read_bytes();
        let vtime = Duration::from_millis(u64::from(settings.read_timeout_deciseconds()) * 100);
        let received = match (vmin, vtime.is_zero()) {
            (0, true) => match self.device.bytes_rx.try_recv() {
                Ok(byte) => Some(byte),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => return Err(io::ErrorKind::BrokenPipe.into()),
            },
            (_, false) => match self.device.bytes_rx.recv_timeout(vtime) {
                Ok(byte) => Some(byte),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::ErrorKind::BrokenPipe.into())
                }
            },
            (_, true) => Some(
                self.device
                    .bytes_rx
                    .recv()
                    .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?,
            ),
        };

        match received {
            Some(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn commit(&mut self, settings: &DeviceSettings) -> io::Result<()> {
        if self.device.fail_commit.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(nix::libc::ENOTTY));
        }
        self.device.commits.lock().push(settings.clone());
        self.settings = Some(settings.clone());
        Ok(())
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        self.device.open_lines.fetch_sub(1, Ordering::SeqCst);
    }
}
