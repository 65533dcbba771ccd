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
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
};

use tokio::sync::mpsc::Sender;
use tracing::{error, info, span, Level};

use crate::{
    error::Error,
    monitor::{KillHandle, SerialMonitor, Stopped},
    serial::{DeviceSettings, SerialPort},
    thread_priority,
};

const THREAD_NAME: &str = "serial-monitor";

/// Session events, in the order a session produces them.
#[derive(Debug)]
pub enum Event {
    /// About to open the device.
    Connecting { device: String },

    /// The device is open and configured.
    Connected { device: String },

    /// A byte was read from the device.
    Byte(u8),

    /// Opening or configuring the device failed. No further events follow.
    Failed(Error),

    /// The monitor loop ended. No further events follow.
    Stopped(Stopped),
}

/// Produces a fresh serial port for each session.
pub trait Connector: Send + Sync + 'static {
    /// A name for the device, used in events and logs.
    fn name(&self) -> String;

    fn connect(&self) -> Result<SerialPort, Error>;
}

/// Connects to a device node.
pub struct DeviceConnector {
    path: PathBuf,
}

impl DeviceConnector {
    pub fn new<P: Into<PathBuf>>(path: P) -> DeviceConnector {
        DeviceConnector { path: path.into() }
    }
}

impl Connector for DeviceConnector {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn connect(&self) -> Result<SerialPort, Error> {
        SerialPort::open(&self.path)
    }
}

/// A monitor loop running on its own thread.
pub struct MonitorSession {
    handle: JoinHandle<()>,
    running: KillHandle,
}

impl MonitorSession {
    /// Spawns the monitor thread and returns immediately. Everything the session
    /// observes is reported through `events_tx`.
    pub fn start(
        connector: Arc<dyn Connector>,
        settings: DeviceSettings,
        events_tx: Sender<Event>,
    ) -> Result<MonitorSession, io::Error> {
        let running = KillHandle::new();
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || MonitorSession::run(connector, settings, events_tx, thread_running))?;

        Ok(MonitorSession { handle, running })
    }

    /// Asks the monitor to stop. Does not wait.
    pub fn kill(&self) {
        self.running.kill();
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.running.clone()
    }

    /// Returns true once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the thread exits.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }

    fn run(
        connector: Arc<dyn Connector>,
        settings: DeviceSettings,
        events_tx: Sender<Event>,
        running: KillHandle,
    ) {
        let device = connector.name();
        let span = span!(Level::INFO, "monitor session", device = %device);
        let _enter = span.enter();

        thread_priority::raise_current_thread_priority(&settings);

        if events_tx
            .blocking_send(Event::Connecting {
                device: device.clone(),
            })
            .is_err()
        {
            info!("Event receiver is gone, not connecting.");
            return;
        }

        let mut port = match connector.connect() {
            Ok(port) => port,
            Err(e) => {
                error!(err = %e, "Unable to open device.");
                let _ = events_tx.blocking_send(Event::Failed(e));
                return;
            }
        };

        port.configure(&settings);
        if let Err(e) = port.commit() {
            error!(err = %e, "Unable to configure device.");
            port.close();
            let _ = events_tx.blocking_send(Event::Failed(e));
            return;
        }
        info!(%settings, "Device configured.");

        if events_tx
            .blocking_send(Event::Connected { device })
            .is_err()
        {
            return;
        }

        let monitor = SerialMonitor::with_kill_handle(port, running.clone());
        let stopped = monitor.listen(|byte| {
            if events_tx.blocking_send(Event::Byte(byte)).is_err() {
                running.kill();
            }
        });

        let _ = events_tx.blocking_send(Event::Stopped(stopped));
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc};

    use tokio::sync::mpsc::{self, Receiver};

    use crate::{
        error,
        monitor::Stopped,
        serial::{mock, DeviceSettings},
    };

    use super::{DeviceConnector, Event, MonitorSession};

    fn expect_connecting(events_rx: &mut Receiver<Event>) {
        match events_rx.blocking_recv() {
            Some(Event::Connecting { device }) => assert_eq!("mock-device", device),
            other => panic!("expected connecting, got {:?}", other),
        }
    }

    #[test]
    fn test_session_forwards_bytes() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let settings = DeviceSettings::default();
        let (events_tx, mut events_rx) = mpsc::channel(10);

        device.send(b"ak");
        let session = MonitorSession::start(Arc::new(device.clone()), settings.clone(), events_tx)?;

        expect_connecting(&mut events_rx);
        assert!(matches!(
            events_rx.blocking_recv(),
            Some(Event::Connected { .. })
        ));
        assert!(matches!(events_rx.blocking_recv(), Some(Event::Byte(b'a'))));
        assert!(matches!(events_rx.blocking_recv(), Some(Event::Byte(b'k'))));

        session.kill();
        assert!(matches!(
            events_rx.blocking_recv(),
            Some(Event::Stopped(Stopped::Killed))
        ));
        assert!(events_rx.blocking_recv().is_none());

        session.join().expect("monitor thread panicked");
        assert!(device.is_closed());
        assert_eq!(vec![settings], device.commits());
        Ok(())
    }

    #[test]
    fn test_session_open_failure() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        device.unplug();
        let (events_tx, mut events_rx) = mpsc::channel(10);

        let session =
            MonitorSession::start(Arc::new(device.clone()), DeviceSettings::default(), events_tx)?;

        expect_connecting(&mut events_rx);
        match events_rx.blocking_recv() {
            Some(Event::Failed(e)) => {
                assert!(matches!(e, error::Error::PathInaccessible { .. }));
                assert!(e.is_transient());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(events_rx.blocking_recv().is_none());
        session.join().expect("monitor thread panicked");
        Ok(())
    }

    #[test]
    fn test_session_commit_failure() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        device.fail_commits();
        let (events_tx, mut events_rx) = mpsc::channel(10);

        let session =
            MonitorSession::start(Arc::new(device.clone()), DeviceSettings::default(), events_tx)?;

        expect_connecting(&mut events_rx);
        assert!(matches!(
            events_rx.blocking_recv(),
            Some(Event::Failed(error::Error::ConfigurationFailed { .. }))
        ));
        session.join().expect("monitor thread panicked");
        assert!(device.is_closed());
        assert_eq!(0, device.reads());
        Ok(())
    }

    #[test]
    fn test_session_disconnect() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let (events_tx, mut events_rx) = mpsc::channel(10);

        let session =
            MonitorSession::start(Arc::new(device.clone()), DeviceSettings::default(), events_tx)?;

        expect_connecting(&mut events_rx);
        assert!(matches!(
            events_rx.blocking_recv(),
            Some(Event::Connected { .. })
        ));
        device.unplug();
        assert!(matches!(
            events_rx.blocking_recv(),
            Some(Event::Stopped(Stopped::Disconnected))
        ));
        session.join().expect("monitor thread panicked");
        assert!(device.is_closed());
        Ok(())
    }

    #[test]
    fn test_session_receiver_dropped() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let (events_tx, events_rx) = mpsc::channel(1);
        drop(events_rx);

        device.send(b"kkk");
        let session =
            MonitorSession::start(Arc::new(device.clone()), DeviceSettings::default(), events_tx)?;
        session.join().expect("monitor thread panicked");

        assert_eq!(0, device.connects());
        assert!(device.is_closed());
        Ok(())
    }

    #[test]
    fn test_device_connector_missing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tty.usbmodem1");
        let (events_tx, mut events_rx) = mpsc::channel(10);

        let session = MonitorSession::start(
            Arc::new(DeviceConnector::new(&path)),
            DeviceSettings::default(),
            events_tx,
        )?;

        match events_rx.blocking_recv() {
            Some(Event::Connecting { device }) => assert_eq!(path.display().to_string(), device),
            other => panic!("expected connecting, got {:?}", other),
        }
        assert!(matches!(
            events_rx.blocking_recv(),
            Some(Event::Failed(error::Error::PathInaccessible { .. }))
        ));
        session.join().expect("monitor thread panicked");
        Ok(())
    }
}
