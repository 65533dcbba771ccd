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
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::{
    monitor::Stopped,
    serial::DeviceSettings,
    session::{Connector, Event, MonitorSession},
    trigger::{Trigger, TriggerMap},
};

/// Bytes buffered between the monitor thread and the controller.
const EVENT_BUFFER: usize = 64;

/// How long a stopping controller waits for the monitor thread. A read with VMIN > 0
/// and VTIME 0 can block forever, in which case the thread is left behind.
const STOP_GRACE: Duration = Duration::from_secs(2);

const STOP_POLL: Duration = Duration::from_millis(10);

/// Stops a running controller. Clones stop the same controller.
#[derive(Clone)]
pub struct StopHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

/// Runs monitor sessions against a device and turns the bytes they read into drum hits.
pub struct Controller {
    handle: JoinHandle<()>,
    stop: StopHandle,
}

impl Controller {
    /// Starts the controller on the current Tokio runtime. With a reconnect delay, the
    /// controller opens a fresh session after a disconnect or a failed open.
    pub fn new(
        connector: Arc<dyn Connector>,
        settings: DeviceSettings,
        triggers: TriggerMap,
        trigger: Arc<dyn Trigger>,
        reconnect_delay: Option<Duration>,
    ) -> Controller {
        let (stop_tx, stop_rx) = watch::channel(false);
        let span = span!(Level::INFO, "controller", device = %connector.name());
        let handle = tokio::spawn(
            Controller::run(
                connector,
                settings,
                triggers,
                trigger,
                reconnect_delay,
                stop_rx,
            )
            .instrument(span),
        );

        Controller {
            handle,
            stop: StopHandle {
                stop_tx: Arc::new(stop_tx),
            },
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stops the current session and the controller.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    async fn run(
        connector: Arc<dyn Connector>,
        settings: DeviceSettings,
        triggers: TriggerMap,
        trigger: Arc<dyn Trigger>,
        reconnect_delay: Option<Duration>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        info!(%settings, "Controller started.");

        loop {
            let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
            let session = match MonitorSession::start(connector.clone(), settings.clone(), events_tx)
            {
                Ok(session) => session,
                Err(e) => {
                    error!(err = %e, "Unable to start monitor thread.");
                    return;
                }
            };

            let mut retry = false;
            loop {
                tokio::select! {
                    event = events_rx.recv() => match event {
                        Some(event) => {
                            if let Some(should_retry) = Controller::handle_event(event, &triggers, trigger.as_ref()) {
                                retry = should_retry;
                            }
                        }
                        None => break,
                    },
                    _ = stop_requested(&mut stop_rx) => {
                        info!("Controller stopping.");
                        session.kill();
                        let deadline = Instant::now() + STOP_GRACE;
                        drain_events(&mut events_rx, &triggers, trigger.as_ref(), deadline).await;
                        drop(events_rx);
                        wind_down(session, deadline).await;
                        return;
                    }
                }
            }

            wind_down(session, Instant::now() + STOP_GRACE).await;

            match reconnect_delay {
                Some(delay) if retry => {
                    info!(delay = ?delay, "Reconnecting after delay.");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop_requested(&mut stop_rx) => {
                            info!("Controller stopping.");
                            return;
                        }
                    }
                }
                _ => {
                    info!("Controller closing.");
                    return;
                }
            }
        }
    }

    /// Logs the event and plays any mapped drum. Returns whether a reconnect makes sense
    /// once the event ends the session.
    fn handle_event(event: Event, triggers: &TriggerMap, trigger: &dyn Trigger) -> Option<bool> {
        match event {
            Event::Connecting { device } => {
                info!(device = %device, "Connecting.");
                None
            }
            Event::Connected { device } => {
                info!(device = %device, "Connected.");
                None
            }
            Event::Byte(byte) => {
                match triggers.drum_for(byte) {
                    Some(drum) => {
                        debug!(byte, %drum, "Triggering.");
                        trigger.trigger(drum);
                    }
                    None => debug!(byte, "No trigger for byte."),
                }
                None
            }
            Event::Failed(e) => {
                error!(err = %e, "Session failed.");
                Some(e.is_transient())
            }
            Event::Stopped(reason) => {
                info!(%reason, "Session stopped.");
                Some(matches!(reason, Stopped::Disconnected))
            }
        }
    }
}

/// Resolves once a stop has been requested or every stop handle is gone.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Handles what a killed session still has queued, through its final event. Returns
/// whether that final event arrived before the deadline.
async fn drain_events(
    events_rx: &mut mpsc::Receiver<Event>,
    triggers: &TriggerMap,
    trigger: &dyn Trigger,
    deadline: Instant,
) -> bool {
    let drained = tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), async {
        let mut ended = false;
        while let Some(event) = events_rx.recv().await {
            ended |= Controller::handle_event(event, triggers, trigger).is_some();
        }
        ended
    })
    .await;

    match drained {
        Ok(ended) => ended,
        Err(_) => {
            warn!("Monitor thread did not report its stop in time.");
            false
        }
    }
}

/// Waits for the monitor thread without tying up the runtime. Gives up at the deadline
/// and leaves the thread detached.
async fn wind_down(session: MonitorSession, deadline: Instant) {
    while !session.is_finished() {
        if Instant::now() >= deadline {
            warn!("Monitor thread is blocked in a read, leaving it behind.");
            return;
        }
        tokio::time::sleep(STOP_POLL).await;
    }

    if session.join().is_err() {
        error!("Monitor thread panicked.");
    }
}
