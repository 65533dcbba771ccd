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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, info, warn};

use crate::serial::DeviceSettings;

/// Default priority for the monitor thread when FAKEIT_THREAD_PRIORITY is unset.
const DEFAULT_MONITOR_THREAD_PRIORITY: u8 = 70;

const PRIORITY_VAR: &str = "FAKEIT_THREAD_PRIORITY";
const DISABLE_RT_VAR: &str = "FAKEIT_DISABLE_RT";

/// Reads FAKEIT_THREAD_PRIORITY (0-99). Anything else falls back to the default.
pub fn monitor_thread_priority() -> ThreadPriority {
    let value = std::env::var(PRIORITY_VAR)
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_MONITOR_THREAD_PRIORITY);
    ThreadPriorityValue::try_from(value)
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether the monitor thread should ask for SCHED_FIFO.
/// Enabled unless FAKEIT_DISABLE_RT is set.
pub fn rt_enabled() -> bool {
    !env_flag(DISABLE_RT_VAR)
}

/// Returns whether a monitor reading with these settings may run under SCHED_FIFO. A
/// line that polls never blocks in a read and would starve the CPU it runs on.
pub fn realtime_allowed(settings: &DeviceSettings) -> bool {
    rt_enabled() && !settings.polls()
}

/// Raises the priority of the calling thread. Failures are logged and ignored.
pub fn raise_current_thread_priority(settings: &DeviceSettings) {
    let tp = monitor_thread_priority();
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(err = %e, "Unable to raise monitor thread priority.");
    }

    if rt_enabled() && !realtime_allowed(settings) {
        debug!(%settings, "Line polls without waiting, not using SCHED_FIFO.");
    }

    #[cfg(unix)]
    if realtime_allowed(settings) {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for monitor thread."),
            Err(e) => warn!(err = %e, "Failed to set RT SCHED_FIFO for monitor thread."),
        }
    }
}
