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
use std::{collections::HashMap, fmt};

use serde::Deserialize;
use tracing::info;

/// The byte that plays the kick by default ('k').
pub const DEFAULT_KICK_BYTE: u8 = 107;

/// A drum sample that can be triggered.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Drum {
    Kick,
    Snare,
}

impl fmt::Display for Drum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drum::Kick => write!(f, "kick"),
            Drum::Snare => write!(f, "snare"),
        }
    }
}

/// Plays drums. Implementations must return quickly; they are called from the
/// controller task for every mapped byte.
pub trait Trigger: Send + Sync + 'static {
    fn trigger(&self, drum: Drum);
}

/// Reports hits through the log.
pub struct LogTrigger {}

impl LogTrigger {
    pub fn new() -> LogTrigger {
        LogTrigger {}
    }
}

impl Default for LogTrigger {
    fn default() -> Self {
        LogTrigger::new()
    }
}

impl Trigger for LogTrigger {
    fn trigger(&self, drum: Drum) {
        info!(%drum, "Hit.");
    }
}

/// Maps byte values to drums. Bytes without a mapping are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMap {
    drums: HashMap<u8, Drum>,
}

impl TriggerMap {
    /// A map with no triggers.
    pub fn empty() -> TriggerMap {
        TriggerMap {
            drums: HashMap::new(),
        }
    }

    /// Adds or replaces the mapping for a byte.
    pub fn with(mut self, byte: u8, drum: Drum) -> TriggerMap {
        self.drums.insert(byte, drum);
        self
    }

    pub fn drum_for(&self, byte: u8) -> Option<Drum> {
        self.drums.get(&byte).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.drums.is_empty()
    }
}

impl Default for TriggerMap {
    fn default() -> Self {
        TriggerMap::empty().with(DEFAULT_KICK_BYTE, Drum::Kick)
    }
}

impl FromIterator<(u8, Drum)> for TriggerMap {
    fn from_iter<I: IntoIterator<Item = (u8, Drum)>>(iter: I) -> Self {
        TriggerMap {
            drums: iter.into_iter().collect(),
        }
    }
}
