use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_VOLUME_DEBOUNCE_MS: u64 = 300;

/// Tunables for a [`crate::VoicePanel`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub volume_debounce_ms: u64,
    /// Extra `leave` attempts after the first one fails.
    pub leave_retry_attempts: u32,
    pub leave_retry_delay_ms: u64,
    pub event_buffer: usize,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            volume_debounce_ms: DEFAULT_VOLUME_DEBOUNCE_MS,
            leave_retry_attempts: 2,
            leave_retry_delay_ms: 250,
            event_buffer: 256,
        }
    }
}

impl PanelSettings {
    pub fn volume_debounce(&self) -> Duration {
        Duration::from_millis(self.volume_debounce_ms)
    }

    pub fn leave_retry_delay(&self) -> Duration {
        Duration::from_millis(self.leave_retry_delay_ms)
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer.max(1)
    }
}
