use std::sync::Arc;

use shared::domain::TrackTag;
use tracing::{info, warn};

use crate::{error::Result, VoiceBackend};

/// Per-track listening switch. Every change is reported to the backend in
/// order, without debouncing.
pub struct ListeningToggle {
    track: TrackTag,
    is_listening: bool,
    backend: Arc<dyn VoiceBackend>,
}

impl ListeningToggle {
    pub fn new(track: TrackTag, backend: Arc<dyn VoiceBackend>) -> Self {
        Self {
            track,
            is_listening: false,
            backend,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    /// Reports the initial state once the control is shown.
    pub async fn mount(&self) -> Result<()> {
        self.report().await
    }

    pub async fn toggle(&mut self) -> Result<bool> {
        self.is_listening = !self.is_listening;
        self.report().await?;
        Ok(self.is_listening)
    }

    pub async fn set(&mut self, is_listening: bool) -> Result<()> {
        if self.is_listening == is_listening {
            return Ok(());
        }
        self.is_listening = is_listening;
        self.report().await
    }

    async fn report(&self) -> Result<()> {
        match self
            .backend
            .update_is_listening(self.track, self.is_listening)
            .await
        {
            Ok(()) => {
                info!(track = ?self.track, is_listening = self.is_listening, "listening updated");
                Ok(())
            }
            Err(err) => {
                warn!(track = ?self.track, is_listening = self.is_listening, "failed to update listening: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackBackend;

    fn toggle(backend: &Arc<LoopbackBackend>) -> ListeningToggle {
        ListeningToggle::new(TrackTag::Track2, Arc::clone(backend) as Arc<dyn VoiceBackend>)
    }

    #[tokio::test]
    async fn set_to_current_value_sends_nothing() {
        let backend = Arc::new(LoopbackBackend::new(Vec::new()));
        let mut listening = toggle(&backend);

        listening.set(false).await.expect("unchanged");
        assert_eq!(backend.count_requests("update_is_listening").await, 0);

        listening.set(true).await.expect("changed");
        listening.set(true).await.expect("unchanged");
        assert_eq!(backend.count_requests("update_is_listening").await, 1);
        assert!(backend.is_listening(TrackTag::Track2).await);
    }

    #[tokio::test]
    async fn failed_set_keeps_requested_value() {
        let backend = Arc::new(LoopbackBackend::new(Vec::new()));
        let mut listening = toggle(&backend);
        backend.fail_next("update_is_listening").await;

        listening.set(true).await.expect_err("transport failure");
        assert!(listening.is_listening());
        assert!(!backend.is_listening(TrackTag::Track2).await);
    }
}
