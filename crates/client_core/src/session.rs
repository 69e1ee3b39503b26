use std::sync::Arc;

use shared::domain::ChannelId;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::{
    error::{PanelError, Result},
    events::{PanelEvent, PanelOperation},
    picker::ChannelPicker,
    settings::PanelSettings,
    VoiceBackend,
};

/// The three channel ids a `join` carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSelection {
    pub ch1: ChannelId,
    pub ch2: ChannelId,
    pub sub_ch: ChannelId,
}

impl JoinSelection {
    pub fn from_pickers(
        track1: &ChannelPicker,
        track2: &ChannelPicker,
        listener: &ChannelPicker,
    ) -> Result<Self> {
        match (track1.selected(), track2.selected(), listener.selected()) {
            (Some(ch1), Some(ch2), Some(sub_ch)) => Ok(Self {
                ch1: ch1.clone(),
                ch2: ch2.clone(),
                sub_ch: sub_ch.clone(),
            }),
            _ => Err(PanelError::ChannelsNotLoaded),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Joined(JoinSelection),
}

/// Join/Leave buttons. A confirmed leave bumps the reset token that every
/// participant list watches.
pub struct SessionControls {
    backend: Arc<dyn VoiceBackend>,
    settings: PanelSettings,
    state: SessionState,
    reset: watch::Sender<u64>,
    events: broadcast::Sender<PanelEvent>,
}

impl SessionControls {
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        settings: PanelSettings,
        events: broadcast::Sender<PanelEvent>,
    ) -> Self {
        let (reset, _) = watch::channel(0);
        Self {
            backend,
            settings,
            state: SessionState::Idle,
            reset,
            events,
        }
    }

    pub fn reset_token(&self) -> watch::Receiver<u64> {
        self.reset.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn join(&mut self, selection: JoinSelection) -> Result<()> {
        info!(
            ch1 = %selection.ch1,
            ch2 = %selection.ch2,
            sub_ch = %selection.sub_ch,
            "joining voice channels"
        );
        if let Err(err) = self
            .backend
            .join(&selection.ch1, &selection.ch2, &selection.sub_ch)
            .await
        {
            error!("join failed: {err}");
            self.report_failure(PanelOperation::Join, &err);
            return Err(err);
        }

        let _ = self.events.send(PanelEvent::SessionJoined {
            ch1: selection.ch1.clone(),
            ch2: selection.ch2.clone(),
            sub_ch: selection.sub_ch.clone(),
        });
        self.state = SessionState::Joined(selection);
        Ok(())
    }

    /// Leaves the session. Rosters are only reset once the backend confirms;
    /// after the retries run out the failure is published and returned.
    pub async fn leave(&mut self) -> Result<()> {
        let attempts = self.settings.leave_retry_attempts.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.backend.leave().await {
                Ok(()) => break,
                Err(err) if attempt < attempts => {
                    warn!(attempt, attempts, "leave failed, retrying: {err}");
                    attempt += 1;
                    tokio::time::sleep(self.settings.leave_retry_delay()).await;
                }
                Err(err) => {
                    error!(attempts, "leave failed, rosters left untouched: {err}");
                    self.report_failure(PanelOperation::Leave, &err);
                    return Err(err);
                }
            }
        }

        self.reset.send_modify(|token| *token = token.wrapping_add(1));
        self.state = SessionState::Idle;
        let _ = self.events.send(PanelEvent::SessionLeft);
        info!("left voice channels");
        Ok(())
    }

    fn report_failure(&self, operation: PanelOperation, err: &PanelError) {
        let _ = self.events.send(PanelEvent::OperationFailed {
            operation,
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
