//! The whole voice routing panel: listener picker, two track panels and the
//! session controls.

use std::sync::Arc;

use shared::domain::{Channel, ChannelId, TrackTag, Volume};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::{PanelError, Result},
    events::{PanelEvent, PanelOperation, Participant, SelectionSlot},
    listening::ListeningToggle,
    picker::ChannelPicker,
    roster::ParticipantList,
    session::{JoinSelection, SessionControls, SessionState},
    settings::PanelSettings,
    VoiceBackend, VoiceEventSource,
};

/// Source picker, listening toggle and live roster for one track.
pub struct TrackPanel {
    source: ChannelPicker,
    listening: ListeningToggle,
    participants: ParticipantList,
}

impl TrackPanel {
    pub fn is_listening(&self) -> bool {
        self.listening.is_listening()
    }
}

pub struct VoicePanel {
    backend: Arc<dyn VoiceBackend>,
    channels: Vec<Channel>,
    listener: ChannelPicker,
    track1: TrackPanel,
    track2: TrackPanel,
    session: SessionControls,
    events: broadcast::Sender<PanelEvent>,
}

impl VoicePanel {
    /// Builds the panel and reports the initial listening state of each
    /// track. A renderer that needs to see mount failures should call
    /// [`VoicePanel::new`], subscribe, then [`VoicePanel::mount`].
    pub async fn start(
        backend: Arc<dyn VoiceBackend>,
        source: Arc<dyn VoiceEventSource>,
        settings: PanelSettings,
    ) -> Self {
        let panel = Self::new(backend, source, settings);
        panel.mount().await;
        panel
    }

    /// Builds the panel and subscribes both participant lists.
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        source: Arc<dyn VoiceEventSource>,
        settings: PanelSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_buffer());
        let session = SessionControls::new(Arc::clone(&backend), settings.clone(), events.clone());

        let track_panel = |track: TrackTag| TrackPanel {
            source: ChannelPicker::new(SelectionSlot::for_track(track)),
            listening: ListeningToggle::new(track, Arc::clone(&backend)),
            participants: ParticipantList::spawn(
                track,
                Arc::clone(&backend),
                source.as_ref(),
                session.reset_token(),
                events.clone(),
                settings.volume_debounce(),
            ),
        };
        let track1 = track_panel(TrackTag::Track1);
        let track2 = track_panel(TrackTag::Track2);

        Self {
            backend,
            channels: Vec::new(),
            listener: ChannelPicker::new(SelectionSlot::Listener),
            track1,
            track2,
            session,
            events,
        }
    }

    /// Reports each track's current listening state to the backend.
    pub async fn mount(&self) {
        for track in [&self.track1, &self.track2] {
            if let Err(err) = track.listening.mount().await {
                self.report_failure(PanelOperation::UpdateListening, err.to_string());
            }
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn track(&self, track: TrackTag) -> &TrackPanel {
        match track {
            TrackTag::Track1 => &self.track1,
            TrackTag::Track2 => &self.track2,
        }
    }

    fn track_mut(&mut self, track: TrackTag) -> &mut TrackPanel {
        match track {
            TrackTag::Track1 => &mut self.track1,
            TrackTag::Track2 => &mut self.track2,
        }
    }

    pub fn picker(&self, slot: SelectionSlot) -> &ChannelPicker {
        match slot {
            SelectionSlot::Track1Source => &self.track1.source,
            SelectionSlot::Track2Source => &self.track2.source,
            SelectionSlot::Listener => &self.listener,
        }
    }

    fn picker_mut(&mut self, slot: SelectionSlot) -> &mut ChannelPicker {
        match slot {
            SelectionSlot::Track1Source => &mut self.track1.source,
            SelectionSlot::Track2Source => &mut self.track2.source,
            SelectionSlot::Listener => &mut self.listener,
        }
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    /// Queries the backend for channels; every picker falls back to the first.
    pub async fn load_channels(&mut self) -> Result<&[Channel]> {
        let channels = match self.backend.get_voice_channels().await {
            Ok(channels) => channels,
            Err(err) => {
                warn!("failed to load voice channels: {err}");
                self.report_failure(PanelOperation::LoadChannels, err.to_string());
                return Err(err);
            }
        };
        info!(count = channels.len(), "voice channels loaded");

        for slot in [
            SelectionSlot::Track1Source,
            SelectionSlot::Track2Source,
            SelectionSlot::Listener,
        ] {
            self.picker_mut(slot).set_channels(&channels);
        }
        self.channels = channels;
        let _ = self
            .events
            .send(PanelEvent::ChannelsLoaded(self.channels.clone()));
        Ok(&self.channels)
    }

    pub fn select(&mut self, slot: SelectionSlot, channel_id: &ChannelId) -> Result<ChannelId> {
        let chosen = self.picker_mut(slot).choose(channel_id)?;
        let _ = self.events.send(PanelEvent::SelectionChanged {
            slot,
            channel_id: chosen.clone(),
        });
        Ok(chosen)
    }

    pub fn join_selection(&self) -> Result<JoinSelection> {
        JoinSelection::from_pickers(&self.track1.source, &self.track2.source, &self.listener)
    }

    pub async fn join(&mut self) -> Result<()> {
        let selection = self.join_selection()?;
        self.session.join(selection).await
    }

    pub async fn leave(&mut self) -> Result<()> {
        self.session.leave().await
    }

    pub async fn toggle_listening(&mut self, track: TrackTag) -> Result<bool> {
        let result = self.track_mut(track).listening.toggle().await;
        let is_listening = self.track(track).is_listening();
        let _ = self.events.send(PanelEvent::ListeningChanged {
            track,
            is_listening,
        });
        if let Err(err) = &result {
            self.report_failure(PanelOperation::UpdateListening, err.to_string());
        }
        result
    }

    /// Sets a track's listening flag; an unchanged value sends nothing.
    pub async fn set_listening(&mut self, track: TrackTag, is_listening: bool) -> Result<()> {
        if self.track(track).is_listening() == is_listening {
            return Ok(());
        }
        let result = self.track_mut(track).listening.set(is_listening).await;
        let _ = self.events.send(PanelEvent::ListeningChanged {
            track,
            is_listening,
        });
        if let Err(err) = &result {
            self.report_failure(PanelOperation::UpdateListening, err.to_string());
        }
        result
    }

    /// Moves a participant's volume by `delta` percent, saturating at the
    /// slider ends.
    pub async fn adjust_volume(&self, track: TrackTag, name: &str, delta: i64) -> Result<Volume> {
        let participants = &self.track(track).participants;
        let current = participants
            .snapshot()
            .await?
            .into_iter()
            .find(|participant| participant.name == name)
            .map(|participant| participant.volume)
            .ok_or_else(|| PanelError::UnknownParticipant {
                track,
                name: name.to_string(),
            })?;
        let volume = Volume::clamped(i64::from(current.percent()) + delta);
        participants.set_volume(name, volume).await?;
        Ok(volume)
    }

    pub async fn set_volume(&self, track: TrackTag, name: &str, percent: i64) -> Result<()> {
        let volume = Volume::new(percent)?;
        self.track(track).participants.set_volume(name, volume).await
    }

    pub async fn roster(&self, track: TrackTag) -> Result<Vec<Participant>> {
        self.track(track).participants.snapshot().await
    }

    pub async fn shutdown(self) {
        let Self { track1, track2, .. } = self;
        tokio::join!(
            track1.participants.shutdown(),
            track2.participants.shutdown()
        );
        info!("voice panel stopped");
    }

    fn report_failure(&self, operation: PanelOperation, message: String) {
        let _ = self
            .events
            .send(PanelEvent::OperationFailed { operation, message });
    }
}

#[cfg(test)]
#[path = "tests/panel_tests.rs"]
mod tests;
