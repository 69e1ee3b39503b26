use shared::domain::{Channel, ChannelId};
use tracing::debug;

use crate::{
    error::{PanelError, Result},
    events::SelectionSlot,
};

/// Single-choice selection over the channels the backend reported.
#[derive(Debug, Clone)]
pub struct ChannelPicker {
    slot: SelectionSlot,
    channels: Vec<Channel>,
    selected: Option<ChannelId>,
}

impl ChannelPicker {
    pub fn new(slot: SelectionSlot) -> Self {
        Self {
            slot,
            channels: Vec::new(),
            selected: None,
        }
    }

    /// Replaces the offered channels and falls back to the first one.
    pub fn set_channels(&mut self, channels: &[Channel]) {
        self.channels = channels.to_vec();
        self.selected = self.channels.first().map(|channel| channel.id.clone());
        debug!(slot = ?self.slot, selected = ?self.selected, "channel picker reset");
    }

    pub fn choose(&mut self, id: &ChannelId) -> Result<ChannelId> {
        if !self.channels.iter().any(|channel| &channel.id == id) {
            return Err(PanelError::UnknownChannel(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(id.clone())
    }

    pub fn selected(&self) -> Option<&ChannelId> {
        self.selected.as_ref()
    }

    pub fn selected_channel(&self) -> Option<&Channel> {
        let id = self.selected.as_ref()?;
        self.channels.iter().find(|channel| &channel.id == id)
    }
}
