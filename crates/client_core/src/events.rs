//! Events published by the panel for whatever renders it.

use shared::domain::{Channel, ChannelId, TrackTag, VoiceUserId, Volume};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub user_id: VoiceUserId,
    pub volume: Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionSlot {
    Track1Source,
    Track2Source,
    Listener,
}

impl SelectionSlot {
    pub fn for_track(track: TrackTag) -> Self {
        match track {
            TrackTag::Track1 => SelectionSlot::Track1Source,
            TrackTag::Track2 => SelectionSlot::Track2Source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOperation {
    LoadChannels,
    Join,
    Leave,
    UpdateListening,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    ChannelsLoaded(Vec<Channel>),
    SelectionChanged {
        slot: SelectionSlot,
        channel_id: ChannelId,
    },
    ListeningChanged {
        track: TrackTag,
        is_listening: bool,
    },
    RosterUpdated {
        track: TrackTag,
        participants: Vec<Participant>,
    },
    SessionJoined {
        ch1: ChannelId,
        ch2: ChannelId,
        sub_ch: ChannelId,
    },
    SessionLeft,
    OperationFailed {
        operation: PanelOperation,
        message: String,
    },
}
