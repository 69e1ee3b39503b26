use shared::{
    domain::{ChannelId, TrackTag, VolumeOutOfRange},
    error::ApiException,
};
use thiserror::Error;

pub type Result<T, E = PanelError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("voice channel list has not been loaded")]
    ChannelsNotLoaded,
    #[error("channel {0} is not in the loaded channel list")]
    UnknownChannel(ChannelId),
    #[error(transparent)]
    VolumeOutOfRange(#[from] VolumeOutOfRange),
    #[error("participant {name} is not on {track}")]
    UnknownParticipant { track: TrackTag, name: String },
    #[error("unexpected backend response for {command}")]
    UnexpectedResponse { command: &'static str },
    #[error("participant list for {0} has stopped")]
    ListStopped(TrackTag),
    #[error("backend rejected {command}: {source}")]
    Rejected {
        command: &'static str,
        source: ApiException,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
