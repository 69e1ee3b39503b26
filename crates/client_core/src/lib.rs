use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::{Channel, ChannelId, TrackTag, VoiceUserId},
    error::ApiException,
    protocol::{BackendRequest, BackendResponse, UserDataChanged},
};
use tokio::sync::broadcast;

pub mod error;
pub mod events;
pub mod listening;
pub mod loopback;
pub mod panel;
pub mod picker;
pub mod roster;
pub mod session;
pub mod settings;

pub use error::{PanelError, Result};
pub use events::{PanelEvent, PanelOperation, Participant, SelectionSlot};
pub use loopback::LoopbackBackend;
pub use panel::{TrackPanel, VoicePanel};
pub use session::{JoinSelection, SessionState};
pub use settings::PanelSettings;

/// The opaque command-invocation boundary to the voice backend.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn invoke(&self, request: BackendRequest) -> anyhow::Result<BackendResponse>;
}

/// Typed view of the backend command surface.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    async fn get_voice_channels(&self) -> Result<Vec<Channel>>;
    async fn join(&self, ch1: &ChannelId, ch2: &ChannelId, sub_ch: &ChannelId) -> Result<()>;
    async fn leave(&self) -> Result<()>;
    async fn update_volume(&self, user_id: &VoiceUserId, gain: f32) -> Result<()>;
    async fn update_is_listening(&self, identify: TrackTag, is_listening: bool) -> Result<()>;
}

/// The push side of the backend boundary.
pub trait VoiceEventSource: Send + Sync {
    fn subscribe_user_data(&self) -> broadcast::Receiver<UserDataChanged>;
}

fn expect_ack(command: &'static str, response: BackendResponse) -> Result<()> {
    match response {
        BackendResponse::Ack => Ok(()),
        BackendResponse::Error(err) => Err(PanelError::Rejected {
            command,
            source: ApiException::from(err),
        }),
        BackendResponse::Channels(_) => Err(PanelError::UnexpectedResponse { command }),
    }
}

async fn invoke_ack<T>(transport: &T, request: BackendRequest) -> Result<()>
where
    T: CommandTransport + ?Sized,
{
    let command = request.command_name();
    let response = transport.invoke(request).await?;
    expect_ack(command, response)
}

#[async_trait]
impl<T> VoiceBackend for T
where
    T: CommandTransport,
{
    async fn get_voice_channels(&self) -> Result<Vec<Channel>> {
        let request = BackendRequest::GetVoiceChannels;
        let command = request.command_name();
        match self.invoke(request).await? {
            BackendResponse::Channels(channels) => Ok(channels),
            BackendResponse::Error(err) => Err(PanelError::Rejected {
                command,
                source: ApiException::from(err),
            }),
            BackendResponse::Ack => Err(PanelError::UnexpectedResponse { command }),
        }
    }

    async fn join(&self, ch1: &ChannelId, ch2: &ChannelId, sub_ch: &ChannelId) -> Result<()> {
        invoke_ack(
            self,
            BackendRequest::Join {
                ch1: ch1.clone(),
                ch2: ch2.clone(),
                sub_ch: sub_ch.clone(),
            },
        )
        .await
    }

    async fn leave(&self) -> Result<()> {
        invoke_ack(self, BackendRequest::Leave).await
    }

    async fn update_volume(&self, user_id: &VoiceUserId, gain: f32) -> Result<()> {
        invoke_ack(
            self,
            BackendRequest::UpdateVolume {
                user_id: user_id.clone(),
                volume: gain,
            },
        )
        .await
    }

    async fn update_is_listening(&self, identify: TrackTag, is_listening: bool) -> Result<()> {
        invoke_ack(
            self,
            BackendRequest::UpdateIsListening {
                identify,
                is_listening,
            },
        )
        .await
    }
}

pub struct MissingCommandTransport;

#[async_trait]
impl CommandTransport for MissingCommandTransport {
    async fn invoke(&self, request: BackendRequest) -> anyhow::Result<BackendResponse> {
        Err(anyhow!(
            "voice backend is unavailable for {}",
            request.command_name()
        ))
    }
}

pub struct MissingEventSource;

impl VoiceEventSource for MissingEventSource {
    fn subscribe_user_data(&self) -> broadcast::Receiver<UserDataChanged> {
        let (_tx, rx) = broadcast::channel(1);
        rx
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
