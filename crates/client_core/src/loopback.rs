//! In-process stand-in for the voice backend.
//!
//! Answers the command surface from local state and lets callers inject
//! `user-data-changed` events, so a panel can be driven without the audio
//! side being present.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::{Channel, ChannelId, TrackTag, VoiceUserId},
    error::{ApiError, ErrorCode},
    protocol::{BackendRequest, BackendResponse, UserDataChanged, USER_DATA_CHANGED},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::{session::JoinSelection, CommandTransport, VoiceEventSource};

const DEFAULT_GAIN: f32 = 1.0;
const EVENT_BUFFER: usize = 256;

#[derive(Default)]
struct LoopbackState {
    channels: Vec<Channel>,
    joined: Option<JoinSelection>,
    listening: HashMap<TrackTag, bool>,
    user_gains: HashMap<VoiceUserId, f32>,
    directory: HashMap<VoiceUserId, String>,
    failures: HashMap<&'static str, u32>,
    requests: Vec<BackendRequest>,
}

pub struct LoopbackBackend {
    state: Mutex<LoopbackState>,
    events: broadcast::Sender<UserDataChanged>,
}

impl LoopbackBackend {
    pub fn new(channels: Vec<Channel>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Mutex::new(LoopbackState {
                channels,
                ..LoopbackState::default()
            }),
            events,
        }
    }

    /// Registers the display name used for `user_id` in future events.
    pub async fn register_user(&self, user_id: impl Into<String>, name: impl Into<String>) {
        let mut state = self.state.lock().await;
        state
            .directory
            .insert(VoiceUserId::new(user_id), name.into());
    }

    pub async fn simulate_join(&self, track: TrackTag, user_id: impl Into<String>) -> UserDataChanged {
        let user_id = VoiceUserId::new(user_id);
        let name = {
            let mut state = self.state.lock().await;
            state.user_gains.entry(user_id.clone()).or_insert_with(|| {
                info!(user_id = %user_id, "volume set to default {DEFAULT_GAIN}");
                DEFAULT_GAIN
            });
            display_name(&state.directory, &user_id)
        };
        self.publish(UserDataChanged::join(track, name, user_id.0))
    }

    pub async fn simulate_leave(&self, track: TrackTag, user_id: impl Into<String>) -> UserDataChanged {
        let user_id = VoiceUserId::new(user_id);
        let name = {
            let state = self.state.lock().await;
            display_name(&state.directory, &user_id)
        };
        self.publish(UserDataChanged::leave(track, name, user_id.0))
    }

    /// Makes the next request for `command` fail with a transport error.
    pub async fn fail_next(&self, command: &'static str) {
        self.fail_times(command, 1).await;
    }

    pub async fn fail_times(&self, command: &'static str, times: u32) {
        let mut state = self.state.lock().await;
        *state.failures.entry(command).or_default() += times;
    }

    pub async fn gain_for(&self, user_id: &VoiceUserId) -> f32 {
        let state = self.state.lock().await;
        state
            .user_gains
            .get(user_id)
            .copied()
            .unwrap_or(DEFAULT_GAIN)
    }

    pub async fn is_listening(&self, track: TrackTag) -> bool {
        let state = self.state.lock().await;
        state.listening.get(&track).copied().unwrap_or(false)
    }

    pub async fn joined(&self) -> Option<JoinSelection> {
        self.state.lock().await.joined.clone()
    }

    pub async fn requests(&self) -> Vec<BackendRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn count_requests(&self, command: &str) -> usize {
        let state = self.state.lock().await;
        state
            .requests
            .iter()
            .filter(|request| request.command_name() == command)
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn publish(&self, event: UserDataChanged) -> UserDataChanged {
        debug!(event = USER_DATA_CHANGED, user_id = %event.user_id, identify = ?event.identify, "loopback publish");
        // no subscribers is not an error; the panel may not be mounted yet
        let _ = self.events.send(event.clone());
        event
    }
}

fn display_name(directory: &HashMap<VoiceUserId, String>, user_id: &VoiceUserId) -> String {
    directory
        .get(user_id)
        .cloned()
        .unwrap_or_else(|| format!("User-{user_id}"))
}

fn has_channel(channels: &[Channel], id: &ChannelId) -> bool {
    channels.iter().any(|channel| &channel.id == id)
}

#[async_trait]
impl CommandTransport for LoopbackBackend {
    async fn invoke(&self, request: BackendRequest) -> anyhow::Result<BackendResponse> {
        let command = request.command_name();
        debug!(payload = %serde_json::to_string(&request)?, "loopback invoke");

        let mut state = self.state.lock().await;
        state.requests.push(request.clone());
        if let Some(remaining) = state.failures.get_mut(command).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(anyhow!("loopback transport failure for {command}"));
        }

        let response = match request {
            BackendRequest::GetVoiceChannels => BackendResponse::Channels(state.channels.clone()),
            BackendRequest::Join { ch1, ch2, sub_ch } => {
                let missing = [&ch1, &ch2, &sub_ch]
                    .into_iter()
                    .find(|id| !has_channel(&state.channels, id))
                    .cloned();
                match missing {
                    Some(missing) => BackendResponse::Error(ApiError::new(
                        ErrorCode::NotFound,
                        format!("unknown voice channel {missing}"),
                    )),
                    None => {
                        info!(ch1 = %ch1, ch2 = %ch2, sub_ch = %sub_ch, "loopback joined");
                        state.joined = Some(JoinSelection { ch1, ch2, sub_ch });
                        BackendResponse::Ack
                    }
                }
            }
            BackendRequest::Leave => {
                if state.joined.take().is_some() {
                    info!("loopback left");
                }
                BackendResponse::Ack
            }
            BackendRequest::UpdateVolume { user_id, volume } => {
                if !(0.0..=2.0).contains(&volume) {
                    BackendResponse::Error(ApiError::new(
                        ErrorCode::Validation,
                        format!("gain {volume} outside 0.0..=2.0"),
                    ))
                } else {
                    info!(user_id = %user_id, volume, "loopback volume updated");
                    state.user_gains.insert(user_id, volume);
                    BackendResponse::Ack
                }
            }
            BackendRequest::UpdateIsListening {
                identify,
                is_listening,
            } => {
                state.listening.insert(identify, is_listening);
                BackendResponse::Ack
            }
        };
        Ok(response)
    }
}

impl VoiceEventSource for LoopbackBackend {
    fn subscribe_user_data(&self) -> broadcast::Receiver<UserDataChanged> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/loopback_tests.rs"]
mod tests;
