use serde::{Deserialize, Serialize};

use crate::{
    domain::{Channel, ChannelId, TrackTag, VoiceUserId},
    error::ApiError,
};

/// Name of the backend push event carrying participant changes.
pub const USER_DATA_CHANGED: &str = "user-data-changed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum BackendRequest {
    GetVoiceChannels,
    Join {
        ch1: ChannelId,
        ch2: ChannelId,
        sub_ch: ChannelId,
    },
    Leave,
    UpdateVolume {
        user_id: VoiceUserId,
        volume: f32,
    },
    UpdateIsListening {
        identify: TrackTag,
        is_listening: bool,
    },
}

impl BackendRequest {
    pub fn command_name(&self) -> &'static str {
        match self {
            BackendRequest::GetVoiceChannels => "get_voice_channels",
            BackendRequest::Join { .. } => "join",
            BackendRequest::Leave => "leave",
            BackendRequest::UpdateVolume { .. } => "update_volume",
            BackendRequest::UpdateIsListening { .. } => "update_is_listening",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BackendResponse {
    Channels(Vec<Channel>),
    Ack,
    Error(ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Join,
    Leave,
}

/// Payload of the `user-data-changed` push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataChanged {
    pub user_id: VoiceUserId,
    pub event: UserEvent,
    pub identify: TrackTag,
    pub name: String,
}

impl UserDataChanged {
    pub fn join(identify: TrackTag, name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            user_id: VoiceUserId::new(user_id),
            event: UserEvent::Join,
            identify,
            name: name.into(),
        }
    }

    pub fn leave(identify: TrackTag, name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            user_id: VoiceUserId::new(user_id),
            event: UserEvent::Leave,
            identify,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn join_request_uses_backend_field_names() {
        let request = BackendRequest::Join {
            ch1: ChannelId::new("A"),
            ch2: ChannelId::new("B"),
            sub_ch: ChannelId::new("C"),
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({"command": "join", "args": {"ch1": "A", "ch2": "B", "sub_ch": "C"}})
        );
        assert_eq!(request.command_name(), "join");
    }

    #[test]
    fn leave_request_has_no_args() {
        assert_eq!(
            serde_json::to_value(BackendRequest::Leave).expect("serialize"),
            json!({"command": "leave"})
        );
    }

    #[test]
    fn user_data_changed_parses_backend_payload() {
        let payload: UserDataChanged = serde_json::from_value(json!({
            "user_id": "u1",
            "event": "Join",
            "identify": "Track1",
            "name": "alice"
        }))
        .expect("parse");
        assert_eq!(payload, UserDataChanged::join(TrackTag::Track1, "alice", "u1"));
    }

    #[test]
    fn volume_rejects_out_of_range_payloads() {
        use crate::domain::Volume;

        assert!(serde_json::from_value::<Volume>(json!(201)).is_err());
        assert_eq!(
            serde_json::from_value::<Volume>(json!(150)).expect("volume"),
            Volume::new(150).expect("in range")
        );
    }
}
