use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ChannelId);
id_newtype!(VoiceUserId);

/// A voice channel the backend can route audio to or from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ChannelId::new(id),
            name: name.into(),
        }
    }
}

/// One of the two fixed output slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackTag {
    Track1,
    Track2,
}

impl TrackTag {
    pub const ALL: [TrackTag; 2] = [TrackTag::Track1, TrackTag::Track2];

    pub fn label(self) -> &'static str {
        match self {
            TrackTag::Track1 => "Track1",
            TrackTag::Track2 => "Track2",
        }
    }
}

impl fmt::Display for TrackTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("volume {0} is outside 0..={max}", max = Volume::MAX_PERCENT)]
pub struct VolumeOutOfRange(pub i64);

/// Per-participant volume as an integer percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Volume(u16);

impl Volume {
    pub const MIN_PERCENT: u16 = 0;
    pub const MAX_PERCENT: u16 = 200;
    pub const DEFAULT: Volume = Volume(100);

    pub fn new(percent: i64) -> Result<Self, VolumeOutOfRange> {
        if (Self::MIN_PERCENT as i64..=Self::MAX_PERCENT as i64).contains(&percent) {
            Ok(Self(percent as u16))
        } else {
            Err(VolumeOutOfRange(percent))
        }
    }

    pub fn clamped(percent: i64) -> Self {
        Self(percent.clamp(Self::MIN_PERCENT as i64, Self::MAX_PERCENT as i64) as u16)
    }

    pub fn percent(self) -> u16 {
        self.0
    }

    /// Normalised gain handed to the backend, in `0.0..=2.0`.
    pub fn gain(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Volume {
    type Error = VolumeOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Volume> for i64 {
    fn from(value: Volume) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_saturates_at_slider_ends() {
        assert_eq!(Volume::clamped(-40), Volume::new(0).expect("min"));
        assert_eq!(Volume::clamped(250), Volume::new(200).expect("max"));
        assert_eq!(Volume::clamped(75).percent(), 75);
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert_eq!(Volume::new(201), Err(VolumeOutOfRange(201)));
        assert_eq!(Volume::new(-1), Err(VolumeOutOfRange(-1)));
        assert_eq!(Volume::DEFAULT.gain(), 1.0);
    }
}
