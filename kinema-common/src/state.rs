//! Playback state shared by sources and sinks

use serde::{Deserialize, Serialize};

/// Playback state enumeration
///
/// A source starts (and can always return to) `Stopped`. `Paused` is only
/// reachable from `Playing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Compact encoding for lock-free storage in an `AtomicU8`
    pub fn as_u8(self) -> u8 {
        match self {
            PlaybackState::Stopped => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
        }
    }

    /// Inverse of [`PlaybackState::as_u8`]; unknown values decode as `Stopped`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped() {
        assert_eq!(PlaybackState::default(), PlaybackState::Stopped);
    }

    #[test]
    fn test_u8_encoding_round_trips_every_state() {
        for state in [PlaybackState::Stopped, PlaybackState::Playing, PlaybackState::Paused] {
            assert_eq!(PlaybackState::from_u8(state.as_u8()), state);
        }
        assert_eq!(PlaybackState::from_u8(200), PlaybackState::Stopped);
    }

    #[test]
    fn test_display_and_serde_agree() {
        let serialized = serialized_name(PlaybackState::Paused);
        assert_eq!(serialized, PlaybackState::Paused.to_string());
    }

    fn serialized_name(state: PlaybackState) -> String {
        #[derive(Serialize)]
        struct Wrapper {
            state: PlaybackState,
        }
        let text = toml::to_string(&Wrapper { state }).unwrap();
        text.trim()
            .trim_start_matches("state = ")
            .trim_matches('"')
            .to_string()
    }
}
