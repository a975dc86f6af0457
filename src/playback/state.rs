//! Text variants and the playback state machine.
//!
//! ```text
//! Idle ──play(v)──▶ Loading(v) ──audio ready + started──▶ Playing(v)
//!                       │                                   │
//!                       └──failure / superseded──▶ Idle ◀───┘ end of buffer,
//!                                                             stop, toggle
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TextVariant
// ---------------------------------------------------------------------------

/// Which of the three texts of a reading a playback or cache entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextVariant {
    /// The text as extracted from the image.
    Original,
    /// A plain-language rewrite in the target language.
    Simplified,
    /// A translation into the user's chosen translation language.
    Translated,
}

impl TextVariant {
    pub const ALL: [TextVariant; 3] = [
        TextVariant::Original,
        TextVariant::Simplified,
        TextVariant::Translated,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextVariant::Original => "original",
            TextVariant::Simplified => "simplified",
            TextVariant::Translated => "translated",
        }
    }
}

impl fmt::Display for TextVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(TextVariant::Original),
            "simplified" => Ok(TextVariant::Simplified),
            "translated" => Ok(TextVariant::Translated),
            other => Err(format!(
                "unknown text variant {other:?} (expected original, simplified or translated)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// State of the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing is loading or audible.
    #[default]
    Idle,
    /// Audio for the variant is being fetched or started.
    Loading(TextVariant),
    /// The variant is audible.
    Playing(TextVariant),
}

impl PlaybackState {
    /// The variant being loaded or played, if any.
    pub fn variant(&self) -> Option<TextVariant> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Loading(v) | PlaybackState::Playing(v) => Some(*v),
        }
    }

    /// `true` while loading or playing.
    ///
    /// ```
    /// use reading_aid::playback::{PlaybackState, TextVariant};
    ///
    /// assert!(!PlaybackState::Idle.is_busy());
    /// assert!(PlaybackState::Loading(TextVariant::Original).is_busy());
    /// assert!(PlaybackState::Playing(TextVariant::Translated).is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }

    pub fn is_playing(&self, variant: TextVariant) -> bool {
        *self == PlaybackState::Playing(variant)
    }

    /// A short human-readable label for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Loading(_) => "Loading",
            PlaybackState::Playing(_) => "Playing",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
    }

    #[test]
    fn variant_of_each_state() {
        assert_eq!(PlaybackState::Idle.variant(), None);
        assert_eq!(
            PlaybackState::Loading(TextVariant::Simplified).variant(),
            Some(TextVariant::Simplified)
        );
        assert_eq!(
            PlaybackState::Playing(TextVariant::Original).variant(),
            Some(TextVariant::Original)
        );
    }

    #[test]
    fn is_playing_matches_variant_only_when_playing() {
        let state = PlaybackState::Playing(TextVariant::Original);
        assert!(state.is_playing(TextVariant::Original));
        assert!(!state.is_playing(TextVariant::Simplified));
        assert!(!PlaybackState::Loading(TextVariant::Original).is_playing(TextVariant::Original));
    }

    #[test]
    fn labels() {
        assert_eq!(PlaybackState::Idle.label(), "Idle");
        assert_eq!(PlaybackState::Loading(TextVariant::Original).label(), "Loading");
        assert_eq!(PlaybackState::Playing(TextVariant::Original).label(), "Playing");
    }

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("Translated".parse::<TextVariant>(), Ok(TextVariant::Translated));
        assert_eq!(" original ".parse::<TextVariant>(), Ok(TextVariant::Original));
        assert!("summary".parse::<TextVariant>().is_err());
    }

    #[test]
    fn variant_display_round_trips() {
        for v in TextVariant::ALL {
            assert_eq!(v.to_string().parse::<TextVariant>(), Ok(v));
        }
    }
}
