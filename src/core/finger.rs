//! Finger labels used on the wire and in tap results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five fingers of a hand.
///
/// The declaration order is the canonical order (thumb first), which is also
/// the tie-break order when two fingers report the same tap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finger {
    /// Thumb (index 1)
    Thumb,
    /// Index finger (index 2)
    Index,
    /// Middle finger (index 3)
    Middle,
    /// Ring finger (index 4)
    Ring,
    /// Little finger (index 5)
    Pinky,
}

impl Finger {
    /// All fingers in canonical order
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Look up a finger by its 1-based wire index
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Thumb),
            2 => Some(Self::Index),
            3 => Some(Self::Middle),
            4 => Some(Self::Ring),
            5 => Some(Self::Pinky),
            _ => None,
        }
    }

    /// 1-based index sent to the device
    pub fn index(self) -> u8 {
        self.rank() as u8 + 1
    }

    /// 0-based position in canonical order
    pub fn rank(self) -> usize {
        match self {
            Self::Thumb => 0,
            Self::Index => 1,
            Self::Middle => 2,
            Self::Ring => 3,
            Self::Pinky => 4,
        }
    }

    /// Label used by the device in tap-event lines
    pub fn name(self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a label is not one of the five finger names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown finger label: {0:?}")]
pub struct UnknownFinger(pub String);

impl FromStr for Finger {
    type Err = UnknownFinger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Labels are case-sensitive on the wire.
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFinger(s.to_string()))
    }
}
