//! Track - one decoded source loop
//!
//! A track is created when a load request decodes successfully, owned by
//! the controller while it plays, and destroyed (or superseded) on
//! stop/track-swap. Tracks are never shared across concurrent graphs.

use serde::{Deserialize, Serialize};

use crate::io::PcmBuffer;

/// Identifier the control surface's track selection enumerates over.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TrackId(pub u32);

/// A decoded, looping source.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: TrackId,
    pub buffer: PcmBuffer,
}

impl Track {
    pub fn new(id: TrackId, buffer: PcmBuffer) -> Self {
        Self { id, buffer }
    }

    /// Loop length in seconds.
    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }
}
