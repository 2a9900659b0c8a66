use std::sync::{Arc, Mutex};

use crate::engine::track::TrackId;

/// Snapshot of the user-adjustable values the core reads.
///
/// The core never reads a UI widget; whatever surface exists (sliders, OSC,
/// a test) writes these values and the engine samples them at scheduler
/// ticks and on explicit pushes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlState {
    /// Output level, [0, 1].
    pub volume: f32,
    /// Waveshaper drive, [0, inf).
    pub distortion_amount: f32,
    /// Tremolo modulation depth, [0, 1].
    pub tremolo_depth: f32,
    /// Glitch gating level, [0, 1].
    pub glitch_intensity: f32,
    /// Which registered track should be playing.
    pub track: TrackId,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            volume: 0.9,
            distortion_amount: 5.0,
            tremolo_depth: 0.05,
            glitch_intensity: 0.0,
            track: TrackId(0),
        }
    }
}

/// Shared, clonable handle to the live control values.
#[derive(Clone, Debug, Default)]
pub struct ControlSurface {
    inner: Arc<Mutex<ControlState>>,
}

impl ControlSurface {
    pub fn new(state: ControlState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> ControlState {
        match self.inner.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut ControlState)) {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut state);
    }

    pub fn set_volume(&self, volume: f32) {
        self.update(|s| s.volume = volume.clamp(0.0, 1.0));
    }

    pub fn set_distortion_amount(&self, amount: f32) {
        self.update(|s| s.distortion_amount = amount.max(0.0));
    }

    pub fn set_tremolo_depth(&self, depth: f32) {
        self.update(|s| s.tremolo_depth = depth.clamp(0.0, 1.0));
    }

    pub fn set_glitch_intensity(&self, intensity: f32) {
        self.update(|s| s.glitch_intensity = intensity.clamp(0.0, 1.0));
    }

    pub fn select_track(&self, track: TrackId) {
        self.update(|s| s.track = track);
    }
}
