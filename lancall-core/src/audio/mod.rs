//! Audio capture, playback, and the per-call streaming pipeline

pub mod device;
pub mod pipeline;

use std::sync::{Arc, RwLock};

/// Upper bound for the volume gain (200%)
pub const MAX_GAIN: f32 = 2.0;

/// Local output volume settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    /// Linear gain applied to incoming audio; 1.0 is passthrough
    pub gain: f32,
    /// When set, incoming audio plays as silence
    pub muted: bool,
}

impl Default for VolumeState {
    fn default() -> Self {
        Self {
            gain: 1.0,
            muted: false,
        }
    }
}

/// Volume state shared between the control surface and receive tasks
///
/// Read on every received frame, written only on user input, so a
/// plain std RwLock is enough. A poisoned lock falls back to defaults
/// rather than taking the audio path down.
#[derive(Debug, Clone, Default)]
pub struct SharedVolume {
    state: Arc<RwLock<VolumeState>>,
}

impl SharedVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current settings (defaults if the lock is poisoned)
    pub fn get(&self) -> VolumeState {
        self.state.read().map(|s| *s).unwrap_or_default()
    }

    /// Set the gain, clamped to `0.0..=MAX_GAIN`
    pub fn set_gain(&self, gain: f32) {
        if let Ok(mut state) = self.state.write() {
            state.gain = gain.clamp(0.0, MAX_GAIN);
        }
    }

    pub fn set_muted(&self, muted: bool) {
        if let Ok(mut state) = self.state.write() {
            state.muted = muted;
        }
    }

    /// Flip the mute flag; returns the new value
    pub fn toggle_mute(&self) -> bool {
        match self.state.write() {
            Ok(mut state) => {
                state.muted = !state.muted;
                state.muted
            }
            Err(_) => false,
        }
    }
}
