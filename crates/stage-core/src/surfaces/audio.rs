use crate::audio::{AudioFeatures, FeaturePatch};

use super::broadcast::{Broadcast, Subscription};

/// Latest audio features. Writes merge field by field.
pub struct AudioSurface {
    cell: Broadcast<AudioFeatures>,
}

impl Default for AudioSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSurface {
    pub fn new() -> Self {
        Self {
            cell: Broadcast::new(AudioFeatures::default()),
        }
    }

    /// Merges the finite fields of `patch` and notifies subscribers.
    pub fn set(&self, patch: FeaturePatch) {
        self.cell.update(|f| {
            f.merge(&patch);
            true
        });
    }

    pub fn get(&self) -> AudioFeatures {
        self.cell.get()
    }

    pub fn subscribe(&self, f: impl Fn(&AudioFeatures) + 'static) -> Subscription {
        self.cell.subscribe(f)
    }
}
