use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A game's timed effect enum.
pub trait EffectKind: Clone + Copy + PartialEq + Serialize + DeserializeOwned {
    /// Seconds the effect lasts once applied. `f32::INFINITY` never lapses.
    fn duration(&self) -> f32;
}

/// Effects currently running on one object, each with its time left.
/// Re-applying a kind restarts its timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EffectSet<K: EffectKind> {
    timers: Vec<(K, f32)>,
}

impl<K: EffectKind> Default for EffectSet<K> {
    fn default() -> Self {
        Self { timers: Vec::new() }
    }
}

impl<K: EffectKind> EffectSet<K> {
    pub fn apply(&mut self, kind: K) {
        let duration = kind.duration();
        match self.timers.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, left)) => *left = duration,
            None => self.timers.push((kind, duration)),
        }
    }

    /// Count every timer down by `dt`; the kinds that ran out are dropped and
    /// returned.
    pub fn tick(&mut self, dt: f32) -> Vec<K> {
        let mut expired = Vec::new();
        self.timers.retain_mut(|(kind, left)| {
            if left.is_infinite() {
                return true;
            }
            *left -= dt;
            if *left <= 0.0 {
                expired.push(*kind);
                return false;
            }
            true
        });
        expired
    }

    pub fn has(&self, kind: K) -> bool {
        self.remaining(kind).is_some()
    }

    pub fn remaining(&self, kind: K) -> Option<f32> {
        self.timers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|&(_, left)| left)
    }

    pub fn cancel(&mut self, kind: K) {
        self.timers.retain(|(k, _)| *k != kind);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
