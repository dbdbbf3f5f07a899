use crate::assets::AnimationGroup;
use tracing::{debug, warn};

/// Per-mesh animation state machine.
///
/// Clips are addressed by name. Switching state starts the new clip and
/// cross-fades out of the previous one over successive `update()` calls.
pub struct AnimationDriver {
    clips: Vec<Box<dyn AnimationGroup>>,
    current: Option<usize>,
    previous: Option<usize>,
    blend: f32,
    blend_speed: f32,
    last_missing: Option<String>,
}

impl AnimationDriver {
    pub fn new(clips: Vec<Box<dyn AnimationGroup>>, blend_speed: f32) -> Self {
        // Imported groups autoplay in most engines
        let mut clips = clips;
        for clip in clips.iter_mut() {
            clip.stop();
        }

        Self {
            clips,
            current: None,
            previous: None,
            blend: 1.0,
            blend_speed: blend_speed.clamp(f32::EPSILON, 1.0),
            last_missing: None,
        }
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.map(|idx| self.clips[idx].name())
    }

    pub fn is_blending(&self) -> bool {
        self.previous.is_some()
    }

    /// Switch to `state`; a no-op when it is already playing
    pub fn play(&mut self, state: &str) {
        if self.current_state() == Some(state) {
            return;
        }

        let Some(next) = self.clips.iter().position(|clip| clip.name() == state) else {
            if self.last_missing.as_deref() != Some(state) {
                warn!(state, "animation state not found on mesh");
                self.last_missing = Some(state.to_string());
            }
            return;
        };
        self.last_missing = None;

        // A fade still in progress is cut short
        if let Some(stale) = self.previous.take() {
            self.clips[stale].stop();
        }

        let clip = &mut self.clips[next];
        let looping = clip.looping();
        clip.start(looping);

        match self.current.replace(next) {
            Some(prev) => {
                clip.set_weight(0.0);
                self.previous = Some(prev);
                self.blend = 0.0;
            }
            None => {
                clip.set_weight(1.0);
                self.blend = 1.0;
            }
        }

        debug!(state, looping, "animation state changed");
    }

    /// Advance blending by one frame
    pub fn update(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        let Some(previous) = self.previous else {
            return;
        };

        self.blend = (self.blend + self.blend_speed).min(1.0);
        self.clips[current].set_weight(self.blend);
        self.clips[previous].set_weight(1.0 - self.blend);

        if self.blend >= 1.0 {
            self.clips[previous].stop();
            self.previous = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::memory::{ClipState, MemoryAnimationGroup};
    use std::sync::{Arc, Mutex};

    fn clip(name: &str, looping: bool) -> (Box<dyn AnimationGroup>, Arc<Mutex<ClipState>>) {
        let group = MemoryAnimationGroup::new(name, looping);
        let state = group.state_handle();
        (Box::new(group), state)
    }

    #[test]
    fn test_play_is_idempotent() {
        let (idle, idle_state) = clip("idle02", true);
        let mut driver = AnimationDriver::new(vec![idle], 0.25);

        driver.play("idle02");
        driver.play("idle02");
        driver.play("idle02");

        let state = idle_state.lock().unwrap().clone();
        assert_eq!(state.starts, 1);
        assert!(state.playing);
        assert!(state.looping);
        assert_eq!(state.weight, 1.0);
        assert_eq!(driver.current_state(), Some("idle02"));
    }

    #[test]
    fn test_switch_blends_then_stops_previous() {
        let (idle, idle_state) = clip("idle02", true);
        let (wave, wave_state) = clip("wave", false);
        let mut driver = AnimationDriver::new(vec![idle, wave], 0.5);

        driver.play("idle02");
        driver.play("wave");
        assert!(driver.is_blending());
        assert!(!wave_state.lock().unwrap().looping);

        driver.update();
        assert_eq!(wave_state.lock().unwrap().weight, 0.5);
        assert_eq!(idle_state.lock().unwrap().weight, 0.5);
        assert!(idle_state.lock().unwrap().playing);

        driver.update();
        assert_eq!(wave_state.lock().unwrap().weight, 1.0);
        assert!(!idle_state.lock().unwrap().playing);
        assert!(!driver.is_blending());
    }

    #[test]
    fn test_unknown_state_keeps_current() {
        let (idle, _) = clip("idle02", true);
        let mut driver = AnimationDriver::new(vec![idle], 0.5);

        driver.play("idle02");
        driver.play("run");

        assert_eq!(driver.current_state(), Some("idle02"));
    }

    #[test]
    fn test_update_without_state_is_noop() {
        let mut driver = AnimationDriver::new(Vec::new(), 0.5);
        driver.update();
        assert_eq!(driver.current_state(), None);
    }
}
