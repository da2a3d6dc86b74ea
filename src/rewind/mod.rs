//! Rewind Snapshot Ring Buffer
//!
//! World-state history for the time-rewind ability:
//! - `RewindBuffer`: bounded FIFO of `(location, vitality)` samples, drop-oldest
//! - `RewindSampler`: collection cadence (e.g. every 0.1 s)
//! - `RewindPlayback`: playback cadence, `duration / buffer_len` per sample
//!
//! Collection and playback run on separate timers so a 3 s window can replay
//! in 1.25 s.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewindSnapshot {
    pub location: Vec3,
    pub vitality: f32,
}

impl RewindSnapshot {
    pub fn new(location: Vec3, vitality: f32) -> Self {
        Self { location, vitality }
    }
}

/// Location-only view of a snapshot
impl From<RewindSnapshot> for Vec3 {
    fn from(snapshot: RewindSnapshot) -> Self {
        snapshot.location
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewindBuffer {
    samples: VecDeque<RewindSnapshot>,
    capacity: usize,
}

impl RewindBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrinking drops the oldest samples
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    pub fn push(&mut self, snapshot: RewindSnapshot) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(snapshot);
    }

    /// Index 0 is the oldest sample
    pub fn get(&self, index: usize) -> Option<&RewindSnapshot> {
        self.samples.get(index)
    }

    pub fn oldest(&self) -> Option<&RewindSnapshot> {
        self.samples.front()
    }

    pub fn latest(&self) -> Option<&RewindSnapshot> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RewindSnapshot> {
        self.samples.iter()
    }

    pub fn locations(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.samples.iter().map(|s| s.location)
    }

    pub fn max_vitality(&self) -> Option<f32> {
        self.samples.iter().map(|s| s.vitality).reduce(f32::max)
    }

    /// Vitality a rewind would restore: buffer peak minus current, never negative
    pub fn heal_magnitude(&self, current_vitality: f32) -> f32 {
        self.max_vitality()
            .map_or(0.0, |peak| (peak - current_vitality).max(0.0))
    }
}

/// Collection cadence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewindSampler {
    pub interval: f32,
    accumulated: f32,
}

impl RewindSampler {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            accumulated: 0.0,
        }
    }

    /// `true` when a sample is due this tick
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.interval <= 0.0 {
            return false;
        }
        self.accumulated += dt;
        if self.accumulated >= self.interval {
            // One sample per tick; leftover time carries, capped below one interval
            self.accumulated = (self.accumulated - self.interval).min(self.interval * 0.999);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

/// Playback cadence for one rewind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewindPlayback {
    pub sample_time: f32,
    pub interpolation_speed: f32,
    timer: f32,
}

impl RewindPlayback {
    /// `None` for an empty buffer or a non-positive duration
    pub fn start(buffer_len: usize, duration: f32) -> Option<Self> {
        if buffer_len == 0 || duration <= 0.0 {
            return None;
        }
        let sample_time = duration / buffer_len as f32;
        Some(Self {
            sample_time,
            interpolation_speed: 1.0 / sample_time,
            timer: sample_time,
        })
    }

    /// Number of sample slots that elapsed during `dt`
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.timer -= dt;
        let mut elapsed = 0;
        while self.timer <= 0.0 {
            self.timer += self.sample_time;
            elapsed += 1;
        }
        elapsed
    }

    /// Interpolation factor toward the current target for a `dt` step
    pub fn blend(&self, dt: f32) -> f32 {
        (self.interpolation_speed * dt).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(i: usize) -> RewindSnapshot {
        RewindSnapshot::new(Vec3::new(i as f32, 0.0, 0.0), i as f32 * 10.0)
    }

    #[test]
    fn test_fifo_drop_oldest() {
        let mut buffer = RewindBuffer::new(5);
        for i in 1..=8 {
            buffer.push(snap(i));
        }
        let xs: Vec<f32> = buffer.locations().map(|l| l.x).collect();
        assert_eq!(xs, vec![4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut buffer = RewindBuffer::new(0);
        buffer.push(snap(1));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_shrink_capacity_keeps_newest() {
        let mut buffer = RewindBuffer::new(10);
        for i in 0..10 {
            buffer.push(snap(i));
        }
        buffer.set_capacity(3);
        assert_eq!(buffer.len(), 3);
        assert!((buffer.oldest().unwrap().location.x - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_heal_magnitude() {
        let mut buffer = RewindBuffer::new(4);
        assert_eq!(buffer.heal_magnitude(50.0), 0.0);

        buffer.push(RewindSnapshot::new(Vec3::ZERO, 80.0));
        buffer.push(RewindSnapshot::new(Vec3::ZERO, 100.0));
        buffer.push(RewindSnapshot::new(Vec3::ZERO, 60.0));
        assert!((buffer.heal_magnitude(45.0) - 55.0).abs() < f32::EPSILON);
        // More vitality now than ever recorded heals nothing
        assert_eq!(buffer.heal_magnitude(120.0), 0.0);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_sampler_cadence() {
        let mut sampler = RewindSampler::new(0.1);
        let dt = 1.0 / 60.0;
        let samples = (0..60).filter(|_| sampler.tick(dt)).count();
        assert!((9..=10).contains(&samples));
    }

    #[test]
    fn test_playback_slots() {
        let mut playback = RewindPlayback::start(30, 1.25).unwrap();
        assert!((playback.sample_time - 1.25 / 30.0).abs() < 1e-6);

        let mut total = 0;
        let dt = 1.0 / 60.0;
        let mut elapsed = 0.0;
        while total < 30 {
            total += playback.advance(dt);
            elapsed += dt;
        }
        assert!((elapsed - 1.25).abs() <= dt + 1e-4);
    }

    #[test]
    fn test_playback_requires_samples() {
        assert!(RewindPlayback::start(0, 1.25).is_none());
        assert!(RewindPlayback::start(5, 0.0).is_none());
    }
}
