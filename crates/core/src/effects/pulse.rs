//! Beat-triggered effects: ripples, blooms and strobes.

use std::time::Duration;

use rand::{rngs::StdRng, Rng};

use super::advance_hue;
use crate::{
    render::{
        color::{add, blur, fade_to_black, fill_gradient, fill_solid, hsv, unit_to_byte, BLACK},
        Animation, Rgb,
    },
    AudioFeatures,
};

/// Adds `color` symmetrically around the centre of the strip at `offset`.
fn add_mirrored(frame: &mut [Rgb], offset: usize, color: Rgb) {
    let center = frame.len() / 2;
    if let Some(left) = center.checked_sub(offset) {
        frame[left] = add(frame[left], color);
    }
    if offset > 0 {
        if let Some(right) = frame.get_mut(center + offset) {
            *right = add(*right, color);
        }
    }
}

/// A ring expanding from the centre on every beat.
#[derive(Debug, Clone)]
pub struct RippleCascade {
    hue: u8,
    step: Option<usize>,
    rng: StdRng,
}

impl RippleCascade {
    pub fn new(rng: StdRng) -> Self {
        Self {
            hue: 0,
            step: None,
            rng,
        }
    }
}

impl Animation for RippleCascade {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        if features.beat_detected {
            self.hue = self.rng.random();
            self.step = Some(0);
        }

        fade_to_black(frame, 64);

        if let Some(step) = self.step {
            let center = frame.len() / 2;
            let value = 255usize.saturating_sub(step * 20) as u8;
            for (i, led) in frame.iter_mut().enumerate() {
                if center.abs_diff(i) == step {
                    *led = hsv(self.hue, 255, value);
                }
            }
            self.step = (step < center).then_some(step + 1);
        }
    }

    fn activate(&mut self) {
        self.step = None;
    }
}

/// Random sparkles that strobe faster when the bass is heavy.
#[derive(Debug, Clone)]
pub struct StrobeMatrix {
    on: bool,
    last_change: Duration,
    rng: StdRng,
}

impl StrobeMatrix {
    pub fn new(rng: StdRng) -> Self {
        Self {
            on: false,
            last_change: Duration::ZERO,
            rng,
        }
    }
}

impl Animation for StrobeMatrix {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let period = Duration::from_millis(if features.bass > 0.5 { 60 } else { 180 });
        if features.timestamp.saturating_sub(self.last_change) > period {
            self.on = !self.on;
            self.last_change = features.timestamp;
        }

        if self.on {
            let mut i = 0;
            while i < frame.len() {
                frame[i] = hsv(self.rng.random(), 255, 255);
                i += self.rng.random_range(1..5);
            }
        } else {
            fill_solid(frame, BLACK);
        }
    }
}

/// A burst of colour growing from the centre on heavy bass, shrinking back
/// by one pixel per frame.
#[derive(Debug, Clone)]
pub struct BassBloom {
    hue: u8,
    size: usize,
    rng: StdRng,
}

impl BassBloom {
    pub fn new(rng: StdRng) -> Self {
        Self {
            hue: 0,
            size: 0,
            rng,
        }
    }
}

impl Animation for BassBloom {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        if features.bass > 0.5 || features.beat_detected {
            self.size = frame.len().div_ceil(2);
            self.hue = self.rng.random();
        }

        fade_to_black(frame, 25);
        for i in 0..self.size {
            let color = hsv(
                self.hue.wrapping_add((i * 2) as u8),
                255,
                255usize.saturating_sub(i * 5) as u8,
            );
            add_mirrored(frame, i, color);
        }
        self.size = self.size.saturating_sub(1);
    }
}

/// Gradient wash with a beat-driven hue, a bass ring and treble sparkles.
#[derive(Debug, Clone)]
pub struct PartyPulse {
    hue: u8,
    radius: usize,
    rng: StdRng,
}

impl PartyPulse {
    pub fn new(rng: StdRng) -> Self {
        Self {
            hue: 0,
            radius: 0,
            rng,
        }
    }
}

impl Animation for PartyPulse {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        if features.beat_detected {
            self.hue = self.hue.wrapping_add(30);
        }

        let value = (features.volume.clamp(0.0, 1.0) * 180.0) as u8;
        fill_gradient(
            frame,
            hsv(self.hue, 255, value),
            hsv(self.hue.wrapping_add(64), 255, value),
        );

        if features.bass > 0.5 {
            self.radius = frame.len().div_ceil(2);
        }
        for i in 0..self.radius {
            let color = hsv(
                self.hue.wrapping_add(60),
                255,
                255usize.saturating_sub(i * 4) as u8,
            );
            add_mirrored(frame, i, color);
        }
        self.radius = self.radius.saturating_sub(1);

        let treble = unit_to_byte(features.treble);
        let mid = (features.mid.clamp(0.0, 1.0) * 100.0) as u8;
        for _ in 0..frame.len() / 6 {
            if self.rng.random::<u8>() < treble || self.rng.random::<u8>() < mid {
                let index = self.rng.random_range(0..frame.len());
                let sparkle = hsv(self.hue.wrapping_add(self.rng.random()), 200, 255);
                frame[index] = add(frame[index], sparkle);
            }
        }
        blur(frame, 18);
    }
}

/// Whole-strip hue sweep that peaks on every beat.
#[derive(Debug, Clone, Default)]
pub struct AudioStorm {
    base_hue: f32,
}

impl Animation for AudioStorm {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let base = advance_hue(&mut self.base_hue, features.volume * 10.0);
        let value = if features.beat_detected { 255 } else { 128 };
        for (i, led) in frame.iter_mut().enumerate() {
            *led = hsv(base.wrapping_add((i as u8).wrapping_mul(5)), 255, value);
        }
        fade_to_black(frame, 10);
    }
}
