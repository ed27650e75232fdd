//! Particle-like effects whose pixels carry state between frames.

use rand::{rngs::StdRng, Rng};

use super::{advance_hue, millis};
use crate::{
    render::{
        color::{add, blur, fade_to_black, heat_color, hsv, scale, sin8, WHITE},
        Animation, Rgb,
    },
    AudioFeatures,
};

/// Flames rising from the start of the strip, flaring up on beats.
#[derive(Debug, Clone)]
pub struct Firestorm {
    heat: Vec<u8>,
    rng: StdRng,
}

impl Firestorm {
    pub fn new(rng: StdRng) -> Self {
        Self {
            heat: Vec::new(),
            rng,
        }
    }
}

impl Animation for Firestorm {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let len = frame.len();
        self.heat.resize(len, 0);

        let cooling = ((features.volume.clamp(0.0, 1.0) * 255.0) / 12.0).clamp(2.0, 10.0) as u8;
        for cell in self.heat.iter_mut() {
            *cell = cell.saturating_sub(self.rng.random_range(0..cooling));
        }

        for k in (2..len).rev() {
            let sum = u16::from(self.heat[k - 1]) + 2 * u16::from(self.heat[k - 2]);
            self.heat[k] = (sum / 3) as u8;
        }

        if features.beat_detected {
            let spark_zone = (len / 4).max(1);
            for _ in 0..3 {
                let index = self.rng.random_range(0..spark_zone);
                let flare = self.rng.random_range(180..=255);
                self.heat[index] = self.heat[index].saturating_add(flare);
            }
        }

        for (led, cell) in frame.iter_mut().zip(&self.heat) {
            *led = heat_color(*cell);
        }
    }
}

/// Drops of colour sliding down the strip, spawned by treble.
#[derive(Debug, Clone)]
pub struct ColorDrip {
    drips: Vec<usize>,
    hue: u8,
    rng: StdRng,
}

impl ColorDrip {
    pub fn new(rng: StdRng) -> Self {
        Self {
            drips: Vec::new(),
            hue: 0,
            rng,
        }
    }
}

impl Animation for ColorDrip {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let len = frame.len();
        fade_to_black(frame, 30);

        if features.treble > 0.25 || self.rng.random::<u8>() < 4 {
            self.drips.push(0);
            self.hue = self.hue.wrapping_add(self.rng.random_range(5..15));
        }

        for drip in self.drips.iter_mut().filter(|pos| **pos < len) {
            frame[*drip] = hsv(self.hue, 200, 255);
            if *drip > 0 {
                frame[*drip - 1] = scale(frame[*drip - 1], 75);
            }
            *drip += 1;
        }
        self.drips.retain(|pos| *pos < len);
    }

    fn activate(&mut self) {
        self.drips.clear();
    }
}

/// Shimmering hue wave with bass hits and treble flashes.
#[derive(Debug, Clone)]
pub struct CyberFlux {
    hue: f32,
    rng: StdRng,
}

impl CyberFlux {
    pub fn new(rng: StdRng) -> Self {
        Self { hue: 0.0, rng }
    }
}

impl Animation for CyberFlux {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let len = frame.len();
        let hue = advance_hue(&mut self.hue, features.volume * 4.0);

        if features.bass > 0.4 && len > 0 {
            let center = self.rng.random_range(0..len);
            frame[center] = hsv(hue, 255, 255);
            if center > 0 {
                frame[center - 1] = hsv(hue.wrapping_add(20), 255, 180);
            }
            if center + 1 < len {
                frame[center + 1] = hsv(hue.wrapping_sub(20), 255, 180);
            }
        }

        let phase = (millis(features) / 6) as u8;
        for (i, led) in frame.iter_mut().enumerate() {
            let i = i as u8;
            let wave = sin8(i.wrapping_mul(4).wrapping_add(phase));
            *led = add(*led, hsv(hue.wrapping_add(i.wrapping_mul(2)), 255, wave));
        }

        let flash = (features.treble.clamp(0.0, 1.0) * 220.0) as u8;
        for led in frame.iter_mut() {
            if self.rng.random::<u8>() < flash {
                *led = WHITE;
            }
        }
        fade_to_black(frame, 22);
    }
}

/// Breathing organic wave; the breath only shows with enough bass.
#[derive(Debug, Clone)]
pub struct BioSignal {
    offset: u8,
    rng: StdRng,
}

impl BioSignal {
    pub fn new(rng: StdRng) -> Self {
        Self { offset: 0, rng }
    }
}

impl Animation for BioSignal {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        self.offset = self.offset.wrapping_add(2);

        let breath = sin8((millis(features) / 12) as u8);
        let brightness = if features.bass > 0.3 { breath } else { 25 };
        let sparkle = (features.treble.clamp(0.0, 1.0) * 200.0) as u8;

        for (i, led) in frame.iter_mut().enumerate() {
            let wave = sin8((i as u8).wrapping_mul(3).wrapping_add(self.offset));
            *led = hsv(wave.wrapping_add(self.offset), 220, brightness);
            if self.rng.random::<u8>() < sparkle {
                *led = add(*led, hsv(self.rng.random(), 255, 255));
            }
        }

        if features.beat_detected {
            for led in frame.iter_mut() {
                *led = add(*led, hsv(0, 0, 40));
            }
        }
        blur(frame, 30);
    }
}
