//! Continuous colour fields that drift with time and volume.

use super::{advance_hue, millis};
use crate::{
    render::{
        color::{add, blur, fill_rainbow, fill_solid, hsv, sin8, unit_to_byte},
        Animation, Rgb,
    },
    AudioFeatures,
};

/// Scrolling hue bands; every other pixel flashes on a beat.
#[derive(Debug, Clone, Default)]
pub struct ColorTunnel {
    hue: f32,
}

impl Animation for ColorTunnel {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let hue = advance_hue(&mut self.hue, features.volume * 8.0);
        let phase = (millis(features) / 12) as u8;

        for (i, led) in frame.iter_mut().enumerate() {
            let i = i as u8;
            let pixel_hue = hue.wrapping_add(i.wrapping_mul(3));
            *led = hsv(pixel_hue, 255, sin8(i.wrapping_mul(5).wrapping_add(phase)));
            if features.beat_detected && i % 2 == 0 {
                *led = add(*led, hsv(pixel_hue, 255, 255));
            }
        }
    }
}

/// Hue swirl pushed along by the mids, brightness following the volume.
#[derive(Debug, Clone, Default)]
pub struct EnergySwirl {
    swirl: f32,
}

impl Animation for EnergySwirl {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let swirl = advance_hue(&mut self.swirl, features.mid * 8.0);
        let value = unit_to_byte(features.volume);
        for (i, led) in frame.iter_mut().enumerate() {
            *led = hsv((i as u8).wrapping_mul(5).wrapping_add(swirl), 255, value);
        }
        blur(frame, 30);
    }
}

/// Three segments showing bass, mid and treble energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyRiver;

impl Animation for FrequencyRiver {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let third = frame.len() / 3;
        let (bass, rest) = frame.split_at_mut(third);
        let (mid, treble) = rest.split_at_mut(third);

        fill_solid(bass, hsv(160, 255, unit_to_byte(features.bass)));
        fill_solid(mid, hsv(96, 255, unit_to_byte(features.mid)));
        fill_solid(treble, hsv(0, 255, unit_to_byte(features.treble)));
        blur(frame, 16);
    }
}

/// Plain rainbow scrolling with time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaosEngine;

impl Animation for ChaosEngine {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        fill_rainbow(frame, (millis(features) / 10) as u8, 7);
    }
}

/// Slow hue drift with a travelling brightness wave.
#[derive(Debug, Clone, Copy, Default)]
pub struct GalacticDrift;

impl Animation for GalacticDrift {
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        let now = millis(features);
        for (i, led) in frame.iter_mut().enumerate() {
            let i = i as u64;
            let hue = ((i * 4 + now / 5) % 255) as u8;
            let wave = sin8(((i * 3 + now / 7) % 256) as u8);
            *led = hsv(hue, 255, wave);
        }
    }
}
