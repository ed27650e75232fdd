//! Built-in animation set.
//!
//! Every effect is a small struct implementing [`Animation`]; state that
//! must survive between frames (heat maps, ripples, drips) lives in its
//! fields. Effects resize their state to whatever frame they are handed.

mod flow;
mod particles;
mod pulse;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::CatalogConfig,
    render::{Animation, AnimationCatalog},
    AudioFeatures, BoothError, Result,
};

pub use flow::{ChaosEngine, ColorTunnel, EnergySwirl, FrequencyRiver, GalacticDrift};
pub use particles::{BioSignal, ColorDrip, CyberFlux, Firestorm};
pub use pulse::{AudioStorm, BassBloom, PartyPulse, RippleCascade, StrobeMatrix};

/// Names accepted by [`build`], in their default catalog order.
pub const BUILTIN_NAMES: &[&str] = &[
    "firestorm",
    "ripple_cascade",
    "color_tunnel",
    "energy_swirl",
    "strobe_matrix",
    "bass_bloom",
    "color_drip",
    "frequency_river",
    "party_pulse",
    "cyber_flux",
    "bio_signal",
    "chaos_engine",
    "galactic_drift",
    "audio_storm",
];

/// Instantiates a built-in effect by name.
pub fn build(name: &str, rng: StdRng) -> Option<Box<dyn Animation>> {
    let animation: Box<dyn Animation> = match name {
        "firestorm" => Box::new(Firestorm::new(rng)),
        "ripple_cascade" => Box::new(RippleCascade::new(rng)),
        "color_tunnel" => Box::new(ColorTunnel::default()),
        "energy_swirl" => Box::new(EnergySwirl::default()),
        "strobe_matrix" => Box::new(StrobeMatrix::new(rng)),
        "bass_bloom" => Box::new(BassBloom::new(rng)),
        "color_drip" => Box::new(ColorDrip::new(rng)),
        "frequency_river" => Box::new(FrequencyRiver),
        "party_pulse" => Box::new(PartyPulse::new(rng)),
        "cyber_flux" => Box::new(CyberFlux::new(rng)),
        "bio_signal" => Box::new(BioSignal::new(rng)),
        "chaos_engine" => Box::new(ChaosEngine),
        "galactic_drift" => Box::new(GalacticDrift),
        "audio_storm" => Box::new(AudioStorm::default()),
        _ => return None,
    };
    Some(animation)
}

/// Builds the startup catalog described by `config`.
///
/// Any mismatch between the configured list and what ends up in the catalog
/// is reported as a configuration error, which callers treat as fatal.
pub fn build_catalog(config: &CatalogConfig, seed: Option<u64>) -> Result<AnimationCatalog> {
    let mut catalog = AnimationCatalog::new(config.capacity);

    for (index, name) in config.animations.iter().enumerate() {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        };
        let animation = build(name, rng)
            .ok_or_else(|| BoothError::config(format!("unknown animation `{name}`")))?;
        catalog.add_boxed(animation, name.as_str());
    }

    if catalog.entry_count() != config.animations.len() {
        return Err(BoothError::config(format!(
            "catalog holds {} animations, {} were configured",
            catalog.entry_count(),
            config.animations.len()
        )));
    }
    Ok(catalog)
}

/// Milliseconds of stream time, truncated the way effect timing expects.
fn millis(features: &AudioFeatures) -> u64 {
    features.timestamp.as_millis() as u64
}

/// Accumulates a fractional hue offset and returns the wrapped byte hue.
fn advance_hue(accumulator: &mut f32, step: f32) -> u8 {
    *accumulator = (*accumulator + step).rem_euclid(256.0);
    *accumulator as u8
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::render::Rgb;

    fn loud(step: u64) -> AudioFeatures {
        AudioFeatures {
            timestamp: Duration::from_millis(step * 12),
            volume: 0.9,
            loudness: 90.0,
            bass: 0.8,
            mid: 0.6,
            treble: 0.5,
            beat_detected: step % 4 == 0,
            bpm: 128.0,
            ..Default::default()
        }
    }

    #[test]
    fn every_builtin_survives_odd_frame_sizes() {
        for name in BUILTIN_NAMES {
            let mut animation = build(name, StdRng::seed_from_u64(7)).unwrap();
            for len in [1, 2, 3, 7, 60] {
                let mut frame = vec![Rgb::default(); len];
                for step in 0..50 {
                    animation.render(&mut frame, &loud(step));
                }
            }
        }
    }

    #[test]
    fn loud_input_lights_the_strip() {
        for name in BUILTIN_NAMES {
            let mut animation = build(name, StdRng::seed_from_u64(3)).unwrap();
            let mut frame = vec![Rgb::default(); 60];
            let mut lit = false;
            for step in 0..40 {
                animation.render(&mut frame, &loud(step));
                lit |= frame.iter().any(|led| *led != Rgb::default());
            }
            assert!(lit, "{name} stayed dark");
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(build("moonwalk", StdRng::seed_from_u64(0)).is_none());

        let config = CatalogConfig {
            capacity: 2,
            animations: vec!["firestorm".into(), "moonwalk".into()],
        };
        assert!(matches!(
            build_catalog(&config, Some(1)),
            Err(BoothError::Config(_))
        ));
    }

    #[test]
    fn catalog_smaller_than_list_is_fatal() {
        let config = CatalogConfig {
            capacity: 1,
            animations: vec!["firestorm".into(), "chaos_engine".into()],
        };
        assert!(build_catalog(&config, Some(1)).is_err());
    }

    #[test]
    fn default_catalog_contains_every_builtin() {
        let catalog = build_catalog(&CatalogConfig::default(), Some(9)).unwrap();
        assert_eq!(catalog.entry_count(), BUILTIN_NAMES.len());
        assert!(catalog.names().eq(BUILTIN_NAMES.iter().copied()));
    }

    #[test]
    fn hue_accumulator_wraps() {
        let mut acc = 250.0;
        assert_eq!(advance_hue(&mut acc, 10.0), 4);
    }
}
