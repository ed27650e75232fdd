use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{controller::HISTORY_LEN, effects, BoothError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub switching: SwitchConfig,
    pub catalog: CatalogConfig,
    pub leds: LedConfig,
}

impl AppConfig {
    /// Loads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency. Any error here is a startup failure.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analysis.validate(&self.audio)?;
        self.switching.validate()?;
        self.catalog.validate()?;
        self.leds.validate()
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 512,
        }
    }
}

impl AudioConfig {
    /// Wall time covered by one captured block.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / f64::from(self.sample_rate.max(1)))
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(BoothError::config("audio.sample_rate must be positive"));
        }
        if self.block_size == 0 {
            return Err(BoothError::config("audio.block_size must be positive"));
        }
        Ok(())
    }
}

/// Per-band divisors mapping averaged FFT magnitudes onto `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BandDivisors {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl Default for BandDivisors {
    fn default() -> Self {
        Self {
            bass: 64.0,
            mid: 12.0,
            treble: 2.0,
        }
    }
}

/// Tuning of the feature extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Weight of the previous volume in the exponential smoother.
    pub volume_smoothing: f32,
    /// Minimum per-cycle rise of the smoothed volume that counts as an onset.
    pub beat_rise_threshold: f32,
    pub beat_refractory_ms: u64,
    /// Inter-beat intervals outside `(min, max)` leave the tempo untouched.
    pub min_beat_interval_ms: u64,
    pub max_beat_interval_ms: u64,
    pub loudness_smoothing: f32,
    pub decibel_smoothing: f32,
    pub decibel_floor: f32,
    pub bass_cutoff_hz: f32,
    pub mid_cutoff_hz: f32,
    pub band_divisors: BandDivisors,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            volume_smoothing: 0.8,
            beat_rise_threshold: 0.05,
            beat_refractory_ms: 250,
            min_beat_interval_ms: 250,
            max_beat_interval_ms: 2000,
            loudness_smoothing: 0.9,
            decibel_smoothing: 0.9,
            decibel_floor: -120.0,
            bass_cutoff_hz: 200.0,
            mid_cutoff_hz: 2000.0,
            band_divisors: BandDivisors::default(),
        }
    }
}

impl AnalysisConfig {
    fn validate(&self, audio: &AudioConfig) -> Result<()> {
        for (name, value) in [
            ("volume_smoothing", self.volume_smoothing),
            ("loudness_smoothing", self.loudness_smoothing),
            ("decibel_smoothing", self.decibel_smoothing),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(BoothError::config(format!(
                    "analysis.{name} must lie in [0, 1), got {value}"
                )));
            }
        }
        if self.beat_rise_threshold <= 0.0 {
            return Err(BoothError::config(
                "analysis.beat_rise_threshold must be positive",
            ));
        }
        if self.min_beat_interval_ms >= self.max_beat_interval_ms {
            return Err(BoothError::config(
                "analysis.min_beat_interval_ms must be below max_beat_interval_ms",
            ));
        }
        let nyquist = audio.sample_rate as f32 / 2.0;
        if !(0.0 < self.bass_cutoff_hz
            && self.bass_cutoff_hz < self.mid_cutoff_hz
            && self.mid_cutoff_hz < nyquist)
        {
            return Err(BoothError::config(format!(
                "band cutoffs must satisfy 0 < bass ({}) < mid ({}) < nyquist ({nyquist})",
                self.bass_cutoff_hz, self.mid_cutoff_hz
            )));
        }
        let d = self.band_divisors;
        if d.bass <= 0.0 || d.mid <= 0.0 || d.treble <= 0.0 {
            return Err(BoothError::config("band divisors must be positive"));
        }
        Ok(())
    }
}

/// Tuning of the animation switch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Start in automatic mode.
    pub auto_switch: bool,
    /// Weight of the newest volume in the controller's envelope filter.
    /// `1.0` pushes the extractor's volume unchanged.
    pub envelope_weight: f32,
    /// Distance in history slots between the two samples compared by the
    /// trend detector.
    pub trend_lag: usize,
    pub build_up_threshold: f32,
    /// Magnitude of the negative trend that counts as a drop.
    pub drop_threshold: f32,
    /// Switching stays blocked while a drop is seen within this window after
    /// the last switch.
    pub drop_hold_ms: u64,
    pub min_switch_ms: u64,
    /// Number of beats an animation plays at least, at the measured tempo.
    pub beats_per_switch: f32,
    pub fallback_bpm: f32,
    /// Consecutive beats required before an automatic switch.
    pub debounce_beats: u32,
    /// A beat streak survives beat-less cycles for this long. `0` is the
    /// strict behaviour: the streak resets on every cycle without an onset.
    /// The refractory window makes onsets on consecutive cycles impossible,
    /// so the strict setting only suits cycles longer than that window.
    pub beat_gap_tolerance_ms: u64,
    /// Seed for the random picker. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            auto_switch: true,
            envelope_weight: 0.2,
            trend_lag: 4,
            build_up_threshold: 0.1,
            drop_threshold: 0.15,
            drop_hold_ms: 10_000,
            min_switch_ms: 6_000,
            beats_per_switch: 8.0,
            fallback_bpm: 120.0,
            debounce_beats: 3,
            beat_gap_tolerance_ms: 2_000,
            seed: None,
        }
    }
}

impl SwitchConfig {
    fn validate(&self) -> Result<()> {
        if !(self.envelope_weight > 0.0 && self.envelope_weight <= 1.0) {
            return Err(BoothError::config(
                "switching.envelope_weight must lie in (0, 1]",
            ));
        }
        if self.trend_lag == 0 || self.trend_lag >= HISTORY_LEN {
            return Err(BoothError::config(format!(
                "switching.trend_lag must lie in 1..{HISTORY_LEN}"
            )));
        }
        if self.build_up_threshold <= 0.0 || self.drop_threshold <= 0.0 {
            return Err(BoothError::config(
                "build-up and drop thresholds must be positive",
            ));
        }
        if self.fallback_bpm <= 0.0 || self.beats_per_switch < 0.0 {
            return Err(BoothError::config(
                "fallback_bpm must be positive and beats_per_switch non-negative",
            ));
        }
        Ok(())
    }
}

/// Which animations the catalog is populated with at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub capacity: usize,
    pub animations: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            capacity: effects::BUILTIN_NAMES.len(),
            animations: effects::BUILTIN_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl CatalogConfig {
    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(BoothError::config("catalog.capacity must be positive"));
        }
        if self.animations.is_empty() {
            return Err(BoothError::config("catalog.animations must not be empty"));
        }
        if self.animations.len() > self.capacity {
            return Err(BoothError::config(format!(
                "catalog lists {} animations but its capacity is {}",
                self.animations.len(),
                self.capacity
            )));
        }
        if let Some(unknown) = self
            .animations
            .iter()
            .find(|name| !effects::BUILTIN_NAMES.contains(&name.as_str()))
        {
            return Err(BoothError::config(format!("unknown animation `{unknown}`")));
        }
        Ok(())
    }
}

/// LED strip geometry and output scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub count: usize,
    pub brightness: u8,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            count: 60,
            brightness: 255,
        }
    }
}

impl LedConfig {
    fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(BoothError::config("leds.count must be positive"));
        }
        Ok(())
    }
}
