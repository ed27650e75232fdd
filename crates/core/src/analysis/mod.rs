use std::{f32::consts::PI, fmt, sync::Arc, time::Duration};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::{AnalysisConfig, AudioConfig, BandDivisors},
    timeline::millis_between,
    BoothError, Result,
};

/// Perceptual features of one captured block.
///
/// A fresh snapshot is produced every cycle and handed to consumers by
/// reference; nothing in it is carried over to the next cycle except through
/// the extractor's own smoothing state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Stream time at the end of the analysed block.
    pub timestamp: Duration,
    /// Smoothed RMS envelope, `[0, 1]`.
    pub volume: f32,
    /// Volume mapped onto a smoothed 0–100 scale for display.
    pub loudness: f32,
    /// Smoothed `20·log10(volume)`, floored for silence.
    pub decibels: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    /// True only for the cycle in which an onset was recognised.
    pub beat_detected: bool,
    /// Last plausible tempo estimate, `0.0` until one has been measured.
    pub bpm: f32,
    /// Magnitude per FFT bin, ascending frequency, `block_size / 2` entries.
    pub spectrum: Vec<f32>,
    /// Raw PCM of the block, for display.
    pub waveform: Vec<i16>,
}

/// Turns captured blocks into [`AudioFeatures`].
///
/// All smoothing state lives in the struct, so independent extractors never
/// influence each other.
pub struct FeatureExtractor {
    config: AnalysisConfig,
    sample_rate: u32,
    block_size: usize,
    bass_limit: usize,
    mid_limit: usize,
    volume: f32,
    loudness: f32,
    decibels: f32,
    bpm: f32,
    last_beat: Option<Duration>,
    fft: Option<FftResources>,
}

impl FeatureExtractor {
    /// Creates an extractor. If the transform cannot be planned the extractor
    /// still works, reporting silent spectral fields.
    pub fn new(audio: &AudioConfig, config: &AnalysisConfig) -> Self {
        let block_size = audio.block_size;
        let bins = block_size / 2;
        let bin_of =
            |hz: f32| ((hz * block_size as f32 / audio.sample_rate as f32) as usize).min(bins);

        let fft = match FftResources::plan(block_size) {
            Ok(fft) => Some(fft),
            Err(err) => {
                warn!(%err, "spectral analysis disabled");
                None
            }
        };

        Self {
            config: config.clone(),
            sample_rate: audio.sample_rate,
            block_size,
            bass_limit: bin_of(config.bass_cutoff_hz),
            mid_limit: bin_of(config.mid_cutoff_hz),
            volume: 0.0,
            loudness: 0.0,
            decibels: config.decibel_floor,
            bpm: 0.0,
            last_beat: None,
            fft,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether band energies and the spectrum are being computed.
    pub fn spectrum_available(&self) -> bool {
        self.fft.is_some()
    }

    /// Last smoothed volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Last plausible tempo, `0.0` if none has been measured yet.
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Clears the smoothing and tempo state while preserving configuration.
    pub fn reset(&mut self) {
        self.volume = 0.0;
        self.loudness = 0.0;
        self.decibels = self.config.decibel_floor;
        self.bpm = 0.0;
        self.last_beat = None;
    }

    /// Analyses one block captured at stream time `now`.
    pub fn analyze_audio(
        &mut self,
        samples: &[f32],
        waveform: &[i16],
        now: Duration,
    ) -> AudioFeatures {
        let mut features = AudioFeatures::default();
        self.analyze_into(samples, waveform, now, &mut features);
        features
    }

    /// Same as [`analyze_audio`](Self::analyze_audio) but overwrites
    /// `features` in place, reusing its spectrum and waveform buffers.
    pub fn analyze_into(
        &mut self,
        samples: &[f32],
        waveform: &[i16],
        now: Duration,
        features: &mut AudioFeatures,
    ) {
        let spectrum_ready = self
            .fft
            .as_ref()
            .is_some_and(|fft| fft.size == samples.len());
        if !spectrum_ready && self.fft.is_some() {
            debug!(
                expected = self.block_size,
                got = samples.len(),
                "block size mismatch, skipping spectrum"
            );
        }

        let rms = match self.fft.as_mut().filter(|_| spectrum_ready) {
            Some(fft) => {
                let mut sum_squares = 0.0;
                let weighted = fft.input.iter_mut().zip(samples).zip(&fft.window);
                for ((slot, sample), weight) in weighted {
                    let x = clamp_sample(*sample);
                    sum_squares += x * x;
                    *slot = x * weight;
                }
                root_mean(sum_squares, samples.len())
            }
            None => {
                let sum_squares: f32 = samples.iter().map(|s| clamp_sample(*s).powi(2)).sum();
                root_mean(sum_squares, samples.len())
            }
        };

        let previous = self.volume;
        let alpha = self.config.volume_smoothing;
        self.volume = (alpha * self.volume + (1.0 - alpha) * rms).clamp(0.0, 1.0);

        let beat_detected = self.detect_beat(self.volume - previous, now);
        self.update_loudness();

        features.timestamp = now;
        features.volume = self.volume;
        features.loudness = self.loudness.clamp(0.0, 100.0);
        features.decibels = self.decibels;
        features.beat_detected = beat_detected;
        features.bpm = self.bpm;
        features.bass = 0.0;
        features.mid = 0.0;
        features.treble = 0.0;
        features.spectrum.clear();
        features.spectrum.resize(self.block_size / 2, 0.0);
        features.waveform.clear();
        features.waveform.extend_from_slice(waveform);

        if let Some(fft) = self.fft.as_mut().filter(|_| spectrum_ready) {
            match fft.magnitudes(&mut features.spectrum) {
                Ok(()) => {
                    let (bass, mid, treble) = band_energies(
                        &features.spectrum,
                        self.bass_limit,
                        self.mid_limit,
                        self.config.band_divisors,
                    );
                    features.bass = bass;
                    features.mid = mid;
                    features.treble = treble;
                }
                Err(err) => {
                    warn!(%err, "spectral transform failed for this block");
                    features.spectrum.fill(0.0);
                }
            }
        }
    }

    fn detect_beat(&mut self, rise: f32, now: Duration) -> bool {
        if rise <= self.config.beat_rise_threshold {
            return false;
        }

        let since_last = self.last_beat.map(|last| millis_between(last, now));
        if since_last.is_some_and(|ms| ms <= self.config.beat_refractory_ms as f32) {
            return false;
        }

        if let Some(interval) = since_last {
            let min = self.config.min_beat_interval_ms as f32;
            let max = self.config.max_beat_interval_ms as f32;
            if interval > min && interval < max {
                self.bpm = 60_000.0 / interval;
            }
        }
        self.last_beat = Some(now);
        debug!(bpm = self.bpm, volume = self.volume, "beat onset");
        true
    }

    fn update_loudness(&mut self) {
        let s = self.config.loudness_smoothing;
        self.loudness = s * self.loudness + (1.0 - s) * self.volume * 100.0;

        let floor = self.config.decibel_floor;
        let raw = if self.volume > 0.0 {
            (20.0 * self.volume.log10()).max(floor)
        } else {
            floor
        };
        let s = self.config.decibel_smoothing;
        self.decibels = s * self.decibels + (1.0 - s) * raw;
    }
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .field("volume", &self.volume)
            .field("bpm", &self.bpm)
            .field("last_beat", &self.last_beat)
            .field("spectrum_available", &self.fft.is_some())
            .finish()
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl FftResources {
    fn plan(size: usize) -> Result<Self> {
        if size < 2 {
            return Err(BoothError::Transform(format!(
                "block of {size} samples is too small for a spectrum"
            )));
        }

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        Ok(Self {
            size,
            window: (0..size).map(|i| hamming_value(i, size)).collect(),
            input: plan.make_input_vec(),
            output: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        })
    }

    /// Transforms the windowed input and writes the first `size / 2` bin
    /// magnitudes into `spectrum`.
    fn magnitudes(&mut self, spectrum: &mut [f32]) -> Result<()> {
        self.plan
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|err| BoothError::Transform(err.to_string()))?;

        for (dst, bin) in spectrum.iter_mut().zip(&self.output) {
            *dst = bin.norm();
        }
        Ok(())
    }
}

fn clamp_sample(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    }
}

fn root_mean(sum_squares: f32, len: usize) -> f32 {
    if len == 0 {
        0.0
    } else {
        (sum_squares / len as f32).sqrt()
    }
}

fn hamming_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.54 - 0.46 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

/// Averages the bins below `bass_limit`, between the limits, and above
/// `mid_limit`, normalised and clamped to `[0, 1]`.
fn band_energies(
    spectrum: &[f32],
    bass_limit: usize,
    mid_limit: usize,
    divisors: BandDivisors,
) -> (f32, f32, f32) {
    let bass_limit = bass_limit.min(spectrum.len());
    let mid_limit = mid_limit.clamp(bass_limit, spectrum.len());

    let average = |bins: &[f32], divisor: f32| {
        if bins.is_empty() {
            0.0
        } else {
            let mean = bins.iter().sum::<f32>() / bins.len() as f32;
            (mean / divisor).clamp(0.0, 1.0)
        }
    };

    (
        average(&spectrum[..bass_limit], divisors.bass),
        average(&spectrum[bass_limit..mid_limit], divisors.mid),
        average(&spectrum[mid_limit..], divisors.treble),
    )
}
