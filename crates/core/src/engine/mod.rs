//! The cycle loop: capture → analyse → decide → render → transmit.

use std::{sync::mpsc::Receiver, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    analysis::{AudioFeatures, FeatureExtractor},
    audio::{SampleSource, SignalCapture},
    config::AppConfig,
    controller::{HybridController, SwapReason},
    display::StatusSnapshot,
    effects,
    render::{AnimationCatalog, Rgb},
    timeline::PlaybackClock,
    Result,
};

/// Operator input applied between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetAutoSwitch(bool),
    Advance,
    ResetToFirst,
}

/// Destination of finished LED frames.
pub trait FrameSink {
    fn transmit(&mut self, frame: &[Rgb]) -> Result<()>;
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    fn transmit(&mut self, frame: &[Rgb]) -> Result<()> {
        (**self).transmit(frame)
    }
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn transmit(&mut self, _frame: &[Rgb]) -> Result<()> {
        Ok(())
    }
}

/// Keeps the most recent frame in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub frames: u64,
    pub last: Vec<Rgb>,
}

impl FrameSink for MemorySink {
    fn transmit(&mut self, frame: &[Rgb]) -> Result<()> {
        self.frames += 1;
        self.last.clear();
        self.last.extend_from_slice(frame);
        Ok(())
    }
}

/// What happened during one cycle. The full feature snapshot stays in the
/// booth, see [`Booth::features`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub timestamp: Duration,
    pub beat_detected: bool,
    pub switched: Option<SwapReason>,
    pub captured: usize,
}

/// Totals for a finished [`Booth::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub switches: u64,
    pub shortfalls: u64,
    pub failed_transmits: u64,
}

/// One booth: an audio source, the analysis chain, the controller and the
/// LED frame they share.
pub struct Booth<S> {
    capture: SignalCapture<S>,
    extractor: FeatureExtractor,
    controller: HybridController,
    frame: Vec<Rgb>,
    output: Vec<Rgb>,
    clock: PlaybackClock,
    block_duration: Duration,
    brightness: u8,
    cycles: u64,
    failed_transmits: u64,
    features: AudioFeatures,
}

impl<S: SampleSource> Booth<S> {
    /// Validates `config` and builds the configured animation catalog.
    pub fn new(config: &AppConfig, source: S) -> Result<Self> {
        config.validate()?;
        let catalog = effects::build_catalog(&config.catalog, config.switching.seed)?;
        Ok(Self::with_catalog(config, source, catalog))
    }

    /// Uses a caller-supplied catalog instead of the configured list.
    pub fn with_catalog(config: &AppConfig, source: S, catalog: AnimationCatalog) -> Self {
        info!(
            sample_rate = config.audio.sample_rate,
            block_size = config.audio.block_size,
            leds = config.leds.count,
            animations = catalog.entry_count(),
            "booth ready"
        );
        Self {
            capture: SignalCapture::new(source, config.audio.block_size),
            extractor: FeatureExtractor::new(&config.audio, &config.analysis),
            controller: HybridController::new(catalog, &config.switching),
            frame: vec![Rgb::default(); config.leds.count],
            output: Vec::with_capacity(config.leds.count),
            clock: PlaybackClock::start(),
            block_duration: config.audio.block_duration(),
            brightness: config.leds.brightness,
            cycles: 0,
            failed_transmits: 0,
            features: AudioFeatures::default(),
        }
    }

    /// Runs one capture/analyse/decide/render step.
    pub fn cycle(&mut self) -> CycleReport {
        let captured = self.capture.capture_audio();
        self.clock.advance(self.block_duration);

        self.extractor.analyze_into(
            self.capture.samples(),
            self.capture.waveform(),
            self.clock.now(),
            &mut self.features,
        );
        let switched = self.controller.update(&mut self.frame, &self.features);
        self.cycles += 1;

        CycleReport {
            timestamp: self.features.timestamp,
            beat_detected: self.features.beat_detected,
            switched,
            captured,
        }
    }

    /// Sends the current frame, scaled by the configured brightness. A failed
    /// transmission is logged and otherwise ignored.
    pub fn transmit<K: FrameSink>(&mut self, sink: &mut K) -> bool {
        self.output.clear();
        self.output
            .extend(smart_leds::brightness(self.frame.iter().copied(), self.brightness));

        match sink.transmit(&self.output) {
            Ok(()) => true,
            Err(err) => {
                self.failed_transmits += 1;
                warn!(%err, cycle = self.cycles, "frame transmission failed");
                false
            }
        }
    }

    pub fn apply(&mut self, command: ControlCommand) {
        let now = self.clock.now();
        debug!(?command, "control command");
        match command {
            ControlCommand::SetAutoSwitch(enabled) => self.controller.toggle_auto_switch(enabled),
            ControlCommand::Advance => self.controller.advance_manually(now),
            ControlCommand::ResetToFirst => self.controller.reset_to_first(now),
        }
    }

    /// Cycles until the source is exhausted or `max_cycles` is reached.
    ///
    /// Pending commands are drained before every cycle. `observer` sees each
    /// cycle after its frame has been transmitted.
    pub fn run<K, F>(
        &mut self,
        sink: &mut K,
        commands: Option<&Receiver<ControlCommand>>,
        max_cycles: Option<u64>,
        mut observer: F,
    ) -> RunSummary
    where
        K: FrameSink,
        F: FnMut(&Self, &CycleReport),
    {
        let mut summary = RunSummary::default();

        while max_cycles.map_or(true, |limit| summary.cycles < limit) {
            if self.capture.is_exhausted() {
                info!(cycles = summary.cycles, "audio source exhausted");
                break;
            }
            if let Some(rx) = commands {
                while let Ok(command) = rx.try_recv() {
                    self.apply(command);
                }
            }

            let report = self.cycle();
            if report.switched.is_some() {
                summary.switches += 1;
            }
            if !self.transmit(sink) {
                summary.failed_transmits += 1;
            }
            summary.cycles += 1;
            observer(self, &report);
        }

        summary.shortfalls = self.capture.shortfalls();
        summary
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.controller, &self.features)
    }

    /// Features of the most recent cycle.
    pub fn features(&self) -> &AudioFeatures {
        &self.features
    }

    pub fn frame(&self) -> &[Rgb] {
        &self.frame
    }

    pub fn controller(&self) -> &HybridController {
        &self.controller
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn failed_transmits(&self) -> u64 {
        self.failed_transmits
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}
