//! Autonomous animation switching.
//!
//! [`HybridController`] watches a short history of the volume envelope and the
//! beat stream and decides, once per cycle, whether the active animation
//! should be replaced. The guards are evaluated in a fixed order and the
//! first one that fires wins:
//!
//! 1. manual mode never switches on its own;
//! 2. a rising build-up is never cut;
//! 3. nothing is cut shortly after a drop;
//! 4. an animation plays for a minimum duration tied to the tempo;
//! 5. the beat has to be stable for a few onsets.
//!
//! Reordering the guards changes which of them resets the beat streak and
//! which reason is reported, so the order is part of the behaviour.

mod history;

use std::{fmt, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::SwitchConfig,
    render::{AnimationCatalog, Rgb},
    AudioFeatures,
};

pub use history::{VolumeHistory, HISTORY_LEN};

/// Why the controller kept the current animation on the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepReason {
    Init,
    AutoSwitchDisabled,
    BuildUp,
    RecentDrop,
    MinimumDuration,
    BeatNotStable,
    SingleAnimation,
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::AutoSwitchDisabled => "auto switching disabled",
            Self::BuildUp => "build up active",
            Self::RecentDrop => "drop shortly after switch",
            Self::MinimumDuration => "not enough time passed",
            Self::BeatNotStable => "beat not stable",
            Self::SingleAnimation => "nothing to switch to",
        })
    }
}

/// Why the active animation last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapReason {
    Init,
    StableBeat,
    Manual,
    Reset,
}

impl fmt::Display for SwapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::StableBeat => "stable beat + time passed",
            Self::Manual => "manual advance",
            Self::Reset => "reset to first",
        })
    }
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep(KeepReason),
    Switch(SwapReason),
}

/// Owns the animation catalog and the switching state.
pub struct HybridController {
    config: SwitchConfig,
    catalog: AnimationCatalog,
    current_index: usize,
    history: VolumeHistory,
    envelope: f32,
    build_up: bool,
    drop: bool,
    debounce_counter: u32,
    last_beat: Option<Duration>,
    last_switch: Duration,
    auto_switch_enabled: bool,
    keep_reason: KeepReason,
    swap_reason: SwapReason,
    switch_count: u64,
    rng: StdRng,
}

impl HybridController {
    pub fn new(catalog: AnimationCatalog, config: &SwitchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut controller = Self {
            config: config.clone(),
            catalog,
            current_index: 0,
            history: VolumeHistory::default(),
            envelope: 0.0,
            build_up: false,
            drop: false,
            debounce_counter: 0,
            last_beat: None,
            last_switch: Duration::ZERO,
            auto_switch_enabled: config.auto_switch,
            keep_reason: KeepReason::Init,
            swap_reason: SwapReason::Init,
            switch_count: 0,
            rng,
        };
        controller.catalog.activate(0);
        info!(
            animations = controller.catalog.entry_count(),
            auto = controller.auto_switch_enabled,
            "hybrid controller initialised"
        );
        controller
    }

    /// Runs one cycle: records the volume, applies the switch policy and
    /// renders the active animation into `frame`. Returns the reason if the
    /// animation changed.
    pub fn update(&mut self, frame: &mut [Rgb], features: &AudioFeatures) -> Option<SwapReason> {
        self.record_volume(features.volume);

        let switched = match self.should_switch(features) {
            Decision::Switch(reason) => {
                if self.switch_randomly(features.timestamp) {
                    Some(reason)
                } else {
                    self.keep_reason = KeepReason::SingleAnimation;
                    None
                }
            }
            Decision::Keep(reason) => {
                debug!(
                    index = self.current_index,
                    avg_volume = self.history.average(),
                    build_up = self.build_up,
                    drop = self.drop,
                    debounce = self.debounce_counter,
                    %reason,
                    "keeping animation"
                );
                None
            }
        };

        self.catalog.render(self.current_index, frame, features);
        switched
    }

    /// Evaluates the switch policy for the current cycle.
    ///
    /// Expects the volume history to already contain this cycle's sample.
    /// Updates the beat streak and the keep reason as a side effect.
    pub fn should_switch(&mut self, features: &AudioFeatures) -> Decision {
        if !self.auto_switch_enabled {
            return self.keep(KeepReason::AutoSwitchDisabled);
        }

        let now = features.timestamp;
        self.track_beat(features.beat_detected, now);
        let elapsed = now.saturating_sub(self.last_switch);

        if self.build_up {
            self.debounce_counter = 0;
            return self.keep(KeepReason::BuildUp);
        }

        if self.drop && elapsed < Duration::from_millis(self.config.drop_hold_ms) {
            self.debounce_counter = 0;
            return self.keep(KeepReason::RecentDrop);
        }

        if elapsed < self.required_duration(features.bpm) {
            return self.keep(KeepReason::MinimumDuration);
        }

        if self.debounce_counter < self.config.debounce_beats {
            return self.keep(KeepReason::BeatNotStable);
        }

        Decision::Switch(SwapReason::StableBeat)
    }

    /// Minimum play time of an animation: the configured floor or
    /// `beats_per_switch` beats at `bpm`, whichever is longer. A non-positive
    /// `bpm` means the tempo is unknown and the fallback tempo is used.
    pub fn required_duration(&self, bpm: f32) -> Duration {
        let bpm = if bpm > 0.0 {
            bpm
        } else {
            self.config.fallback_bpm
        };
        let tempo_ms = 60_000.0 / bpm * self.config.beats_per_switch;
        let floor = Duration::from_millis(self.config.min_switch_ms);
        floor.max(Duration::from_secs_f32(tempo_ms.max(0.0) / 1000.0))
    }

    /// Moves to the next catalog entry in order. Works in both modes.
    pub fn advance_manually(&mut self, now: Duration) {
        let count = self.catalog.entry_count();
        if count == 0 {
            return;
        }
        self.set_current((self.current_index + 1) % count, now, SwapReason::Manual);
    }

    /// Returns to the first catalog entry.
    pub fn reset_to_first(&mut self, now: Duration) {
        self.set_current(0, now, SwapReason::Reset);
    }

    pub fn toggle_auto_switch(&mut self, enabled: bool) {
        if self.auto_switch_enabled != enabled {
            info!(enabled, "auto switching toggled");
        }
        self.auto_switch_enabled = enabled;
    }

    pub fn enable_auto_switching(&mut self) {
        self.toggle_auto_switch(true);
    }

    pub fn disable_auto_switching(&mut self) {
        self.toggle_auto_switch(false);
    }

    pub fn is_auto_switch_enabled(&self) -> bool {
        self.auto_switch_enabled
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_name(&self) -> Option<&str> {
        self.catalog.name_of(self.current_index)
    }

    pub fn entry_count(&self) -> usize {
        self.catalog.entry_count()
    }

    pub fn catalog(&self) -> &AnimationCatalog {
        &self.catalog
    }

    pub fn average_volume(&self) -> f32 {
        self.history.average()
    }

    pub fn is_build_up(&self) -> bool {
        self.build_up
    }

    pub fn is_drop(&self) -> bool {
        self.drop
    }

    pub fn debounce_counter(&self) -> u32 {
        self.debounce_counter
    }

    pub fn last_switch(&self) -> Duration {
        self.last_switch
    }

    pub fn keep_reason(&self) -> KeepReason {
        self.keep_reason
    }

    pub fn swap_reason(&self) -> SwapReason {
        self.swap_reason
    }

    /// Number of animation changes since startup, any cause.
    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    fn record_volume(&mut self, volume: f32) {
        let weight = self.config.envelope_weight;
        self.envelope = weight * volume + (1.0 - weight) * self.envelope;
        self.history.push(self.envelope);

        let trend = self.history.trend(self.config.trend_lag);
        self.build_up = trend > self.config.build_up_threshold;
        self.drop = trend < -self.config.drop_threshold;
    }

    fn track_beat(&mut self, beat_detected: bool, now: Duration) {
        if beat_detected {
            self.debounce_counter += 1;
            self.last_beat = Some(now);
            return;
        }

        let tolerance = Duration::from_millis(self.config.beat_gap_tolerance_ms);
        let streak_broken = self
            .last_beat
            .map_or(true, |last| now.saturating_sub(last) > tolerance);
        if streak_broken {
            self.debounce_counter = 0;
        }
    }

    fn keep(&mut self, reason: KeepReason) -> Decision {
        self.keep_reason = reason;
        Decision::Keep(reason)
    }

    fn switch_randomly(&mut self, now: Duration) -> bool {
        let count = self.catalog.entry_count();
        if count <= 1 {
            return false;
        }
        let offset = self.rng.random_range(1..count);
        self.set_current((self.current_index + offset) % count, now, SwapReason::StableBeat);
        true
    }

    fn set_current(&mut self, index: usize, now: Duration, reason: SwapReason) {
        self.current_index = index;
        self.last_switch = now;
        self.debounce_counter = 0;
        self.swap_reason = reason;
        self.switch_count += 1;
        self.catalog.activate(index);
        info!(
            index,
            name = self.catalog.name_of(index).unwrap_or("none"),
            %reason,
            "switched animation"
        );
    }
}

impl fmt::Debug for HybridController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridController")
            .field("catalog", &self.catalog)
            .field("current_index", &self.current_index)
            .field("auto_switch_enabled", &self.auto_switch_enabled)
            .field("debounce_counter", &self.debounce_counter)
            .field("last_switch", &self.last_switch)
            .field("keep_reason", &self.keep_reason)
            .field("swap_reason", &self.swap_reason)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    fn build_controller(entries: usize, config: SwitchConfig) -> HybridController {
        let mut catalog = AnimationCatalog::new(entries.max(1));
        for i in 0..entries {
            let shade = i as u8;
            catalog.add_entry(
                move |frame: &mut [Rgb], _: &AudioFeatures| frame.fill(Rgb::new(shade, 0, 0)),
                format!("anim-{i}"),
            );
        }
        HybridController::new(catalog, &config)
    }

    fn raw_config() -> SwitchConfig {
        SwitchConfig {
            envelope_weight: 1.0,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn features(ms: u64, volume: f32, beat: bool, bpm: f32) -> AudioFeatures {
        AudioFeatures {
            timestamp: Duration::from_millis(ms),
            volume,
            beat_detected: beat,
            bpm,
            ..Default::default()
        }
    }

    fn step(controller: &mut HybridController, f: &AudioFeatures) -> Option<SwapReason> {
        let mut frame = [Rgb::default(); 4];
        controller.update(&mut frame, f)
    }

    #[test]
    fn manual_mode_never_switches_but_advances_in_order() {
        let mut controller = build_controller(3, raw_config());
        controller.toggle_auto_switch(false);

        for i in 0..400 {
            let f = features(i * 50, 0.5, true, 128.0);
            assert_eq!(controller.should_switch(&f), Decision::Keep(KeepReason::AutoSwitchDisabled));
            assert_eq!(step(&mut controller, &f), None);
        }
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.keep_reason(), KeepReason::AutoSwitchDisabled);

        let now = Duration::from_secs(30);
        let visited: Vec<usize> = (0..4)
            .map(|_| {
                controller.advance_manually(now);
                controller.current_index()
            })
            .collect();
        assert_eq!(visited, vec![1, 2, 0, 1]);
        assert_eq!(controller.swap_reason(), SwapReason::Manual);
        assert_eq!(controller.last_switch(), now);
        assert_eq!(controller.debounce_counter(), 0);
    }

    #[test]
    fn build_up_dominates_stable_beats() {
        let mut controller = build_controller(2, raw_config());

        // Steady volume with a beat every 250 ms builds a beat streak.
        for ms in (0..5_800).step_by(50) {
            step(&mut controller, &features(ms, 0.3, ms % 250 == 0, 240.0));
        }
        assert!(controller.debounce_counter() >= 3);

        // Rising volume past the minimum duration, beats on every cycle.
        let mut volume = 0.3;
        for ms in (5_800..=6_500).step_by(50) {
            volume += 0.04;
            let switched = step(&mut controller, &features(ms, volume, true, 240.0));
            if ms >= 5_950 {
                assert!(controller.is_build_up());
                assert_eq!(switched, None);
                assert_eq!(controller.keep_reason(), KeepReason::BuildUp);
                assert_eq!(controller.debounce_counter(), 0);
            }
        }
        assert_eq!(controller.switch_count(), 0);

        // Once the level plateaus the trend flattens and the switch goes through.
        let mut switched = None;
        for ms in (6_550..7_500).step_by(50) {
            switched = switched.or(step(&mut controller, &features(ms, volume, true, 240.0)));
        }
        assert_eq!(switched, Some(SwapReason::StableBeat));
        assert_eq!(controller.current_index(), 1);
    }

    fn drop_scenario(offset_ms: u64) -> HybridController {
        let config = SwitchConfig {
            min_switch_ms: 1_000,
            beats_per_switch: 0.0,
            ..raw_config()
        };
        let mut controller = build_controller(2, config);

        for ms in (0..offset_ms + 4_600).step_by(100) {
            step(&mut controller, &features(ms, 0.8, false, 0.0));
        }
        for (i, volume) in [0.7, 0.6, 0.5, 0.4, 0.3].into_iter().enumerate() {
            let ms = offset_ms + 4_600 + i as u64 * 100;
            if step(&mut controller, &features(ms, volume, true, 0.0)).is_some() {
                break;
            }
        }
        controller
    }

    #[test]
    fn drop_blocks_switching_shortly_after_a_switch() {
        let controller = drop_scenario(0);

        assert!(controller.is_drop());
        assert_eq!(controller.switch_count(), 0);
        assert_eq!(controller.keep_reason(), KeepReason::RecentDrop);
    }

    #[test]
    fn drop_outside_hold_window_does_not_block() {
        let controller = drop_scenario(10_000);

        assert_eq!(controller.switch_count(), 1);
        assert_eq!(controller.swap_reason(), SwapReason::StableBeat);
    }

    #[test]
    fn waits_minimum_duration_at_120_bpm() {
        let mut controller = build_controller(2, raw_config());
        assert_eq!(controller.required_duration(120.0), Duration::from_millis(6_000));
        assert_eq!(controller.required_duration(0.0), Duration::from_millis(6_000));
        assert_eq!(controller.required_duration(30.0), Duration::from_millis(16_000));

        let mut first_switch = None;
        for ms in (100..=7_000).step_by(100) {
            if step(&mut controller, &features(ms, 0.5, true, 120.0)).is_some() {
                first_switch.get_or_insert(ms);
            }
            if (500..6_000).contains(&ms) {
                assert_eq!(controller.keep_reason(), KeepReason::MinimumDuration);
            }
        }
        assert_eq!(first_switch, Some(6_000));
    }

    #[test]
    fn strict_debounce_needs_consecutive_beat_cycles() {
        let config = SwitchConfig {
            beat_gap_tolerance_ms: 0,
            min_switch_ms: 0,
            beats_per_switch: 0.0,
            ..raw_config()
        };
        let mut controller = build_controller(2, config);

        for i in 1..200u64 {
            step(&mut controller, &features(i * 100, 0.5, i % 2 == 0, 120.0));
        }
        assert_eq!(controller.switch_count(), 0);
        assert_eq!(controller.keep_reason(), KeepReason::BeatNotStable);

        for i in 200..203u64 {
            step(&mut controller, &features(i * 100, 0.5, true, 120.0));
        }
        assert_eq!(controller.switch_count(), 1);
    }

    #[test]
    fn streak_survives_gaps_within_tolerance() {
        let mut controller = build_controller(2, raw_config());

        for ms in (100..3_000).step_by(10) {
            step(&mut controller, &features(ms, 0.5, ms % 500 == 0, 120.0));
        }
        assert_eq!(controller.debounce_counter(), 5);

        step(&mut controller, &features(5_600, 0.5, false, 120.0));
        assert_eq!(controller.debounce_counter(), 0);
    }

    #[test]
    fn random_switch_always_changes_index() {
        let config = SwitchConfig {
            min_switch_ms: 0,
            beats_per_switch: 0.0,
            debounce_beats: 0,
            ..raw_config()
        };
        let mut controller = build_controller(5, config);

        let mut previous = controller.current_index();
        for i in 1..=60u64 {
            let switched = step(&mut controller, &features(i * 10, 0.0, false, 0.0));
            assert_eq!(switched, Some(SwapReason::StableBeat));
            assert_ne!(controller.current_index(), previous);
            assert!(controller.current_index() < 5);
            previous = controller.current_index();
        }
    }

    #[test]
    fn single_entry_catalog_never_switches() {
        let config = SwitchConfig {
            min_switch_ms: 0,
            beats_per_switch: 0.0,
            debounce_beats: 0,
            ..raw_config()
        };
        let mut controller = build_controller(1, config);

        assert_eq!(step(&mut controller, &features(10, 0.0, true, 0.0)), None);
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.keep_reason(), KeepReason::SingleAnimation);
    }

    #[test]
    fn renders_every_cycle() {
        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        let mut catalog = AnimationCatalog::new(1);
        catalog.add_entry(
            move |_: &mut [Rgb], _: &AudioFeatures| counter.set(counter.get() + 1),
            "count",
        );
        let mut controller = HybridController::new(catalog, &raw_config());

        for i in 0..25 {
            step(&mut controller, &features(i * 10, 0.2, false, 0.0));
        }
        assert_eq!(renders.get(), 25);
    }

    #[test]
    fn empty_catalog_is_harmless() {
        let mut controller = build_controller(0, raw_config());
        let mut frame = [Rgb::new(9, 9, 9); 3];

        controller.advance_manually(Duration::from_secs(1));
        assert_eq!(controller.update(&mut frame, &features(10, 0.5, true, 0.0)), None);
        assert_eq!(frame, [Rgb::new(9, 9, 9); 3]);
        assert_eq!(controller.current_name(), None);
    }

    #[test]
    fn reset_returns_to_first_entry() {
        let mut controller = build_controller(3, raw_config());
        controller.advance_manually(Duration::from_secs(1));
        controller.advance_manually(Duration::from_secs(2));

        controller.reset_to_first(Duration::from_secs(3));
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.current_name(), Some("anim-0"));
        assert_eq!(controller.swap_reason(), SwapReason::Reset);
    }

    #[test]
    fn envelope_filter_softens_history() {
        let config = SwitchConfig {
            envelope_weight: 0.1,
            ..raw_config()
        };
        let mut controller = build_controller(2, config);

        step(&mut controller, &features(10, 1.0, false, 0.0));
        assert!((controller.average_volume() - 0.01).abs() < 1e-6);
        assert!(!controller.is_build_up());
    }

    /// Runs 10 ms cycles at 240 bpm with a beat every 250 ms and returns the
    /// times at which the controller switched.
    fn run_steady_set(
        controller: &mut HybridController,
        volume_at: impl Fn(u64) -> f32,
        mut each: impl FnMut(u64, &HybridController),
    ) -> Vec<u64> {
        let mut switches = Vec::new();
        for ms in (10..=7000).step_by(10) {
            let f = features(ms, volume_at(ms), ms % 250 == 0, 240.0);
            if step(controller, &f).is_some() {
                switches.push(ms);
            }
            each(ms, &*controller);
        }
        switches
    }

    #[test]
    fn sharp_rise_holds_a_due_switch_under_default_envelope() {
        let config = SwitchConfig {
            seed: Some(42),
            ..crate::config::AppConfig::default().switching
        };

        let mut steady = build_controller(3, config.clone());
        let switches = run_steady_set(&mut steady, |_| 0.1, |_, _| {});
        assert_eq!(switches.first(), Some(&6000));

        let mut rising = build_controller(3, config);
        let mut held_at_due_time = false;
        let switches = run_steady_set(
            &mut rising,
            |ms| if ms >= 5950 { 0.9 } else { 0.1 },
            |ms, controller| {
                if ms == 6000 {
                    held_at_due_time = controller.is_build_up()
                        && controller.keep_reason() == KeepReason::BuildUp;
                }
            },
        );
        assert!(held_at_due_time);
        assert!(switches.iter().all(|&ms| !(5950..=6040).contains(&ms)));
        assert!(switches.first().is_some_and(|&ms| ms > 6040));
    }
}
