//! Core library for the DJ booth lighting controller.
//!
//! Audio arrives in fixed-size blocks, is reduced to [`AudioFeatures`]
//! (volume, beat, tempo, frequency bands), and drives a [`HybridController`]
//! that picks and renders one of the catalogued animations into the LED frame.
//! Each module owns one stage of that chain; [`Booth`] wires them together.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod controller;
pub mod display;
pub mod effects;
pub mod engine;
pub mod error;
pub mod render;
pub mod timeline;

pub use analysis::{AudioFeatures, FeatureExtractor};
pub use audio::{PcmStream, SampleSource, SignalCapture, SyntheticSource, WavSource};
pub use config::AppConfig;
pub use controller::{HybridController, KeepReason, SwapReason};
pub use display::{Presenter, StatusSnapshot, Theme, Widget};
pub use engine::{Booth, ControlCommand, FrameSink, RunSummary};
pub use error::{BoothError, Result};
pub use render::{Animation, AnimationCatalog, Rgb};
pub use timeline::PlaybackClock;
