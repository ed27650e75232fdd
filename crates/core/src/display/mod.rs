//! Status screen model.
//!
//! The booth does not draw pixels itself. Each cycle it produces a
//! [`StatusSnapshot`]; a [`Presenter`] turns that into a list of [`Widget`]s
//! placed on a fixed-size screen by a [`GridLayout`]. Whatever owns the real
//! screen (or the terminal preview) draws the placed widgets.

use std::fmt;

use serde::Serialize;

use crate::{
    controller::{HybridController, KeepReason, SwapReason},
    render::Rgb,
    AudioFeatures,
};

pub const SCREEN_WIDTH: u16 = 240;
pub const SCREEN_HEIGHT: u16 = 135;
pub const SPECTRUM_BANDS: usize = 16;
const WAVEFORM_POINTS: usize = 128;
const BPM_SMOOTHING: f32 = 0.1;

/// Everything the status screen needs from one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub features: AudioFeatures,
    pub current_name: String,
    pub current_index: usize,
    pub entry_count: usize,
    pub auto_switch: bool,
    pub build_up: bool,
    pub drop: bool,
    pub average_volume: f32,
    pub keep_reason: KeepReason,
    pub swap_reason: SwapReason,
}

impl StatusSnapshot {
    pub fn capture(controller: &HybridController, features: &AudioFeatures) -> Self {
        Self {
            features: features.clone(),
            current_name: controller.current_name().unwrap_or("none").to_string(),
            current_index: controller.current_index(),
            entry_count: controller.entry_count(),
            auto_switch: controller.is_auto_switch_enabled(),
            build_up: controller.is_build_up(),
            drop: controller.is_drop(),
            average_volume: controller.average_volume(),
            keep_reason: controller.keep_reason(),
            swap_reason: controller.swap_reason(),
        }
    }
}

/// Screen palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
    pub background: Rgb,
    pub text: Rgb,
}

impl Theme {
    pub const NAMES: [&'static str; 2] = ["cyberpunk", "blade_runner"];

    pub fn cyberpunk() -> Self {
        Self {
            primary: Rgb::new(128, 0, 128),
            secondary: Rgb::new(255, 192, 203),
            accent: Rgb::new(255, 255, 0),
            background: Rgb::new(0, 0, 0),
            text: Rgb::new(255, 255, 255),
        }
    }

    pub fn blade_runner() -> Self {
        Self {
            primary: Rgb::new(192, 192, 192),
            secondary: Rgb::new(0, 0, 255),
            accent: Rgb::new(255, 165, 0),
            background: Rgb::new(0, 0, 0),
            text: Rgb::new(255, 255, 255),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "cyberpunk" => Some(Self::cyberpunk()),
            "blade_runner" => Some(Self::blade_runner()),
            _ => None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::cyberpunk()
    }
}

/// Closed set of things the status screen can show.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    ModeHeader {
        name: String,
        position: usize,
        total: usize,
    },
    ModeIndicator {
        auto: bool,
    },
    BpmBadge {
        bpm: u32,
        beat: bool,
    },
    DecibelBadge {
        decibels: f32,
    },
    VerticalBar {
        label: &'static str,
        level: f32,
        color: Rgb,
    },
    Spectrum {
        bands: Vec<f32>,
        color: Rgb,
    },
    Waveform {
        points: Vec<f32>,
        color: Rgb,
    },
    ReasonLine {
        text: String,
    },
}

impl Widget {
    /// Smallest box the widget can be drawn in, `(width, height)`.
    pub fn min_size(&self) -> (u16, u16) {
        match self {
            Self::ModeHeader { .. } => (SCREEN_WIDTH, 30),
            Self::ModeIndicator { .. } | Self::BpmBadge { .. } | Self::DecibelBadge { .. } => (80, 25),
            Self::VerticalBar { .. } => (30, 45),
            Self::Spectrum { .. } | Self::Waveform { .. } => (130, 45),
            Self::ReasonLine { .. } => (SCREEN_WIDTH, 12),
        }
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeHeader {
                name,
                position,
                total,
            } => write!(f, "{name} {position}/{total}"),
            Self::ModeIndicator { auto } => f.write_str(if *auto { "HYBRID" } else { "MANUAL" }),
            Self::BpmBadge { bpm, beat } => {
                write!(f, "BPM:{bpm}{}", if *beat { " *" } else { "" })
            }
            Self::DecibelBadge { decibels } => write!(f, "dB:{decibels:.2}"),
            Self::VerticalBar { label, level, .. } => {
                write!(f, "{label} {}", level_glyph(*level))
            }
            Self::Spectrum { bands, .. } => {
                bands.iter().try_for_each(|level| write!(f, "{}", level_glyph(*level)))
            }
            Self::Waveform { points, .. } => points
                .iter()
                .step_by(8)
                .try_for_each(|p| write!(f, "{}", level_glyph((p + 1.0) / 2.0))),
            Self::ReasonLine { text } => f.write_str(text),
        }
    }
}

fn level_glyph(level: f32) -> char {
    const GLYPHS: [char; 8] = [' ', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let step = (level.clamp(0.0, 1.0) * (GLYPHS.len() - 1) as f32).round() as usize;
    GLYPHS[step.min(GLYPHS.len() - 1)]
}

/// A widget with its assigned box.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub widget: Widget,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Flows widgets left to right and wraps to a new row when the next one
/// does not fit. Widgets that fall below the screen are dropped.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    width: u16,
    height: u16,
}

impl GridLayout {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn arrange(&self, widgets: Vec<Widget>) -> Vec<Placed> {
        let (mut x, mut y, mut row_height) = (0u16, 0u16, 0u16);
        let mut placed = Vec::with_capacity(widgets.len());

        for widget in widgets {
            let (w, h) = widget.min_size();
            if x > 0 && x.saturating_add(w) > self.width {
                x = 0;
                y = y.saturating_add(row_height);
                row_height = 0;
            }
            if y.saturating_add(h) > self.height {
                break;
            }
            placed.push(Placed {
                widget,
                x,
                y,
                width: w,
                height: h,
            });
            x = x.saturating_add(w);
            row_height = row_height.max(h);
        }
        placed
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

/// Averages the spectrum into `bands` equal groups, clamped to `[0, 1]`.
/// Returns all zeros when there are fewer bins than bands.
pub fn spectrum_bars(spectrum: &[f32], bands: usize) -> Vec<f32> {
    if bands == 0 {
        return Vec::new();
    }
    let per_band = spectrum.len() / bands;
    if per_band == 0 {
        return vec![0.0; bands];
    }
    spectrum
        .chunks_exact(per_band)
        .take(bands)
        .map(|chunk| (chunk.iter().sum::<f32>() / per_band as f32).clamp(0.0, 1.0))
        .collect()
}

/// Builds the widget list for a snapshot.
#[derive(Debug, Clone)]
pub struct Presenter {
    theme: Theme,
    layout: GridLayout,
    smoothed_bpm: f32,
    show_waveform: bool,
}

impl Presenter {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            layout: GridLayout::default(),
            smoothed_bpm: 0.0,
            show_waveform: false,
        }
    }

    /// Shows the raw waveform in place of the spectrum.
    pub fn with_waveform(mut self, enabled: bool) -> Self {
        self.show_waveform = enabled;
        self
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn smoothed_bpm(&self) -> f32 {
        self.smoothed_bpm
    }

    pub fn present(&mut self, snapshot: &StatusSnapshot) -> Vec<Placed> {
        let widgets = self.compose(snapshot);
        self.layout.arrange(widgets)
    }

    pub fn compose(&mut self, snapshot: &StatusSnapshot) -> Vec<Widget> {
        let features = &snapshot.features;
        self.smoothed_bpm =
            self.smoothed_bpm * (1.0 - BPM_SMOOTHING) + features.bpm * BPM_SMOOTHING;

        let mut widgets = vec![
            Widget::ModeHeader {
                name: snapshot.current_name.clone(),
                position: snapshot.current_index + 1,
                total: snapshot.entry_count,
            },
            Widget::ModeIndicator {
                auto: snapshot.auto_switch,
            },
            Widget::BpmBadge {
                bpm: self.smoothed_bpm.round().max(0.0) as u32,
                beat: features.beat_detected,
            },
            Widget::DecibelBadge {
                decibels: features.decibels,
            },
            Widget::VerticalBar {
                label: "BASS",
                level: features.bass.clamp(0.0, 1.0),
                color: self.theme.secondary,
            },
            Widget::VerticalBar {
                label: "MID",
                level: features.mid.clamp(0.0, 1.0),
                color: self.theme.primary,
            },
            Widget::VerticalBar {
                label: "TREB",
                level: features.treble.clamp(0.0, 1.0),
                color: self.theme.accent,
            },
        ];

        if self.show_waveform {
            let points = features
                .waveform
                .iter()
                .take(WAVEFORM_POINTS)
                .map(|&s| s as f32 / 32768.0)
                .collect();
            widgets.push(Widget::Waveform {
                points,
                color: self.theme.accent,
            });
        } else {
            widgets.push(Widget::Spectrum {
                bands: spectrum_bars(&features.spectrum, SPECTRUM_BANDS),
                color: self.theme.accent,
            });
        }

        let text = if snapshot.auto_switch {
            format!("keep: {} | last: {}", snapshot.keep_reason, snapshot.swap_reason)
        } else {
            format!("last: {}", snapshot.swap_reason)
        };
        widgets.push(Widget::ReasonLine { text });
        widgets
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bpm: f32) -> StatusSnapshot {
        StatusSnapshot {
            features: AudioFeatures {
                bpm,
                bass: 1.7,
                spectrum: vec![0.5; 256],
                waveform: vec![0; 512],
                ..Default::default()
            },
            current_name: "firestorm".into(),
            current_index: 0,
            entry_count: 14,
            auto_switch: true,
            build_up: false,
            drop: false,
            average_volume: 0.0,
            keep_reason: KeepReason::BeatNotStable,
            swap_reason: SwapReason::Init,
        }
    }

    #[test]
    fn spectrum_bars_average_and_clamp() {
        let mut spectrum = vec![0.25; 32];
        spectrum[0] = 4.0;
        let bars = spectrum_bars(&spectrum, 16);

        assert_eq!(bars.len(), 16);
        assert_eq!(bars[0], 1.0);
        assert!((bars[1] - 0.25).abs() < 1e-6);
        assert_eq!(spectrum_bars(&[1.0; 8], 16), vec![0.0; 16]);
        assert!(spectrum_bars(&spectrum, 0).is_empty());
    }

    #[test]
    fn layout_wraps_rows() {
        let layout = GridLayout::new(160, 200);
        let placed = layout.arrange(vec![
            Widget::ModeIndicator { auto: true },
            Widget::BpmBadge { bpm: 0, beat: false },
            Widget::DecibelBadge { decibels: 0.0 },
        ]);

        let origins: Vec<(u16, u16)> = placed.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(origins, vec![(0, 0), (80, 0), (0, 25)]);
    }

    #[test]
    fn layout_drops_widgets_below_screen() {
        let layout = GridLayout::new(240, 40);
        let placed = layout.arrange(vec![
            Widget::ReasonLine { text: "a".into() },
            Widget::ReasonLine { text: "b".into() },
            Widget::ReasonLine { text: "c".into() },
            Widget::ReasonLine { text: "d".into() },
        ]);
        assert_eq!(placed.len(), 3);
    }

    #[test]
    fn presenter_smooths_bpm_and_shows_position() {
        let mut presenter = Presenter::default();
        let widgets = presenter.compose(&snapshot(120.0));

        assert!((presenter.smoothed_bpm() - 12.0).abs() < 1e-4);
        assert_eq!(widgets[0].to_string(), "firestorm 1/14");
        assert!(widgets.contains(&Widget::BpmBadge { bpm: 12, beat: false }));
        assert!(widgets.iter().any(|w| matches!(
            w,
            Widget::VerticalBar { label: "BASS", level, .. } if *level == 1.0
        )));
        assert!(widgets
            .iter()
            .any(|w| matches!(w, Widget::Spectrum { bands, .. } if bands.len() == SPECTRUM_BANDS)));
    }

    #[test]
    fn default_screen_fits_every_widget() {
        let mut presenter = Presenter::new(Theme::blade_runner());
        assert_eq!(presenter.present(&snapshot(0.0)).len(), 9);

        let mut presenter = Presenter::default().with_waveform(true);
        let placed = presenter.present(&snapshot(0.0));
        assert!(placed
            .iter()
            .any(|p| matches!(&p.widget, Widget::Waveform { points, .. } if points.len() == 128)));
    }

    #[test]
    fn themes_by_name() {
        for name in Theme::NAMES {
            assert!(Theme::by_name(name).is_some());
        }
        assert_eq!(Theme::by_name("vaporwave"), None);
        assert_eq!(Theme::default(), Theme::cyberpunk());
    }
}
