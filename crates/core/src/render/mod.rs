pub mod color;

use std::fmt;

use tracing::{info, warn};

use crate::AudioFeatures;

/// Colour of one LED in the frame buffer.
pub type Rgb = smart_leds::RGB8;

/// A visual effect driven by audio features.
///
/// Implementations own whatever state they need between frames. The frame
/// buffer belongs to the animation for the duration of the call.
pub trait Animation {
    /// Writes the next frame into `frame`.
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures);

    /// Called whenever the animation becomes the active catalog entry.
    fn activate(&mut self) {}
}

impl<F> Animation for F
where
    F: FnMut(&mut [Rgb], &AudioFeatures),
{
    fn render(&mut self, frame: &mut [Rgb], features: &AudioFeatures) {
        self(frame, features);
    }
}

struct CatalogEntry {
    name: String,
    animation: Box<dyn Animation>,
}

/// Fixed-capacity, append-only list of named animations.
///
/// The catalog is filled once during startup. Entries cannot be removed or
/// reordered afterwards; the index of an entry is stable for the lifetime of
/// the process.
pub struct AnimationCatalog {
    entries: Vec<CatalogEntry>,
    capacity: usize,
}

impl AnimationCatalog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an animation. Once the catalog is full the entry is dropped
    /// with a warning and `false` is returned; existing entries are untouched.
    pub fn add_entry<A>(&mut self, animation: A, name: impl Into<String>) -> bool
    where
        A: Animation + 'static,
    {
        self.add_boxed(Box::new(animation), name)
    }

    pub fn add_boxed(&mut self, animation: Box<dyn Animation>, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.entries.len() >= self.capacity {
            warn!(
                %name,
                capacity = self.capacity,
                "animation catalog is full, entry dropped"
            );
            return false;
        }

        info!(%name, index = self.entries.len(), "added animation");
        self.entries.push(CatalogEntry { name, animation });
        true
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Notifies the entry at `index` that it is now active.
    pub fn activate(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.animation.activate();
        }
    }

    /// Renders the entry at `index`. Returns `false` without touching the
    /// frame when the frame is empty or the index does not exist.
    pub fn render(&mut self, index: usize, frame: &mut [Rgb], features: &AudioFeatures) -> bool {
        if frame.is_empty() {
            return false;
        }
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.animation.render(frame, features);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for AnimationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationCatalog")
            .field("capacity", &self.capacity)
            .field("entries", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(color: Rgb) -> impl FnMut(&mut [Rgb], &AudioFeatures) {
        move |frame: &mut [Rgb], _: &AudioFeatures| frame.fill(color)
    }

    #[test]
    fn overflow_keeps_existing_entries() {
        let mut catalog = AnimationCatalog::new(2);
        assert!(catalog.add_entry(solid(Rgb::new(255, 0, 0)), "red"));
        assert!(catalog.add_entry(solid(Rgb::new(0, 255, 0)), "green"));
        assert!(!catalog.add_entry(solid(Rgb::new(0, 0, 255)), "blue"));

        assert_eq!(catalog.entry_count(), 2);
        assert_eq!(catalog.name_of(0), Some("red"));
        assert_eq!(catalog.name_of(1), Some("green"));
        assert_eq!(catalog.name_of(2), None);

        let mut frame = [Rgb::default(); 3];
        catalog.render(1, &mut frame, &AudioFeatures::default());
        assert_eq!(frame, [Rgb::new(0, 255, 0); 3]);
    }

    #[test]
    fn render_with_invalid_inputs_is_a_no_op() {
        let mut catalog = AnimationCatalog::new(1);
        let mut frame = [Rgb::default(); 2];
        assert!(!catalog.render(0, &mut frame, &AudioFeatures::default()));

        catalog.add_entry(solid(Rgb::new(1, 2, 3)), "dim");
        assert!(!catalog.render(0, &mut [], &AudioFeatures::default()));
        assert!(!catalog.render(5, &mut frame, &AudioFeatures::default()));
        assert_eq!(frame, [Rgb::default(); 2]);
    }

    #[test]
    fn closures_keep_their_own_state() {
        let mut calls = 0u8;
        let mut catalog = AnimationCatalog::new(1);
        catalog.add_entry(
            move |frame: &mut [Rgb], _: &AudioFeatures| {
                calls += 1;
                frame[0] = Rgb::new(calls, 0, 0);
            },
            "counter",
        );

        let mut frame = [Rgb::default(); 1];
        for _ in 0..3 {
            catalog.render(0, &mut frame, &AudioFeatures::default());
        }
        assert_eq!(frame[0].r, 3);
    }
}
