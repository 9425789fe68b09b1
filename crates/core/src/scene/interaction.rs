use glam::Vec3;

use super::SceneLayout;
use crate::audio::{EchoKind, ToneSynth};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Distance along the ray to the first hit on a sphere, if any.
    fn hit_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        [-b - root, -b + root].into_iter().find(|t| *t >= 0.0)
    }
}

/// Index of the nearest crystal whose bounding sphere the ray passes through.
pub fn pick(layout: &SceneLayout, ray: &Ray, radius: f32) -> Option<usize> {
    layout
        .placements()
        .iter()
        .filter_map(|p| ray.hit_sphere(p.position, radius).map(|t| (p.index, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Host callback invoked when a crystal is selected.
pub trait SelectionListener {
    fn crystal_selected(&mut self, event_id: &str);
}

impl<F: FnMut(&str)> SelectionListener for F {
    fn crystal_selected(&mut self, event_id: &str) {
        self(event_id)
    }
}

/// Hover and selection state for the crystals of one mount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionState {
    hovered: Option<usize>,
    selected: Option<usize>,
    dirty: bool,
}

impl InteractionState {
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Moves the hover to `target`. Entering a new crystal plays its category
    /// tone; leaving one for empty space plays the hover echo. Returns whether
    /// the hover changed.
    pub fn hover(&mut self, target: Option<usize>, layout: &SceneLayout, synth: &mut ToneSynth) -> bool {
        let target = target.filter(|i| *i < layout.len());
        if target == self.hovered {
            return false;
        }
        self.hovered = target;
        self.dirty = true;
        match target.and_then(|i| layout.placements().get(i)) {
            Some(placement) => {
                synth.play_category_tone(placement.category);
            }
            None => {
                synth.play_ui_echo(EchoKind::Hover);
            }
        }
        true
    }

    /// Toggles selection of `target`. Selecting notifies the listener with the
    /// event id; clicking the selected crystal or empty space dismisses it.
    pub fn select(
        &mut self,
        target: Option<usize>,
        layout: &SceneLayout,
        synth: &mut ToneSynth,
        listener: &mut dyn SelectionListener,
    ) -> Option<usize> {
        let target = target.filter(|i| *i < layout.len());
        match target {
            Some(index) if self.selected != Some(index) => {
                self.selected = Some(index);
                self.dirty = true;
                synth.play_ui_echo(EchoKind::Select);
                if let Some(placement) = layout.placements().get(index) {
                    tracing::debug!(index, event = %placement.event_id, "crystal selected");
                    listener.crystal_selected(&placement.event_id);
                }
            }
            _ => {
                if self.selected.take().is_some() {
                    self.dirty = true;
                    synth.play_ui_echo(EchoKind::Dismiss);
                }
            }
        }
        self.selected
    }

    /// Whether crystal `index` should render highlighted.
    pub fn is_active(&self, index: usize) -> bool {
        self.hovered == Some(index) || self.selected == Some(index)
    }

    /// Returns and clears the flag set by any hover or selection change.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        audio::{AudioSink, Tone},
        config::{AudioConfig, SceneConfig},
        Event, EventCategory, EventSnapshot, QualityTier, Result,
    };

    struct Recorder(Rc<RefCell<Vec<&'static str>>>);

    impl AudioSink for Recorder {
        fn play(&mut self, tone: &Tone) -> Result<()> {
            self.0.borrow_mut().push(tone.label);
            Ok(())
        }
    }

    fn layout() -> SceneLayout {
        let events = (0..4)
            .map(|i| Event::new(format!("e{i}"), EventCategory::ALL[i], i as i64))
            .collect();
        SceneLayout::compose(
            &EventSnapshot::new(events).unwrap(),
            &QualityTier::Low.profile(),
            &SceneConfig::default(),
        )
    }

    fn ray_at(layout: &SceneLayout, index: usize) -> Ray {
        let target = layout.placements()[index].position;
        let origin = Vec3::new(0.0, 0.0, 20.0);
        Ray::new(origin, target - origin)
    }

    #[test]
    fn picks_the_crystal_under_the_ray() {
        let layout = layout();
        assert_eq!(pick(&layout, &ray_at(&layout, 2), 0.8), Some(2));

        let away = Ray::new(Vec3::new(0.0, 0.0, 20.0), Vec3::Z);
        assert_eq!(pick(&layout, &away, 0.8), None);
    }

    #[test]
    fn hover_changes_once_per_target() {
        let layout = layout();
        let mut synth = ToneSynth::muted(AudioConfig::default());
        let mut state = InteractionState::default();

        assert!(state.hover(Some(1), &layout, &mut synth));
        assert!(!state.hover(Some(1), &layout, &mut synth));
        assert!(state.is_active(1));
        assert!(state.take_dirty());
        assert!(!state.take_dirty());

        // Out-of-range targets clear the hover.
        assert!(state.hover(Some(99), &layout, &mut synth));
        assert_eq!(state.hovered(), None);
    }

    #[test]
    fn selection_toggles_and_reports_event_id() {
        let layout = layout();
        let mut synth = ToneSynth::muted(AudioConfig::default());
        let mut state = InteractionState::default();
        let mut seen = Vec::new();
        let mut listener = |id: &str| seen.push(id.to_string());

        assert_eq!(state.select(Some(3), &layout, &mut synth, &mut listener), Some(3));
        assert_eq!(state.select(Some(3), &layout, &mut synth, &mut listener), None);
        assert_eq!(state.select(Some(0), &layout, &mut synth, &mut listener), Some(0));
        assert_eq!(state.select(None, &layout, &mut synth, &mut listener), None);
        drop(listener);

        assert_eq!(seen, vec!["e3".to_string(), "e0".to_string()]);
    }

    #[test]
    fn hover_tones_follow_enter_and_leave() {
        let layout = layout();
        let labels = Rc::new(RefCell::new(Vec::new()));
        let mut synth = ToneSynth::new(AudioConfig::default(), Box::new(Recorder(labels.clone())));
        let mut state = InteractionState::default();

        state.hover(Some(0), &layout, &mut synth);
        state.hover(Some(2), &layout, &mut synth);
        state.hover(None, &layout, &mut synth);
        state.hover(None, &layout, &mut synth);

        let expected = vec![
            EventCategory::ALL[0].as_str(),
            EventCategory::ALL[2].as_str(),
            "echo-hover",
        ];
        assert_eq!(*labels.borrow(), expected);
    }
}
