use crate::{EventSnapshot, QualityProfile};

/// State the frame driver and its collaborators read instead of a shared
/// global store. Passed down explicitly at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    profile: QualityProfile,
    event_count: usize,
    selected_event: Option<String>,
}

impl RenderContext {
    pub fn new(profile: QualityProfile, snapshot: &EventSnapshot) -> Self {
        Self {
            profile,
            event_count: snapshot.len(),
            selected_event: None,
        }
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    pub fn selected_event(&self) -> Option<&str> {
        self.selected_event.as_deref()
    }

    pub fn set_selected_event(&mut self, event_id: Option<String>) {
        self.selected_event = event_id;
    }
}
