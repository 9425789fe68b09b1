use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, TunnelError};

/// Semantic tag carried by every event. The set is closed: colour, velocity
/// profile and tone tables all match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    Triumph,
    Hardship,
    HostileAction,
    Demographic,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Triumph,
        EventCategory::Hardship,
        EventCategory::HostileAction,
        EventCategory::Demographic,
    ];

    /// Index uploaded to shaders as `category_index`.
    pub fn index(self) -> u32 {
        match self {
            Self::Triumph => 0,
            Self::Hardship => 1,
            Self::HostileAction => 2,
            Self::Demographic => 3,
        }
    }

    /// Linear RGB colour used for the crystal, its emitter and the tunnel tint.
    pub fn color(self) -> [f32; 3] {
        match self {
            Self::Triumph => [1.0, 0.78, 0.25],
            Self::Hardship => [0.35, 0.55, 0.95],
            Self::HostileAction => [0.95, 0.22, 0.18],
            Self::Demographic => [0.3, 0.9, 0.6],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triumph => "triumph",
            Self::Hardship => "hardship",
            Self::HostileAction => "hostile-action",
            Self::Demographic => "demographic",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = TunnelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| TunnelError::invalid(format!("unknown event category `{s}`")))
    }
}

/// A single chronological event supplied by the data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub category: EventCategory,
    /// Start timestamp in seconds. Only used for ordering by the collaborator.
    pub start: i64,
    #[serde(default)]
    pub severity: Option<f32>,
    #[serde(default)]
    pub population_before: Option<u64>,
    #[serde(default)]
    pub population_after: Option<u64>,
}

impl Event {
    pub fn new(id: impl Into<String>, category: EventCategory, start: i64) -> Self {
        Self {
            id: id.into(),
            category,
            start,
            severity: None,
            population_before: None,
            population_after: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(TunnelError::invalid("event id must not be empty"));
        }
        if let Some(severity) = self.severity {
            if !(0.0..=10.0).contains(&severity) {
                return Err(TunnelError::invalid(format!(
                    "event `{}` has severity {severity} outside 0..=10",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Ordered, immutable snapshot of events taken at scene-mount time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventSnapshot {
    events: Vec<Event>,
}

impl EventSnapshot {
    pub fn new(events: Vec<Event>) -> Result<Self> {
        for event in &events {
            event.validate()?;
        }
        Ok(Self { events })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let events: Vec<Event> = serde_json::from_str(json)?;
        Self::new(events)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }
}
