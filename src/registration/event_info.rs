//! Symposium event structure
//! Stored at: events/{event_id}/event.json

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::registration::form::require_fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    Technical,
    NonTechnical,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Technical => write!(f, "technical"),
            EventCategory::NonTechnical => write!(f, "non-technical"),
        }
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(EventCategory::Technical),
            "non-technical" => Ok(EventCategory::NonTechnical),
            other => Err(format!("Unknown event category: {}", other)),
        }
    }
}

/// Contact person shown on an event page, optionally with a hosted photo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinator {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub id: String,
    pub title: String,
    pub category: EventCategory,
    pub description: String,
    #[serde(default)]
    pub rules: Vec<String>,
    pub date: String,
    pub time: String,
    pub venue: String,
    pub team_size: String,
    pub registration_open: bool,
    #[serde(default)]
    pub coordinators: Vec<Coordinator>,
    #[serde(default)]
    pub staff_coordinators: Vec<Coordinator>,
    pub created_at: DateTime<Utc>,
}

impl EventInfo {
    pub fn validate(&self) -> Result<(), String> {
        require_fields(&[
            ("Title", &self.title),
            ("Description", &self.description),
            ("Date", &self.date),
            ("Time", &self.time),
            ("Venue", &self.venue),
            ("Team size", &self.team_size),
        ])
    }
}

/// Payload of the admin event form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    #[serde(default)]
    pub title: String,
    pub category: EventCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub team_size: String,
    #[serde(default = "default_registration_open")]
    pub registration_open: bool,
    #[serde(default)]
    pub coordinators: Vec<Coordinator>,
    #[serde(default)]
    pub staff_coordinators: Vec<Coordinator>,
}

fn default_registration_open() -> bool {
    true
}

impl EventDraft {
    pub fn into_event(self, id: impl Into<String>, created_at: DateTime<Utc>) -> EventInfo {
        EventInfo {
            id: id.into(),
            title: self.title.trim().to_string(),
            category: self.category,
            description: self.description,
            rules: clean_rules(self.rules),
            date: self.date,
            time: self.time,
            venue: self.venue,
            team_size: self.team_size,
            registration_open: self.registration_open,
            coordinators: clean_coordinators(self.coordinators),
            staff_coordinators: clean_coordinators(self.staff_coordinators),
            created_at,
        }
    }
}

/// Partial update sent by the admin edit form. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub category: Option<EventCategory>,
    pub description: Option<String>,
    pub rules: Option<Vec<String>>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub team_size: Option<String>,
    pub registration_open: Option<bool>,
    pub coordinators: Option<Vec<Coordinator>>,
    pub staff_coordinators: Option<Vec<Coordinator>>,
}

impl EventPatch {
    pub fn apply(self, event: &mut EventInfo) {
        if let Some(title) = self.title {
            event.title = title.trim().to_string();
        }
        if let Some(category) = self.category {
            event.category = category;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(rules) = self.rules {
            event.rules = clean_rules(rules);
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(time) = self.time {
            event.time = time;
        }
        if let Some(venue) = self.venue {
            event.venue = venue;
        }
        if let Some(team_size) = self.team_size {
            event.team_size = team_size;
        }
        if let Some(open) = self.registration_open {
            event.registration_open = open;
        }
        if let Some(coordinators) = self.coordinators {
            event.coordinators = clean_coordinators(coordinators);
        }
        if let Some(staff) = self.staff_coordinators {
            event.staff_coordinators = clean_coordinators(staff);
        }
    }
}

fn clean_rules(rules: Vec<String>) -> Vec<String> {
    rules
        .into_iter()
        .map(|rule| rule.trim().to_string())
        .filter(|rule| !rule.is_empty())
        .collect()
}

fn clean_coordinators(coordinators: Vec<Coordinator>) -> Vec<Coordinator> {
    coordinators
        .into_iter()
        .filter(|c| !c.name.trim().is_empty())
        .collect()
}

/// Listing filter used by the public events page and the admin table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub search: Option<String>,
    /// The admin table also searches venues; the public page searches titles only.
    pub search_venue: bool,
}

impl EventFilter {
    pub fn category(category: EventCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }

    pub fn including_venue(mut self) -> Self {
        self.search_venue = true;
        self
    }

    /// Search is case-insensitive over the title, plus the venue when enabled.
    pub fn matches(&self, event: &EventInfo) -> bool {
        if let Some(category) = self.category {
            if event.category != category {
                return false;
            }
        }
        match &self.search {
            Some(search) => {
                let needle = search.trim().to_lowercase();
                event.title.to_lowercase().contains(&needle)
                    || (self.search_venue && event.venue.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    pub fn apply(&self, events: Vec<EventInfo>) -> Vec<EventInfo> {
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// Newest first, the order every event listing uses.
pub fn sort_newest_first(events: &mut [EventInfo]) {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
