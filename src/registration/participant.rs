//! Participant registrations
//! Stored at: events/{event_id}/registrations/{registration_id}.json

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registration::form::{require_email, require_fields, split_list};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub participant_name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub college: String,
    #[serde(default)]
    pub team_members: Vec<String>,
    pub registered_at: DateTime<Utc>,
}

/// Team members arrive either as the comma separated text box or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TeamMembers {
    Text(String),
    List(Vec<String>),
}

impl TeamMembers {
    pub fn into_names(self) -> Vec<String> {
        match self {
            TeamMembers::Text(text) => split_list(&text),
            TeamMembers::List(names) => names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

/// Public registration form for a single event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(default)]
    pub participant_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub team_members: Option<TeamMembers>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), String> {
        require_fields(&[
            ("Full name", &self.participant_name),
            ("Email", &self.email),
            ("Phone", &self.phone),
            ("Department", &self.department),
            ("College", &self.college),
        ])?;
        require_email(&self.email)
    }

    pub fn into_registration(
        self,
        id: impl Into<String>,
        registered_at: DateTime<Utc>,
    ) -> Registration {
        Registration {
            id: id.into(),
            participant_name: self.participant_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            department: self.department.trim().to_string(),
            college: self.college.trim().to_string(),
            team_members: self
                .team_members
                .map(TeamMembers::into_names)
                .unwrap_or_default(),
            registered_at,
        }
    }
}

pub fn sort_newest_first(registrations: &mut [Registration]) {
    registrations.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
}
