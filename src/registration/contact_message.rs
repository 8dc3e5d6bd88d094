//! Contact form messages
//! Stored at: messages/{message_id}.json

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registration::form::{require_email, require_fields};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub college: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn subject_label(&self) -> &str {
        subject_label(&self.subject)
    }
}

/// Human label for the subjects offered by the contact form; anything else is shown as typed.
pub fn subject_label(subject: &str) -> &str {
    match subject {
        "registration" => "Event Registration",
        "sponsorship" => "Sponsorship Inquiry",
        "technical" => "Technical Query",
        "other" => "Other",
        free_form => free_form,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), String> {
        require_fields(&[
            ("Name", &self.name),
            ("Email", &self.email),
            ("Subject", &self.subject),
            ("Message", &self.message),
        ])?;
        require_email(&self.email)
    }

    pub fn into_message(self, id: impl Into<String>, created_at: DateTime<Utc>) -> ContactMessage {
        ContactMessage {
            id: id.into(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            college: self.college.trim().to_string(),
            subject: self.subject.trim().to_string(),
            message: self.message,
            read: false,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl MessageFilter {
    pub fn matches(&self, message: &ContactMessage) -> bool {
        match self {
            MessageFilter::All => true,
            MessageFilter::Unread => !message.read,
            MessageFilter::Read => message.read,
        }
    }
}

pub fn sort_newest_first(messages: &mut [ContactMessage]) {
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_subjects_get_labels() {
        assert_eq!(subject_label("sponsorship"), "Sponsorship Inquiry");
        assert_eq!(subject_label("Venue parking"), "Venue parking");
    }

    #[test]
    fn unread_filter_skips_read_messages() {
        let form = ContactForm {
            name: "Ravi".to_string(),
            email: "ravi@x.in".to_string(),
            college: String::new(),
            subject: "other".to_string(),
            message: "Hi".to_string(),
        };
        let mut message = form.into_message("m1", Utc::now());
        assert!(MessageFilter::Unread.matches(&message));
        message.read = true;
        assert!(!MessageFilter::Unread.matches(&message));
        assert!(MessageFilter::Read.matches(&message));
        assert!(MessageFilter::All.matches(&message));
    }

    #[test]
    fn message_body_is_required() {
        let form = ContactForm {
            name: "Ravi".to_string(),
            email: "ravi@x.in".to_string(),
            subject: "other".to_string(),
            ..Default::default()
        };
        assert_eq!(form.validate().unwrap_err(), "Message is required");
    }
}
