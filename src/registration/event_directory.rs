//! Event directory backed by a document store
//! Structure: events/{event_id}/event.json plus events/{event_id}/registrations/

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::registration::document_store::{read_all_json, read_json, write_json, DocumentStore};
use crate::registration::error::RegistrationError;
use crate::registration::event_info::{
    self, EventCategory, EventDraft, EventFilter, EventInfo, EventPatch,
};
use crate::registration::form::is_document_key;
use crate::registration::participant::{self, Registration, RegistrationForm};
use crate::registration::subscription::{Change, ChangeFeed, Subscription};

const EVENTS_ROOT: &str = "events/";
const EVENT_DOCUMENT: &str = "event.json";
const REGISTRATIONS_FOLDER: &str = "registrations/";

/// Numbers shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_events: usize,
    pub technical_events: usize,
    pub non_technical_events: usize,
    pub total_registrations: usize,
    pub registrations_per_event: BTreeMap<String, usize>,
}

#[derive(Clone)]
pub struct EventDirectory {
    store: Arc<dyn DocumentStore>,
    feed: ChangeFeed,
}

impl EventDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    fn event_folder(&self, event_id: &str) -> String {
        format!("{}{}/", EVENTS_ROOT, event_id)
    }

    fn event_path(&self, event_id: &str) -> String {
        format!("{}{}", self.event_folder(event_id), EVENT_DOCUMENT)
    }

    fn registrations_folder(&self, event_id: &str) -> String {
        format!("{}{}", self.event_folder(event_id), REGISTRATIONS_FOLDER)
    }

    fn registration_path(&self, event_id: &str, registration_id: &str) -> String {
        format!(
            "{}{}.json",
            self.registrations_folder(event_id),
            registration_id
        )
    }

    fn check_key(event_id: &str) -> Result<(), RegistrationError> {
        if is_document_key(event_id) {
            Ok(())
        } else {
            Err(RegistrationError::EventNotFound(event_id.to_string()))
        }
    }

    pub async fn create_event(&self, draft: EventDraft) -> Result<String, RegistrationError> {
        let event_id = Uuid::new_v4().to_string();
        let event = draft.into_event(event_id.clone(), Utc::now());
        event.validate().map_err(RegistrationError::ValidationError)?;

        write_json(self.store.as_ref(), &self.event_path(&event_id), &event)
            .await
            .map_err(|e| {
                error!("Error creating event: {}", e);
                e
            })?;
        self.feed.publish(Change::Events);

        info!("Created event '{}' ({})", event.title, event_id);
        Ok(event_id)
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        patch: EventPatch,
    ) -> Result<EventInfo, RegistrationError> {
        let mut event = self
            .get_event(event_id)
            .await?
            .ok_or_else(|| RegistrationError::EventNotFound(event_id.to_string()))?;

        patch.apply(&mut event);
        event.validate().map_err(RegistrationError::ValidationError)?;

        write_json(self.store.as_ref(), &self.event_path(event_id), &event)
            .await
            .map_err(|e| {
                error!("Error updating event {}: {}", event_id, e);
                e
            })?;
        self.feed.publish(Change::Events);

        info!("Updated event '{}' ({})", event.title, event_id);
        Ok(event)
    }

    /// Removes every registration of the event before the event document itself.
    pub async fn delete_event(&self, event_id: &str) -> Result<usize, RegistrationError> {
        if self.get_event(event_id).await?.is_none() {
            return Err(RegistrationError::EventNotFound(event_id.to_string()));
        }

        let registrations = self
            .store
            .list(&self.registrations_folder(event_id))
            .await?;
        let removals = registrations.iter().map(|path| self.store.remove(path));
        futures::future::try_join_all(removals)
            .await
            .map_err(|e| {
                error!("Error deleting registrations of {}: {}", event_id, e);
                e
            })?;

        self.store.remove(&self.event_path(event_id)).await.map_err(|e| {
            error!("Error deleting event {}: {}", event_id, e);
            e
        })?;

        self.feed.publish(Change::Registrations(event_id.to_string()));
        self.feed.publish(Change::Events);

        info!(
            "Deleted event {} with {} registration(s)",
            event_id,
            registrations.len()
        );
        Ok(registrations.len())
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<EventInfo>, RegistrationError> {
        if !is_document_key(event_id) {
            return Ok(None);
        }

        let event: Option<EventInfo> =
            read_json(self.store.as_ref(), &self.event_path(event_id)).await?;

        // The document key is authoritative over whatever id the body carries
        Ok(event.map(|mut event| {
            event.id = event_id.to_string();
            event
        }))
    }

    async fn event_paths(&self) -> Result<Vec<String>, RegistrationError> {
        let suffix = format!("/{}", EVENT_DOCUMENT);
        Ok(self
            .store
            .list(EVENTS_ROOT)
            .await?
            .into_iter()
            .filter(|path| path.ends_with(&suffix))
            .collect())
    }

    /// Events matching `filter`, newest first.
    pub async fn list_events(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<EventInfo>, RegistrationError> {
        let paths = self.event_paths().await?;
        let events: Vec<EventInfo> = read_all_json(self.store.as_ref(), &paths).await;

        let mut events = filter.apply(events);
        event_info::sort_newest_first(&mut events);
        Ok(events)
    }

    pub async fn subscribe_events(
        &self,
        category: Option<EventCategory>,
    ) -> Subscription<Vec<EventInfo>> {
        let directory = self.clone();
        let filter = EventFilter {
            category,
            ..EventFilter::default()
        };

        Subscription::start(
            "Events",
            &self.feed,
            |change| *change == Change::Events,
            move || {
                let directory = directory.clone();
                let filter = filter.clone();
                async move { directory.list_events(&filter).await }
            },
        )
        .await
    }

    /// Append-only insert of a participant registration.
    pub async fn register_for_event(
        &self,
        event_id: &str,
        form: RegistrationForm,
    ) -> Result<String, RegistrationError> {
        form.validate().map_err(RegistrationError::ValidationError)?;

        let event = self
            .get_event(event_id)
            .await?
            .ok_or_else(|| RegistrationError::EventNotFound(event_id.to_string()))?;
        if !event.registration_open {
            return Err(RegistrationError::RegistrationClosed);
        }

        let registration_id = Uuid::new_v4().to_string();
        let registration = form.into_registration(registration_id.clone(), Utc::now());

        write_json(
            self.store.as_ref(),
            &self.registration_path(event_id, &registration_id),
            &registration,
        )
        .await
        .map_err(|e| {
            error!("Error registering for {}: {}", event_id, e);
            e
        })?;
        self.feed.publish(Change::Registrations(event_id.to_string()));

        info!(
            "Registered '{}' for event '{}'",
            registration.participant_name, event.title
        );
        Ok(registration_id)
    }

    /// Registrations of one event, newest first.
    pub async fn list_registrations(
        &self,
        event_id: &str,
    ) -> Result<Vec<Registration>, RegistrationError> {
        Self::check_key(event_id)?;

        let paths = self
            .store
            .list(&self.registrations_folder(event_id))
            .await?;
        let mut registrations: Vec<Registration> =
            read_all_json(self.store.as_ref(), &paths).await;

        participant::sort_newest_first(&mut registrations);
        Ok(registrations)
    }

    pub async fn subscribe_registrations(
        &self,
        event_id: &str,
    ) -> Result<Subscription<Vec<Registration>>, RegistrationError> {
        Self::check_key(event_id)?;

        let directory = self.clone();
        let watched = event_id.to_string();
        let target = Change::Registrations(event_id.to_string());

        Ok(Subscription::start(
            "Registrations",
            &self.feed,
            move |change| *change == target,
            move || {
                let directory = directory.clone();
                let event_id = watched.clone();
                async move { directory.list_registrations(&event_id).await }
            },
        )
        .await)
    }

    pub async fn registration_count(&self, event_id: &str) -> Result<usize, RegistrationError> {
        Self::check_key(event_id)?;
        Ok(self
            .store
            .list(&self.registrations_folder(event_id))
            .await?
            .len())
    }

    /// Registration totals for every event, taken from a single listing of the
    /// events tree. Events without registrations report zero.
    pub async fn registration_counts(&self) -> Result<BTreeMap<String, usize>, RegistrationError> {
        let mut counts = BTreeMap::new();
        let mut registered = BTreeMap::new();

        for path in self.store.list(EVENTS_ROOT).await? {
            let Some(rest) = path.strip_prefix(EVENTS_ROOT) else {
                continue;
            };
            let Some((event_id, inner)) = rest.split_once('/') else {
                continue;
            };

            if inner == EVENT_DOCUMENT {
                counts.entry(event_id.to_string()).or_insert(0);
            } else if inner.starts_with(REGISTRATIONS_FOLDER) {
                *registered.entry(event_id.to_string()).or_insert(0) += 1;
            }
        }

        // Only registrations whose event document still exists are counted
        for (event_id, count) in counts.iter_mut() {
            *count = registered.remove(event_id).unwrap_or(0);
        }

        Ok(counts)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, RegistrationError> {
        let events = self.list_events(&EventFilter::default()).await?;
        let registrations_per_event = self.registration_counts().await?;

        let technical_events = events
            .iter()
            .filter(|e| e.category == EventCategory::Technical)
            .count();

        Ok(DashboardStats {
            total_events: events.len(),
            technical_events,
            non_technical_events: events.len() - technical_events,
            total_registrations: registrations_per_event.values().sum(),
            registrations_per_event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::document_store::MemoryStore;
    use crate::registration::event_info::Coordinator;

    fn directory() -> (EventDirectory, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (EventDirectory::new(store.clone(), ChangeFeed::new()), store)
    }

    fn draft(title: &str, category: EventCategory) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            category,
            description: "An event".to_string(),
            rules: vec!["Be on time".to_string()],
            date: "2026-03-15".to_string(),
            time: "10:00 AM".to_string(),
            venue: "Main Hall".to_string(),
            team_size: "1-2".to_string(),
            registration_open: true,
            coordinators: vec![Coordinator {
                name: "Asha".to_string(),
                phone: "99887 76655".to_string(),
                email: "asha@college.edu".to_string(),
                photo: "https://img.example/asha.jpg".to_string(),
            }],
            staff_coordinators: vec![],
        }
    }

    fn form(name: &str) -> RegistrationForm {
        RegistrationForm {
            participant_name: name.to_string(),
            email: format!("{}@college.edu", name.to_lowercase()),
            phone: "9876543210".to_string(),
            department: "CSE".to_string(),
            college: "Jeppiaar".to_string(),
            team_members: None,
        }
    }

    #[tokio::test]
    async fn created_event_reads_back_with_same_fields() {
        let (dir, _) = directory();
        let input = draft("Hackathon", EventCategory::Technical);

        let id = dir.create_event(input.clone()).await.unwrap();
        let event = dir.get_event(&id).await.unwrap().unwrap();

        assert_eq!(event.id, id);
        assert_eq!(event.title, input.title);
        assert_eq!(event.category, input.category);
        assert_eq!(event.rules, input.rules);
        assert_eq!(event.venue, input.venue);
        assert_eq!(event.team_size, input.team_size);
        assert_eq!(event.coordinators, input.coordinators);
        assert!(event.registration_open);
    }

    #[tokio::test]
    async fn deleting_event_removes_all_its_registrations() {
        let (dir, store) = directory();
        let keep = dir
            .create_event(draft("Quiz", EventCategory::NonTechnical))
            .await
            .unwrap();
        let doomed = dir
            .create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();

        for name in ["Asha", "Ravi", "Meena"] {
            dir.register_for_event(&doomed, form(name)).await.unwrap();
        }
        dir.register_for_event(&keep, form("Kiran")).await.unwrap();

        let removed = dir.delete_event(&doomed).await.unwrap();

        assert_eq!(removed, 3);
        assert!(dir.get_event(&doomed).await.unwrap().is_none());
        assert!(store
            .list(&format!("events/{}/", doomed))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(dir.registration_count(&keep).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn registration_left_behind_by_a_delete_is_not_counted() {
        let (dir, store) = directory();
        let keep = dir
            .create_event(draft("Quiz", EventCategory::NonTechnical))
            .await
            .unwrap();
        let gone = dir
            .create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();
        dir.register_for_event(&keep, form("Kiran")).await.unwrap();
        dir.delete_event(&gone).await.unwrap();

        // A registration that landed after the delete listed the folder
        store
            .write(&dir.registration_path(&gone, "late"), b"{}".to_vec())
            .await
            .unwrap();

        let stats = dir.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.total_registrations, 1);
        assert!(!stats.registrations_per_event.contains_key(&gone));
    }

    #[tokio::test]
    async fn deleting_unknown_event_is_not_found() {
        let (dir, _) = directory();
        let err = dir.delete_event("missing").await.unwrap_err();
        assert!(matches!(err, RegistrationError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_registration_never_touches_the_store() {
        let (dir, store) = directory();
        let id = dir
            .create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();
        let before = store.len().await;

        let err = dir
            .register_for_event(
                &id,
                RegistrationForm {
                    phone: String::new(),
                    ..form("Asha")
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::ValidationError(_)));
        assert_eq!(store.len().await, before);
    }

    #[tokio::test]
    async fn closed_event_refuses_registrations() {
        let (dir, _) = directory();
        let id = dir
            .create_event(EventDraft {
                registration_open: false,
                ..draft("Quiz", EventCategory::NonTechnical)
            })
            .await
            .unwrap();

        let err = dir.register_for_event(&id, form("Asha")).await.unwrap_err();
        assert!(matches!(err, RegistrationError::RegistrationClosed));
    }

    #[tokio::test]
    async fn update_keeps_untouched_fields() {
        let (dir, _) = directory();
        let id = dir
            .create_event(draft("Quiz", EventCategory::NonTechnical))
            .await
            .unwrap();

        let updated = dir
            .update_event(
                &id,
                EventPatch {
                    title: Some("Grand Quiz".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Grand Quiz");
        assert_eq!(updated.venue, "Main Hall");

        let blanked = dir
            .update_event(
                &id,
                EventPatch {
                    venue: Some(" ".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(blanked, Err(RegistrationError::ValidationError(_))));
    }

    #[tokio::test]
    async fn category_listing_only_returns_that_category() {
        let (dir, _) = directory();
        dir.create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();
        dir.create_event(draft("Quiz", EventCategory::NonTechnical))
            .await
            .unwrap();
        dir.create_event(draft("Paper", EventCategory::Technical))
            .await
            .unwrap();

        let technical = dir
            .list_events(&EventFilter::category(EventCategory::Technical))
            .await
            .unwrap();

        assert_eq!(technical.len(), 2);
        assert!(technical
            .iter()
            .all(|e| e.category == EventCategory::Technical));
    }

    #[tokio::test]
    async fn dashboard_counts_come_from_one_listing() {
        let (dir, _) = directory();
        let a = dir
            .create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();
        let b = dir
            .create_event(draft("Quiz", EventCategory::NonTechnical))
            .await
            .unwrap();
        dir.register_for_event(&a, form("Asha")).await.unwrap();
        dir.register_for_event(&a, form("Ravi")).await.unwrap();

        let stats = dir.dashboard_stats().await.unwrap();

        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.technical_events, 1);
        assert_eq!(stats.non_technical_events, 1);
        assert_eq!(stats.total_registrations, 2);
        assert_eq!(stats.registrations_per_event[&a], 2);
        assert_eq!(stats.registrations_per_event[&b], 0);
    }

    #[tokio::test]
    async fn registration_subscription_sees_new_participants() {
        let (dir, _) = directory();
        let id = dir
            .create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();

        let mut sub = dir.subscribe_registrations(&id).await.unwrap();
        assert!(sub.current().is_empty());

        dir.register_for_event(&id, form("Asha")).await.unwrap();

        let snapshot = sub.next_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].participant_name, "Asha");
    }

    #[tokio::test]
    async fn event_subscription_only_follows_its_category() {
        let (dir, _) = directory();
        let mut sub = dir.subscribe_events(Some(EventCategory::Technical)).await;
        assert!(sub.current().is_empty());

        dir.create_event(draft("Hackathon", EventCategory::Technical))
            .await
            .unwrap();
        dir.create_event(draft("Quiz", EventCategory::NonTechnical))
            .await
            .unwrap();

        let snapshot = sub.next_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "Hackathon");
        assert_eq!(snapshot[0].category, EventCategory::Technical);
    }

    #[tokio::test]
    async fn path_like_keys_are_treated_as_missing() {
        let (dir, _) = directory();
        assert!(dir.get_event("../messages").await.unwrap().is_none());
        assert!(matches!(
            dir.list_registrations("a/b").await,
            Err(RegistrationError::EventNotFound(_))
        ));
    }
}
