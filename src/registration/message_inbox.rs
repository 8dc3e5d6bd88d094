//! Contact message inbox
//! Structure: messages/{message_id}.json

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::registration::contact_message::{self, ContactForm, ContactMessage, MessageFilter};
use crate::registration::document_store::{read_all_json, read_json, write_json, DocumentStore};
use crate::registration::error::RegistrationError;
use crate::registration::form::is_document_key;
use crate::registration::subscription::{Change, ChangeFeed, Subscription};

const MESSAGES_ROOT: &str = "messages/";

#[derive(Clone)]
pub struct MessageInbox {
    store: Arc<dyn DocumentStore>,
    feed: ChangeFeed,
}

impl MessageInbox {
    pub fn new(store: Arc<dyn DocumentStore>, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    fn message_path(&self, message_id: &str) -> String {
        format!("{}{}.json", MESSAGES_ROOT, message_id)
    }

    pub async fn create_message(&self, form: ContactForm) -> Result<String, RegistrationError> {
        form.validate().map_err(RegistrationError::ValidationError)?;

        let message_id = Uuid::new_v4().to_string();
        let message = form.into_message(message_id.clone(), Utc::now());

        write_json(self.store.as_ref(), &self.message_path(&message_id), &message)
            .await
            .map_err(|e| {
                error!("Error sending message: {}", e);
                e
            })?;
        self.feed.publish(Change::Messages);

        info!(
            "New contact message from {} ({})",
            message.email,
            message.subject_label()
        );
        Ok(message_id)
    }

    pub async fn get_message(
        &self,
        message_id: &str,
    ) -> Result<Option<ContactMessage>, RegistrationError> {
        if !is_document_key(message_id) {
            return Ok(None);
        }
        let message: Option<ContactMessage> =
            read_json(self.store.as_ref(), &self.message_path(message_id)).await?;
        Ok(message.map(|mut message| {
            message.id = message_id.to_string();
            message
        }))
    }

    async fn require_message(&self, message_id: &str) -> Result<ContactMessage, RegistrationError> {
        self.get_message(message_id)
            .await?
            .ok_or_else(|| RegistrationError::MessageNotFound(message_id.to_string()))
    }

    /// Messages matching `filter`, newest first.
    pub async fn list_messages(
        &self,
        filter: MessageFilter,
    ) -> Result<Vec<ContactMessage>, RegistrationError> {
        let paths = self.store.list(MESSAGES_ROOT).await?;
        let messages: Vec<ContactMessage> = read_all_json(self.store.as_ref(), &paths).await;

        let mut messages: Vec<ContactMessage> = messages
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        contact_message::sort_newest_first(&mut messages);
        Ok(messages)
    }

    pub async fn unread_count(&self) -> Result<usize, RegistrationError> {
        Ok(self.list_messages(MessageFilter::Unread).await?.len())
    }

    pub async fn subscribe_messages(
        &self,
        filter: MessageFilter,
    ) -> Subscription<Vec<ContactMessage>> {
        let inbox = self.clone();

        Subscription::start(
            "Messages",
            &self.feed,
            |change| *change == Change::Messages,
            move || {
                let inbox = inbox.clone();
                async move { inbox.list_messages(filter).await }
            },
        )
        .await
    }

    pub async fn mark_message_read(&self, message_id: &str) -> Result<(), RegistrationError> {
        let mut message = self.require_message(message_id).await?;
        if message.read {
            return Ok(());
        }

        message.read = true;
        write_json(self.store.as_ref(), &self.message_path(message_id), &message)
            .await
            .map_err(|e| {
                error!("Error marking message read: {}", e);
                e
            })?;
        self.feed.publish(Change::Messages);
        Ok(())
    }

    /// Detail view: returns the message and marks it read on first open.
    pub async fn open_message(&self, message_id: &str) -> Result<ContactMessage, RegistrationError> {
        let mut message = self.require_message(message_id).await?;
        if !message.read {
            self.mark_message_read(message_id).await?;
            message.read = true;
        }
        Ok(message)
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<(), RegistrationError> {
        self.require_message(message_id).await?;

        self.store
            .remove(&self.message_path(message_id))
            .await
            .map_err(|e| {
                error!("Error deleting message: {}", e);
                e
            })?;
        self.feed.publish(Change::Messages);

        info!("Deleted message {}", message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::document_store::MemoryStore;

    fn inbox() -> MessageInbox {
        MessageInbox::new(Arc::new(MemoryStore::new()), ChangeFeed::new())
    }

    fn form(subject: &str) -> ContactForm {
        ContactForm {
            name: "Ravi".to_string(),
            email: "ravi@college.edu".to_string(),
            college: "Jeppiaar".to_string(),
            subject: subject.to_string(),
            message: "Is parking available?".to_string(),
        }
    }

    #[tokio::test]
    async fn new_messages_start_unread() {
        let inbox = inbox();
        let id = inbox.create_message(form("other")).await.unwrap();

        let message = inbox.get_message(&id).await.unwrap().unwrap();
        assert!(!message.read);
        assert_eq!(inbox.unread_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn opening_marks_read_once() {
        let inbox = inbox();
        let id = inbox.create_message(form("sponsorship")).await.unwrap();
        inbox.create_message(form("technical")).await.unwrap();

        let opened = inbox.open_message(&id).await.unwrap();
        assert!(opened.read);

        let read = inbox.list_messages(MessageFilter::Read).await.unwrap();
        let unread = inbox.list_messages(MessageFilter::Unread).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].id, id);
        assert_eq!(unread.len(), 1);
    }

    #[tokio::test]
    async fn deleted_message_is_gone() {
        let inbox = inbox();
        let id = inbox.create_message(form("registration")).await.unwrap();

        inbox.delete_message(&id).await.unwrap();

        assert!(inbox.get_message(&id).await.unwrap().is_none());
        assert!(matches!(
            inbox.delete_message(&id).await,
            Err(RegistrationError::MessageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscription_follows_read_state() {
        let inbox = inbox();
        let id = inbox.create_message(form("other")).await.unwrap();

        let mut unread = inbox.subscribe_messages(MessageFilter::Unread).await;
        assert_eq!(unread.current().len(), 1);

        inbox.mark_message_read(&id).await.unwrap();

        assert!(unread.next_snapshot().await.unwrap().is_empty());
    }
}
