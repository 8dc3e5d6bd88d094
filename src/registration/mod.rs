//! Symposium event registration backed by Firebase

pub mod auth;
pub mod config;
pub mod contact_message;
pub mod csv_export;
pub mod document_store;
pub mod error;
pub mod event_directory;
pub mod event_info;
mod form;
pub mod image_storage;
pub mod message_inbox;
pub mod participant;
pub mod subscription;

pub use auth::{AdminAllowList, AdminAuth, AuthChange, AuthUser, FirebaseAuth, IdentityProvider};
pub use config::{RegistrationConfig, StorageBackend};
pub use contact_message::{ContactForm, ContactMessage, MessageFilter};
pub use document_store::{BucketStore, DocumentStore, MemoryStore};
pub use error::RegistrationError;
pub use event_directory::{DashboardStats, EventDirectory};
pub use event_info::{Coordinator, EventCategory, EventDraft, EventFilter, EventInfo, EventPatch};
pub use image_storage::ImageStorage;
pub use message_inbox::MessageInbox;
pub use participant::{Registration, RegistrationForm};
pub use subscription::{Change, ChangeFeed, Subscription};
