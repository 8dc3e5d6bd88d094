pub mod api;
pub mod registration;
