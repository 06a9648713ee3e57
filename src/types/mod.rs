//! Core domain types for the webhook relay.

pub mod ids;

pub use ids::{DeliveryId, EventType, FunctionName, RepoName, WebhookSecret};
