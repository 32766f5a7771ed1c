//! Background task handlers.
//!
//! Each hook runs as its own task when the host raises its trigger:
//! deferred sync on connectivity restoration, scheduled sync on a
//! host-managed interval, push on inbound delivery, and the interaction
//! callback when the user acts on a shown notification. None of them may
//! let a failure escape the task that raised it.

pub mod deferred_sync;
pub mod interaction;
pub mod push;
pub mod scheduled_sync;

pub use deferred_sync::DeferredSyncHandler;
pub use interaction::InteractionHandler;
pub use push::PushHandler;
pub use scheduled_sync::ScheduledSyncHandler;

/// Notification body used when a trigger carries no text of its own.
pub(crate) const NEW_CONTENT_BODY: &str = "New content available!";
