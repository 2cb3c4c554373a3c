//! Capabilities the timer calls out to
//!
//! Storage, the toolbar badge and reminder notifications are owned by the
//! host. The timer only sees the traits defined here; the host binary wires in
//! the file store and the logging implementations.

pub mod badge;
pub mod notifications;
pub mod storage;

// Re-export main types
pub use badge::{Badge, BadgeColor, LogBadge};
pub use notifications::{LogNotifier, Notification, NotificationKind, Notifier};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageArea, StorageChange};
