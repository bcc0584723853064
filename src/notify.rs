//! Notifications - fire-and-forget user feedback for sync outcomes.
//!
//! Nothing here participates in store correctness. A notifier that drops
//! messages leaves the state machine unaffected.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    /// Event name used by emitter-backed notifiers.
    pub fn event_name(&self) -> &'static str {
        match self {
            Level::Success => "notification:success",
            Level::Error => "notification:error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub collection: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl Notification {
    pub fn success(collection: &str, message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            collection: collection.to_string(),
            message: message.into(),
            code: None,
            record_id: None,
        }
    }

    pub fn failure(collection: &str, error: &SyncError) -> Self {
        Self {
            level: Level::Error,
            collection: collection.to_string(),
            message: error.message.clone(),
            code: Some(error.code),
            record_id: None,
        }
    }

    pub fn for_record(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }
}

/// Receives user-visible feedback. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Success => log::info!(
                "[{}] {}",
                notification.collection,
                notification.message
            ),
            Level::Error => log::warn!(
                "[{}] {} ({})",
                notification.collection,
                notification.message,
                notification
                    .code
                    .map(|code| code.as_str())
                    .unwrap_or("unknown")
            ),
        }
    }
}

/// Collects notifications into a shared buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferNotifier {
    buffer: Arc<Mutex<Vec<Notification>>>,
}

impl BufferNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<Notification>>>) -> Self {
        Self { buffer }
    }

    /// Copy of everything received so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.level == Level::Error)
            .collect()
    }
}

impl Notifier for BufferNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(notification);
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

#[cfg(feature = "emitter")]
pub use emitter::EmitterNotifier;

#[cfg(feature = "emitter")]
mod emitter {
    use std::sync::Mutex;

    use event_emitter_rs::EventEmitter;

    use super::{Level, Notification, Notifier};

    /// Broadcasts notifications as JSON strings through an `EventEmitter`.
    ///
    /// Listeners run on the emitter's own threads.
    pub struct EmitterNotifier {
        emitter: Mutex<EventEmitter>,
    }

    impl Default for EmitterNotifier {
        fn default() -> Self {
            Self::new(EventEmitter::new())
        }
    }

    impl EmitterNotifier {
        pub fn new(emitter: EventEmitter) -> Self {
            Self {
                emitter: Mutex::new(emitter),
            }
        }

        /// Register a listener for one notification level.
        pub fn on<F>(&self, level: Level, listener: F)
        where
            F: Fn(String) + Send + Sync + 'static,
        {
            if let Ok(mut emitter) = self.emitter.lock() {
                emitter.on(level.event_name(), listener);
            }
        }
    }

    impl Notifier for EmitterNotifier {
        fn notify(&self, notification: Notification) {
            let payload = match serde_json::to_string(&notification) {
                Ok(payload) => payload,
                Err(err) => {
                    log::warn!("dropping notification: {}", err);
                    return;
                }
            };
            if let Ok(mut emitter) = self.emitter.lock() {
                emitter.emit(notification.level.event_name(), payload);
            }
        }
    }
}
