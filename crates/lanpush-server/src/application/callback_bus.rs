//! CallbackBus: hands decoded payloads to the presentation layer.
//!
//! The presentation layer (a tray app, a GUI, or the `lanpush serve` console
//! output) subscribes by channel name.  The server never depends on any UI
//! type; it only calls whatever handler is registered.
//!
//! | Channel   | Event                                  |
//! |-----------|----------------------------------------|
//! | `message` | [`ChannelEvent::Message`] (kind, content) |
//! | `file`    | [`ChannelEvent::File`] ([`StoredFile`]) |
//!
//! Each channel holds at most one handler; registering again replaces it.
//! Dispatch with no handler registered drops the event: this is not a queue.
//!
//! # Threading
//!
//! Handlers run on the router's dispatch thread (a tokio blocking-pool
//! thread).  A consumer with thread affinity, such as a GUI event loop, must
//! forward the event to its own thread itself.

use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use lanpush_core::StoredFile;
use serde_json::Value;
use thiserror::Error;

/// Programmer error raised while wiring callbacks at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The channel name is not one of `message` or `file`.
    #[error("unknown callback channel {0:?}; expected \"message\" or \"file\"")]
    UnknownChannel(String),
}

/// A logical delivery target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Message,
    File,
}

impl Channel {
    /// Returns the channel name used for registration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::File => "file",
        }
    }
}

impl FromStr for Channel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "file" => Ok(Self::File),
            other => Err(ConfigurationError::UnknownChannel(other.to_string())),
        }
    }
}

/// An event delivered to a channel handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A decoded `message` frame.
    Message { kind: String, content: Value },
    /// A file that has been written to disk.
    File(StoredFile),
}

impl ChannelEvent {
    /// Returns the channel this event is delivered on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Message { .. } => Channel::Message,
            Self::File(_) => Channel::File,
        }
    }
}

/// A registered channel handler.
pub type Handler = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Single-slot-per-channel handler registry.
#[derive(Default)]
pub struct CallbackBus {
    message: RwLock<Option<Handler>>,
    file: RwLock<Option<Handler>>,
}

impl CallbackBus {
    /// Creates a bus with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for the channel named `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownChannel`] if `channel` is not
    /// `message` or `file`.  Existing registrations are left untouched.
    pub fn register<F>(&self, channel: &str, handler: F) -> Result<(), ConfigurationError>
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        let channel: Channel = channel.parse()?;
        self.register_channel(channel, handler);
        Ok(())
    }

    /// Registers `handler` for a known channel, replacing any previous one.
    pub fn register_channel<F>(&self, channel: Channel, handler: F)
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        let mut slot = self.slot(channel).write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// Registers a `message` handler receiving `(kind, content)`.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.register_channel(Channel::Message, move |event| {
            if let ChannelEvent::Message { kind, content } = event {
                handler(&kind, &content);
            }
        });
    }

    /// Registers a `file` handler receiving the stored file's metadata.
    pub fn on_file<F>(&self, handler: F)
    where
        F: Fn(&StoredFile) + Send + Sync + 'static,
    {
        self.register_channel(Channel::File, move |event| {
            if let ChannelEvent::File(stored) = event {
                handler(&stored);
            }
        });
    }

    /// Returns `true` if a handler is registered for `channel`.
    pub fn is_registered(&self, channel: Channel) -> bool {
        self.slot(channel)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Delivers `event` to its channel's handler.
    ///
    /// Returns `true` if a handler ran, `false` if the event was dropped.
    pub fn dispatch(&self, event: ChannelEvent) -> bool {
        // Clone the handler out so the lock is released before it runs; a
        // handler may itself call `register`.
        let handler = self
            .slot(event.channel())
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    fn slot(&self, channel: Channel) -> &RwLock<Option<Handler>> {
        match channel {
            Channel::Message => &self.message,
            Channel::File => &self.file,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
