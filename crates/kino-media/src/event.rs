//! Player notifications and event provenance
//!
//! Every notification may carry a [`Trigger`]: a chain of back-references to the
//! events that caused it, so consumers can find the origin of a change (for
//! example, whether a `source-change` came from a user action or a probe).

use crate::{
    loader::{Provider, ProviderLoader},
    types::*,
};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Upper bound on trigger chain walks
pub const MAX_TRIGGER_DEPTH: usize = 32;

/// Causality record attached to events
#[derive(Debug, Clone)]
pub struct Trigger(Arc<TriggerNode>);

#[derive(Debug)]
struct TriggerNode {
    name: Cow<'static, str>,
    caused_by: Option<Trigger>,
}

impl Trigger {
    /// A root trigger with no cause
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(Arc::new(TriggerNode {
            name: name.into(),
            caused_by: None,
        }))
    }

    /// A trigger caused by `cause` (if any)
    pub fn caused_by(name: impl Into<Cow<'static, str>>, cause: Option<&Trigger>) -> Self {
        Self(Arc::new(TriggerNode {
            name: name.into(),
            caused_by: cause.cloned(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn cause(&self) -> Option<&Trigger> {
        self.0.caused_by.as_ref()
    }

    /// This trigger followed by its causes, at most [`MAX_TRIGGER_DEPTH`] entries
    pub fn chain(&self) -> impl Iterator<Item = &Trigger> {
        std::iter::successors(Some(self), |&t| t.cause()).take(MAX_TRIGGER_DEPTH)
    }

    /// The earliest reachable cause
    pub fn origin(&self) -> &Trigger {
        self.chain().last().unwrap_or(self)
    }

    /// True if any trigger in the chain has the given name
    pub fn has(&self, name: &str) -> bool {
        self.chain().any(|t| t.name() == name)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.chain().map(Trigger::name).collect();
        write!(f, "{}", names.join(" <- "))
    }
}

/// Player-level events
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    SourceChange(Source),
    SourcesChange(Vec<Source>),
    MediaTypeChange(MediaType),
    /// `None` is the tear-down signal for the previous provider
    ProviderChange(Option<Arc<dyn Provider>>),
    ProviderLoaderChange(Option<Arc<dyn ProviderLoader>>),
    StreamTypeChange(StreamType),
    DurationChange(f64),
    CanPlay,
    Error(MediaError),
}

impl PlayerEvent {
    /// Event name as exposed to UI consumers
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::SourceChange(_) => "source-change",
            PlayerEvent::SourcesChange(_) => "sources-change",
            PlayerEvent::MediaTypeChange(_) => "media-type-change",
            PlayerEvent::ProviderChange(_) => "provider-change",
            PlayerEvent::ProviderLoaderChange(_) => "provider-loader-change",
            PlayerEvent::StreamTypeChange(_) => "stream-type-change",
            PlayerEvent::DurationChange(_) => "duration-change",
            PlayerEvent::CanPlay => "can-play",
            PlayerEvent::Error(_) => "error",
        }
    }
}

/// A published event with its provenance
#[derive(Debug, Clone)]
pub struct Notification {
    pub event: PlayerEvent,
    pub trigger: Option<Trigger>,
}

/// Broadcast channel for player notifications
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: PlayerEvent, trigger: Option<&Trigger>) {
        debug!(event = event.name(), trigger = ?trigger.map(|t| t.to_string()), "Notify");
        let _ = self.tx.send(Notification {
            event,
            trigger: trigger.cloned(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_origin() {
        let click = Trigger::new("click");
        let select = Trigger::caused_by("select", Some(&click));
        let change = Trigger::caused_by("change", Some(&select));

        assert_eq!(change.origin().name(), "click");
        assert!(change.has("select"));
        assert!(!change.has("keydown"));
        assert_eq!(change.to_string(), "change <- select <- click");
    }

    #[test]
    fn test_trigger_walk_is_bounded() {
        let mut trigger = Trigger::new("root");
        for i in 0..100 {
            trigger = Trigger::caused_by(format!("t{}", i), Some(&trigger));
        }
        assert_eq!(trigger.chain().count(), MAX_TRIGGER_DEPTH);
        assert_ne!(trigger.origin().name(), "root");
    }

    #[tokio::test]
    async fn test_event_bus_ordering() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(PlayerEvent::ProviderChange(None), None);
        bus.publish(PlayerEvent::ProviderLoaderChange(None), None);

        assert_eq!(rx.recv().await.unwrap().event.name(), "provider-change");
        assert_eq!(rx.recv().await.unwrap().event.name(), "provider-loader-change");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(PlayerEvent::CanPlay, None);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
