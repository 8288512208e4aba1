//! Observable media state
//!
//! Each field of [`MediaStore`] is a [`Signal`]: a value cell that UI code can
//! read, write and watch. Components that only need the current values take a
//! [`MediaSnapshot`] instead of subscribing.

use crate::types::*;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Observable value cell
#[derive(Debug)]
pub struct Signal<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> Signal<T> {
    pub fn new(value: T) -> Self {
        let (tx, _) = watch::channel(value);
        Self { tx }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Store a value; returns false (and wakes nobody) if it was unchanged
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Watch for changes
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + PartialEq + Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Mute, volume and inline state applied to every new provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackDefaults {
    pub muted: bool,
    pub volume: f64,
    pub plays_inline: bool,
}

/// Plain copy of the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSnapshot {
    pub source: Source,
    pub sources: Vec<Source>,
    pub media_type: MediaType,
    pub stream_type: StreamType,
    pub declared_stream_type: StreamType,
    pub duration: f64,
    pub can_play: bool,
    pub muted: bool,
    pub volume: f64,
    pub plays_inline: bool,
    pub current_time: f64,
    pub live_sync_position: f64,
    pub error: Option<MediaError>,
}

/// Observable player state
#[derive(Debug)]
pub struct MediaStore {
    pub source: Signal<Source>,
    pub sources: Signal<Vec<Source>>,
    pub media_type: Signal<MediaType>,
    /// Classification reported by the engine for the current session
    pub stream_type: Signal<StreamType>,
    /// Classification declared by the host; survives session resets and
    /// takes precedence over the engine's when known
    pub declared_stream_type: Signal<StreamType>,
    pub duration: Signal<f64>,
    pub can_play: Signal<bool>,
    pub muted: Signal<bool>,
    pub volume: Signal<f64>,
    pub plays_inline: Signal<bool>,
    pub current_time: Signal<f64>,
    /// Live edge position reported by the adaptive engine; infinite when unknown
    pub live_sync_position: Signal<f64>,
    pub error: Signal<Option<MediaError>>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self {
            source: Signal::default(),
            sources: Signal::default(),
            media_type: Signal::default(),
            stream_type: Signal::default(),
            declared_stream_type: Signal::default(),
            duration: Signal::new(f64::NAN),
            can_play: Signal::new(false),
            muted: Signal::new(false),
            volume: Signal::new(1.0),
            plays_inline: Signal::new(false),
            current_time: Signal::new(0.0),
            live_sync_position: Signal::new(f64::INFINITY),
            error: Signal::default(),
        }
    }

    pub fn snapshot(&self) -> MediaSnapshot {
        MediaSnapshot {
            source: self.source.get(),
            sources: self.sources.get(),
            media_type: self.media_type.get(),
            stream_type: self.stream_type.get(),
            declared_stream_type: self.declared_stream_type.get(),
            duration: self.duration.get(),
            can_play: self.can_play.get(),
            muted: self.muted.get(),
            volume: self.volume.get(),
            plays_inline: self.plays_inline.get(),
            current_time: self.current_time.get(),
            live_sync_position: self.live_sync_position.get(),
            error: self.error.get(),
        }
    }

    pub fn playback_defaults(&self) -> PlaybackDefaults {
        PlaybackDefaults {
            muted: self.muted.get(),
            volume: self.volume.get(),
            plays_inline: self.plays_inline.get(),
        }
    }

    /// Declared stream type if known, otherwise the current classification
    pub fn effective_stream_type(&self) -> StreamType {
        match self.declared_stream_type.get() {
            StreamType::Unknown => self.stream_type.get(),
            declared => declared,
        }
    }

    /// Distance between the current time and the live edge, infinite when unknown
    pub fn live_edge_distance(&self) -> f64 {
        let edge = self.live_sync_position.get();
        if edge.is_finite() {
            (edge - self.current_time.get()).max(0.0)
        } else {
            f64::INFINITY
        }
    }

    /// Clear per-session state ahead of a new provider
    pub fn reset_session(&self) {
        self.stream_type.set(StreamType::Unknown);
        self.duration.set(f64::NAN);
        self.can_play.set(false);
        self.current_time.set(0.0);
        self.live_sync_position.set(f64::INFINITY);
        self.error.set(None);
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new()
    }
}
