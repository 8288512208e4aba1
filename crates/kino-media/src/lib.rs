//! Kino Media - Provider resolution and track synchronization for Kino
//!
//! This crate decides which playback provider handles a set of sources and keeps
//! the player's track collections in step with whatever is playing:
//! - Source selection with HTTP type probing for unknown sources
//! - Provider load/swap with stale-load protection
//! - Audio, text and quality collections with single selection
//! - Adaptive engine (HLS/DASH) bridging, live edge tracking, DVR detection
//! - Remote (cast) track mirroring
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Media Player                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Source    │─►│   Provider   │─►│   Provider   │           │
//! │  │   Selector   │  │  Lifecycle   │  │ (html/hls/…) │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │    Media    │                              │
//! │                    │   Context   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │   Adaptive   │  │ Tracks and  │  │  Remote Cast │            │
//! │  │ Engine Bridge│◄►│  Qualities  │◄►│    Bridge    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod event;
pub mod store;
pub mod list;
pub mod tracks;
pub mod context;
pub mod loader;
pub mod source;
pub mod controller;
pub mod bridge;
pub mod player;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use types::*;
pub use config::PlayerConfig;
pub use event::{EventBus, Notification, PlayerEvent, Trigger};
pub use store::{MediaSnapshot, MediaStore, PlaybackDefaults, Signal};
pub use list::{ChangeSource, ListEvent, SelectList, Subscription};
pub use tracks::{AudioTrack, AudioTrackList, TextTrack, TextTrackList, VideoQuality, VideoQualityList};
pub use context::MediaContext;
pub use loader::{default_loaders, LoaderDeps, MediaElement, Provider, ProviderLoader};
pub use source::{HttpSourceProbe, ResolveOutcome, SourceProbe, SourceSelector};
pub use controller::{LoadState, ProviderLifecycleController};
pub use bridge::{AdaptiveEngine, AdaptiveEngineBridge, AdaptiveEngineFactory, EngineEvent, RemoteCastBridge, RemoteSession};
pub use player::{MediaPlayer, MediaPlayerBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the media library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Media initialized");
}
