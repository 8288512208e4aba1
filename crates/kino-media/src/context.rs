//! State shared between the player, its loaders and the attached provider

use crate::{
    config::PlayerConfig,
    event::{EventBus, PlayerEvent, Trigger},
    store::MediaStore,
    tracks::{AudioTrackList, TextTrackList, VideoQualityList},
    Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Media context handed to loaders and providers
#[derive(Debug)]
pub struct MediaContext {
    pub config: PlayerConfig,
    pub store: MediaStore,
    pub events: EventBus,
    pub audio_tracks: AudioTrackList,
    pub text_tracks: TextTrackList,
    pub qualities: VideoQualityList,
    /// Last published `provider-change` carried a provider
    provider_announced: AtomicBool,
}

impl MediaContext {
    /// Context for a validated configuration
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PlayerConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let qualities = VideoQualityList::new(config.quality_switch);
        Self {
            config,
            store: MediaStore::new(),
            events,
            audio_tracks: AudioTrackList::new(),
            text_tracks: TextTrackList::new(),
            qualities,
            provider_announced: AtomicBool::new(false),
        }
    }

    /// True between a `provider-change(provider)` and the next `provider-change(None)`
    pub fn provider_announced(&self) -> bool {
        self.provider_announced.load(Ordering::SeqCst)
    }

    /// Update the store cell backing `event`, then publish it
    pub fn notify(&self, event: PlayerEvent, trigger: Option<&Trigger>) {
        match &event {
            PlayerEvent::SourceChange(source) => {
                self.store.source.set(source.clone());
            }
            PlayerEvent::SourcesChange(sources) => {
                self.store.sources.set(sources.clone());
            }
            PlayerEvent::MediaTypeChange(media_type) => {
                self.store.media_type.set(*media_type);
            }
            PlayerEvent::StreamTypeChange(stream_type) => {
                info!(%stream_type, "Stream type changed");
                self.store.stream_type.set(*stream_type);
            }
            PlayerEvent::DurationChange(duration) => {
                self.store.duration.set(*duration);
            }
            PlayerEvent::CanPlay => {
                self.store.can_play.set(true);
            }
            PlayerEvent::Error(error) => {
                self.store.error.set(Some(error.clone()));
            }
            PlayerEvent::ProviderChange(provider) => {
                self.provider_announced.store(provider.is_some(), Ordering::SeqCst);
            }
            PlayerEvent::ProviderLoaderChange(_) => {}
        }
        self.events.publish(event, trigger);
    }

    /// Empty every collection ahead of a new provider session
    pub fn reset_tracks(&self, trigger: Option<&Trigger>) {
        self.audio_tracks.reset(trigger);
        self.text_tracks.reset(trigger);
        self.qualities.reset(trigger);
    }
}

impl Default for MediaContext {
    fn default() -> Self {
        Self::build(PlayerConfig::default())
    }
}
