//! Adaptive engine bridge
//!
//! Keeps one external adaptive streaming engine (HLS or DASH) and the track
//! collections in step:
//!
//! ```text
//!   engine events ──► handle_event ──► select_internal / notify
//!                                            │ (ChangeSource::Internal)
//!                                            ▼
//!   UI select ──► collections ──► change (ChangeSource::User) ──► engine commands
//! ```
//!
//! Outgoing handlers only react to user-sourced changes, so engine-driven
//! selection is never echoed back as a command.

pub mod cast;
pub mod live;

pub use cast::{RemoteCastBridge, RemoteSession, RemoteTrack, RemoteTrackType};
pub use live::LiveSyncLoop;

use crate::{
    context::MediaContext,
    event::{PlayerEvent, Trigger},
    list::{ChangeSource, ListEvent, Subscription},
    loader::MediaElement,
    tracks::{AudioTrack, EnableAuto, TextTrack, VideoQuality},
    types::{MediaError, QualitySwitch, StreamType, TextCue, TextTrackKind, TextTrackMode},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Rendition as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineLevel {
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
    pub codec_set: Option<String>,
}

/// Audio rendition as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineAudioTrack {
    pub id: usize,
    pub name: String,
    pub lang: String,
    pub default: bool,
}

/// Subtitle rendition as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineTextTrack {
    pub name: String,
    pub lang: String,
    pub kind: TextTrackKind,
    pub default: bool,
}

/// Playlist type reported for live streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaylistKind {
    Event,
    Vod,
}

/// Details of a loaded level playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDetails {
    pub live: bool,
    pub playlist: Option<PlaylistKind>,
    /// Seconds
    pub total_duration: f64,
    /// Seconds
    pub target_duration: f64,
    pub low_latency: bool,
}

/// Engine error class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineErrorKind {
    Network,
    Media,
    Other,
}

impl std::fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineErrorKind::Network => write!(f, "network"),
            EngineErrorKind::Media => write!(f, "media"),
            EngineErrorKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub details: String,
    pub fatal: bool,
}

/// Native engine events
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    LevelLoaded(LevelDetails),
    LevelSwitched { level: usize },
    AudioTrackSwitched { index: usize },
    SubtitleTracksUpdated(Vec<EngineTextTrack>),
    SubtitleTrackSwitched { index: Option<usize> },
    CuesParsed { track: usize, cues: Vec<TextCue> },
    Error(EngineError),
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::LevelLoaded(_) => "level-loaded",
            EngineEvent::LevelSwitched { .. } => "level-switched",
            EngineEvent::AudioTrackSwitched { .. } => "audio-track-switched",
            EngineEvent::SubtitleTracksUpdated(_) => "subtitle-tracks-updated",
            EngineEvent::SubtitleTrackSwitched { .. } => "subtitle-track-switched",
            EngineEvent::CuesParsed { .. } => "cues-parsed",
            EngineEvent::Error(_) => "engine-error",
        }
    }
}

/// Channel the engine reports its events on
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Handle to an external adaptive engine instance.
///
/// Level indexes use `None` for the engine's "automatic" sentinel.
pub trait AdaptiveEngine: Debug + Send + Sync {
    fn attach_media(&self, target: Arc<dyn MediaElement>) -> Result<()>;

    fn load_source(&self, src: &str) -> Result<()>;

    fn levels(&self) -> Vec<EngineLevel>;

    fn audio_tracks(&self) -> Vec<EngineAudioTrack>;

    fn current_level(&self) -> Option<usize>;

    fn set_current_level(&self, level: Option<usize>);

    fn set_next_level(&self, level: Option<usize>);

    fn set_load_level(&self, level: Option<usize>);

    /// Starting hint for the bitrate controller
    fn set_next_auto_level(&self, level: usize);

    fn audio_track(&self) -> Option<usize>;

    fn set_audio_track(&self, index: usize);

    /// `None` disables subtitles
    fn set_subtitle_track(&self, index: Option<usize>);

    fn live_sync_position(&self) -> Option<f64>;

    fn start_load(&self);

    fn recover_media_error(&self);

    fn destroy(&self);
}

/// Builds engine instances; one factory per engine library
pub trait AdaptiveEngineFactory: Debug + Send + Sync {
    /// Short engine name, used in track ids ("hls", "dash")
    fn name(&self) -> &'static str;

    /// False when the engine cannot run in this environment
    fn is_supported(&self) -> bool;

    fn create(&self, config: Value, events: EngineEventSender) -> Result<Arc<dyn AdaptiveEngine>>;
}

/// Bidirectional synchronization between one engine instance and the context
pub struct AdaptiveEngineBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    ctx: Arc<MediaContext>,
    factory: Arc<dyn AdaptiveEngineFactory>,
    target: Arc<dyn MediaElement>,
    engine: Mutex<Option<Arc<dyn AdaptiveEngine>>>,
    live: Mutex<Option<LiveSyncLoop>>,
    /// Engine subtitle index -> internal text track id
    text_ids: Mutex<HashMap<usize, String>>,
    /// Subtitle index the engine is currently rendering
    active_subtitle: Mutex<Option<usize>>,
    subscriptions: Mutex<Vec<Subscription>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl AdaptiveEngineBridge {
    pub fn new(
        ctx: Arc<MediaContext>,
        factory: Arc<dyn AdaptiveEngineFactory>,
        target: Arc<dyn MediaElement>,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                ctx,
                factory,
                target,
                engine: Mutex::new(None),
                live: Mutex::new(None),
                text_ids: Mutex::new(HashMap::new()),
                active_subtitle: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
                pump: Mutex::new(None),
            }),
        }
    }

    pub fn engine(&self) -> Option<Arc<dyn AdaptiveEngine>> {
        self.inner.engine()
    }

    pub fn engine_name(&self) -> &'static str {
        self.inner.factory.name()
    }

    /// Engine configuration for the current stream classification
    pub fn engine_config(&self) -> Value {
        self.inner.engine_config()
    }

    /// Create the engine, wire both sync directions and attach media
    #[instrument(skip(self), fields(engine = self.inner.factory.name()))]
    pub fn setup(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.engine().is_some() {
            return Ok(());
        }

        // Listeners are in place (the channel) before media is attached
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = inner.factory.create(inner.engine_config(), tx)?;
        *lock(&inner.engine) = Some(engine.clone());

        let weak = Arc::downgrade(inner);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.handle_event(event);
            }
        });
        if let Some(previous) = lock(&inner.pump).replace(pump) {
            previous.abort();
        }

        engine.attach_media(inner.target.clone())?;

        inner.ctx.qualities.set_enable_auto(Some(BridgeInner::enable_auto_hook(inner)));
        inner.subscribe_outgoing();

        info!("Adaptive engine attached");
        Ok(())
    }

    /// Start a new session on the attached engine.
    ///
    /// Per-session bridge state is cleared first, so the next level-loaded
    /// event populates the collections again.
    pub fn load_source(&self, src: &str) -> Result<()> {
        let engine = self
            .engine()
            .ok_or_else(|| Error::EngineUnavailable(self.engine_name().to_string()))?;
        self.inner.begin_session();
        engine.load_source(src)
    }

    /// Apply one engine event; events normally arrive through the pump task
    pub fn handle_event(&self, event: EngineEvent) {
        self.inner.handle_event(event);
    }

    /// True while the live-edge loop runs
    pub fn is_live_syncing(&self) -> bool {
        lock(&self.inner.live).is_some()
    }

    /// Uninstall hooks, destroy the engine and clear per-session state
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl Debug for AdaptiveEngineBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveEngineBridge")
            .field("engine", &self.inner.factory.name())
            .field("attached", &self.inner.engine().is_some())
            .finish()
    }
}

impl Drop for AdaptiveEngineBridge {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl BridgeInner {
    fn engine(&self) -> Option<Arc<dyn AdaptiveEngine>> {
        lock(&self.engine).clone()
    }

    fn engine_config(&self) -> Value {
        let config = &self.ctx.config;
        let stream_type = self.ctx.store.effective_stream_type();

        let mut derived = json!({ "lowLatencyMode": stream_type.is_low_latency() });
        if stream_type.is_low_latency() {
            derived["backBufferLength"] = json!(config.low_latency_back_buffer);
        } else if stream_type.is_live() {
            derived["backBufferLength"] = json!(config.live_back_buffer);
        }

        if let Value::Object(map) = &mut derived {
            for (key, value) in &config.engine {
                map.insert(key.clone(), value.clone());
            }
        }
        derived
    }

    fn enable_auto_hook(this: &Arc<Self>) -> EnableAuto {
        let weak: Weak<Self> = Arc::downgrade(this);
        Arc::new(move |_trigger: Option<&Trigger>| {
            let Some(inner) = weak.upgrade() else { return };
            let Some(engine) = inner.engine() else { return };
            engine.set_current_level(None);
            if let Some(index) = inner.ctx.qualities.selected_index() {
                engine.set_next_auto_level(index);
            }
            debug!("Engine switched to automatic level selection");
        })
    }

    fn subscribe_outgoing(self: &Arc<Self>) {
        let mut subscriptions = Vec::with_capacity(2);

        let weak = Arc::downgrade(self);
        subscriptions.push(self.ctx.qualities.subscribe(move |event| {
            if let ListEvent::Change {
                current: Some(quality),
                source: ChangeSource::User,
                ..
            } = event
            {
                if let Some(inner) = weak.upgrade() {
                    inner.on_quality_selected(quality);
                }
            }
        }));

        let weak = Arc::downgrade(self);
        subscriptions.push(self.ctx.audio_tracks.subscribe(move |event| {
            if let ListEvent::Change {
                current: Some(track),
                source: ChangeSource::User,
                ..
            } = event
            {
                if let Some(inner) = weak.upgrade() {
                    inner.on_audio_track_selected(track);
                }
            }
        }));

        *lock(&self.subscriptions) = subscriptions;
    }

    fn on_quality_selected(&self, quality: &Arc<VideoQuality>) {
        let qualities = &self.ctx.qualities;
        if qualities.auto() {
            return;
        }
        let (Some(engine), Some(index)) = (self.engine(), qualities.index_of(quality)) else {
            return;
        };

        let policy = qualities.switch_policy();
        debug!(level = index, %policy, "Switching engine level");
        match policy {
            QualitySwitch::Current => engine.set_current_level(Some(index)),
            QualitySwitch::Next => engine.set_next_level(Some(index)),
            QualitySwitch::Load => engine.set_load_level(Some(index)),
        }

        if self.ctx.config.nudge_after_quality_switch {
            // Forces keyframe re-evaluation on engines that stall after a switch
            self.target.set_current_time(self.target.current_time());
        }
    }

    fn on_audio_track_selected(&self, track: &Arc<AudioTrack>) {
        let (Some(engine), Some(index)) = (self.engine(), self.ctx.audio_tracks.index_of(track))
        else {
            return;
        };
        debug!(index, "Switching engine audio track");
        engine.set_audio_track(index);
    }

    fn handle_event(self: &Arc<Self>, event: EngineEvent) {
        let trigger = Trigger::new(event.name());
        match event {
            EngineEvent::LevelLoaded(details) => self.on_level_loaded(&details, &trigger),
            EngineEvent::LevelSwitched { level } => {
                if let Some(quality) = self.ctx.qualities.get(level) {
                    self.ctx.qualities.select_internal(&quality, true, Some(&trigger));
                }
            }
            EngineEvent::AudioTrackSwitched { index } => {
                if let Some(track) = self.ctx.audio_tracks.get(index) {
                    self.ctx.audio_tracks.select_internal(&track, true, Some(&trigger));
                }
            }
            EngineEvent::SubtitleTracksUpdated(tracks) => self.on_text_tracks(tracks, &trigger),
            EngineEvent::SubtitleTrackSwitched { index } => self.on_subtitle_switched(index, &trigger),
            EngineEvent::CuesParsed { track, cues } => {
                let id = lock(&self.text_ids).get(&track).cloned();
                if let Some(text_track) = id.and_then(|id| self.ctx.text_tracks.get_by_id(&id)) {
                    for cue in cues {
                        text_track.add_cue(cue);
                    }
                }
            }
            EngineEvent::Error(err) => self.on_error(err, &trigger),
        }
    }

    fn on_level_loaded(self: &Arc<Self>, details: &LevelDetails, trigger: &Trigger) {
        let ctx = &self.ctx;
        if ctx.store.can_play.get() {
            return;
        }
        let Some(engine) = self.engine() else { return };
        let name = self.factory.name();

        for track in engine.audio_tracks() {
            let kind = if track.default { "main" } else { "alternative" };
            let audio = AudioTrack::new(format!("{}-audio-{}", name, track.id), track.name, track.lang, kind);
            ctx.audio_tracks.add(Arc::new(audio), Some(trigger));
        }
        if let Some(track) = engine.audio_track().and_then(|i| ctx.audio_tracks.get(i)) {
            ctx.audio_tracks.select_internal(&track, true, Some(trigger));
        }

        for (i, level) in engine.levels().into_iter().enumerate() {
            let mut quality = VideoQuality::new(format!("{}-level-{}", name, i), level.width, level.height, level.bitrate);
            quality.codec = level.codec_set;
            ctx.qualities.add(Arc::new(quality), Some(trigger));
        }

        let stream_type = match ctx.store.declared_stream_type.get() {
            StreamType::Unknown => self.classify(details),
            declared => declared,
        };
        let duration = if stream_type.is_live() && !stream_type.has_dvr() {
            f64::INFINITY
        } else {
            details.total_duration
        };
        ctx.notify(PlayerEvent::StreamTypeChange(stream_type), Some(trigger));
        ctx.notify(PlayerEvent::DurationChange(duration), Some(trigger));

        match engine.current_level() {
            None => ctx.qualities.set_auto(true, Some(trigger)),
            Some(level) => {
                if let Some(quality) = ctx.qualities.get(level) {
                    ctx.qualities.select_internal(&quality, true, Some(trigger));
                }
            }
        }

        if stream_type.is_live() {
            self.start_live_sync();
        } else {
            self.stop_live_sync();
        }

        info!(
            %stream_type,
            levels = ctx.qualities.len(),
            audio_tracks = ctx.audio_tracks.len(),
            "Engine levels loaded"
        );
        ctx.notify(PlayerEvent::CanPlay, Some(trigger));
    }

    fn classify(&self, details: &LevelDetails) -> StreamType {
        if !details.live {
            return StreamType::OnDemand;
        }
        let dvr = details.playlist == Some(PlaylistKind::Event)
            && details.total_duration.is_finite()
            && details.target_duration >= self.ctx.config.dvr_min_target_duration;
        match (details.low_latency, dvr) {
            (true, true) => StreamType::LowLatencyLiveDvr,
            (true, false) => StreamType::LowLatencyLive,
            (false, true) => StreamType::LiveDvr,
            (false, false) => StreamType::Live,
        }
    }

    fn on_text_tracks(self: &Arc<Self>, tracks: Vec<EngineTextTrack>, trigger: &Trigger) {
        let ctx = &self.ctx;
        let name = self.factory.name();

        let stale: Vec<(usize, String)> = lock(&self.text_ids)
            .iter()
            .filter(|(index, _)| **index >= tracks.len())
            .map(|(index, id)| (*index, id.clone()))
            .collect();
        for (index, id) in stale {
            lock(&self.text_ids).remove(&index);
            if let Some(track) = ctx.text_tracks.get_by_id(&id) {
                ctx.text_tracks.remove(&track, Some(trigger));
            }
        }

        for (index, engine_track) in tracks.into_iter().enumerate() {
            if lock(&self.text_ids).contains_key(&index) {
                continue;
            }
            let id = format!("{}-{}-{}", name, engine_track.kind, index);
            let track = Arc::new(
                TextTrack::new(id.clone(), engine_track.kind, engine_track.name, engine_track.lang)
                    .with_default(engine_track.default),
            );
            track.set_mode_change_hook(Some(self.mode_change_hook(index)));
            lock(&self.text_ids).insert(index, id);
            ctx.text_tracks.add(track, Some(trigger));
        }
    }

    /// The only path from caption selection to the engine's subtitle track
    fn mode_change_hook(self: &Arc<Self>, index: usize) -> crate::tracks::ModeChangeHook {
        let weak = Arc::downgrade(self);
        Arc::new(move |track: &TextTrack| {
            let Some(inner) = weak.upgrade() else { return };
            let Some(engine) = inner.engine() else { return };
            let command = {
                let mut active = lock(&inner.active_subtitle);
                match track.mode() {
                    TextTrackMode::Showing if *active != Some(index) => {
                        *active = Some(index);
                        Some(Some(index))
                    }
                    TextTrackMode::Disabled | TextTrackMode::Hidden if *active == Some(index) => {
                        *active = None;
                        Some(None)
                    }
                    _ => None,
                }
            };
            if let Some(subtitle) = command {
                debug!(?subtitle, "Switching engine subtitle track");
                engine.set_subtitle_track(subtitle);
            }
        })
    }

    fn on_subtitle_switched(&self, index: Option<usize>, trigger: &Trigger) {
        let previous = std::mem::replace(&mut *lock(&self.active_subtitle), index);
        if previous == index {
            return;
        }
        let text_ids = lock(&self.text_ids).clone();
        let find = |i: Option<usize>| {
            i.and_then(|i| text_ids.get(&i))
                .and_then(|id| self.ctx.text_tracks.get_by_id(id))
        };
        match find(index) {
            Some(track) => {
                self.ctx
                    .text_tracks
                    .set_mode_internal(&track, TextTrackMode::Showing, Some(trigger));
            }
            None => {
                if let Some(track) = find(previous) {
                    self.ctx
                        .text_tracks
                        .set_mode_internal(&track, TextTrackMode::Disabled, Some(trigger));
                }
            }
        }
    }

    fn on_error(&self, err: EngineError, trigger: &Trigger) {
        if !err.fatal {
            warn!(kind = %err.kind, details = %err.details, "Non-fatal engine error");
            return;
        }
        let Some(engine) = self.engine() else { return };
        match err.kind {
            EngineErrorKind::Network => {
                warn!(details = %err.details, "Fatal network error, restarting load");
                engine.start_load();
            }
            EngineErrorKind::Media => {
                warn!(details = %err.details, "Fatal media error, recovering");
                engine.recover_media_error();
            }
            EngineErrorKind::Other => {
                error!(details = %err.details, "Unrecoverable engine error");
                self.stop_live_sync();
                if let Some(engine) = lock(&self.engine).take() {
                    engine.destroy();
                }
                let failure = Error::Engine {
                    kind: err.kind.to_string(),
                    details: err.details,
                    fatal: true,
                };
                self.ctx
                    .notify(PlayerEvent::Error(MediaError::from(&failure)), Some(trigger));
            }
        }
    }

    fn start_live_sync(self: &Arc<Self>) {
        let mut live = lock(&self.live);
        if live.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        *live = Some(LiveSyncLoop::start(
            self.ctx.config.live_sync_interval(),
            self.ctx.clone(),
            move || {
                weak.upgrade()
                    .and_then(|inner| inner.engine())
                    .and_then(|engine| engine.live_sync_position())
            },
        ));
    }

    fn stop_live_sync(&self) {
        if let Some(live) = lock(&self.live).take() {
            live.stop();
        }
    }

    fn begin_session(self: &Arc<Self>) {
        self.stop_live_sync();
        self.detach_text_tracks();
        self.ctx.qualities.set_enable_auto(Some(Self::enable_auto_hook(self)));
    }

    fn detach_text_tracks(&self) {
        let text_ids: Vec<String> = lock(&self.text_ids).drain().map(|(_, id)| id).collect();
        for id in text_ids {
            if let Some(track) = self.ctx.text_tracks.get_by_id(&id) {
                track.set_mode_change_hook(None);
            }
        }
        *lock(&self.active_subtitle) = None;
    }

    fn teardown(&self) {
        self.ctx.qualities.set_enable_auto(None);
        lock(&self.subscriptions).clear();
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
        if let Some(engine) = lock(&self.engine).take() {
            engine.destroy();
            info!(engine = self.factory.name(), "Adaptive engine destroyed");
        }
        self.stop_live_sync();
        self.detach_text_tracks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeElement, FakeEngineFactory};
    use std::time::Duration;

    fn bridge_with(ctx: Arc<MediaContext>) -> (AdaptiveEngineBridge, Arc<FakeEngineFactory>) {
        let factory = Arc::new(FakeEngineFactory::with_ladder(&[360, 720, 1080]));
        let bridge = AdaptiveEngineBridge::new(ctx, factory.clone(), Arc::new(FakeElement::default()));
        bridge.setup().unwrap();
        (bridge, factory)
    }

    fn vod() -> LevelDetails {
        LevelDetails {
            live: false,
            playlist: Some(PlaylistKind::Vod),
            total_duration: 120.0,
            target_duration: 6.0,
            low_latency: false,
        }
    }

    #[tokio::test]
    async fn test_level_loaded_populates_collections() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, _) = bridge_with(ctx.clone());

        bridge.handle_event(EngineEvent::LevelLoaded(vod()));

        assert_eq!(ctx.qualities.len(), 3);
        assert_eq!(ctx.audio_tracks.len(), 2);
        assert!(ctx.qualities.auto());
        assert_eq!(ctx.store.stream_type.get(), StreamType::OnDemand);
        assert_eq!(ctx.store.duration.get(), 120.0);
        assert!(ctx.store.can_play.get());
        assert!(!bridge.is_live_syncing());
    }

    fn live(playlist: Option<PlaylistKind>, target_duration: f64, low_latency: bool) -> LevelDetails {
        LevelDetails {
            live: true,
            playlist,
            total_duration: 600.0,
            target_duration,
            low_latency,
        }
    }

    /// Stream type, duration and live-sync state after one level-loaded event
    fn loaded(details: LevelDetails) -> (StreamType, f64, bool) {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, _) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::LevelLoaded(details));
        (ctx.store.stream_type.get(), ctx.store.duration.get(), bridge.is_live_syncing())
    }

    #[tokio::test]
    async fn test_live_streams_are_classified() {
        assert_eq!(loaded(live(None, 6.0, false)), (StreamType::Live, f64::INFINITY, true));
        assert_eq!(
            loaded(live(Some(PlaylistKind::Event), 10.0, false)),
            (StreamType::LiveDvr, 600.0, true)
        );
        assert_eq!(
            loaded(live(Some(PlaylistKind::Event), 9.5, false)).0,
            StreamType::Live
        );
        assert_eq!(
            loaded(live(Some(PlaylistKind::Vod), 10.0, false)).0,
            StreamType::Live
        );
        assert_eq!(
            loaded(live(None, 2.0, true)),
            (StreamType::LowLatencyLive, f64::INFINITY, true)
        );
        assert_eq!(
            loaded(live(Some(PlaylistKind::Event), 12.0, true)),
            (StreamType::LowLatencyLiveDvr, 600.0, true)
        );
    }

    #[tokio::test]
    async fn test_declared_stream_type_wins_over_classification() {
        let ctx = Arc::new(MediaContext::default());
        ctx.store.declared_stream_type.set(StreamType::LiveDvr);
        let (bridge, _) = bridge_with(ctx.clone());

        bridge.handle_event(EngineEvent::LevelLoaded(vod()));

        assert_eq!(ctx.store.stream_type.get(), StreamType::LiveDvr);
        assert_eq!(ctx.store.duration.get(), 120.0);
        assert!(bridge.is_live_syncing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_sync_tracks_engine_edge_until_teardown() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        let engine = factory.last_engine().unwrap();
        engine.set_live_edge(Some(42.0));

        bridge.handle_event(EngineEvent::LevelLoaded(live(None, 6.0, false)));
        assert!(bridge.is_live_syncing());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ctx.store.live_sync_position.get(), 42.0);

        engine.set_live_edge(Some(48.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ctx.store.live_sync_position.get(), 48.0);

        bridge.teardown();
        assert!(!bridge.is_live_syncing());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ctx.store.live_sync_position.get(), f64::INFINITY);
    }

    #[tokio::test]
    async fn test_new_source_starts_new_session() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        bridge.load_source("a.m3u8").unwrap();
        bridge.handle_event(EngineEvent::LevelLoaded(live(None, 6.0, false)));
        assert!(bridge.is_live_syncing());

        ctx.store.reset_session();
        ctx.reset_tracks(None);
        bridge.load_source("b.m3u8").unwrap();
        assert!(!bridge.is_live_syncing());
        assert!(ctx.qualities.can_auto_select());

        bridge.handle_event(EngineEvent::LevelLoaded(vod()));
        assert_eq!(ctx.qualities.len(), 3);
        assert_eq!(ctx.store.stream_type.get(), StreamType::OnDemand);
        assert_eq!(
            factory.last_engine().unwrap().commands(),
            vec!["load:a.m3u8", "load:b.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_level_loaded_only_populates_once() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, _) = bridge_with(ctx.clone());

        bridge.handle_event(EngineEvent::LevelLoaded(vod()));
        bridge.handle_event(EngineEvent::LevelLoaded(vod()));

        assert_eq!(ctx.qualities.len(), 3);
    }

    #[tokio::test]
    async fn test_level_switch_is_not_echoed() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::LevelLoaded(vod()));
        ctx.qualities.set_auto(false, None);
        let engine = factory.last_engine().unwrap();
        engine.clear_commands();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let _sub = ctx.qualities.subscribe(move |event| {
            if let ListEvent::Change { prev, current, .. } = event {
                sink.lock().unwrap().push((prev.is_none(), current.as_ref().map(|q| q.height)));
            }
        });

        bridge.handle_event(EngineEvent::LevelSwitched { level: 2 });

        assert_eq!(*changes.lock().unwrap(), vec![(true, Some(1080))]);
        assert!(engine.commands().is_empty());
    }

    #[tokio::test]
    async fn test_user_quality_select_commands_engine() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::LevelLoaded(vod()));
        let engine = factory.last_engine().unwrap();
        engine.clear_commands();

        let quality = ctx.qualities.get(1).unwrap();
        ctx.qualities.select(&quality, true, None);

        assert!(!ctx.qualities.auto());
        assert_eq!(engine.commands(), vec!["current-level:1"]);
    }

    #[tokio::test]
    async fn test_switch_policy_selects_engine_command() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::LevelLoaded(vod()));
        let engine = factory.last_engine().unwrap();
        engine.clear_commands();

        ctx.qualities.set_switch_policy(QualitySwitch::Next);
        ctx.qualities.select(&ctx.qualities.get(0).unwrap(), true, None);
        ctx.qualities.set_switch_policy(QualitySwitch::Load);
        ctx.qualities.select(&ctx.qualities.get(2).unwrap(), true, None);

        assert_eq!(engine.commands(), vec!["next-level:0", "load-level:2"]);
    }

    #[tokio::test]
    async fn test_auto_select_uses_engine_hook() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::LevelLoaded(vod()));
        let engine = factory.last_engine().unwrap();
        ctx.qualities.select(&ctx.qualities.get(1).unwrap(), true, None);
        engine.clear_commands();

        ctx.qualities.auto_select(None);

        assert!(ctx.qualities.auto());
        assert_eq!(engine.commands(), vec!["current-level:auto", "next-auto-level:1"]);
    }

    #[tokio::test]
    async fn test_caption_mode_reaches_engine_once() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::SubtitleTracksUpdated(vec![
            EngineTextTrack {
                name: "English".into(),
                lang: "en".into(),
                kind: TextTrackKind::Subtitles,
                default: false,
            },
            EngineTextTrack {
                name: "French".into(),
                lang: "fr".into(),
                kind: TextTrackKind::Subtitles,
                default: false,
            },
        ]));
        let engine = factory.last_engine().unwrap();
        engine.clear_commands();

        let french = ctx.text_tracks.get_by_id("fake-subtitles-1").unwrap();
        ctx.text_tracks.set_mode(&french, TextTrackMode::Showing, None);
        bridge.handle_event(EngineEvent::SubtitleTrackSwitched { index: Some(1) });
        ctx.text_tracks.set_mode(&french, TextTrackMode::Disabled, None);

        assert_eq!(engine.commands(), vec!["subtitle:1", "subtitle:off"]);
    }

    #[tokio::test]
    async fn test_cues_are_routed_by_engine_index() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, _) = bridge_with(ctx.clone());
        bridge.handle_event(EngineEvent::SubtitleTracksUpdated(vec![EngineTextTrack {
            name: "English".into(),
            lang: "en".into(),
            kind: TextTrackKind::Captions,
            default: true,
        }]));

        bridge.handle_event(EngineEvent::CuesParsed {
            track: 0,
            cues: vec![TextCue::new("1", 0.0, 2.0, "Hello")],
        });

        let track = ctx.text_tracks.get(0).unwrap();
        assert_eq!(track.mode(), TextTrackMode::Showing);
        assert_eq!(track.cues().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_errors_by_class() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        let engine = factory.last_engine().unwrap();
        let fatal = |kind| {
            EngineEvent::Error(EngineError {
                kind,
                details: "boom".into(),
                fatal: true,
            })
        };

        bridge.handle_event(EngineEvent::Error(EngineError {
            kind: EngineErrorKind::Network,
            details: "timeout".into(),
            fatal: false,
        }));
        bridge.handle_event(fatal(EngineErrorKind::Network));
        bridge.handle_event(fatal(EngineErrorKind::Media));
        assert!(bridge.engine().is_some());

        bridge.handle_event(fatal(EngineErrorKind::Other));
        assert_eq!(engine.commands(), vec!["start-load", "recover-media", "destroy"]);
        assert!(bridge.engine().is_none());
        assert!(ctx.store.error.get().is_some_and(|e| e.fatal && e.code == "ENGINE"));
        assert!(bridge.load_source("a.m3u8").is_err());
    }

    #[tokio::test]
    async fn test_engine_config_follows_stream_type() {
        let ctx = Arc::new(MediaContext::default());
        ctx.store.stream_type.set(StreamType::LowLatencyLive);
        let factory = Arc::new(FakeEngineFactory::default());
        let bridge = AdaptiveEngineBridge::new(ctx.clone(), factory, Arc::new(FakeElement::default()));

        let config = bridge.engine_config();
        assert_eq!(config["lowLatencyMode"], true);
        assert_eq!(config["backBufferLength"], 4.0);
    }

    #[tokio::test]
    async fn test_teardown_uninstalls_hook() {
        let ctx = Arc::new(MediaContext::default());
        let (bridge, factory) = bridge_with(ctx.clone());
        assert!(ctx.qualities.can_auto_select());

        bridge.teardown();
        bridge.teardown();

        assert!(!ctx.qualities.can_auto_select());
        assert_eq!(factory.last_engine().unwrap().commands(), vec!["destroy"]);
    }
}
