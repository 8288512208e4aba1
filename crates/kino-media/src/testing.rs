//! Test doubles that record the commands they receive

use crate::{
    bridge::{
        AdaptiveEngine, AdaptiveEngineFactory, EngineAudioTrack, EngineEvent, EngineEventSender,
        EngineLevel,
        RemoteSession, RemoteTrack,
    },
    context::MediaContext,
    loader::{MediaElement, NativeAudioTrack, Provider, ProviderLoader},
    types::{MediaType, ProviderKind, Source},
    Error, Result,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Media element that records commands
#[derive(Debug, Default)]
pub struct FakeElement {
    pub log: Mutex<Vec<String>>,
    pub time: Mutex<f64>,
    pub audio_tracks: Mutex<Vec<NativeAudioTrack>>,
}

impl FakeElement {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn set_src(&self, src: &str) {
        self.record(format!("src:{}", src));
    }

    async fn play(&self) -> Result<()> {
        self.record("play".into());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".into());
        Ok(())
    }

    fn current_time(&self) -> f64 {
        *self.time.lock().unwrap()
    }

    fn set_current_time(&self, time: f64) {
        *self.time.lock().unwrap() = time;
        self.record(format!("seek:{}", time));
    }

    fn set_muted(&self, muted: bool) {
        self.record(format!("muted:{}", muted));
    }

    fn set_volume(&self, volume: f64) {
        self.record(format!("volume:{}", volume));
    }

    fn set_plays_inline(&self, plays_inline: bool) {
        self.record(format!("inline:{}", plays_inline));
    }

    fn native_audio_tracks(&self) -> Vec<NativeAudioTrack> {
        self.audio_tracks.lock().unwrap().clone()
    }

    fn enable_native_audio_track(&self, id: &str) {
        for track in self.audio_tracks.lock().unwrap().iter_mut() {
            track.enabled = track.id == id;
        }
        self.record(format!("audio:{}", id));
    }
}

/// Adaptive engine that records commands
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub levels: Vec<EngineLevel>,
    pub config: Value,
    pub events: Mutex<Option<EngineEventSender>>,
    commands: Mutex<Vec<String>>,
    live_edge: Mutex<Option<f64>>,
}

impl FakeEngine {
    /// Report `event` the way the real engine would, through its channel
    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn set_live_edge(&self, edge: Option<f64>) {
        *self.live_edge.lock().unwrap() = edge;
    }

    fn record(&self, entry: String) {
        self.commands.lock().unwrap().push(entry);
    }
}

fn level_name(level: Option<usize>) -> String {
    level.map_or_else(|| "auto".to_string(), |l| l.to_string())
}

impl AdaptiveEngine for FakeEngine {
    fn attach_media(&self, _target: Arc<dyn MediaElement>) -> Result<()> {
        Ok(())
    }

    fn load_source(&self, src: &str) -> Result<()> {
        self.record(format!("load:{}", src));
        Ok(())
    }

    fn levels(&self) -> Vec<EngineLevel> {
        self.levels.clone()
    }

    fn audio_tracks(&self) -> Vec<EngineAudioTrack> {
        vec![
            EngineAudioTrack {
                id: 0,
                name: "English".into(),
                lang: "en".into(),
                default: true,
            },
            EngineAudioTrack {
                id: 1,
                name: "Commentary".into(),
                lang: "en".into(),
                default: false,
            },
        ]
    }

    fn current_level(&self) -> Option<usize> {
        None
    }

    fn set_current_level(&self, level: Option<usize>) {
        self.record(format!("current-level:{}", level_name(level)));
    }

    fn set_next_level(&self, level: Option<usize>) {
        self.record(format!("next-level:{}", level_name(level)));
    }

    fn set_load_level(&self, level: Option<usize>) {
        self.record(format!("load-level:{}", level_name(level)));
    }

    fn set_next_auto_level(&self, level: usize) {
        self.record(format!("next-auto-level:{}", level));
    }

    fn audio_track(&self) -> Option<usize> {
        Some(0)
    }

    fn set_audio_track(&self, index: usize) {
        self.record(format!("audio-track:{}", index));
    }

    fn set_subtitle_track(&self, index: Option<usize>) {
        let entry = index.map_or_else(|| "off".to_string(), |i| i.to_string());
        self.record(format!("subtitle:{}", entry));
    }

    fn live_sync_position(&self) -> Option<f64> {
        *self.live_edge.lock().unwrap()
    }

    fn start_load(&self) {
        self.record("start-load".into());
    }

    fn recover_media_error(&self) {
        self.record("recover-media".into());
    }

    fn destroy(&self) {
        self.record("destroy".into());
    }
}

/// Factory handing out [`FakeEngine`]s with a fixed ladder
#[derive(Debug)]
pub struct FakeEngineFactory {
    pub supported: bool,
    heights: Vec<u32>,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
}

impl FakeEngineFactory {
    pub fn with_ladder(heights: &[u32]) -> Self {
        Self {
            supported: true,
            heights: heights.to_vec(),
            engines: Mutex::new(Vec::new()),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::default()
        }
    }

    pub fn last_engine(&self) -> Option<Arc<FakeEngine>> {
        self.engines.lock().unwrap().last().cloned()
    }
}

impl Default for FakeEngineFactory {
    fn default() -> Self {
        Self::with_ladder(&[360, 720])
    }
}

impl AdaptiveEngineFactory for FakeEngineFactory {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, config: Value, events: EngineEventSender) -> Result<Arc<dyn AdaptiveEngine>> {
        let levels = self
            .heights
            .iter()
            .map(|&h| EngineLevel {
                width: h * 16 / 9,
                height: h,
                bitrate: u64::from(h) * 4_000,
                codec_set: Some("avc1.64001f".into()),
            })
            .collect();
        let engine = Arc::new(FakeEngine {
            levels,
            config,
            events: Mutex::new(Some(events)),
            ..Default::default()
        });
        self.engines.lock().unwrap().push(engine.clone());
        Ok(engine)
    }
}

/// Provider that records its lifecycle
#[derive(Debug)]
pub struct FakeProvider {
    pub loader: &'static str,
    pub log: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Video
    }

    async fn setup(&self, _ctx: Arc<MediaContext>) -> Result<()> {
        self.record("setup".into());
        Ok(())
    }

    async fn load_source(&self, source: &Source) -> Result<()> {
        self.record(format!("source:{}", source.src));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record("play".into());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".into());
        Ok(())
    }

    fn set_current_time(&self, time: f64) {
        self.record(format!("seek:{}", time));
    }

    fn set_muted(&self, muted: bool) {
        self.record(format!("muted:{}", muted));
    }

    fn set_volume(&self, volume: f64) {
        self.record(format!("volume:{}", volume));
    }

    fn set_plays_inline(&self, plays_inline: bool) {
        self.record(format!("inline:{}", plays_inline));
    }

    async fn destroy(&self) {
        self.record("destroy".into());
    }
}

/// Loader matching one exact MIME type, with an optional load delay
#[derive(Debug)]
pub struct FakeLoader {
    pub name: &'static str,
    pub mime: &'static str,
    pub media_type: MediaType,
    pub delay: Duration,
    pub fail: AtomicBool,
    pub preconnects: Mutex<usize>,
}

impl FakeLoader {
    pub fn new(name: &'static str, mime: &'static str) -> Self {
        Self {
            name,
            mime,
            media_type: MediaType::Video,
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
            preconnects: Mutex::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ProviderLoader for FakeLoader {
    fn name(&self) -> &'static str {
        self.name
    }

    fn can_play(&self, source: &Source) -> bool {
        source.mime == self.mime
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        self.media_type
    }

    async fn load(
        &self,
        _target: Arc<dyn MediaElement>,
        _ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::load(self.name, "refused"));
        }
        Ok(Arc::new(FakeProvider {
            loader: self.name,
            log: Mutex::new(Vec::new()),
        }))
    }

    async fn preconnect(&self) -> Result<()> {
        *self.preconnects.lock().unwrap() += 1;
        Ok(())
    }
}

/// Remote session that records track edits
#[derive(Debug)]
pub struct FakeRemoteSession {
    tracks: Vec<RemoteTrack>,
    active: Vec<u64>,
    edits: Mutex<Vec<Vec<u64>>>,
    fail: AtomicBool,
}

impl FakeRemoteSession {
    pub fn new(tracks: Vec<RemoteTrack>, active: Vec<u64>) -> Self {
        Self {
            tracks,
            active,
            edits: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn edits(&self) -> Vec<Vec<u64>> {
        self.edits.lock().unwrap().clone()
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteSession for FakeRemoteSession {
    fn tracks(&self) -> Vec<RemoteTrack> {
        self.tracks.clone()
    }

    fn active_track_ids(&self) -> Vec<u64> {
        self.active.clone()
    }

    async fn edit_tracks_info(&self, active_ids: Vec<u64>) -> Result<()> {
        self.edits.lock().unwrap().push(active_ids);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Cast("session closed".into()));
        }
        Ok(())
    }
}
