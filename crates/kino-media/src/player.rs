//! Media Player - ties source selection, provider lifecycle and tracks together
//!
//! Coordinates:
//! - Source resolution against the loader priority list
//! - Provider load/swap on the media element
//! - Playback passthroughs into the store and the live provider
//! - Remote (cast) track mirroring

use crate::{
    bridge::{RemoteCastBridge, RemoteSession},
    context::MediaContext,
    controller::{LoadState, ProviderLifecycleController},
    event::{Notification, Trigger},
    loader::{default_loaders, same_loader, LoaderDeps, MediaElement, Provider, ProviderLoader},
    source::{HttpSourceProbe, ResolveOutcome, SourceProbe, SourceSelector},
    store::MediaStore,
    types::{SessionId, Source, StreamType},
    Error, PlayerConfig, Result,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

/// Builder for [`MediaPlayer`]
#[derive(Debug, Default)]
pub struct MediaPlayerBuilder {
    config: PlayerConfig,
    deps: LoaderDeps,
    loaders: Option<Vec<Arc<dyn ProviderLoader>>>,
    probe: Option<Arc<dyn SourceProbe>>,
}

impl MediaPlayerBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Engines and embed channel used by the default loader set
    pub fn deps(mut self, deps: LoaderDeps) -> Self {
        self.deps = deps;
        self
    }

    /// Replace the default loader set
    pub fn loaders(mut self, loaders: Vec<Arc<dyn ProviderLoader>>) -> Self {
        self.loaders = Some(loaders);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn SourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self, target: Arc<dyn MediaElement>) -> Result<MediaPlayer> {
        let probe = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpSourceProbe::new(self.config.probe_timeout())?),
        };
        let loaders = match self.loaders {
            Some(loaders) => loaders,
            None => default_loaders(&self.config, self.deps),
        };

        let ctx = Arc::new(MediaContext::new(self.config)?);
        let player = MediaPlayer {
            id: SessionId::new(),
            selector: SourceSelector::new(ctx.clone(), loaders, probe),
            controller: Arc::new(ProviderLifecycleController::new(ctx.clone())),
            requests: AtomicU64::new(0),
            ctx,
            target,
        };
        info!(session = %player.id, "Media player created");
        Ok(player)
    }
}

/// Media player bound to one media element
#[derive(Debug)]
pub struct MediaPlayer {
    /// Unique session ID
    id: SessionId,
    /// Shared state, tracks and notifications
    ctx: Arc<MediaContext>,
    selector: SourceSelector,
    controller: Arc<ProviderLifecycleController>,
    /// Bumped by every `set_sources` call
    requests: AtomicU64,
    /// Media surface providers attach to
    target: Arc<dyn MediaElement>,
}

impl MediaPlayer {
    pub fn builder() -> MediaPlayerBuilder {
        MediaPlayerBuilder::default()
    }

    /// Player with the default loader set and HTTP probing
    pub fn new(config: PlayerConfig, target: Arc<dyn MediaElement>) -> Result<Self> {
        Self::builder().config(config).build(target)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn context(&self) -> &Arc<MediaContext> {
        &self.ctx
    }

    pub fn store(&self) -> &MediaStore {
        &self.ctx.store
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.ctx.events.subscribe()
    }

    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.controller.provider()
    }

    pub fn load_state(&self) -> LoadState {
        self.controller.phase()
    }

    /// Resolve `sources`, (re)load the provider and hand it the selected source.
    ///
    /// The provider load is deferred by one frame so that back-to-back calls
    /// coalesce into a single attachment. Returns the attached provider, or
    /// `None` when nothing can play the sources or a newer call superseded
    /// this one.
    #[instrument(skip_all, fields(session = %self.id, candidates = sources.len()))]
    pub async fn set_sources(&self, sources: Vec<Source>) -> Result<Option<Arc<dyn Provider>>> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let trigger = Trigger::new("sources-change");
        let (source, loader, source_changed, loader_changed) =
            match self.selector.resolve(sources, Some(&trigger)).await {
                ResolveOutcome::Resolved {
                    source,
                    loader,
                    source_changed,
                    loader_changed,
                } => (source, loader, source_changed, loader_changed),
                ResolveOutcome::Superseded => {
                    debug!("Source resolution superseded");
                    return Ok(None);
                }
            };

        // A loader swap resets the session in the controller; a new source on
        // the same loader starts a new session here
        if source_changed && !loader_changed && loader.is_some() {
            let reset = Trigger::caused_by("source-session-reset", Some(&trigger));
            self.ctx.store.reset_session();
            self.ctx.reset_tracks(Some(&reset));
        }

        self.controller
            .schedule_load(loader.clone(), self.target.clone(), Some(trigger));
        self.controller.flush().await;
        if self.requests.load(Ordering::SeqCst) != request {
            debug!("Provider load superseded by a newer source");
            return Ok(None);
        }

        let Some(loader) = loader else {
            return Ok(None);
        };
        let current = self
            .controller
            .loader()
            .is_some_and(|l| same_loader(&l, &loader));
        if !current {
            return Ok(None);
        }
        if self.controller.phase() == LoadState::Aborted {
            let reason = self
                .ctx
                .store
                .error
                .get()
                .map_or_else(|| "provider load failed".to_string(), |e| e.message);
            return Err(Error::load(loader.name(), reason));
        }

        let provider = self.controller.provider();
        match &provider {
            Some(provider) if !source.is_empty() => provider.load_source(&source).await?,
            _ => {}
        }
        Ok(provider)
    }

    pub async fn set_source(&self, source: impl Into<Source>) -> Result<Option<Arc<dyn Provider>>> {
        self.set_sources(vec![source.into()]).await
    }

    fn require_provider(&self) -> Result<Arc<dyn Provider>> {
        self.controller.provider().ok_or(Error::NoProvider)
    }

    pub async fn play(&self) -> Result<()> {
        self.require_provider()?.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.require_provider()?.pause().await
    }

    /// Seek to `time` seconds
    pub fn seek(&self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(Error::Media(format!("invalid seek position {}", time)));
        }
        let provider = self.require_provider()?;
        self.ctx.store.current_time.set(time);
        provider.set_current_time(time);
        Ok(())
    }

    /// Declare the stream type up front; it takes precedence over what the
    /// provider detects and survives source changes. `Unknown` clears it.
    pub fn set_stream_type(&self, stream_type: StreamType) {
        self.ctx.store.declared_stream_type.set(stream_type);
    }

    pub fn set_muted(&self, muted: bool) {
        self.ctx.store.muted.set(muted);
        if let Some(provider) = self.controller.provider() {
            provider.set_muted(muted);
        }
    }

    /// Volume is clamped to `0.0..=1.0`
    pub fn set_volume(&self, volume: f64) {
        let volume = if volume.is_nan() { 1.0 } else { volume.clamp(0.0, 1.0) };
        self.ctx.store.volume.set(volume);
        if let Some(provider) = self.controller.provider() {
            provider.set_volume(volume);
        }
    }

    pub fn set_plays_inline(&self, plays_inline: bool) {
        self.ctx.store.plays_inline.set(plays_inline);
        if let Some(provider) = self.controller.provider() {
            provider.set_plays_inline(plays_inline);
        }
    }

    /// Mirror tracks with a remote playback session; drop the bridge to stop
    pub fn cast(&self, session: Arc<dyn RemoteSession>) -> RemoteCastBridge {
        let bridge = RemoteCastBridge::new(self.ctx.clone(), session);
        bridge.attach();
        bridge
    }

    /// Cancel pending resolution and tear down the provider
    pub async fn destroy(&self) {
        let trigger = Trigger::new("destroy");
        self.selector.cancel();
        self.controller.destroy(Some(&trigger)).await;
        self.ctx.reset_tracks(Some(&trigger));
        info!(session = %self.id, "Media player destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlayerEvent;
    use crate::testing::{FakeElement, FakeLoader};
    use async_trait::async_trait;
    #[cfg(feature = "hls")]
    use crate::{
        bridge::{EngineEvent, LevelDetails, PlaylistKind},
        testing::FakeEngineFactory,
    };
    #[cfg(feature = "hls")]
    use std::time::Duration;

    #[derive(Debug)]
    struct NoProbe;

    #[async_trait]
    impl SourceProbe for NoProbe {
        async fn probe(&self, _src: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn player(element: Arc<FakeElement>) -> MediaPlayer {
        MediaPlayer::builder()
            .loaders(vec![
                Arc::new(FakeLoader::new("video", "video/mp4")),
                Arc::new(FakeLoader::new("audio", "audio/mpeg")),
            ])
            .probe(Arc::new(NoProbe))
            .build(element)
            .unwrap()
    }

    /// Debug output of every provider announced on `rx`, `None` for detaches
    fn provider_changes(rx: &mut broadcast::Receiver<Notification>) -> Vec<Option<String>> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            if let PlayerEvent::ProviderChange(provider) = n.event {
                out.push(provider.map(|p| format!("{:?}", p)));
            }
        }
        out
    }

    #[cfg(feature = "hls")]
    fn hls_player(factory: Arc<FakeEngineFactory>) -> MediaPlayer {
        MediaPlayer::builder()
            .deps(LoaderDeps {
                hls_engine: Some(factory),
                ..Default::default()
            })
            .probe(Arc::new(NoProbe))
            .build(Arc::new(FakeElement::default()))
            .unwrap()
    }

    #[cfg(feature = "hls")]
    fn vod(total_duration: f64) -> LevelDetails {
        LevelDetails {
            live: false,
            playlist: Some(PlaylistKind::Vod),
            total_duration,
            target_duration: 6.0,
            low_latency: false,
        }
    }

    #[cfg(feature = "hls")]
    async fn wait_until_playable(player: &MediaPlayer) {
        let mut can_play = player.store().can_play.subscribe();
        tokio::time::timeout(Duration::from_secs(1), can_play.wait_for(|ready| *ready))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_sources_attaches_and_loads() {
        let player = player(Arc::new(FakeElement::default()));
        let mut rx = player.subscribe();

        let provider = player
            .set_sources(vec![Source::new("movie", "video/mp4")])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(player.load_state(), LoadState::Attached);
        assert_eq!(player.store().source.get().src, "movie");
        assert!(format!("{:?}", provider).contains("source:movie"));

        let mut names = Vec::new();
        while let Ok(n) = rx.try_recv() {
            names.push(n.event.name());
        }
        assert_eq!(
            names,
            vec![
                "sources-change",
                "source-change",
                "media-type-change",
                "provider-change",
                "provider-loader-change",
                "provider-change",
            ]
        );
    }

    #[tokio::test]
    async fn test_same_loader_keeps_provider() {
        let player = player(Arc::new(FakeElement::default()));
        let first = player
            .set_sources(vec![Source::new("a", "video/mp4")])
            .await
            .unwrap()
            .unwrap();
        let second = player
            .set_sources(vec![Source::new("b", "video/mp4")])
            .await
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let log = format!("{:?}", second);
        assert!(log.contains("source:a") && log.contains("source:b"));
    }

    #[cfg(feature = "hls")]
    #[tokio::test]
    async fn test_new_source_on_same_engine_starts_new_session() {
        let factory = Arc::new(FakeEngineFactory::with_ladder(&[360, 720, 1080]));
        let player = hls_player(factory.clone());
        let first = player.set_source("a.m3u8").await.unwrap().unwrap();
        let engine = factory.last_engine().unwrap();
        engine.emit(EngineEvent::LevelLoaded(vod(120.0)));
        wait_until_playable(&player).await;
        assert_eq!(player.context().qualities.len(), 3);

        let second = player.set_source("b.m3u8").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!player.store().can_play.get());
        assert!(player.context().qualities.is_empty());

        engine.emit(EngineEvent::LevelLoaded(vod(30.0)));
        wait_until_playable(&player).await;
        assert_eq!(player.store().duration.get(), 30.0);
        assert_eq!(player.context().qualities.len(), 3);
        assert!(player.context().qualities.can_auto_select());
        assert!(Arc::ptr_eq(&engine, &factory.last_engine().unwrap()));
        assert_eq!(engine.commands(), vec!["load:a.m3u8", "load:b.m3u8"]);
    }

    #[cfg(feature = "hls")]
    #[tokio::test]
    async fn test_declared_low_latency_configures_engine() {
        let factory = Arc::new(FakeEngineFactory::default());
        let player = hls_player(factory.clone());
        player.set_stream_type(StreamType::LowLatencyLive);

        player.set_source("ll.m3u8").await.unwrap().unwrap();

        let config = factory.last_engine().unwrap().config.clone();
        assert_eq!(config["lowLatencyMode"], true);
        assert_eq!(config["backBufferLength"], 4.0);
        assert_eq!(player.store().effective_stream_type(), StreamType::LowLatencyLive);
    }

    #[tokio::test]
    async fn test_back_to_back_sources_attach_once() {
        let player = player(Arc::new(FakeElement::default()));
        let mut rx = player.subscribe();

        let (first, second) = tokio::join!(
            player.set_source(Source::new("clip", "video/mp4")),
            player.set_source(Source::new("song", "audio/mpeg")),
        );

        assert!(first.unwrap().is_none());
        let second = second.unwrap().unwrap();
        assert!(format!("{:?}", second).contains("source:song"));
        let attached: Vec<String> = provider_changes(&mut rx).into_iter().flatten().collect();
        assert_eq!(attached.len(), 1);
        assert!(attached[0].contains("\"audio\""));
        assert_eq!(player.load_state(), LoadState::Attached);
    }

    #[tokio::test]
    async fn test_loader_swap_announces_detach_once() {
        let player = player(Arc::new(FakeElement::default()));
        player
            .set_source(Source::new("clip", "video/mp4"))
            .await
            .unwrap();
        let mut rx = player.subscribe();

        player
            .set_source(Source::new("song", "audio/mpeg"))
            .await
            .unwrap();

        let changes = provider_changes(&mut rx);
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_none());
        assert!(changes[1].as_ref().is_some_and(|p| p.contains("\"audio\"")));
    }

    #[tokio::test]
    async fn test_failed_provider_load_is_returned() {
        let failing = FakeLoader::new("video", "video/mp4");
        failing.fail.store(true, Ordering::SeqCst);
        let player = MediaPlayer::builder()
            .loaders(vec![Arc::new(failing)])
            .probe(Arc::new(NoProbe))
            .build(Arc::new(FakeElement::default()))
            .unwrap();

        let result = player.set_source(Source::new("a", "video/mp4")).await;

        assert!(matches!(result, Err(Error::ProviderLoad { .. })));
        assert_eq!(player.load_state(), LoadState::Aborted);
        assert!(player.provider().is_none());
    }

    #[tokio::test]
    async fn test_unplayable_sources_detach() {
        let player = player(Arc::new(FakeElement::default()));
        player
            .set_sources(vec![Source::new("a", "video/mp4")])
            .await
            .unwrap();
        let provider = player
            .set_sources(vec![Source::new("doc", "application/pdf")])
            .await
            .unwrap();

        assert!(provider.is_none());
        assert!(player.provider().is_none());
        assert!(player.store().source.get().is_empty());
    }

    #[tokio::test]
    async fn test_passthroughs_update_store_and_provider() {
        let player = player(Arc::new(FakeElement::default()));
        assert!(matches!(player.play().await, Err(Error::NoProvider)));

        player.set_muted(true);
        let provider = player
            .set_source(Source::new("a", "video/mp4"))
            .await
            .unwrap()
            .unwrap();
        player.set_volume(3.0);
        player.seek(12.5).unwrap();
        player.play().await.unwrap();

        assert!(player.store().muted.get());
        assert_eq!(player.store().volume.get(), 1.0);
        assert_eq!(player.store().current_time.get(), 12.5);
        let log = format!("{:?}", provider);
        assert!(log.contains("muted:true"));
        assert!(log.contains("volume:1"));
        assert!(log.contains("seek:12.5"));
        assert!(log.contains("\"play\""));
        assert!(player.seek(-1.0).is_err());
    }

    #[tokio::test]
    async fn test_destroy_detaches() {
        let player = player(Arc::new(FakeElement::default()));
        player
            .set_source(Source::new("a", "video/mp4"))
            .await
            .unwrap();
        let mut rx = player.subscribe();

        player.destroy().await;

        assert!(player.provider().is_none());
        assert_eq!(player.load_state(), LoadState::Idle);
        let event = rx.try_recv().unwrap();
        assert!(matches!(event.event, PlayerEvent::ProviderChange(None)));
        assert_eq!(event.trigger.map(|t| t.name().to_string()), Some("destroy".into()));
    }
}
