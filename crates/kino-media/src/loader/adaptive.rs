//! Adaptive streaming loaders (HLS, DASH)

use super::{extension, MediaElement, Provider, ProviderLoader};
use crate::{
    bridge::{AdaptiveEngineBridge, AdaptiveEngineFactory},
    context::MediaContext,
    types::{MediaType, ProviderKind, Source},
    Error, Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

#[cfg(feature = "dash")]
const DASH_TYPES: &[&str] = &["application/dash+xml"];

fn load_bridge(
    factory: &Arc<dyn AdaptiveEngineFactory>,
    kind: ProviderKind,
    target: Arc<dyn MediaElement>,
    ctx: Arc<MediaContext>,
) -> Result<Arc<dyn Provider>> {
    if !factory.is_supported() {
        return Err(Error::EngineUnavailable(factory.name().to_string()));
    }
    let bridge = AdaptiveEngineBridge::new(ctx, factory.clone(), target.clone());
    Ok(Arc::new(AdaptiveProvider {
        kind,
        target,
        bridge,
    }))
}

/// HLS through an adaptive engine
#[cfg(feature = "hls")]
#[derive(Debug)]
pub struct HlsLoader {
    factory: Arc<dyn AdaptiveEngineFactory>,
}

#[cfg(feature = "hls")]
impl HlsLoader {
    pub fn new(factory: Arc<dyn AdaptiveEngineFactory>) -> Self {
        Self { factory }
    }
}

#[cfg(feature = "hls")]
#[async_trait]
impl ProviderLoader for HlsLoader {
    fn name(&self) -> &'static str {
        "hls"
    }

    fn can_play(&self, source: &Source) -> bool {
        self.factory.is_supported() && super::html::is_hls(source)
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        MediaType::Video
    }

    #[instrument(skip_all, fields(loader = "hls"))]
    async fn load(
        &self,
        target: Arc<dyn MediaElement>,
        ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        load_bridge(&self.factory, ProviderKind::Hls, target, ctx)
    }
}

/// DASH through an adaptive engine
#[cfg(feature = "dash")]
#[derive(Debug)]
pub struct DashLoader {
    factory: Arc<dyn AdaptiveEngineFactory>,
}

#[cfg(feature = "dash")]
impl DashLoader {
    pub fn new(factory: Arc<dyn AdaptiveEngineFactory>) -> Self {
        Self { factory }
    }
}

#[cfg(feature = "dash")]
#[async_trait]
impl ProviderLoader for DashLoader {
    fn name(&self) -> &'static str {
        "dash"
    }

    fn can_play(&self, source: &Source) -> bool {
        self.factory.is_supported()
            && (DASH_TYPES.contains(&source.mime.to_ascii_lowercase().as_str())
                || extension(source).as_deref() == Some("mpd"))
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        MediaType::Video
    }

    #[instrument(skip_all, fields(loader = "dash"))]
    async fn load(
        &self,
        target: Arc<dyn MediaElement>,
        ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        load_bridge(&self.factory, ProviderKind::Dash, target, ctx)
    }
}

/// Provider backed by an [`AdaptiveEngineBridge`]
#[derive(Debug)]
pub struct AdaptiveProvider {
    kind: ProviderKind,
    target: Arc<dyn MediaElement>,
    bridge: AdaptiveEngineBridge,
}

impl AdaptiveProvider {
    pub fn bridge(&self) -> &AdaptiveEngineBridge {
        &self.bridge
    }
}

#[async_trait]
impl Provider for AdaptiveProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn setup(&self, _ctx: Arc<MediaContext>) -> Result<()> {
        self.bridge.setup()
    }

    async fn load_source(&self, source: &Source) -> Result<()> {
        info!(src = %source.src, engine = self.bridge.engine_name(), "Loading adaptive source");
        self.bridge.load_source(&source.src)
    }

    async fn play(&self) -> Result<()> {
        self.target.play().await
    }

    async fn pause(&self) -> Result<()> {
        self.target.pause().await
    }

    fn set_current_time(&self, time: f64) {
        self.target.set_current_time(time);
    }

    fn set_muted(&self, muted: bool) {
        self.target.set_muted(muted);
    }

    fn set_volume(&self, volume: f64) {
        self.target.set_volume(volume);
    }

    fn set_plays_inline(&self, plays_inline: bool) {
        self.target.set_plays_inline(plays_inline);
    }

    async fn destroy(&self) {
        self.bridge.teardown();
    }
}
