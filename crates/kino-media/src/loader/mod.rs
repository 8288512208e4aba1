//! Provider loaders and the provider contract
//!
//! A [`ProviderLoader`] decides whether it can play a [`Source`] and builds the
//! [`Provider`] that drives playback for it. Loaders are stateless apart from
//! their configuration, so the same loader instance can be reused across
//! sessions; providers live for exactly one attachment.

mod html;

#[cfg(any(feature = "hls", feature = "dash"))]
mod adaptive;

#[cfg(feature = "embeds")]
mod embed;

pub use html::{AudioLoader, HtmlMediaProvider, VideoLoader};

#[cfg(any(feature = "hls", feature = "dash"))]
pub use adaptive::AdaptiveProvider;
#[cfg(feature = "dash")]
pub use adaptive::DashLoader;
#[cfg(feature = "hls")]
pub use adaptive::HlsLoader;

#[cfg(feature = "embeds")]
pub use embed::{EmbedFrame, EmbedProvider, VimeoLoader, YouTubeLoader};

use crate::{
    bridge::AdaptiveEngineFactory,
    config::PlayerConfig,
    context::MediaContext,
    types::{MediaType, ProviderKind, Source},
    Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Audio track as reported by the native media element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeAudioTrack {
    pub id: String,
    pub label: String,
    pub language: String,
    pub kind: String,
    pub enabled: bool,
}

/// Capability surface of the native `<video>`/`<audio>` element
#[async_trait]
pub trait MediaElement: Debug + Send + Sync {
    /// Point the element at a locator; an empty string detaches it
    fn set_src(&self, src: &str);

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    fn current_time(&self) -> f64;

    fn set_current_time(&self, time: f64);

    fn set_muted(&self, muted: bool);

    fn set_volume(&self, volume: f64);

    fn set_plays_inline(&self, plays_inline: bool);

    /// Native audio track inventory; empty when the platform has none
    fn native_audio_tracks(&self) -> Vec<NativeAudioTrack> {
        Vec::new()
    }

    fn enable_native_audio_track(&self, _id: &str) {}
}

/// Live playback engine attached to the media surface
#[async_trait]
pub trait Provider: Debug + Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Attach to the context: populate collections, start listening
    async fn setup(&self, ctx: Arc<MediaContext>) -> Result<()>;

    /// Hand a resolved source to the provider
    async fn load_source(&self, source: &Source) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    fn set_current_time(&self, time: f64);

    fn set_muted(&self, muted: bool);

    fn set_volume(&self, volume: f64);

    fn set_plays_inline(&self, _plays_inline: bool) {}

    /// Detach; must be safe to call more than once
    async fn destroy(&self);
}

/// Capability object that tests sources and builds providers
#[async_trait]
pub trait ProviderLoader: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn can_play(&self, source: &Source) -> bool;

    fn media_type(&self, source: &Source) -> MediaType;

    async fn load(
        &self,
        target: Arc<dyn MediaElement>,
        ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>>;

    /// Warm up connections to the provider's origins
    async fn preconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Poster image for `source`, if the provider has one
    async fn load_poster(&self, _source: &Source) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Identity comparison for loaders
pub fn same_loader(a: &Arc<dyn ProviderLoader>, b: &Arc<dyn ProviderLoader>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Identity comparison for optional loaders; two `None`s are the same
pub(crate) fn same_loader_opt(
    a: Option<&Arc<dyn ProviderLoader>>,
    b: Option<&Arc<dyn ProviderLoader>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_loader(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub(crate) fn same_element(a: &Arc<dyn MediaElement>, b: &Arc<dyn MediaElement>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Engines and host channels the default loader set may use
#[derive(Debug, Clone, Default)]
pub struct LoaderDeps {
    pub hls_engine: Option<Arc<dyn AdaptiveEngineFactory>>,
    pub dash_engine: Option<Arc<dyn AdaptiveEngineFactory>>,
    #[cfg(feature = "embeds")]
    pub embed_frame: Option<EmbedFrame>,
}

/// Build the loader priority list.
///
/// The adaptive HLS loader precedes the native video loader unless
/// `prefer_native_hls` is set. Loaders whose dependencies are missing are left
/// out.
pub fn default_loaders(config: &PlayerConfig, deps: LoaderDeps) -> Vec<Arc<dyn ProviderLoader>> {
    let mut loaders: Vec<Arc<dyn ProviderLoader>> = Vec::new();
    let video: Arc<dyn ProviderLoader> = Arc::new(VideoLoader::new(config.native_hls));

    if config.prefer_native_hls {
        loaders.push(video.clone());
    }

    #[cfg(feature = "hls")]
    if let Some(factory) = deps.hls_engine {
        loaders.push(Arc::new(HlsLoader::new(factory)));
    }
    #[cfg(feature = "dash")]
    if let Some(factory) = deps.dash_engine {
        loaders.push(Arc::new(DashLoader::new(factory)));
    }

    if !config.prefer_native_hls {
        loaders.push(video);
    }
    loaders.push(Arc::new(AudioLoader::new()));

    #[cfg(feature = "embeds")]
    if let Some(frame) = deps.embed_frame {
        loaders.push(Arc::new(YouTubeLoader::new(
            frame.clone(),
            config.youtube_no_cookie,
        )));
        loaders.push(Arc::new(VimeoLoader::new(frame)));
    }

    loaders
}

/// Lower-cased extension of a source's path, if any
pub(crate) fn extension(source: &Source) -> Option<String> {
    let path = source.path();
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(extension(&Source::from("https://x.com/a/Movie.MP4?t=1")).as_deref(), Some("mp4"));
        assert_eq!(extension(&Source::from("https://x.com/stream")), None);
        assert_eq!(extension(&Source::from("https://x.com/a.b/stream")), None);
    }

    #[test]
    fn test_native_hls_preference_reorders_video_loader() {
        let deps = || LoaderDeps {
            hls_engine: Some(Arc::new(crate::testing::FakeEngineFactory::default())),
            ..Default::default()
        };
        let names = |loaders: Vec<Arc<dyn ProviderLoader>>| {
            loaders.iter().map(|l| l.name()).collect::<Vec<_>>()
        };

        let default = names(default_loaders(&PlayerConfig::default(), deps()));
        assert_eq!(default, vec!["hls", "video", "audio"]);

        let config = PlayerConfig {
            prefer_native_hls: true,
            ..Default::default()
        };
        assert_eq!(names(default_loaders(&config, deps())), vec!["video", "hls", "audio"]);
    }

    #[test]
    fn test_loader_identity() {
        let a: Arc<dyn ProviderLoader> = Arc::new(AudioLoader::new());
        let b: Arc<dyn ProviderLoader> = Arc::new(AudioLoader::new());
        assert!(same_loader(&a, &a.clone()));
        assert!(!same_loader(&a, &b));
        assert!(same_loader_opt(None, None));
        assert!(!same_loader_opt(Some(&a), None));
    }
}
