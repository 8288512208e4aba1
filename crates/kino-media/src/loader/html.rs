//! Native `<video>` / `<audio>` playback

use super::{extension, MediaElement, Provider, ProviderLoader};
use crate::{
    context::MediaContext,
    event::Trigger,
    list::{ChangeSource, ListEvent, Subscription},
    tracks::AudioTrack,
    types::{MediaType, ProviderKind, Source},
    Result,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "ogg", "ogv", "webm", "mov", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "m4b", "mp4a", "mpga", "mp2", "mp2a", "mp3", "m2a", "m3a", "wav", "weba", "aac", "oga", "spx", "flac"];
const HLS_EXTENSIONS: &[&str] = &["m3u8"];
const HLS_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
    "application/x-mpegurl",
    "video/x-mpegurl",
    "video/mpegurl",
    "application/mpegurl",
];

pub(crate) fn is_hls(source: &Source) -> bool {
    HLS_TYPES.contains(&source.mime.to_ascii_lowercase().as_str())
        || extension(source).is_some_and(|ext| HLS_EXTENSIONS.contains(&ext.as_str()))
}

/// Loader for the native video element
#[derive(Debug, Default)]
pub struct VideoLoader {
    native_hls: bool,
}

impl VideoLoader {
    /// `native_hls`: the element can play HLS by itself
    pub fn new(native_hls: bool) -> Self {
        Self { native_hls }
    }
}

#[async_trait]
impl ProviderLoader for VideoLoader {
    fn name(&self) -> &'static str {
        "video"
    }

    fn can_play(&self, source: &Source) -> bool {
        if is_hls(source) {
            return self.native_hls;
        }
        if let Some(mime) = source.known_type() {
            return mime == "video/object" || mime.starts_with("video/");
        }
        extension(source).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        MediaType::Video
    }

    #[instrument(skip_all, fields(loader = "video"))]
    async fn load(
        &self,
        target: Arc<dyn MediaElement>,
        _ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(HtmlMediaProvider::new(ProviderKind::Video, target)))
    }
}

/// Loader for the native audio element
#[derive(Debug, Default)]
pub struct AudioLoader;

impl AudioLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderLoader for AudioLoader {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn can_play(&self, source: &Source) -> bool {
        if let Some(mime) = source.known_type() {
            return mime == "audio/object" || (mime.starts_with("audio/") && !is_hls(source));
        }
        extension(source).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        MediaType::Audio
    }

    #[instrument(skip_all, fields(loader = "audio"))]
    async fn load(
        &self,
        target: Arc<dyn MediaElement>,
        _ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(HtmlMediaProvider::new(ProviderKind::Audio, target)))
    }
}

/// Provider driving the native element directly.
///
/// Audio tracks mirror the element's native inventory; qualities are not
/// selectable, so the quality list is readonly.
#[derive(Debug)]
pub struct HtmlMediaProvider {
    kind: ProviderKind,
    target: Arc<dyn MediaElement>,
    ctx: Mutex<Option<Arc<MediaContext>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl HtmlMediaProvider {
    pub fn new(kind: ProviderKind, target: Arc<dyn MediaElement>) -> Self {
        Self {
            kind,
            target,
            ctx: Mutex::new(None),
            subscription: Mutex::new(None),
        }
    }

    fn context(&self) -> Option<Arc<MediaContext>> {
        self.ctx.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn target(&self) -> &Arc<dyn MediaElement> {
        &self.target
    }

    /// Copy the element's native audio tracks into the context
    pub fn sync_audio_tracks(&self, ctx: &MediaContext, trigger: Option<&Trigger>) {
        for native in self.target.native_audio_tracks() {
            let track = match ctx.audio_tracks.get_by_id(&native.id) {
                Some(track) => track,
                None => {
                    let track = Arc::new(AudioTrack::new(
                        native.id.clone(),
                        native.label,
                        native.language,
                        native.kind,
                    ));
                    ctx.audio_tracks.add(track.clone(), trigger);
                    track
                }
            };
            if native.enabled {
                ctx.audio_tracks.select_internal(&track, true, trigger);
            }
        }
    }
}

#[async_trait]
impl Provider for HtmlMediaProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn setup(&self, ctx: Arc<MediaContext>) -> Result<()> {
        let trigger = Trigger::new("provider-setup");
        ctx.qualities.set_readonly(true, Some(&trigger));
        self.sync_audio_tracks(&ctx, Some(&trigger));
        *self.ctx.lock().unwrap_or_else(|e| e.into_inner()) = Some(ctx.clone());

        let target = self.target.clone();
        let subscription = ctx.audio_tracks.subscribe(move |event| {
            if let ListEvent::Change {
                current: Some(track),
                source: ChangeSource::User,
                ..
            } = event
            {
                debug!(id = %track.id, "Enabling native audio track");
                target.enable_native_audio_track(&track.id);
            }
        });
        *self.subscription.lock().unwrap_or_else(|e| e.into_inner()) = Some(subscription);
        Ok(())
    }

    async fn load_source(&self, source: &Source) -> Result<()> {
        self.target.set_src(&source.src);
        // A new source starts a new session: the collections may have been reset
        if let Some(ctx) = self.context() {
            let trigger = Trigger::new("provider-load-source");
            ctx.qualities.set_readonly(true, Some(&trigger));
            self.sync_audio_tracks(&ctx, Some(&trigger));
        }
        Ok(())
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
        self.subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.ctx.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.target.set_src("");
    }
}
