//! Embedded players (YouTube, Vimeo)
//!
//! Embeds are driven by posting JSON messages to their iframe. The host owns
//! the iframe; this module hands it [`EmbedMessage`]s over an [`EmbedFrame`]
//! channel and consumes the iframe's replies through
//! [`EmbedProvider::handle_message`].

use super::{MediaElement, Provider, ProviderLoader};
use crate::{
    context::MediaContext,
    event::{PlayerEvent, Trigger},
    types::{MediaType, ProviderKind, Source},
    Error, Result,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtube-nocookie.com", "www.youtube-nocookie.com"];
const VIMEO_HOSTS: &[&str] = &["vimeo.com", "www.vimeo.com", "player.vimeo.com"];

/// Message for the host's iframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EmbedMessage {
    /// Point the iframe at an embed URL
    Navigate { src: String },
    /// `postMessage(message, origin)` into the iframe
    Post { origin: String, message: String },
}

/// Channel to the host's iframe
pub type EmbedFrame = mpsc::UnboundedSender<EmbedMessage>;

fn parse_url(source: &Source) -> Option<Url> {
    Url::parse(&source.src).ok()
}

/// YouTube video id from a watch, short, embed or shorts URL
pub(crate) fn youtube_id(source: &Source) -> Option<String> {
    let url = parse_url(source)?;
    let host = url.host_str()?;
    let id = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host) {
        let mut segments = url.path_segments()?;
        match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, v)| v.into_owned()),
            "embed" | "shorts" | "live" => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };
    id.filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
}

/// Vimeo video id from a page or player URL
pub(crate) fn vimeo_id(source: &Source) -> Option<String> {
    let url = parse_url(source)?;
    if !VIMEO_HOSTS.contains(&url.host_str()?) {
        return None;
    }
    url.path_segments()?
        .find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Loader for YouTube embeds
#[derive(Debug)]
pub struct YouTubeLoader {
    frame: EmbedFrame,
    no_cookie: bool,
    client: Client,
}

impl YouTubeLoader {
    pub fn new(frame: EmbedFrame, no_cookie: bool) -> Self {
        Self {
            frame,
            no_cookie,
            client: Client::new(),
        }
    }

    fn origin(&self) -> &'static str {
        if self.no_cookie {
            "https://www.youtube-nocookie.com"
        } else {
            "https://www.youtube.com"
        }
    }
}

#[async_trait]
impl ProviderLoader for YouTubeLoader {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn can_play(&self, source: &Source) -> bool {
        source.mime == "video/youtube" || youtube_id(source).is_some()
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        MediaType::Video
    }

    #[instrument(skip_all, fields(loader = "youtube"))]
    async fn load(
        &self,
        _target: Arc<dyn MediaElement>,
        _ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(EmbedProvider::new(
            ProviderKind::YouTube,
            self.origin(),
            self.frame.clone(),
        )))
    }

    async fn preconnect(&self) -> Result<()> {
        for origin in [self.origin(), "https://i.ytimg.com", "https://www.google.com"] {
            self.client.head(origin).send().await?;
        }
        Ok(())
    }

    async fn load_poster(&self, source: &Source) -> Result<Option<String>> {
        Ok(youtube_id(source).map(|id| format!("https://i.ytimg.com/vi/{}/maxresdefault.jpg", id)))
    }
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    thumbnail_url: Option<String>,
}

/// Loader for Vimeo embeds
#[derive(Debug)]
pub struct VimeoLoader {
    frame: EmbedFrame,
    client: Client,
}

impl VimeoLoader {
    pub fn new(frame: EmbedFrame) -> Self {
        Self {
            frame,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ProviderLoader for VimeoLoader {
    fn name(&self) -> &'static str {
        "vimeo"
    }

    fn can_play(&self, source: &Source) -> bool {
        source.mime == "video/vimeo" || vimeo_id(source).is_some()
    }

    fn media_type(&self, _source: &Source) -> MediaType {
        MediaType::Video
    }

    #[instrument(skip_all, fields(loader = "vimeo"))]
    async fn load(
        &self,
        _target: Arc<dyn MediaElement>,
        _ctx: Arc<MediaContext>,
    ) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(EmbedProvider::new(
            ProviderKind::Vimeo,
            "https://player.vimeo.com",
            self.frame.clone(),
        )))
    }

    async fn preconnect(&self) -> Result<()> {
        for origin in ["https://player.vimeo.com", "https://i.vimeocdn.com", "https://f.vimeocdn.com"] {
            self.client.head(origin).send().await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_poster(&self, source: &Source) -> Result<Option<String>> {
        let Some(id) = vimeo_id(source) else {
            return Ok(None);
        };
        let video = format!("https://vimeo.com/{}", id);
        let endpoint = Url::parse_with_params("https://vimeo.com/api/oembed.json", &[("url", video.as_str())])?;
        let oembed: OEmbed = self
            .client
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(oembed.thumbnail_url)
    }
}

/// Provider for an embedded iframe player
#[derive(Debug)]
pub struct EmbedProvider {
    kind: ProviderKind,
    origin: &'static str,
    frame: EmbedFrame,
    ctx: Mutex<Option<Arc<MediaContext>>>,
}

impl EmbedProvider {
    pub fn new(kind: ProviderKind, origin: &'static str, frame: EmbedFrame) -> Self {
        Self {
            kind,
            origin,
            frame,
            ctx: Mutex::new(None),
        }
    }

    fn send(&self, message: EmbedMessage) -> Result<()> {
        self.frame
            .send(message)
            .map_err(|_| Error::Media("embed frame closed".to_string()))
    }

    /// Serialize a command in the embed's own protocol
    fn command(&self, name: &str, value: Option<Value>) -> Value {
        match self.kind {
            ProviderKind::Vimeo => match value {
                Some(value) => json!({ "method": name, "value": value }),
                None => json!({ "method": name }),
            },
            _ => json!({
                "event": "command",
                "func": name,
                "args": value.map(|v| vec![v]).unwrap_or_default(),
            }),
        }
    }

    fn post(&self, name: &str, value: Option<Value>) {
        self.post_raw(self.command(name, value));
    }

    fn post_raw(&self, message: Value) {
        let post = EmbedMessage::Post {
            origin: self.origin.to_string(),
            message: message.to_string(),
        };
        if let Err(e) = self.send(post) {
            warn!(error = %e, "Dropping embed command");
        }
    }

    fn embed_url(&self, source: &Source) -> Result<String> {
        let invalid = || Error::InvalidSource(source.src.clone());
        match self.kind {
            ProviderKind::YouTube => {
                let id = youtube_id(source).ok_or_else(invalid)?;
                Ok(format!("{}/embed/{}?enablejsapi=1&controls=0&playsinline=1", self.origin, id))
            }
            ProviderKind::Vimeo => {
                let id = vimeo_id(source).ok_or_else(invalid)?;
                Ok(format!("{}/video/{}?api=1&controls=0", self.origin, id))
            }
            _ => Err(invalid()),
        }
    }

    /// Apply a message received from the iframe.
    ///
    /// Unknown or malformed messages are ignored.
    pub fn handle_message(&self, raw: &str) {
        let Some(ctx) = self.ctx.lock().unwrap_or_else(|e| e.into_inner()).clone() else {
            return;
        };
        let Ok(message) = serde_json::from_str::<Value>(raw) else {
            debug!("Ignoring malformed embed message");
            return;
        };
        let trigger = Trigger::new("embed-message");

        let (ready, info) = match self.kind {
            ProviderKind::Vimeo => (message["event"] == "ready", &message["data"]),
            _ => (message["event"] == "onReady", &message["info"]),
        };
        if ready {
            ctx.notify(PlayerEvent::CanPlay, Some(&trigger));
            return;
        }

        let (time, duration) = match self.kind {
            ProviderKind::Vimeo => (info["seconds"].as_f64(), info["duration"].as_f64()),
            _ => (info["currentTime"].as_f64(), info["duration"].as_f64()),
        };
        if let Some(time) = time {
            ctx.store.current_time.set(time);
        }
        if let Some(duration) = duration.filter(|d| *d > 0.0) {
            if ctx.store.duration.get() != duration {
                ctx.notify(PlayerEvent::DurationChange(duration), Some(&trigger));
            }
        }
    }
}

#[async_trait]
impl Provider for EmbedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn setup(&self, ctx: Arc<MediaContext>) -> Result<()> {
        ctx.qualities.set_readonly(true, None);
        *self.ctx.lock().unwrap_or_else(|e| e.into_inner()) = Some(ctx);
        if self.kind == ProviderKind::YouTube {
            self.post_raw(json!({ "event": "listening" }));
        }
        Ok(())
    }

    async fn load_source(&self, source: &Source) -> Result<()> {
        let src = self.embed_url(source)?;
        self.send(EmbedMessage::Navigate { src })
    }

    async fn play(&self) -> Result<()> {
        match self.kind {
            ProviderKind::Vimeo => self.post("play", None),
            _ => self.post("playVideo", None),
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        match self.kind {
            ProviderKind::Vimeo => self.post("pause", None),
            _ => self.post("pauseVideo", None),
        }
        Ok(())
    }

    fn set_current_time(&self, time: f64) {
        match self.kind {
            ProviderKind::Vimeo => self.post("setCurrentTime", Some(json!(time))),
            _ => self.post_raw(json!({ "event": "command", "func": "seekTo", "args": [time, true] })),
        }
    }

    fn set_muted(&self, muted: bool) {
        match (self.kind, muted) {
            (ProviderKind::Vimeo, muted) => self.post("setMuted", Some(json!(muted))),
            (_, true) => self.post("mute", None),
            (_, false) => self.post("unMute", None),
        }
    }

    fn set_volume(&self, volume: f64) {
        match self.kind {
            ProviderKind::Vimeo => self.post("setVolume", Some(json!(volume))),
            _ => self.post("setVolume", Some(json!((volume * 100.0).round()))),
        }
    }

    async fn destroy(&self) {
        self.ctx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let _ = self.send(EmbedMessage::Navigate { src: String::new() });
    }
}
