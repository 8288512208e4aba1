//! Manifest-backed adaptive engine
//!
//! Parses an HLS playlist with `m3u8-rs` and plays the engine's part towards
//! the bridge: reports the ladder, audio and subtitle renditions, emits the
//! level-loaded event when a source is loaded and records every command it
//! receives.

use anyhow::Context;
use kino_media::bridge::{
    AdaptiveEngine, AdaptiveEngineFactory, EngineAudioTrack, EngineEvent, EngineEventSender,
    EngineLevel, EngineTextTrack, LevelDetails, PlaylistKind,
};
use kino_media::{MediaElement, TextTrackKind};
use m3u8_rs::{AlternativeMediaType, MasterPlaylist, MediaPlaylist, MediaPlaylistType, Playlist};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

/// Everything the engine reports about one presentation
#[derive(Debug, Clone, Default)]
pub struct Presentation {
    pub levels: Vec<EngineLevel>,
    pub audio_tracks: Vec<EngineAudioTrack>,
    pub text_tracks: Vec<EngineTextTrack>,
    pub details: Option<LevelDetails>,
}

/// Fetch a playlist from an URL or a local path
pub async fn fetch(location: &str) -> anyhow::Result<String> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            let body = reqwest::get(url)
                .await?
                .error_for_status()?
                .text()
                .await?;
            Ok(body)
        }
        _ => tokio::fs::read_to_string(location)
            .await
            .with_context(|| format!("reading {}", location)),
    }
}

fn resolve(base: &str, relative: &str) -> String {
    if let Ok(base) = Url::parse(base) {
        if let Ok(joined) = base.join(relative) {
            return joined.to_string();
        }
    }
    std::path::Path::new(base)
        .parent()
        .map(|dir| dir.join(relative).to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.to_string())
}

impl Presentation {
    /// Load the playlist at `location`; for a multivariant playlist the first
    /// variant is fetched as well to classify the stream
    pub async fn load(location: &str) -> anyhow::Result<Self> {
        let content = fetch(location).await?;
        let playlist = m3u8_rs::parse_playlist_res(content.as_bytes())
            .map_err(|e| anyhow::anyhow!("failed to parse playlist: {:?}", e))?;

        match playlist {
            Playlist::MasterPlaylist(master) => {
                let mut presentation = Self::from_master(&master);
                if let Some(variant) = master.variants.iter().find(|v| !v.is_i_frame) {
                    let media_location = resolve(location, &variant.uri);
                    match fetch(&media_location).await {
                        Ok(media) => presentation.details = parse_details(&media),
                        Err(e) => warn!(src = %media_location, error = %e, "Variant playlist unavailable"),
                    }
                }
                Ok(presentation)
            }
            Playlist::MediaPlaylist(media) => Ok(Self {
                levels: vec![EngineLevel {
                    width: 0,
                    height: 0,
                    bitrate: 0,
                    codec_set: None,
                }],
                details: Some(details_of(&media, &content)),
                ..Self::default()
            }),
        }
    }

    fn from_master(master: &MasterPlaylist) -> Self {
        let mut levels: Vec<EngineLevel> = master
            .variants
            .iter()
            .filter(|v| !v.is_i_frame)
            .map(|v| EngineLevel {
                width: v.resolution.as_ref().map_or(0, |r| r.width as u32),
                height: v.resolution.as_ref().map_or(0, |r| r.height as u32),
                bitrate: v.bandwidth,
                codec_set: v.codecs.clone(),
            })
            .collect();
        levels.sort_by_key(|l| l.bitrate);

        let mut audio_tracks = Vec::new();
        let mut text_tracks = Vec::new();
        for alternative in &master.alternatives {
            let lang = alternative.language.clone().unwrap_or_default();
            let kind = match alternative.media_type {
                AlternativeMediaType::Audio => {
                    audio_tracks.push(EngineAudioTrack {
                        id: audio_tracks.len(),
                        name: alternative.name.clone(),
                        lang,
                        default: alternative.default,
                    });
                    continue;
                }
                AlternativeMediaType::Subtitles => TextTrackKind::Subtitles,
                AlternativeMediaType::ClosedCaptions => TextTrackKind::Captions,
                _ => continue,
            };
            text_tracks.push(EngineTextTrack {
                name: alternative.name.clone(),
                lang,
                kind,
                default: alternative.default,
            });
        }

        Self {
            levels,
            audio_tracks,
            text_tracks,
            details: None,
        }
    }
}

fn parse_details(content: &str) -> Option<LevelDetails> {
    match m3u8_rs::parse_media_playlist_res(content.as_bytes()) {
        Ok(media) => Some(details_of(&media, content)),
        Err(e) => {
            warn!(error = ?e, "Failed to parse media playlist");
            None
        }
    }
}

fn details_of(media: &MediaPlaylist, raw: &str) -> LevelDetails {
    let playlist = match media.playlist_type {
        Some(MediaPlaylistType::Event) => Some(PlaylistKind::Event),
        Some(MediaPlaylistType::Vod) => Some(PlaylistKind::Vod),
        _ => None,
    };
    LevelDetails {
        live: !media.end_list,
        playlist,
        total_duration: media.segments.iter().map(|s| f64::from(s.duration)).sum(),
        target_duration: media.target_duration as f64,
        low_latency: raw.contains("#EXT-X-PART-INF"),
    }
}

/// Engine instance over a parsed [`Presentation`]
#[derive(Debug)]
pub struct ManifestEngine {
    presentation: Presentation,
    events: EngineEventSender,
    current_level: Mutex<Option<usize>>,
    audio_track: Mutex<Option<usize>>,
    commands: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ManifestEngine {
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    fn record(&self, command: String) {
        debug!(%command, "Engine command");
        lock(&self.commands).push(command);
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("Engine event dropped, bridge gone");
        }
    }
}

fn level_name(level: Option<usize>) -> String {
    level.map_or_else(|| "auto".to_string(), |l| l.to_string())
}

impl AdaptiveEngine for ManifestEngine {
    fn attach_media(&self, _target: Arc<dyn MediaElement>) -> kino_media::Result<()> {
        self.record("attach-media".into());
        Ok(())
    }

    fn load_source(&self, src: &str) -> kino_media::Result<()> {
        self.record(format!("load {}", src));
        if !self.presentation.text_tracks.is_empty() {
            self.emit(EngineEvent::SubtitleTracksUpdated(self.presentation.text_tracks.clone()));
        }
        let details = self.presentation.details.clone().unwrap_or(LevelDetails {
            live: false,
            playlist: Some(PlaylistKind::Vod),
            total_duration: f64::NAN,
            target_duration: 0.0,
            low_latency: false,
        });
        self.emit(EngineEvent::LevelLoaded(details));
        Ok(())
    }

    fn levels(&self) -> Vec<EngineLevel> {
        self.presentation.levels.clone()
    }

    fn audio_tracks(&self) -> Vec<EngineAudioTrack> {
        self.presentation.audio_tracks.clone()
    }

    fn current_level(&self) -> Option<usize> {
        *lock(&self.current_level)
    }

    fn set_current_level(&self, level: Option<usize>) {
        *lock(&self.current_level) = level;
        self.record(format!("set currentLevel {}", level_name(level)));
        if let Some(level) = level {
            self.emit(EngineEvent::LevelSwitched { level });
        }
    }

    fn set_next_level(&self, level: Option<usize>) {
        self.record(format!("set nextLevel {}", level_name(level)));
    }

    fn set_load_level(&self, level: Option<usize>) {
        self.record(format!("set loadLevel {}", level_name(level)));
    }

    fn set_next_auto_level(&self, level: usize) {
        self.record(format!("set nextAutoLevel {}", level));
    }

    fn audio_track(&self) -> Option<usize> {
        let explicit = *lock(&self.audio_track);
        explicit.or_else(|| {
            self.presentation
                .audio_tracks
                .iter()
                .position(|t| t.default)
        })
    }

    fn set_audio_track(&self, index: usize) {
        *lock(&self.audio_track) = Some(index);
        self.record(format!("set audioTrack {}", index));
        self.emit(EngineEvent::AudioTrackSwitched { index });
    }

    fn set_subtitle_track(&self, index: Option<usize>) {
        let name = index.map_or_else(|| "off".to_string(), |i| i.to_string());
        self.record(format!("set subtitleTrack {}", name));
    }

    fn live_sync_position(&self) -> Option<f64> {
        let details = self.presentation.details.as_ref()?;
        (details.live && details.total_duration.is_finite())
            .then(|| (details.total_duration - 3.0 * details.target_duration).max(0.0))
    }

    fn start_load(&self) {
        self.record("startLoad".into());
    }

    fn recover_media_error(&self) {
        self.record("recoverMediaError".into());
    }

    fn destroy(&self) {
        self.record("destroy".into());
    }
}

/// Factory handing out [`ManifestEngine`]s for one presentation
#[derive(Debug, Default)]
pub struct ManifestEngineFactory {
    presentation: Presentation,
    engine: Mutex<Option<Arc<ManifestEngine>>>,
}

impl ManifestEngineFactory {
    pub fn new(presentation: Presentation) -> Self {
        Self {
            presentation,
            engine: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> Option<Arc<ManifestEngine>> {
        lock(&self.engine).clone()
    }
}

impl AdaptiveEngineFactory for ManifestEngineFactory {
    fn name(&self) -> &'static str {
        "hls"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn create(
        &self,
        config: serde_json::Value,
        events: EngineEventSender,
    ) -> kino_media::Result<Arc<dyn AdaptiveEngine>> {
        debug!(%config, "Creating manifest engine");
        let engine = Arc::new(ManifestEngine {
            presentation: self.presentation.clone(),
            events,
            current_level: Mutex::new(None),
            audio_track: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
        });
        *lock(&self.engine) = Some(engine.clone());
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",LANGUAGE=\"en\",DEFAULT=YES,URI=\"en.m3u8\"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"Deutsch\",LANGUAGE=\"de\",URI=\"de.m3u8\"
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"English\",LANGUAGE=\"en\",URI=\"subs.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\",AUDIO=\"aud\",SUBTITLES=\"subs\"
720p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.64001e,mp4a.40.2\",AUDIO=\"aud\",SUBTITLES=\"subs\"
360p.m3u8
";

    const EVENT: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-PLAYLIST-TYPE:EVENT
#EXTINF:10.0,
seg0.ts
#EXTINF:10.0,
seg1.ts
";

    #[test]
    fn test_master_presentation() {
        let master = match m3u8_rs::parse_playlist_res(MASTER.as_bytes()).unwrap() {
            Playlist::MasterPlaylist(master) => master,
            Playlist::MediaPlaylist(_) => panic!("expected a multivariant playlist"),
        };
        let presentation = Presentation::from_master(&master);

        let heights: Vec<u32> = presentation.levels.iter().map(|l| l.height).collect();
        assert_eq!(heights, vec![360, 720]);
        assert_eq!(presentation.audio_tracks.len(), 2);
        assert!(presentation.audio_tracks[0].default);
        assert_eq!(presentation.text_tracks[0].kind, TextTrackKind::Subtitles);
    }

    #[test]
    fn test_event_playlist_details() {
        let details = parse_details(EVENT).unwrap();
        assert!(details.live);
        assert_eq!(details.playlist, Some(PlaylistKind::Event));
        assert_eq!(details.total_duration, 20.0);
        assert_eq!(details.target_duration, 10.0);
        assert!(!details.low_latency);
    }

    #[test]
    fn test_resolve_relative_locations() {
        assert_eq!(
            resolve("https://cdn.example.com/live/master.m3u8", "720p.m3u8"),
            "https://cdn.example.com/live/720p.m3u8"
        );
        assert_eq!(resolve("media/master.m3u8", "720p.m3u8"), "media/720p.m3u8");
    }
}
