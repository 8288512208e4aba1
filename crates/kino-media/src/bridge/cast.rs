//! Remote playback (cast) track reconciliation
//!
//! Local and remote tracks live in different id spaces, so they are matched
//! by label, language and kind. The remote API only accepts a complete set of
//! active track ids, so every local selection change results in one batched
//! edit carrying the whole set.

use crate::{
    context::MediaContext,
    event::Trigger,
    list::{ChangeSource, ListEvent, Subscription},
    tracks::{AudioTrack, TextTrack},
    types::{TextTrackKind, TextTrackMode},
    Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteTrackType {
    Audio,
    Text,
    Video,
}

/// Track in the remote session's media info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrack {
    pub track_id: u64,
    #[serde(rename = "type")]
    pub track_type: RemoteTrackType,
    pub name: String,
    pub language: String,
    /// Text subtype ("CAPTIONS", "SUBTITLES", ...)
    pub subtype: Option<String>,
}

impl RemoteTrack {
    /// Kind in the local vocabulary
    fn local_kind(&self) -> String {
        match (&self.subtype, self.track_type) {
            (Some(subtype), _) => subtype.to_ascii_lowercase(),
            (None, RemoteTrackType::Text) => TextTrackKind::Subtitles.to_string(),
            (None, _) => "main".to_string(),
        }
    }

    fn matches(&self, label: &str, language: &str, kind: &str) -> bool {
        self.name == label
            && self.language.eq_ignore_ascii_case(language)
            && self.local_kind().eq_ignore_ascii_case(kind)
    }

    fn matches_audio(&self, track: &AudioTrack) -> bool {
        self.track_type == RemoteTrackType::Audio
            && self.matches(&track.label, &track.language, &track.kind)
    }

    fn matches_text(&self, track: &TextTrack) -> bool {
        self.track_type == RemoteTrackType::Text
            && self.matches(&track.label, &track.language, &track.kind.to_string())
    }
}

/// Capability surface of a remote playback session
#[async_trait]
pub trait RemoteSession: Debug + Send + Sync {
    fn tracks(&self) -> Vec<RemoteTrack>;

    /// Ids the remote side currently renders
    fn active_track_ids(&self) -> Vec<u64>;

    /// Replace the remote active track set
    async fn edit_tracks_info(&self, active_ids: Vec<u64>) -> Result<()>;
}

/// Reconciles local collections with a remote session
pub struct RemoteCastBridge {
    inner: Arc<CastInner>,
}

struct CastInner {
    ctx: Arc<MediaContext>,
    session: Arc<dyn RemoteSession>,
    pending: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl RemoteCastBridge {
    pub fn new(ctx: Arc<MediaContext>, session: Arc<dyn RemoteSession>) -> Self {
        Self {
            inner: Arc::new(CastInner {
                ctx,
                session,
                pending: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Import remote tracks, then follow local selection changes
    pub fn attach(&self) {
        let trigger = Trigger::new("cast-attach");
        self.sync_remote_tracks(Some(&trigger));

        let weak = Arc::downgrade(&self.inner);
        let audio = self.inner.ctx.audio_tracks.subscribe(move |event| {
            if let ListEvent::Change {
                source: ChangeSource::User,
                ..
            } = event
            {
                CastInner::on_local_change(&weak);
            }
        });
        let weak = Arc::downgrade(&self.inner);
        // One change per user action, after every mode in the slot is final
        let text = self.inner.ctx.text_tracks.subscribe(move |event| {
            if let ListEvent::Change {
                source: ChangeSource::User,
                ..
            } = event
            {
                CastInner::on_local_change(&weak);
            }
        });
        *lock(&self.inner.subscriptions) = vec![audio, text];
        info!("Cast session attached");
    }

    /// Add remote tracks that have no local counterpart and mirror the remote
    /// active set
    pub fn sync_remote_tracks(&self, trigger: Option<&Trigger>) {
        let ctx = &self.inner.ctx;
        let remote = self.inner.session.tracks();
        let active = self.inner.session.active_track_ids();

        for track in &remote {
            match track.track_type {
                RemoteTrackType::Audio => {
                    let local = ctx.audio_tracks.iter().find(|t| track.matches_audio(t));
                    let local = local.unwrap_or_else(|| {
                        let audio = Arc::new(AudioTrack::new(
                            format!("cast-audio-{}", track.track_id),
                            track.name.clone(),
                            track.language.clone(),
                            track.local_kind(),
                        ));
                        ctx.audio_tracks.add(audio.clone(), trigger);
                        audio
                    });
                    if active.contains(&track.track_id) {
                        ctx.audio_tracks.select_internal(&local, true, trigger);
                    }
                }
                RemoteTrackType::Text => {
                    let Some(kind) = TextTrackKind::parse(&track.local_kind()) else {
                        continue;
                    };
                    let local = ctx.text_tracks.iter().find(|t| track.matches_text(t));
                    let local = local.unwrap_or_else(|| {
                        let text = Arc::new(TextTrack::new(
                            format!("cast-text-{}", track.track_id),
                            kind,
                            track.name.clone(),
                            track.language.clone(),
                        ));
                        ctx.text_tracks.add(text.clone(), trigger);
                        text
                    });
                    if active.contains(&track.track_id) {
                        ctx.text_tracks
                            .set_mode_internal(&local, TextTrackMode::Showing, trigger);
                    }
                }
                RemoteTrackType::Video => {}
            }
        }
        debug!(remote = remote.len(), "Remote tracks synced");
    }

    /// Remote ids of the selected audio track and every showing text track
    pub fn active_ids(&self) -> Vec<u64> {
        self.inner.active_ids()
    }

    pub fn detach(&self) {
        lock(&self.inner.subscriptions).clear();
        if let Some(pending) = lock(&self.inner.pending).take() {
            pending.abort();
        }
    }
}

impl Debug for RemoteCastBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCastBridge")
            .field("session", &self.inner.session)
            .finish()
    }
}

impl Drop for RemoteCastBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

impl CastInner {
    fn active_ids(&self) -> Vec<u64> {
        let remote = self.session.tracks();
        let mut ids = Vec::new();
        if let Some(audio) = self.ctx.audio_tracks.selected() {
            ids.extend(remote.iter().find(|r| r.matches_audio(&audio)).map(|r| r.track_id));
        }
        for text in self.ctx.text_tracks.showing() {
            ids.extend(remote.iter().find(|r| r.matches_text(&text)).map(|r| r.track_id));
        }
        ids
    }

    fn on_local_change(weak: &Weak<Self>) {
        let Some(inner) = weak.upgrade() else { return };
        let active = inner.active_ids();
        let session = inner.session.clone();

        let mut pending = lock(&inner.pending);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            debug!(?active, "Editing remote tracks");
            if let Err(e) = session.edit_tracks_info(active).await {
                warn!(error = %e, "Remote track edit failed");
            }
        }));
    }
}
