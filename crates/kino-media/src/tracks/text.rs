//! Text tracks (captions, subtitles, chapters, ...)
//!
//! A track's `mode` is the user-facing control. At most one track per kind
//! group is `showing`: captions and subtitles share a group, every other kind
//! is its own group. The showing caption/subtitle track is the list's selected
//! item.

use crate::event::Trigger;
use crate::list::{ChangeSource, ListEvent, SelectList, Selectable, SelectedFlag, Subscription};
use crate::types::{TextCue, TextTrackKind, TextTrackMode};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Callback an adapter installs to learn about mode changes of a track it owns
pub type ModeChangeHook = Arc<dyn Fn(&TextTrack) + Send + Sync>;

/// Text track
pub struct TextTrack {
    pub id: String,
    pub label: String,
    pub language: String,
    pub kind: TextTrackKind,
    /// Location of the track file, if loaded out of band
    pub src: Option<String>,
    pub is_default: bool,
    selected: SelectedFlag,
    mode: Mutex<TextTrackMode>,
    cues: Mutex<Vec<TextCue>>,
    on_mode_change: Mutex<Option<ModeChangeHook>>,
}

impl TextTrack {
    pub fn new(
        id: impl Into<String>,
        kind: TextTrackKind,
        label: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            language: language.into(),
            kind,
            src: None,
            is_default: false,
            selected: SelectedFlag::default(),
            mode: Mutex::new(TextTrackMode::Disabled),
            cues: Mutex::new(Vec::new()),
            on_mode_change: Mutex::new(None),
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    /// Set as default track
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn mode(&self) -> TextTrackMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_mode_raw(&self, mode: TextTrackMode) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    fn cue_store(&self) -> MutexGuard<'_, Vec<TextCue>> {
        self.cues.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cues(&self) -> Vec<TextCue> {
        self.cue_store().clone()
    }

    /// Add a cue, keeping cues ordered by start time; duplicate ids are ignored
    pub fn add_cue(&self, cue: TextCue) -> bool {
        let mut cues = self.cue_store();
        if cues.iter().any(|c| c.id == cue.id) {
            return false;
        }
        let at = cues.partition_point(|c| c.start_time <= cue.start_time);
        cues.insert(at, cue);
        true
    }

    pub fn remove_cue(&self, id: &str) -> Option<TextCue> {
        let mut cues = self.cue_store();
        let index = cues.iter().position(|c| c.id == id)?;
        Some(cues.remove(index))
    }

    /// Cues to display at `time`
    pub fn active_cues(&self, time: f64) -> Vec<TextCue> {
        self.cue_store()
            .iter()
            .filter(|c| c.is_active_at(time))
            .cloned()
            .collect()
    }

    pub(crate) fn set_mode_change_hook(&self, hook: Option<ModeChangeHook>) {
        *self
            .on_mode_change
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = hook;
    }

    fn run_mode_change_hook(&self) {
        let hook = self
            .on_mode_change
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    fn shares_slot_with(&self, other: &TextTrack) -> bool {
        if self.kind.is_caption() {
            other.kind.is_caption()
        } else {
            self.kind == other.kind
        }
    }
}

impl Selectable for TextTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn selected_flag(&self) -> &SelectedFlag {
        &self.selected
    }
}

impl std::fmt::Debug for TextTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("language", &self.language)
            .field("mode", &self.mode())
            .finish()
    }
}

/// Text track collection
#[derive(Debug, Default)]
pub struct TextTrackList {
    list: SelectList<TextTrack>,
}

impl TextTrackList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track; a default caption track is shown if nothing else is
    pub fn add(&self, track: Arc<TextTrack>, trigger: Option<&Trigger>) {
        if self.list.contains(&track) {
            return;
        }
        self.list.add(track.clone(), trigger);

        let slot_taken = self
            .list
            .iter()
            .any(|t| !Arc::ptr_eq(&t, &track) && t.mode() == TextTrackMode::Showing && t.shares_slot_with(&track));
        if track.is_default && !slot_taken && track.mode() != TextTrackMode::Showing {
            self.apply_mode(&track, TextTrackMode::Showing, ChangeSource::Internal, trigger);
        }
    }

    /// Remove a track; it is disabled (through its adapter hook) first, then
    /// the hook is detached
    pub fn remove(&self, track: &Arc<TextTrack>, trigger: Option<&Trigger>) {
        if !self.list.contains(track) {
            return;
        }
        self.apply_mode(track, TextTrackMode::Disabled, ChangeSource::Internal, trigger);
        track.set_mode_change_hook(None);
        self.list.remove(track, trigger);
    }

    pub fn reset(&self, trigger: Option<&Trigger>) {
        while let Some(first) = self.list.get(0) {
            self.remove(&first, trigger);
        }
        self.list.set_readonly(false, trigger);
    }

    /// Change a track's mode on behalf of the user; ignored while readonly
    pub fn set_mode(&self, track: &Arc<TextTrack>, mode: TextTrackMode, trigger: Option<&Trigger>) {
        if self.list.readonly() {
            debug!(id = %track.id, "Ignoring mode change on readonly text tracks");
            return;
        }
        self.apply_mode(track, mode, ChangeSource::User, trigger);
    }

    pub(crate) fn set_mode_internal(
        &self,
        track: &Arc<TextTrack>,
        mode: TextTrackMode,
        trigger: Option<&Trigger>,
    ) {
        self.apply_mode(track, mode, ChangeSource::Internal, trigger);
    }

    fn apply_mode(
        &self,
        track: &Arc<TextTrack>,
        mode: TextTrackMode,
        source: ChangeSource,
        trigger: Option<&Trigger>,
    ) {
        if !self.list.contains(track) || track.mode() == mode {
            return;
        }

        let mut displaced = Vec::new();
        if mode == TextTrackMode::Showing {
            for other in self.list.iter() {
                if !Arc::ptr_eq(&other, track)
                    && other.mode() == TextTrackMode::Showing
                    && other.shares_slot_with(track)
                {
                    other.set_mode_raw(TextTrackMode::Disabled);
                    displaced.push(other);
                }
            }
        }
        track.set_mode_raw(mode);
        debug!(id = %track.id, %mode, "Text track mode changed");

        if track.kind.is_caption() {
            let showing = mode == TextTrackMode::Showing;
            if showing || track.selected() {
                self.list.apply_select(track, showing, source, trigger);
            }
        }

        for other in displaced {
            self.list.emit(ListEvent::ModeChange {
                item: other.clone(),
                trigger: trigger.cloned(),
            });
            other.run_mode_change_hook();
        }
        self.list.emit(ListEvent::ModeChange {
            item: track.clone(),
            trigger: trigger.cloned(),
        });
        track.run_mode_change_hook();
    }

    /// Tracks currently in `showing` mode
    pub fn showing(&self) -> Vec<Arc<TextTrack>> {
        self.list
            .iter()
            .filter(|t| t.mode() == TextTrackMode::Showing)
            .collect()
    }

    pub fn set_readonly(&self, readonly: bool, trigger: Option<&Trigger>) {
        self.list.set_readonly(readonly, trigger);
    }

    pub fn readonly(&self) -> bool {
        self.list.readonly()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ListEvent<TextTrack>) + Send + Sync + 'static,
    {
        self.list.subscribe(listener)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Arc<TextTrack>> {
        self.list.get(index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<TextTrack>> {
        self.list.get_by_id(id)
    }

    pub fn selected(&self) -> Option<Arc<TextTrack>> {
        self.list.selected()
    }

    pub fn to_vec(&self) -> Vec<Arc<TextTrack>> {
        self.list.to_vec()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<TextTrack>> {
        self.list.iter()
    }
}
