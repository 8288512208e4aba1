//! Audio tracks

use crate::list::{SelectList, Selectable, SelectedFlag};
use serde::Serialize;

/// Audio track
#[derive(Debug, Serialize)]
pub struct AudioTrack {
    pub id: String,
    pub label: String,
    /// BCP-47 language code, empty when unknown
    pub language: String,
    /// "main", "alternative", "commentary", ...
    pub kind: String,
    #[serde(skip)]
    selected: SelectedFlag,
}

impl AudioTrack {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        language: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            language: language.into(),
            kind: kind.into(),
            selected: SelectedFlag::default(),
        }
    }
}

impl Selectable for AudioTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn selected_flag(&self) -> &SelectedFlag {
        &self.selected
    }
}

/// Audio track collection
pub type AudioTrackList = SelectList<AudioTrack>;
