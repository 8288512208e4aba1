//! Track collections: audio tracks, text tracks and video qualities

pub mod audio;
pub mod quality;
pub mod text;

pub use audio::{AudioTrack, AudioTrackList};
pub use quality::{EnableAuto, VideoQuality, VideoQualityList};
pub use text::{ModeChangeHook, TextTrack, TextTrackList};
