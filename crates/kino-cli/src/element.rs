//! Headless media element

use async_trait::async_trait;
use kino_media::MediaElement;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Media element without a surface; keeps the source and position providers set
#[derive(Debug, Default)]
pub struct HeadlessElement {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    src: String,
    time: f64,
}

impl HeadlessElement {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MediaElement for HeadlessElement {
    fn set_src(&self, src: &str) {
        debug!(src, "Element source");
        let mut state = self.state();
        state.src = src.to_string();
        state.time = 0.0;
    }

    async fn play(&self) -> kino_media::Result<()> {
        if self.state().src.is_empty() {
            return Err(kino_media::Error::Media("no source loaded".into()));
        }
        Ok(())
    }

    async fn pause(&self) -> kino_media::Result<()> {
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state().time
    }

    fn set_current_time(&self, time: f64) {
        self.state().time = time;
    }

    fn set_muted(&self, muted: bool) {
        debug!(muted, "Element muted");
    }

    fn set_volume(&self, volume: f64) {
        debug!(volume, "Element volume");
    }

    fn set_plays_inline(&self, plays_inline: bool) {
        debug!(plays_inline, "Element inline playback");
    }
}
