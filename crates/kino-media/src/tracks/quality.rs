//! Video qualities and the auto-selecting quality list

use crate::event::Trigger;
use crate::list::{ListEvent, SelectList, Selectable, SelectedFlag, Subscription};
use crate::types::{QualitySwitch, Resolution};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Hook installed by an adaptive adapter to hand quality selection to its engine
pub type EnableAuto = Arc<dyn Fn(Option<&Trigger>) + Send + Sync>;

/// A rendition in the quality ladder
#[derive(Debug, Serialize)]
pub struct VideoQuality {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Bits per second
    pub bitrate: u64,
    pub codec: Option<String>,
    #[serde(skip)]
    selected: SelectedFlag,
}

impl VideoQuality {
    pub fn new(id: impl Into<String>, width: u32, height: u32, bitrate: u64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            bitrate,
            codec: None,
            selected: SelectedFlag::default(),
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl Selectable for VideoQuality {
    fn id(&self) -> &str {
        &self.id
    }

    fn selected_flag(&self) -> &SelectedFlag {
        &self.selected
    }
}

/// Quality collection with an "auto" mode delegated to the engine
pub struct VideoQualityList {
    list: SelectList<VideoQuality>,
    auto: AtomicBool,
    switch: Mutex<QualitySwitch>,
    enable_auto: Mutex<Option<EnableAuto>>,
}

impl VideoQualityList {
    pub fn new(switch: QualitySwitch) -> Self {
        Self {
            list: SelectList::new(),
            auto: AtomicBool::new(false),
            switch: Mutex::new(switch),
            enable_auto: Mutex::new(None),
        }
    }

    /// True while the engine, not the user, picks the quality
    pub fn auto(&self) -> bool {
        self.auto.load(Ordering::SeqCst) || self.list.readonly()
    }

    pub fn switch_policy(&self) -> QualitySwitch {
        *self.switch.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_switch_policy(&self, switch: QualitySwitch) {
        *self.switch.lock().unwrap_or_else(|e| e.into_inner()) = switch;
    }

    /// True if an engine hook for auto selection is installed
    pub fn can_auto_select(&self) -> bool {
        self.hook().is_some()
    }

    fn hook(&self) -> Option<EnableAuto> {
        self.enable_auto
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Hand quality selection back to the engine
    pub fn auto_select(&self, trigger: Option<&Trigger>) {
        if self.list.readonly() || self.auto.load(Ordering::SeqCst) {
            return;
        }
        let Some(enable) = self.hook() else {
            return;
        };
        enable(trigger);
        self.set_auto(true, trigger);
    }

    /// Pick a quality on behalf of the user; this always leaves auto mode
    pub fn select(&self, item: &Arc<VideoQuality>, selected: bool, trigger: Option<&Trigger>) {
        if self.list.readonly() {
            return;
        }
        self.set_auto(false, trigger);
        self.list.select(item, selected, trigger);
    }

    pub(crate) fn select_internal(
        &self,
        item: &Arc<VideoQuality>,
        selected: bool,
        trigger: Option<&Trigger>,
    ) {
        self.list.select_internal(item, selected, trigger);
    }

    pub(crate) fn set_auto(&self, auto: bool, trigger: Option<&Trigger>) {
        if self.auto.swap(auto, Ordering::SeqCst) == auto {
            return;
        }
        debug!(auto, "Quality auto mode changed");
        self.list.emit(ListEvent::AutoChange {
            auto,
            trigger: trigger.cloned(),
        });
    }

    pub(crate) fn set_enable_auto(&self, hook: Option<EnableAuto>) {
        *self.enable_auto.lock().unwrap_or_else(|e| e.into_inner()) = hook;
    }

    /// Remove every quality, leave auto mode and uninstall the engine hook
    pub fn reset(&self, trigger: Option<&Trigger>) {
        self.list.reset(trigger);
        self.set_auto(false, trigger);
        self.set_enable_auto(None);
    }

    pub fn add(&self, item: Arc<VideoQuality>, trigger: Option<&Trigger>) {
        self.list.add(item, trigger);
    }

    pub fn remove(&self, item: &Arc<VideoQuality>, trigger: Option<&Trigger>) {
        self.list.remove(item, trigger);
    }

    pub fn set_readonly(&self, readonly: bool, trigger: Option<&Trigger>) {
        self.list.set_readonly(readonly, trigger);
    }

    pub fn readonly(&self) -> bool {
        self.list.readonly()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ListEvent<VideoQuality>) + Send + Sync + 'static,
    {
        self.list.subscribe(listener)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Arc<VideoQuality>> {
        self.list.get(index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<VideoQuality>> {
        self.list.get_by_id(id)
    }

    pub fn index_of(&self, item: &Arc<VideoQuality>) -> Option<usize> {
        self.list.index_of(item)
    }

    pub fn selected(&self) -> Option<Arc<VideoQuality>> {
        self.list.selected()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.list.selected_index()
    }

    pub fn to_vec(&self) -> Vec<Arc<VideoQuality>> {
        self.list.to_vec()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<VideoQuality>> {
        self.list.iter()
    }
}

impl Default for VideoQualityList {
    fn default() -> Self {
        Self::new(QualitySwitch::default())
    }
}

impl std::fmt::Debug for VideoQualityList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoQualityList")
            .field("list", &self.list)
            .field("auto", &self.auto())
            .field("switch", &self.switch_policy())
            .finish()
    }
}
