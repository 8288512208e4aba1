//! Ordered, single-selection collections
//!
//! [`SelectList`] keeps items in insertion order, allows at most one selected
//! item and notifies listeners synchronously, in call order. Listeners are
//! invoked after the list's own lock is released, so a listener may read or
//! mutate the list that notified it.
//!
//! Selection has two entry points:
//! - [`SelectList::select`] is the public path: ignored while the list is
//!   readonly, and its `change` events are tagged [`ChangeSource::User`].
//! - `select_internal` is reserved for adapters inside this crate that mirror
//!   an engine's state; it bypasses the readonly guard and its events are
//!   tagged [`ChangeSource::Internal`] so outgoing sync can skip them.

mod subscription;

pub use subscription::Subscription;

use crate::event::Trigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use subscription::Listeners;
use tracing::debug;

/// Selected state owned by the list that holds the item
#[derive(Debug, Default)]
pub struct SelectedFlag(AtomicBool);

impl SelectedFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, selected: bool) {
        self.0.store(selected, Ordering::SeqCst);
    }
}

/// An item that can live in a [`SelectList`]
pub trait Selectable: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn selected_flag(&self) -> &SelectedFlag;

    fn selected(&self) -> bool {
        self.selected_flag().get()
    }
}

/// Which entry point caused a selection change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    User,
    Internal,
}

/// Collection events
#[derive(Debug)]
pub enum ListEvent<T> {
    Add {
        item: Arc<T>,
        trigger: Option<Trigger>,
    },
    Remove {
        item: Arc<T>,
        trigger: Option<Trigger>,
    },
    Change {
        prev: Option<Arc<T>>,
        current: Option<Arc<T>>,
        source: ChangeSource,
        trigger: Option<Trigger>,
    },
    ReadonlyChange {
        readonly: bool,
        trigger: Option<Trigger>,
    },
    /// Quality lists only
    AutoChange {
        auto: bool,
        trigger: Option<Trigger>,
    },
    /// Text track lists only
    ModeChange {
        item: Arc<T>,
        trigger: Option<Trigger>,
    },
}

impl<T> ListEvent<T> {
    pub fn name(&self) -> &'static str {
        match self {
            ListEvent::Add { .. } => "add",
            ListEvent::Remove { .. } => "remove",
            ListEvent::Change { .. } => "change",
            ListEvent::ReadonlyChange { .. } => "readonly-change",
            ListEvent::AutoChange { .. } => "auto-change",
            ListEvent::ModeChange { .. } => "mode-change",
        }
    }

    pub fn trigger(&self) -> Option<&Trigger> {
        match self {
            ListEvent::Add { trigger, .. }
            | ListEvent::Remove { trigger, .. }
            | ListEvent::Change { trigger, .. }
            | ListEvent::ReadonlyChange { trigger, .. }
            | ListEvent::AutoChange { trigger, .. }
            | ListEvent::ModeChange { trigger, .. } => trigger.as_ref(),
        }
    }
}

#[derive(Debug)]
struct ListState<T> {
    items: Vec<Arc<T>>,
    readonly: bool,
}

/// Ordered collection with at most one selected item
pub struct SelectList<T: Selectable> {
    state: Mutex<ListState<T>>,
    listeners: Arc<Listeners<ListEvent<T>>>,
}

impl<T: Selectable> SelectList<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ListState {
                items: Vec::new(),
                readonly: false,
            }),
            listeners: Arc::new(Listeners::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an event to every listener registered at this point
    pub(crate) fn emit(&self, event: ListEvent<T>) {
        self.listeners.dispatch(&event);
    }

    /// Register a listener; dropping the returned guard unsubscribes it
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ListEvent<T>) + Send + Sync + 'static,
    {
        Listeners::subscribe(&self.listeners, listener)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Item at `index`; positions are stable only between mutations
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.lock().items.get(index).cloned()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<T>> {
        self.lock().items.iter().find(|i| i.id() == id).cloned()
    }

    pub fn index_of(&self, item: &Arc<T>) -> Option<usize> {
        self.lock().items.iter().position(|i| Arc::ptr_eq(i, item))
    }

    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.index_of(item).is_some()
    }

    /// Copy of the current items, in insertion order
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.lock().items.clone()
    }

    /// Iterate over the items present at the time of the call.
    ///
    /// Each call starts a fresh pass, so iteration can be restarted at will.
    pub fn iter(&self) -> std::vec::IntoIter<Arc<T>> {
        self.to_vec().into_iter()
    }

    pub fn selected(&self) -> Option<Arc<T>> {
        self.lock().items.iter().find(|i| i.selected()).cloned()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.lock().items.iter().position(|i| i.selected())
    }

    pub fn readonly(&self) -> bool {
        self.lock().readonly
    }

    /// Append an item; adding the same `Arc` twice is a no-op
    pub fn add(&self, item: Arc<T>, trigger: Option<&Trigger>) {
        {
            let mut state = self.lock();
            if state.items.iter().any(|i| Arc::ptr_eq(i, &item)) {
                return;
            }
            state.items.push(item.clone());
        }
        debug!(id = item.id(), "List item added");
        self.emit(ListEvent::Add {
            item: item.clone(),
            trigger: trigger.cloned(),
        });

        // An item that arrives selected takes over the selection
        if item.selected() {
            item.selected_flag().set(false);
            self.select_internal(&item, true, trigger);
        }
    }

    /// Remove an item by reference.
    ///
    /// A selected item is deselected first, so listeners see `change` with
    /// `current: None` before `remove`.
    pub fn remove(&self, item: &Arc<T>, trigger: Option<&Trigger>) {
        let was_selected = {
            let state = self.lock();
            if !state.items.iter().any(|i| Arc::ptr_eq(i, item)) {
                return;
            }
            item.selected()
        };

        if was_selected {
            item.selected_flag().set(false);
            self.emit(ListEvent::Change {
                prev: Some(item.clone()),
                current: None,
                source: ChangeSource::Internal,
                trigger: trigger.cloned(),
            });
        }

        let removed = {
            let mut state = self.lock();
            match state.items.iter().position(|i| Arc::ptr_eq(i, item)) {
                Some(index) => {
                    state.items.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            debug!(id = item.id(), "List item removed");
            self.emit(ListEvent::Remove {
                item: item.clone(),
                trigger: trigger.cloned(),
            });
        }
    }

    /// Remove every item, oldest first, then clear the readonly flag
    pub fn reset(&self, trigger: Option<&Trigger>) {
        while let Some(first) = self.get(0) {
            self.remove(&first, trigger);
        }
        self.set_readonly(false, trigger);
    }

    pub fn set_readonly(&self, readonly: bool, trigger: Option<&Trigger>) {
        {
            let mut state = self.lock();
            if state.readonly == readonly {
                return;
            }
            state.readonly = readonly;
        }
        self.emit(ListEvent::ReadonlyChange {
            readonly,
            trigger: trigger.cloned(),
        });
    }

    /// Select or deselect an item on behalf of the user.
    ///
    /// Ignored while the list is readonly.
    pub fn select(&self, item: &Arc<T>, selected: bool, trigger: Option<&Trigger>) {
        if self.readonly() {
            debug!(id = item.id(), "Ignoring selection on readonly list");
            return;
        }
        self.apply_select(item, selected, ChangeSource::User, trigger);
    }

    /// Select or deselect an item on behalf of an adapter, ignoring readonly
    pub(crate) fn select_internal(&self, item: &Arc<T>, selected: bool, trigger: Option<&Trigger>) {
        self.apply_select(item, selected, ChangeSource::Internal, trigger);
    }

    pub(crate) fn apply_select(
        &self,
        item: &Arc<T>,
        selected: bool,
        source: ChangeSource,
        trigger: Option<&Trigger>,
    ) {
        let prev = {
            let state = self.lock();
            if !state.items.iter().any(|i| Arc::ptr_eq(i, item)) {
                return;
            }
            if item.selected() == selected {
                return;
            }
            let prev = state.items.iter().find(|i| i.selected()).cloned();
            if let Some(prev) = &prev {
                prev.selected_flag().set(false);
            }
            item.selected_flag().set(selected);
            prev
        };

        let event = if selected {
            ListEvent::Change {
                prev,
                current: Some(item.clone()),
                source,
                trigger: trigger.cloned(),
            }
        } else {
            ListEvent::Change {
                prev: Some(item.clone()),
                current: None,
                source,
                trigger: trigger.cloned(),
            }
        };
        self.emit(event);
    }
}

impl<T: Selectable> Default for SelectList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Selectable + std::fmt::Debug> std::fmt::Debug for SelectList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SelectList")
            .field("items", &state.items)
            .field("readonly", &state.readonly)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item {
        id: String,
        selected: SelectedFlag,
    }

    impl Item {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                selected: SelectedFlag::default(),
            })
        }
    }

    impl Selectable for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn selected_flag(&self) -> &SelectedFlag {
            &self.selected
        }
    }

    /// Records "name:prev->current" style strings for every event
    fn record(list: &SelectList<Item>) -> (Arc<Mutex<Vec<String>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = list.subscribe(move |event| {
            let entry = match event {
                ListEvent::Add { item, .. } => format!("add:{}", item.id),
                ListEvent::Remove { item, .. } => format!("remove:{}", item.id),
                ListEvent::Change { prev, current, .. } => format!(
                    "change:{}->{}",
                    prev.as_ref().map(|i| i.id.as_str()).unwrap_or("none"),
                    current.as_ref().map(|i| i.id.as_str()).unwrap_or("none"),
                ),
                ListEvent::ReadonlyChange { readonly, .. } => format!("readonly:{}", readonly),
                other => other.name().to_string(),
            };
            sink.lock().unwrap().push(entry);
        });
        (log, sub)
    }

    fn selected_count(list: &SelectList<Item>) -> usize {
        list.iter().filter(|i| i.selected()).count()
    }

    #[test]
    fn test_add_is_idempotent() {
        let list = SelectList::new();
        let (log, _sub) = record(&list);
        let a = Item::new("a");

        list.add(a.clone(), None);
        list.add(a.clone(), None);

        assert_eq!(list.len(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["add:a"]);
    }

    #[test]
    fn test_select_fires_single_change() {
        let list = SelectList::new();
        let (a, b) = (Item::new("a"), Item::new("b"));
        list.add(a.clone(), None);
        list.add(b.clone(), None);
        let (log, _sub) = record(&list);

        list.select(&a, true, None);
        list.select(&b, true, None);
        list.select(&b, true, None);

        assert!(!a.selected());
        assert!(b.selected());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["change:none->a", "change:a->b"]
        );
    }

    #[test]
    fn test_at_most_one_selected() {
        let list = SelectList::new();
        let items: Vec<_> = (0..5).map(|i| Item::new(&i.to_string())).collect();
        for item in &items {
            list.add(item.clone(), None);
        }

        let picks = [0usize, 3, 3, 1, 4, 0, 2];
        for (step, &pick) in picks.iter().enumerate() {
            list.select(&items[pick], step % 3 != 2, None);
            assert!(selected_count(&list) <= 1);
        }
    }

    #[test]
    fn test_remove_selected_clears_before_remove() {
        let list = SelectList::new();
        let a = Item::new("a");
        list.add(a.clone(), None);
        list.select(&a, true, None);
        let (log, _sub) = record(&list);

        list.remove(&a, None);

        assert!(!a.selected());
        assert!(list.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["change:a->none", "remove:a"]);
    }

    #[test]
    fn test_unknown_items_are_ignored() {
        let list = SelectList::new();
        let (log, _sub) = record(&list);
        let stranger = Item::new("x");

        list.remove(&stranger, None);
        list.select(&stranger, true, None);

        assert!(!stranger.selected());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_readonly_blocks_public_select_only() {
        let list = SelectList::new();
        let a = Item::new("a");
        list.add(a.clone(), None);
        list.set_readonly(true, None);
        let (log, _sub) = record(&list);

        list.select(&a, true, None);
        assert!(!a.selected());
        assert!(log.lock().unwrap().is_empty());

        list.select_internal(&a, true, None);
        assert!(a.selected());
        assert_eq!(*log.lock().unwrap(), vec!["change:none->a"]);
    }

    #[test]
    fn test_reset_removes_in_order_then_clears_readonly() {
        let list = SelectList::new();
        let (a, b) = (Item::new("a"), Item::new("b"));
        list.add(a.clone(), None);
        list.add(b.clone(), None);
        list.select(&b, true, None);
        list.set_readonly(true, None);
        let (log, _sub) = record(&list);

        list.reset(None);

        assert!(list.is_empty());
        assert!(!list.readonly());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["remove:a", "change:b->none", "remove:b", "readonly:false"]
        );
    }

    #[test]
    fn test_set_readonly_is_idempotent() {
        let list: SelectList<Item> = SelectList::new();
        let (log, _sub) = record(&list);
        list.set_readonly(false, None);
        list.set_readonly(true, None);
        list.set_readonly(true, None);
        assert_eq!(*log.lock().unwrap(), vec!["readonly:true"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let list = SelectList::new();
        for id in ["a", "b", "c"] {
            list.add(Item::new(id), None);
        }
        let first: Vec<String> = list.iter().map(|i| i.id.clone()).collect();
        let second: Vec<String> = list.iter().map(|i| i.id.clone()).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
        assert_eq!(list.get(1).map(|i| i.id.clone()), Some("b".to_string()));
    }

    #[test]
    fn test_listener_can_reenter_list() {
        let list = Arc::new(SelectList::new());
        let a = Item::new("a");
        list.add(a.clone(), None);

        let weak = Arc::downgrade(&list);
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let _sub = list.subscribe(move |event| {
            if let ListEvent::Change { .. } = event {
                if let Some(list) = weak.upgrade() {
                    *sink.lock().unwrap() = list.selected_index();
                }
            }
        });

        list.select(&a, true, None);
        assert_eq!(*seen.lock().unwrap(), Some(0));
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let list = SelectList::new();
        let (log, sub) = record(&list);
        list.add(Item::new("a"), None);
        drop(sub);
        list.add(Item::new("b"), None);
        assert_eq!(*log.lock().unwrap(), vec!["add:a"]);
    }
}
