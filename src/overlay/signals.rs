//! Redraw requests and listener registries.
//!
//! Viewport movement and window resize are independent producers of "draw
//! again now". They all mark the same `RedrawScheduler`, and the frame loop
//! takes the flag once, so a burst of events costs a single extra render.
//!
//! A `ListenerSet` only holds weak references to the schedulers it notifies.
//! When the owner of a scheduler replaces or drops it, every registration made
//! with it lapses and is pruned, even if nobody unsubscribed.

use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Shared dirty flag. Clones observe and mark the same flag.
#[derive(Debug, Clone, Default)]
pub struct RedrawScheduler {
    dirty: Rc<Cell<bool>>,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    /// Consume the pending request, if any.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<K> {
    id: ListenerId,
    kind: K,
    dirty: Weak<Cell<bool>>,
}

impl<K> Listener<K> {
    fn is_live(&self) -> bool {
        self.dirty.strong_count() > 0
    }
}

/// Registry of redraw listeners keyed by event kind.
pub struct ListenerSet<K> {
    next_id: u64,
    listeners: Vec<Listener<K>>,
}

impl<K: Copy + PartialEq> ListenerSet<K> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn add(&mut self, kind: K, redraw: RedrawScheduler) -> ListenerId {
        self.listeners.retain(Listener::is_live);
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(Listener {
            id,
            kind,
            dirty: Rc::downgrade(&redraw.dirty),
        });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    /// Notify every live listener registered for `kind` and drop lapsed ones.
    pub fn emit(&mut self, kind: K) {
        self.listeners.retain(|listener| match listener.dirty.upgrade() {
            Some(dirty) => {
                if listener.kind == kind {
                    dirty.set(true);
                }
                true
            }
            None => false,
        });
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.listeners.iter().filter(|l| l.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn stored(&self) -> usize {
        self.listeners.len()
    }
}

impl<K: Copy + PartialEq> Default for ListenerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Kind {
        Zoom,
        Pan,
    }

    #[test]
    fn bursts_collapse_into_one_redraw() {
        let redraw = RedrawScheduler::new();
        let producer = redraw.clone();
        for _ in 0..5 {
            producer.mark_dirty();
        }
        assert!(redraw.take_dirty());
        assert!(!redraw.take_dirty());
    }

    #[test]
    fn emit_only_reaches_matching_kind() {
        let mut set = ListenerSet::new();
        let zoom = RedrawScheduler::new();
        let pan = RedrawScheduler::new();
        set.add(Kind::Zoom, zoom.clone());
        set.add(Kind::Pan, pan.clone());
        set.emit(Kind::Zoom);
        assert!(zoom.is_dirty());
        assert!(!pan.is_dirty());
    }

    #[test]
    fn removed_listener_is_not_notified() {
        let mut set = ListenerSet::new();
        let redraw = RedrawScheduler::new();
        let id = set.add(Kind::Pan, redraw.clone());
        assert!(set.remove(id));
        assert!(!set.remove(id));
        set.emit(Kind::Pan);
        assert!(!redraw.is_dirty());
        assert!(set.is_empty());
    }

    #[test]
    fn dropped_scheduler_lapses_its_registrations() {
        let mut set = ListenerSet::new();
        let kept = RedrawScheduler::new();
        set.add(Kind::Zoom, kept.clone());
        let dropped = RedrawScheduler::new();
        set.add(Kind::Zoom, dropped.clone());
        set.add(Kind::Pan, dropped.clone());
        assert_eq!(set.len(), 3);

        drop(dropped);
        assert_eq!(set.len(), 1);
        assert_eq!(set.stored(), 3);
        set.emit(Kind::Pan);
        assert_eq!(set.stored(), 1);
        assert!(!kept.is_dirty());
        set.emit(Kind::Zoom);
        assert!(kept.is_dirty());
    }
}
