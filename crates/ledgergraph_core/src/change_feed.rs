//! Change notifications for edit sessions.
//!
//! Every edit made through a [`TransactionManager`](crate::TransactionManager)
//! is announced to its listeners twice:
//! - immediately, with [`ChangeStage::Uncommitted`], while the edit only
//!   exists in the manager
//! - again after a successful commit, with [`ChangeStage::Committed`] and
//!   committed keys filled in (unless disabled in the config)
//!
//! Listeners run synchronously on the editing thread, in registration order,
//! with no internal borrow held; they may read through the manager.
//!
//! # Usage
//!
//! ```rust,ignore
//! let log = Rc::new(EventLog::new());
//! manager.add_listener(log.clone());
//! manager.add_listener(Rc::new(|event: &ChangeEvent| println!("{event:?}")));
//! ```

use crate::journal::FieldValue;
use crate::types::{IdentityKey, SessionId};
use ledgergraph_storage::{ObjectKey, PropertyId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// When an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStage {
    /// The edit exists only in the manager.
    Uncommitted,
    /// The edit was written to the committed store.
    Committed,
}

/// An object as seen by a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef {
    /// Identity in the emitting manager.
    pub identity: IdentityKey,
    /// Committed key, if the object exists in the store.
    pub committed: Option<ObjectKey>,
}

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// A scalar or reference property was written.
    PropertyChanged {
        /// The property.
        property: PropertyId,
        /// Value before the write.
        old: FieldValue,
        /// Value after the write.
        new: FieldValue,
    },
    /// A new object was created in a list.
    Inserted {
        /// Owner of the list.
        owner: ObjectRef,
        /// The list property.
        list: PropertyId,
    },
    /// An object was moved into a list.
    Moved {
        /// Owner of the target list.
        owner: ObjectRef,
        /// The target list property.
        list: PropertyId,
    },
    /// The object was deleted.
    Deleted,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Emission stage.
    pub stage: ChangeStage,
    /// Session of the emitting manager.
    pub session: SessionId,
    /// The changed object.
    pub object: ObjectRef,
    /// What changed.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Returns the committed-stage copy of this event, with object keys
    /// refreshed by `resolve`.
    ///
    /// Returns `None` if the object never reached the store.
    pub(crate) fn committed(
        &self,
        resolve: impl Fn(IdentityKey) -> Option<ObjectKey>,
    ) -> Option<ChangeEvent> {
        let refresh = |r: ObjectRef| ObjectRef {
            identity: r.identity,
            committed: resolve(r.identity).or(r.committed),
        };
        let object = refresh(self.object);
        object.committed?;
        let kind = match &self.kind {
            ChangeKind::Inserted { owner, list } => ChangeKind::Inserted {
                owner: refresh(*owner),
                list: *list,
            },
            ChangeKind::Moved { owner, list } => ChangeKind::Moved {
                owner: refresh(*owner),
                list: *list,
            },
            other => other.clone(),
        };
        Some(ChangeEvent {
            stage: ChangeStage::Committed,
            session: self.session,
            object,
            kind,
        })
    }
}

/// Receives change notifications.
pub trait ChangeListener {
    /// Called once per event.
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent),
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event);
    }
}

/// Handle returned by `add_listener`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered listeners of one manager.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, Rc<dyn ChangeListener>)>,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, listener: Rc<dyn ChangeListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Copies the current listeners so they can be called without holding
    /// a borrow of the registry.
    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn ChangeListener>> {
        self.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// A listener that keeps the most recent events.
///
/// Useful for tests and for consumers that poll instead of reacting.
#[derive(Debug)]
pub struct EventLog {
    history: RefCell<VecDeque<ChangeEvent>>,
    max_history: usize,
}

impl EventLog {
    /// Creates a log keeping up to 10 000 events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a log with a specific history limit.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            history: RefCell::new(VecDeque::new()),
            max_history,
        }
    }

    /// Returns every retained event in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.history.borrow().iter().cloned().collect()
    }

    /// Returns the retained events of one stage.
    #[must_use]
    pub fn stage(&self, stage: ChangeStage) -> Vec<ChangeEvent> {
        self.history
            .borrow()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }

    /// Returns the number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.borrow().len()
    }

    /// Returns true if no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.borrow().is_empty()
    }

    /// Drops every retained event.
    pub fn clear(&self) {
        self.history.borrow_mut().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeListener for EventLog {
    fn on_change(&self, event: &ChangeEvent) {
        let mut history = self.history.borrow_mut();
        history.push_back(event.clone());
        while history.len() > self.max_history {
            history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgergraph_storage::{EntityTypeId, Value};
    use std::cell::Cell;

    const NAME: PropertyId = PropertyId::new(EntityTypeId::new(1), 0);

    fn event(identity: u32) -> ChangeEvent {
        ChangeEvent {
            stage: ChangeStage::Uncommitted,
            session: SessionId::new(),
            object: ObjectRef {
                identity: IdentityKey::new(identity),
                committed: None,
            },
            kind: ChangeKind::PropertyChanged {
                property: NAME,
                old: Value::Null.into(),
                new: Value::text("x").into(),
            },
        }
    }

    #[test]
    fn closures_are_listeners() {
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let mut registry = ListenerRegistry::default();
        registry.add(Rc::new(move |_: &ChangeEvent| counter.set(counter.get() + 1)));

        for listener in registry.snapshot() {
            listener.on_change(&event(1));
        }
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn remove_listener() {
        let mut registry = ListenerRegistry::default();
        let a = registry.add(Rc::new(EventLog::new()));
        let b = registry.add(Rc::new(EventLog::new()));
        assert_ne!(a, b);
        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn history_truncation() {
        let log = EventLog::with_max_history(3);
        for i in 1..=5 {
            log.on_change(&event(i));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.events()[0].object.identity, IdentityKey::new(3));
    }

    #[test]
    fn committed_copy_resolves_keys() {
        let resolved = event(1)
            .committed(|_| Some(ObjectKey::new(9)))
            .unwrap();
        assert_eq!(resolved.stage, ChangeStage::Committed);
        assert_eq!(resolved.object.committed, Some(ObjectKey::new(9)));

        assert!(event(1).committed(|_| None).is_none());
    }

    #[test]
    fn stage_filter() {
        let log = EventLog::new();
        log.on_change(&event(1));
        let committed = event(2).committed(|_| Some(ObjectKey::new(1))).unwrap();
        log.on_change(&committed);
        assert_eq!(log.stage(ChangeStage::Committed).len(), 1);
        assert_eq!(log.stage(ChangeStage::Uncommitted).len(), 1);
        log.clear();
        assert!(log.is_empty());
    }
}
