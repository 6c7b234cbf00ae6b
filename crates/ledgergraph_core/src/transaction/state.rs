//! State shared by a transaction manager and every handle it hands out.

use crate::change_feed::{ChangeEvent, ChangeKind, ChangeStage, ListenerRegistry, ObjectRef};
use crate::config::TransactionConfig;
use crate::delta::{ListDelta, Membership};
use crate::error::{CoreError, CoreResult};
use crate::identity::{IdentityArena, Placement};
use crate::journal::{ChangeJournal, FieldValue};
use crate::types::{IdentityKey, ManagerPhase, SessionId};
use ledgergraph_storage::{CommittedStore, EntityTypeId, ObjectKey, PropertyId, SchemaRegistry};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

/// Copy-in view of one object's value properties.
#[derive(Debug)]
pub(crate) struct Shadow {
    pub(crate) identity: IdentityKey,
    pub(crate) entity: EntityTypeId,
    pub(crate) values: BTreeMap<PropertyId, FieldValue>,
}

/// Mutable state of one edit session.
pub(crate) struct TxState {
    pub(crate) phase: ManagerPhase,
    pub(crate) root: IdentityKey,
    pub(crate) arena: IdentityArena,
    pub(crate) journal: ChangeJournal,
    /// Keyed by (owner, list property); created on first mutation.
    pub(crate) deltas: BTreeMap<(IdentityKey, PropertyId), ListDelta>,
    pub(crate) cache: HashMap<IdentityKey, Rc<RefCell<Shadow>>>,
    /// Uncommitted-stage events, replayed as committed after commit.
    pub(crate) pending_events: Vec<ChangeEvent>,
}

impl TxState {
    pub(crate) fn new(root: ObjectKey, root_entity: EntityTypeId) -> Self {
        let mut arena = IdentityArena::new();
        let root = arena.intern(root, root_entity);
        Self {
            phase: ManagerPhase::Open,
            root,
            arena,
            journal: ChangeJournal::new(),
            deltas: BTreeMap::new(),
            cache: HashMap::new(),
            pending_events: Vec::new(),
        }
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.phase == ManagerPhase::Open {
            Ok(())
        } else {
            Err(CoreError::invariant(format!(
                "transaction manager is {}",
                self.phase
            )))
        }
    }

    /// Checks that the manager is open and `object` may still be edited.
    pub(crate) fn ensure_live(&self, object: IdentityKey) -> CoreResult<()> {
        self.ensure_open()?;
        if !self.arena.contains(object) {
            return Err(CoreError::invariant(format!(
                "{object} was not issued by this manager"
            )));
        }
        if self.journal.is_deleted(object) {
            return Err(CoreError::invariant(format!("{object} is deleted")));
        }
        Ok(())
    }

    pub(crate) fn object_ref(&self, identity: IdentityKey) -> ObjectRef {
        ObjectRef {
            identity,
            committed: self.arena.resolve(identity),
        }
    }

    /// Interns a committed object, reading its entity type from the store.
    pub(crate) fn intern(
        &mut self,
        store: &dyn CommittedStore,
        key: ObjectKey,
    ) -> CoreResult<IdentityKey> {
        if let Some(identity) = self.arena.lookup(key) {
            return Ok(identity);
        }
        let entity = store.entity_type(key)?;
        Ok(self.arena.intern(key, entity))
    }

    /// Returns the list holding `object` in the committed store.
    pub(crate) fn origin(
        &mut self,
        store: &dyn CommittedStore,
        object: IdentityKey,
    ) -> CoreResult<Option<Placement>> {
        let Some(key) = self.arena.resolve(object) else {
            return Ok(None);
        };
        match store.parent_of(key)? {
            Some((parent, list)) => Ok(Some(Placement {
                owner: self.intern(store, parent)?,
                list,
            })),
            None => Ok(None),
        }
    }

    /// Returns the list holding `object` in the uncommitted view.
    ///
    /// `None` for the root and for deleted new objects.
    pub(crate) fn placement(
        &mut self,
        store: &dyn CommittedStore,
        object: IdentityKey,
    ) -> CoreResult<Option<Placement>> {
        if let Some(placement) = self.arena.placement(object)? {
            return Ok(Some(placement));
        }
        if self.arena.is_new(object)? {
            return Ok(None);
        }
        self.origin(store, object)
    }

    /// Describes `object` relative to the committed contents of `placement`.
    pub(crate) fn membership(
        &self,
        store: &dyn CommittedStore,
        object: IdentityKey,
        placement: Placement,
    ) -> CoreResult<Membership> {
        if self.arena.is_new(object)? {
            return Ok(Membership::New);
        }
        let key = self
            .arena
            .resolve(object)
            .ok_or_else(|| CoreError::invariant(format!("{object} has no committed key")))?;
        let in_list = match self.arena.resolve(placement.owner) {
            Some(owner) => store.parent_of(key)? == Some((owner, placement.list)),
            None => false,
        };
        Ok(Membership::Committed { key, in_list })
    }

    pub(crate) fn delta_mut(&mut self, placement: Placement) -> &mut ListDelta {
        self.deltas
            .entry((placement.owner, placement.list))
            .or_default()
    }

    pub(crate) fn delta(&self, owner: IdentityKey, list: PropertyId) -> Option<&ListDelta> {
        self.deltas.get(&(owner, list))
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.journal.is_empty() || self.deltas.values().any(|d| !d.is_empty())
    }

    /// Drops all pending edits after a successful commit.
    pub(crate) fn clear(&mut self) {
        self.journal.clear();
        self.deltas.clear();
        self.cache.clear();
        self.pending_events.clear();
    }
}

/// Everything a manager and its objects share.
pub(crate) struct Shared {
    pub(crate) session: SessionId,
    pub(crate) store: Arc<dyn CommittedStore>,
    pub(crate) schemas: Arc<SchemaRegistry>,
    pub(crate) config: TransactionConfig,
    pub(crate) state: RefCell<TxState>,
    pub(crate) listeners: RefCell<ListenerRegistry>,
}

impl Shared {
    pub(crate) fn store(&self) -> &dyn CommittedStore {
        self.store.as_ref()
    }

    /// Announces an uncommitted edit.
    ///
    /// Must be called with no borrow of the state held; listeners may read
    /// through the manager.
    pub(crate) fn emit(&self, object: IdentityKey, kind: ChangeKind) {
        let event = {
            let mut state = self.state.borrow_mut();
            let event = ChangeEvent {
                stage: ChangeStage::Uncommitted,
                session: self.session,
                object: state.object_ref(object),
                kind,
            };
            if self.config.refire_on_commit {
                state.pending_events.push(event.clone());
            }
            event
        };
        self.dispatch(&event);
    }

    pub(crate) fn dispatch(&self, event: &ChangeEvent) {
        let listeners = self.listeners.borrow().snapshot();
        trace!(
            session = %self.session,
            listeners = listeners.len(),
            "dispatching change event"
        );
        for listener in listeners {
            listener.on_change(event);
        }
    }
}
