//! Transaction manager.

use super::commit::{CommitReport, CommitRun};
use super::object::UncommittedObject;
use super::state::{Shared, TxState};
use crate::change_feed::{ChangeListener, ListenerId, ListenerRegistry};
use crate::config::TransactionConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{CommitPhase, ManagerPhase, SessionId};
use ledgergraph_storage::{CommittedStore, ObjectKey, SchemaRegistry};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An edit session over a committed store.
///
/// The manager hands out [`UncommittedObject`]s that can be read and edited
/// freely. Nothing reaches the store until [`commit`](Self::commit), which
/// applies every edit inside one store transaction. Other readers of the
/// store never observe a partial commit.
///
/// ## Lifecycle
///
/// `Open` → `Committing` → `Closed`, or `Failed` if the commit was rolled
/// back. A manager commits at most once; open a new one for the next edit
/// session. Dropping an open manager discards its edits.
///
/// ## Threading
///
/// A manager and its objects are `!Send`. Several managers, on any threads,
/// may be open against one store; the last one to commit wins.
pub struct TransactionManager {
    shared: Rc<Shared>,
}

impl TransactionManager {
    /// Opens an edit session rooted at `root` with the default config.
    pub fn open<S>(store: Arc<S>, schemas: Arc<SchemaRegistry>, root: ObjectKey) -> CoreResult<Self>
    where
        S: CommittedStore + 'static,
    {
        Self::open_with_config(store, schemas, root, TransactionConfig::default())
    }

    /// Opens an edit session rooted at `root`.
    ///
    /// # Errors
    ///
    /// Fails if `root` does not exist in the store.
    pub fn open_with_config<S>(
        store: Arc<S>,
        schemas: Arc<SchemaRegistry>,
        root: ObjectKey,
        config: TransactionConfig,
    ) -> CoreResult<Self>
    where
        S: CommittedStore + 'static,
    {
        let store: Arc<dyn CommittedStore> = store;
        let root_entity = store.entity_type(root)?;
        schemas.schema_for(root_entity)?;
        let session = SessionId::new();
        info!(session = %session, root = %root, "opened transaction manager");
        Ok(Self {
            shared: Rc::new(Shared {
                session,
                store,
                schemas,
                config,
                state: RefCell::new(TxState::new(root, root_entity)),
                listeners: RefCell::new(ListenerRegistry::default()),
            }),
        })
    }

    /// Returns the session ID.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.shared.session
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TransactionConfig {
        &self.shared.config
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ManagerPhase {
        self.shared.state.borrow().phase
    }

    /// Returns true if anything was edited.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.shared.state.borrow().is_dirty()
    }

    /// Materializes the root object.
    pub fn root(&self) -> CoreResult<UncommittedObject> {
        let root = self.shared.state.borrow().root;
        self.shared.materialize(root)
    }

    /// Materializes a committed object.
    ///
    /// # Errors
    ///
    /// Fails if the object does not exist, was deleted in this session, or
    /// the manager is no longer open.
    pub fn materialize(&self, key: ObjectKey) -> CoreResult<UncommittedObject> {
        self.shared.materialize_key(key)
    }

    /// Registers a change listener.
    pub fn add_listener(&self, listener: Rc<dyn ChangeListener>) -> ListenerId {
        self.shared.listeners.borrow_mut().add(listener)
    }

    /// Unregisters a change listener. Returns false if it was not
    /// registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.borrow_mut().remove(id)
    }

    /// Applies every edit to the store in one store transaction.
    ///
    /// On success the manager is `Closed` and listeners are notified again
    /// with committed keys. On failure the store bracket is rolled back, the
    /// manager is `Failed`, and the error carries the failing phase.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Commit`] if the store rejected a write, or
    /// [`CoreError::InvariantViolation`] if the manager is not open.
    pub fn commit(&self) -> CoreResult<CommitReport> {
        let shared = &self.shared;
        let mut state = shared.state.borrow_mut();
        state.ensure_open()?;
        state.phase = ManagerPhase::Committing;
        info!(session = %shared.session, "committing");

        if let Err(e) = shared.store.start_transaction() {
            state.phase = ManagerPhase::Failed;
            warn!(session = %shared.session, error = %e, "could not open store transaction");
            return Err(CoreError::commit(CommitPhase::Begin, e.into()));
        }

        let result = CommitRun::new(
            shared.store(),
            &shared.schemas,
            &shared.config,
            &mut state,
        )
        .run();

        let report = match result {
            Ok(report) => report,
            Err((phase, e)) => {
                warn!(
                    session = %shared.session,
                    phase = %phase,
                    error = %e,
                    "commit failed, rolling back"
                );
                if shared.store.in_transaction() {
                    if let Err(rollback) = shared.store.rollback_transaction() {
                        warn!(session = %shared.session, error = %rollback, "rollback failed");
                    }
                }
                state.phase = ManagerPhase::Failed;
                return Err(CoreError::commit(phase, e));
            }
        };

        let refire: Vec<_> = if shared.config.refire_on_commit {
            let arena = &state.arena;
            state
                .pending_events
                .iter()
                .filter_map(|event| event.committed(|identity| arena.resolve(identity)))
                .collect()
        } else {
            Vec::new()
        };
        state.clear();
        state.phase = ManagerPhase::Closed;
        drop(state);

        info!(
            session = %shared.session,
            created = report.created,
            updated = report.updated,
            moved = report.moved,
            deleted = report.deleted,
            "committed"
        );
        for event in &refire {
            shared.dispatch(event);
        }
        Ok(report)
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.try_borrow_mut() {
            if state.phase == ManagerPhase::Open {
                debug!(session = %self.shared.session, dirty = state.is_dirty(), "discarding edits");
                state.clear();
                state.phase = ManagerPhase::Closed;
            }
        }
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("TransactionManager")
            .field("session", &self.shared.session)
            .field("phase", &state.phase)
            .field("identities", &state.arena.len())
            .field("journal_entries", &state.journal.len())
            .field("deltas", &state.deltas.len())
            .finish()
    }
}
