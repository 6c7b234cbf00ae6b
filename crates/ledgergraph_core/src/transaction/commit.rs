//! Commit protocol: replays an edit session onto the committed store.
//!
//! The replay runs inside one store bracket, in fixed phases:
//!
//! 1. **Create** - walk the list deltas of committed owners depth-first, in
//!    list order: create every new member, write its values and bind its
//!    identity. Then relocate the committed members moved into each list.
//!    A move whose target still sits inside the member's subtree waits
//!    until the moves above it have run. Lists the moves left out of view
//!    order are re-appended.
//! 2. **Update** - write the journal of committed objects, then the
//!    references that pointed at not-yet-created objects
//! 3. **Delete prepare** - collect the doomed subtrees and null references
//!    between doomed objects
//! 4. **Delete** - remove the doomed subtrees
//! 5. **Finalize** - close the bracket
//!
//! Any failure rolls the bracket back, so the store is left untouched.

use super::state::TxState;
use crate::config::TransactionConfig;
use crate::error::{CoreError, CoreResult};
use crate::journal::{FieldValue, JournalEntry};
use crate::types::{CommitPhase, IdentityKey};
use ledgergraph_storage::{
    CommittedStore, ObjectKey, PropertyId, SchemaRegistry, StorageError, Value,
};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Counts of what a commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// New objects created.
    pub created: usize,
    /// Committed objects whose properties were written.
    pub updated: usize,
    /// Committed objects moved to another list.
    pub moved: usize,
    /// References set to `Null` because their target went away.
    pub nulled: usize,
    /// Subtrees deleted.
    pub deleted: usize,
}

impl CommitReport {
    /// Returns true if the commit wrote nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A reference whose target had no committed key when its holder was
/// written.
#[derive(Debug)]
struct DeferredReference {
    holder: ObjectKey,
    property: PropertyId,
    target: IdentityKey,
}

/// A committed member to relocate once every new object exists.
#[derive(Debug, Clone, Copy)]
struct PendingMove {
    key: ObjectKey,
    owner: IdentityKey,
    parent: ObjectKey,
    list: PropertyId,
}

/// One commit in progress.
pub(crate) struct CommitRun<'a> {
    store: &'a dyn CommittedStore,
    schemas: &'a SchemaRegistry,
    config: &'a TransactionConfig,
    state: &'a mut TxState,
    deferred: Vec<DeferredReference>,
    moves: Vec<PendingMove>,
    doomed_roots: Vec<ObjectKey>,
    report: CommitReport,
}

impl<'a> CommitRun<'a> {
    pub(crate) fn new(
        store: &'a dyn CommittedStore,
        schemas: &'a SchemaRegistry,
        config: &'a TransactionConfig,
        state: &'a mut TxState,
    ) -> Self {
        Self {
            store,
            schemas,
            config,
            state,
            deferred: Vec::new(),
            moves: Vec::new(),
            doomed_roots: Vec::new(),
            report: CommitReport::default(),
        }
    }

    /// Runs every phase after `start_transaction`. The caller owns the
    /// bracket and rolls it back on error.
    pub(crate) fn run(mut self) -> Result<CommitReport, (CommitPhase, CoreError)> {
        let phases: [(CommitPhase, fn(&mut Self) -> CoreResult<()>); 5] = [
            (CommitPhase::Create, Self::create),
            (CommitPhase::Update, Self::update),
            (CommitPhase::DeletePrepare, Self::prepare_deletes),
            (CommitPhase::Delete, Self::delete),
            (CommitPhase::Finalize, Self::finalize),
        ];
        for (phase, step) in phases {
            debug!(phase = %phase, "commit phase");
            step(&mut self).map_err(|e| (phase, e))?;
        }
        Ok(self.report)
    }

    fn create(&mut self) -> CoreResult<()> {
        let owners: Vec<(IdentityKey, PropertyId)> = self
            .state
            .deltas
            .keys()
            .copied()
            .filter(|(owner, _)| !self.state.arena.is_new(*owner).unwrap_or(true))
            .collect();
        for (owner, list) in owners {
            self.walk_list(owner, list)?;
        }

        let moves = std::mem::take(&mut self.moves);
        let mut touched: Vec<(IdentityKey, PropertyId)> = Vec::new();
        for step in &moves {
            if !touched.contains(&(step.owner, step.list)) {
                touched.push((step.owner, step.list));
            }
        }
        self.apply_moves(moves)?;
        for (owner, list) in touched {
            self.restore_order(owner, list)?;
        }
        Ok(())
    }

    /// Applies every move whose target lies outside the member's current
    /// subtree, then retries the rest. An acyclic final tree always leaves
    /// at least one legal move per pass.
    fn apply_moves(&mut self, mut pending: Vec<PendingMove>) -> CoreResult<()> {
        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();
            for step in pending {
                if self.encloses(step.key, step.parent)? {
                    blocked.push(step);
                    continue;
                }
                self.store.move_child(step.key, step.parent, step.list)?;
                self.report.moved += 1;
            }
            if blocked.len() == before {
                let step = blocked[0];
                return Err(CoreError::Storage(StorageError::CyclicMove {
                    key: step.key,
                    parent: step.parent,
                }));
            }
            debug!(deferred = blocked.len(), "retrying moves blocked by a subtree");
            pending = blocked;
        }
        Ok(())
    }

    /// Returns true if `target` currently sits inside the subtree of `key`.
    fn encloses(&self, key: ObjectKey, mut target: ObjectKey) -> CoreResult<bool> {
        loop {
            if target == key {
                return Ok(true);
            }
            match self.store.parent_of(target)? {
                Some((parent, _)) => target = parent,
                None => return Ok(false),
            }
        }
    }

    /// Moves land at the end of their list. When that breaks the order the
    /// view showed, re-append the added members in view order.
    fn restore_order(&mut self, owner: IdentityKey, list: PropertyId) -> CoreResult<()> {
        if self.state.journal.is_deleted(owner) {
            return Ok(());
        }
        let parent = self.resolved(owner)?;
        let candidates: Vec<ObjectKey> = match self.state.delta(owner, list) {
            Some(delta) => delta
                .added()
                .filter_map(|member| self.state.arena.resolve(member))
                .collect(),
            None => return Ok(()),
        };
        let mut added = Vec::with_capacity(candidates.len());
        for key in candidates {
            if self.store.parent_of(key)? == Some((parent, list)) {
                added.push(key);
            }
        }
        if self.store.list_members(parent, list)?.ends_with(&added) {
            return Ok(());
        }
        for key in added {
            self.store.move_child(key, parent, list)?;
        }
        Ok(())
    }

    /// Creates the new members of one list in order and queues its moved
    /// members.
    fn walk_list(&mut self, owner: IdentityKey, list: PropertyId) -> CoreResult<()> {
        let parent = self.resolved(owner)?;
        // Moved members still go down with a deleted owner; new ones are
        // never written.
        let owner_deleted = self.state.journal.is_deleted(owner);
        let added: Vec<IdentityKey> = match self.state.delta(owner, list) {
            Some(delta) => delta.added().collect(),
            None => return Ok(()),
        };
        for member in added {
            if !self.state.arena.is_new(member)? {
                let key = self.resolved(member)?;
                self.moves.push(PendingMove {
                    key,
                    owner,
                    parent,
                    list,
                });
                continue;
            }
            if owner_deleted || self.state.arena.resolve(member).is_some() {
                continue;
            }
            let entity = self.state.arena.entity(member)?;
            let key = self.store.create_child(parent, list, entity)?;
            self.state.arena.bind(member, key)?;
            self.report.created += 1;
            self.write_changes(member, key)?;

            let lists: Vec<PropertyId> = self
                .state
                .deltas
                .keys()
                .filter(|(o, _)| *o == member)
                .map(|(_, l)| *l)
                .collect();
            for child_list in lists {
                self.walk_list(member, child_list)?;
            }
        }
        Ok(())
    }

    fn update(&mut self) -> CoreResult<()> {
        let changed: Vec<IdentityKey> = self
            .state
            .journal
            .entries()
            .filter(|(_, entry)| matches!(entry, JournalEntry::Changes(_)))
            .map(|(identity, _)| identity)
            .collect();
        for identity in changed {
            if self.state.arena.is_new(identity)? {
                continue;
            }
            let key = self.resolved(identity)?;
            self.write_changes(identity, key)?;
            self.report.updated += 1;
        }

        for deferred in std::mem::take(&mut self.deferred) {
            let value = match self.state.arena.resolve(deferred.target) {
                Some(target) => Value::Reference(target),
                None if self.config.null_dangling_references => {
                    self.report.nulled += 1;
                    Value::Null
                }
                None => {
                    return Err(CoreError::DanglingReference {
                        identity: deferred.target,
                    })
                }
            };
            self.store
                .set_property(deferred.holder, deferred.property, value)?;
        }
        Ok(())
    }

    fn prepare_deletes(&mut self) -> CoreResult<()> {
        let mut roots = Vec::new();
        for ((owner, _), delta) in &self.state.deltas {
            // Moved into a new object that was deleted before commit.
            if self.state.arena.resolve(*owner).is_none() {
                for member in delta.added() {
                    if let Some(key) = self.state.arena.resolve(member) {
                        roots.push(key);
                    }
                }
                continue;
            }
            for key in delta.removed() {
                let moved = self
                    .state
                    .arena
                    .lookup(key)
                    .map(|identity| self.state.arena.placement(identity))
                    .transpose()?
                    .flatten()
                    .is_some();
                if !moved && self.store.contains(key) {
                    roots.push(key);
                }
            }
        }

        let doomed = self.subtrees(&roots)?;
        for &key in &doomed {
            let entity = self.store.entity_type(key)?;
            for property in self.schemas.schema_for(entity)?.references() {
                if let Value::Reference(target) = self.store.get_property(key, property.id)? {
                    if doomed.contains(&target) {
                        self.store.set_property(key, property.id, Value::Null)?;
                        self.report.nulled += 1;
                    }
                }
            }
        }
        debug!(
            roots = roots.len(),
            doomed = doomed.len(),
            "collected deleted subtrees"
        );
        self.doomed_roots = roots;
        Ok(())
    }

    fn delete(&mut self) -> CoreResult<()> {
        for key in std::mem::take(&mut self.doomed_roots) {
            // Already gone with a deleted ancestor.
            if !self.store.contains(key) {
                continue;
            }
            let (parent, list) = self
                .store
                .parent_of(key)?
                .ok_or_else(|| CoreError::unsupported("delete root"))?;
            self.store.delete_child(parent, list, key)?;
            self.report.deleted += 1;
        }
        Ok(())
    }

    fn finalize(&mut self) -> CoreResult<()> {
        self.store.commit_transaction()?;
        Ok(())
    }

    fn write_changes(&mut self, identity: IdentityKey, key: ObjectKey) -> CoreResult<()> {
        let Some(changes) = self.state.journal.changes(identity) else {
            return Ok(());
        };
        for (property, value) in changes {
            let value = match value {
                FieldValue::Scalar(value) => value.clone(),
                FieldValue::Reference(None) => Value::Null,
                FieldValue::Reference(Some(target)) => match self.state.arena.resolve(*target) {
                    Some(target) => Value::Reference(target),
                    None => {
                        self.deferred.push(DeferredReference {
                            holder: key,
                            property: *property,
                            target: *target,
                        });
                        continue;
                    }
                },
            };
            self.store.set_property(key, *property, value)?;
        }
        Ok(())
    }

    fn subtrees(&self, roots: &[ObjectKey]) -> CoreResult<HashSet<ObjectKey>> {
        let mut doomed = HashSet::new();
        let mut queue: VecDeque<ObjectKey> = roots.iter().copied().collect();
        while let Some(key) = queue.pop_front() {
            if !doomed.insert(key) {
                continue;
            }
            let entity = self.store.entity_type(key)?;
            for list in self.schemas.schema_for(entity)?.lists() {
                queue.extend(self.store.list_members(key, list.id)?);
            }
        }
        Ok(doomed)
    }

    fn resolved(&self, identity: IdentityKey) -> CoreResult<ObjectKey> {
        self.state
            .arena
            .resolve(identity)
            .ok_or_else(|| CoreError::invariant(format!("{identity} has no committed key")))
    }
}
