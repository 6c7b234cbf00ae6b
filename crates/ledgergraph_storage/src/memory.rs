//! In-memory committed store.

use crate::error::{StorageError, StorageResult};
use crate::key::ObjectKey;
use crate::schema::{EntitySchema, EntityTypeId, PropertyId, SchemaRegistry};
use crate::snapshot::{SnapshotObject, StoreSnapshot};
use crate::store::CommittedStore;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// An in-memory committed store.
///
/// `start_transaction` takes a copy of the committed graph; all writes in the
/// bracket go to that staged copy, `commit_transaction` swaps it in and
/// `rollback_transaction` throws it away. While a bracket is open, the
/// thread that opened it reads the staged graph; every other thread keeps
/// reading the committed one until the bracket commits.
///
/// Suitable for:
/// - Unit and integration tests
/// - Tools that load and save whole snapshots
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use ledgergraph_storage::{CommittedStore, EntitySchema, EntityTypeId, InMemoryStore, SchemaRegistry};
/// use std::sync::Arc;
///
/// const NODE: EntityTypeId = EntityTypeId::new(1);
/// let schemas = SchemaRegistry::builder().entity(EntitySchema::new(NODE, "Node")).build().unwrap();
/// let store = InMemoryStore::new(Arc::new(schemas));
///
/// store.start_transaction().unwrap();
/// let root = store.create_root(NODE).unwrap();
/// store.rollback_transaction().unwrap();
/// assert!(!store.contains(root));
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    schemas: Arc<SchemaRegistry>,
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    committed: Graph,
    staged: Option<Graph>,
    owner: Option<ThreadId>,
}

#[derive(Debug, Clone)]
struct Graph {
    next_key: ObjectKey,
    root: Option<ObjectKey>,
    objects: BTreeMap<ObjectKey, StoredObject>,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            next_key: ObjectKey::new(1),
            root: None,
            objects: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    entity: EntityTypeId,
    parent: Option<(ObjectKey, PropertyId)>,
    values: BTreeMap<PropertyId, Value>,
    lists: BTreeMap<PropertyId, Vec<ObjectKey>>,
}

impl StoredObject {
    fn with_defaults(schema: &EntitySchema, parent: Option<(ObjectKey, PropertyId)>) -> Self {
        let mut values = BTreeMap::new();
        let mut lists = BTreeMap::new();
        for property in schema.properties() {
            if property.is_list() {
                lists.insert(property.id, Vec::new());
            } else {
                values.insert(property.id, property.default_value());
            }
        }
        Self {
            entity: schema.id(),
            parent,
            values,
            lists,
        }
    }
}

impl Graph {
    fn object(&self, key: ObjectKey) -> StorageResult<&StoredObject> {
        self.objects
            .get(&key)
            .ok_or(StorageError::UnknownObject { key })
    }

    fn object_mut(&mut self, key: ObjectKey) -> StorageResult<&mut StoredObject> {
        self.objects
            .get_mut(&key)
            .ok_or(StorageError::UnknownObject { key })
    }

    fn allocate_key(&mut self) -> ObjectKey {
        let key = self.next_key;
        self.next_key = key.next();
        key
    }

    /// Collects `key` and all of its descendants.
    fn subtree(&self, key: ObjectKey) -> StorageResult<BTreeSet<ObjectKey>> {
        let mut out = BTreeSet::new();
        let mut stack = vec![key];
        while let Some(next) = stack.pop() {
            let object = self.object(next)?;
            out.insert(next);
            for members in object.lists.values() {
                stack.extend(members.iter().copied());
            }
        }
        Ok(out)
    }

    fn is_ancestor_or_self(&self, candidate: ObjectKey, mut of: ObjectKey) -> StorageResult<bool> {
        loop {
            if of == candidate {
                return Ok(true);
            }
            match self.object(of)?.parent {
                Some((parent, _)) => of = parent,
                None => return Ok(false),
            }
        }
    }

    fn check_list(
        &self,
        schemas: &SchemaRegistry,
        parent: ObjectKey,
        list: PropertyId,
        entity: EntityTypeId,
    ) -> StorageResult<()> {
        let parent_entity = self.object(parent)?.entity;
        let descriptor = schemas.schema_for(parent_entity)?.list_property(list)?;
        match descriptor.list_member() {
            Some(member) if member == entity => Ok(()),
            Some(member) => Err(StorageError::ReferenceTargetMismatch {
                property: list,
                expected: member,
                actual: entity,
            }),
            None => Err(StorageError::WrongPropertyKind {
                property: list,
                expected: "list",
            }),
        }
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            schemas,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Creates the root object.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open or the store already has a root.
    pub fn create_root(&self, entity: EntityTypeId) -> StorageResult<ObjectKey> {
        let schema = self.schemas.schema_for(entity)?;
        self.write(|graph| {
            if let Some(root) = graph.root {
                return Err(StorageError::RootExists { root });
            }
            let key = graph.allocate_key();
            graph
                .objects
                .insert(key, StoredObject::with_defaults(schema, None));
            graph.root = Some(key);
            Ok(key)
        })
    }

    /// Returns the number of committed objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.read().committed.objects.len()
    }

    /// Captures the committed graph.
    ///
    /// Writes staged in an open bracket are not included.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        let graph = &state.committed;
        StoreSnapshot {
            next_key: graph.next_key,
            root: graph.root,
            objects: graph
                .objects
                .iter()
                .map(|(key, object)| SnapshotObject {
                    key: *key,
                    entity: object.entity,
                    parent: object.parent,
                    values: object
                        .values
                        .iter()
                        .map(|(p, v)| (*p, v.clone()))
                        .collect(),
                    lists: object
                        .lists
                        .iter()
                        .map(|(p, members)| (*p, members.clone()))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Rebuilds a store from a snapshot, checking it against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSnapshot`] if the snapshot refers to
    /// unknown types or properties, or its parent links and list memberships
    /// disagree.
    pub fn from_snapshot(
        schemas: Arc<SchemaRegistry>,
        snapshot: StoreSnapshot,
    ) -> StorageResult<Self> {
        let mut graph = Graph {
            next_key: snapshot.next_key,
            root: snapshot.root,
            objects: BTreeMap::new(),
        };
        for object in snapshot.objects {
            let schema = schemas.schema_for(object.entity)?;
            let mut stored = StoredObject::with_defaults(schema, object.parent);
            for (property, value) in object.values {
                schema.value_property(property)?.check_value(&value)?;
                stored.values.insert(property, value);
            }
            for (property, members) in object.lists {
                schema.list_property(property)?;
                stored.lists.insert(property, members);
            }
            if object.key >= graph.next_key {
                return Err(StorageError::invalid_snapshot(format!(
                    "{} is not below next key {}",
                    object.key, graph.next_key
                )));
            }
            graph.objects.insert(object.key, stored);
        }

        for (key, object) in &graph.objects {
            match object.parent {
                None if graph.root != Some(*key) => {
                    return Err(StorageError::invalid_snapshot(format!(
                        "{key} has no parent and is not the root"
                    )));
                }
                None => {}
                Some((parent, list)) => {
                    let listed = graph
                        .objects
                        .get(&parent)
                        .and_then(|p| p.lists.get(&list))
                        .is_some_and(|members| members.contains(key));
                    if !listed {
                        return Err(StorageError::invalid_snapshot(format!(
                            "{key} is not listed in {parent}/{list}"
                        )));
                    }
                }
            }
            for value in object.values.values() {
                if let Some(target) = value.as_reference() {
                    if !graph.objects.contains_key(&target) {
                        return Err(StorageError::invalid_snapshot(format!(
                            "{key} references missing {target}"
                        )));
                    }
                }
            }
        }

        Ok(Self {
            schemas,
            state: RwLock::new(StoreState {
                committed: graph,
                staged: None,
                owner: None,
            }),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        let state = self.state.read();
        match &state.staged {
            Some(staged) if state.owner == Some(thread::current().id()) => f(staged),
            _ => f(&state.committed),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut Graph) -> StorageResult<R>) -> StorageResult<R> {
        let mut state = self.state.write();
        let graph = state.staged.as_mut().ok_or(StorageError::NoTransaction)?;
        f(graph)
    }
}

impl CommittedStore for InMemoryStore {
    fn schemas(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.schemas)
    }

    fn start_transaction(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.staged.is_some() {
            return Err(StorageError::TransactionActive);
        }
        state.staged = Some(state.committed.clone());
        state.owner = Some(thread::current().id());
        Ok(())
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        let staged = state.staged.take().ok_or(StorageError::NoTransaction)?;
        state.owner = None;
        debug!(objects = staged.objects.len(), "store transaction committed");
        state.committed = staged;
        Ok(())
    }

    fn rollback_transaction(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        state.staged.take().ok_or(StorageError::NoTransaction)?;
        state.owner = None;
        debug!("store transaction rolled back");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.state.read().staged.is_some()
    }

    fn root(&self) -> Option<ObjectKey> {
        self.read(|graph| graph.root)
    }

    fn contains(&self, key: ObjectKey) -> bool {
        self.read(|graph| graph.objects.contains_key(&key))
    }

    fn entity_type(&self, key: ObjectKey) -> StorageResult<EntityTypeId> {
        self.read(|graph| graph.object(key).map(|o| o.entity))
    }

    fn get_property(&self, key: ObjectKey, property: PropertyId) -> StorageResult<Value> {
        self.read(|graph| {
            let object = graph.object(key)?;
            self.schemas
                .schema_for(object.entity)?
                .value_property(property)?;
            Ok(object.values.get(&property).cloned().unwrap_or(Value::Null))
        })
    }

    fn list_members(&self, parent: ObjectKey, list: PropertyId) -> StorageResult<Vec<ObjectKey>> {
        self.read(|graph| {
            let object = graph.object(parent)?;
            self.schemas.schema_for(object.entity)?.list_property(list)?;
            Ok(object.lists.get(&list).cloned().unwrap_or_default())
        })
    }

    fn parent_of(&self, key: ObjectKey) -> StorageResult<Option<(ObjectKey, PropertyId)>> {
        self.read(|graph| graph.object(key).map(|o| o.parent))
    }

    fn create_child(
        &self,
        parent: ObjectKey,
        list: PropertyId,
        entity: EntityTypeId,
    ) -> StorageResult<ObjectKey> {
        let schema = self.schemas.schema_for(entity)?;
        self.write(|graph| {
            graph.check_list(&self.schemas, parent, list, entity)?;
            let key = graph.allocate_key();
            graph
                .objects
                .insert(key, StoredObject::with_defaults(schema, Some((parent, list))));
            graph
                .object_mut(parent)?
                .lists
                .entry(list)
                .or_default()
                .push(key);
            Ok(key)
        })
    }

    fn set_property(&self, key: ObjectKey, property: PropertyId, value: Value) -> StorageResult<()> {
        self.write(|graph| {
            let entity = graph.object(key)?.entity;
            let descriptor = self.schemas.schema_for(entity)?.value_property(property)?;
            descriptor.check_value(&value)?;
            if let (Some(expected), Some(target)) =
                (descriptor.reference_target(), value.as_reference())
            {
                let actual = graph.object(target)?.entity;
                if actual != expected {
                    return Err(StorageError::ReferenceTargetMismatch {
                        property,
                        expected,
                        actual,
                    });
                }
            }
            graph.object_mut(key)?.values.insert(property, value);
            Ok(())
        })
    }

    fn move_child(&self, key: ObjectKey, parent: ObjectKey, list: PropertyId) -> StorageResult<()> {
        self.write(|graph| {
            let object = graph.object(key)?;
            let entity = object.entity;
            let Some((old_parent, old_list)) = object.parent else {
                return Err(StorageError::NotAMember { parent, list, key });
            };
            graph.check_list(&self.schemas, parent, list, entity)?;
            if graph.is_ancestor_or_self(key, parent)? {
                return Err(StorageError::CyclicMove { key, parent });
            }
            if let Some(members) = graph.object_mut(old_parent)?.lists.get_mut(&old_list) {
                members.retain(|m| *m != key);
            }
            graph
                .object_mut(parent)?
                .lists
                .entry(list)
                .or_default()
                .push(key);
            graph.object_mut(key)?.parent = Some((parent, list));
            Ok(())
        })
    }

    fn delete_child(
        &self,
        parent: ObjectKey,
        list: PropertyId,
        key: ObjectKey,
    ) -> StorageResult<()> {
        self.write(|graph| {
            let listed = graph
                .object(parent)?
                .lists
                .get(&list)
                .is_some_and(|members| members.contains(&key));
            if !listed {
                return Err(StorageError::NotAMember { parent, list, key });
            }

            let doomed = graph.subtree(key)?;
            for (referrer, object) in &graph.objects {
                if doomed.contains(referrer) {
                    continue;
                }
                for (property, value) in &object.values {
                    if let Some(target) = value.as_reference() {
                        if doomed.contains(&target) {
                            return Err(StorageError::StillReferenced {
                                key: target,
                                referrer: *referrer,
                                property: *property,
                            });
                        }
                    }
                }
            }

            for gone in &doomed {
                graph.objects.remove(gone);
            }
            if let Some(members) = graph.object_mut(parent)?.lists.get_mut(&list) {
                members.retain(|m| *m != key);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    const FOLDER: EntityTypeId = EntityTypeId::new(1);
    const FOLDER_NAME: PropertyId = PropertyId::new(FOLDER, 0);
    const FOLDER_FOLDERS: PropertyId = PropertyId::new(FOLDER, 1);
    const FOLDER_FILES: PropertyId = PropertyId::new(FOLDER, 2);
    const FILE: EntityTypeId = EntityTypeId::new(2);
    const FILE_SIZE: PropertyId = PropertyId::new(FILE, 0);
    const FILE_LINK: PropertyId = PropertyId::new(FILE, 1);

    fn store() -> InMemoryStore {
        let schemas = SchemaRegistry::builder()
            .entity(
                EntitySchema::new(FOLDER, "Folder")
                    .scalar(FOLDER_NAME, "name", ValueType::Text)
                    .list(FOLDER_FOLDERS, "folders", FOLDER)
                    .list(FOLDER_FILES, "files", FILE),
            )
            .entity(
                EntitySchema::new(FILE, "File")
                    .scalar(FILE_SIZE, "size", ValueType::Integer)
                    .reference(FILE_LINK, "link", FILE),
            )
            .build()
            .unwrap();
        InMemoryStore::new(Arc::new(schemas))
    }

    fn seeded() -> (InMemoryStore, ObjectKey) {
        let store = store();
        store.start_transaction().unwrap();
        let root = store.create_root(FOLDER).unwrap();
        store.commit_transaction().unwrap();
        (store, root)
    }

    #[test]
    fn writes_require_bracket() {
        let (store, root) = seeded();
        let result = store.set_property(root, FOLDER_NAME, Value::text("x"));
        assert_eq!(result, Err(StorageError::NoTransaction));
    }

    #[test]
    fn nested_bracket_is_rejected() {
        let store = store();
        store.start_transaction().unwrap();
        assert_eq!(store.start_transaction(), Err(StorageError::TransactionActive));
    }

    #[test]
    fn create_child_uses_defaults() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let file = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.commit_transaction().unwrap();

        assert_eq!(store.get_property(file, FILE_SIZE).unwrap(), Value::Integer(0));
        assert_eq!(store.get_property(file, FILE_LINK).unwrap(), Value::Null);
        assert_eq!(store.list_members(root, FOLDER_FILES).unwrap(), vec![file]);
        assert_eq!(store.parent_of(file).unwrap(), Some((root, FOLDER_FILES)));
    }

    #[test]
    fn create_child_checks_member_type() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let result = store.create_child(root, FOLDER_FILES, FOLDER);
        assert!(matches!(
            result,
            Err(StorageError::ReferenceTargetMismatch { .. })
        ));
    }

    #[test]
    fn rollback_discards_writes() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        store
            .set_property(root, FOLDER_NAME, Value::text("changed"))
            .unwrap();
        let file = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.rollback_transaction().unwrap();

        assert_eq!(store.get_property(root, FOLDER_NAME).unwrap(), Value::text(""));
        assert!(!store.contains(file));
    }

    #[test]
    fn reference_target_type_is_checked() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let file = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        let result = store.set_property(file, FILE_LINK, Value::Reference(root));
        assert!(matches!(
            result,
            Err(StorageError::ReferenceTargetMismatch { .. })
        ));
    }

    #[test]
    fn delete_rejects_dangling_reference() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let a = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        let b = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.set_property(a, FILE_LINK, Value::Reference(b)).unwrap();

        let result = store.delete_child(root, FOLDER_FILES, b);
        assert!(matches!(
            result,
            Err(StorageError::StillReferenced { referrer, .. }) if referrer == a
        ));

        store.set_property(a, FILE_LINK, Value::Null).unwrap();
        store.delete_child(root, FOLDER_FILES, b).unwrap();
        store.delete_child(root, FOLDER_FILES, a).unwrap();
        store.commit_transaction().unwrap();
        assert!(store.list_members(root, FOLDER_FILES).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_subtree() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let sub = store.create_child(root, FOLDER_FOLDERS, FOLDER).unwrap();
        let file = store.create_child(sub, FOLDER_FILES, FILE).unwrap();
        store.delete_child(root, FOLDER_FOLDERS, sub).unwrap();
        store.commit_transaction().unwrap();

        assert!(!store.contains(sub));
        assert!(!store.contains(file));
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn move_child_relocates() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let a = store.create_child(root, FOLDER_FOLDERS, FOLDER).unwrap();
        let b = store.create_child(root, FOLDER_FOLDERS, FOLDER).unwrap();
        let file = store.create_child(a, FOLDER_FILES, FILE).unwrap();
        store.move_child(file, b, FOLDER_FILES).unwrap();
        store.commit_transaction().unwrap();

        assert!(store.list_members(a, FOLDER_FILES).unwrap().is_empty());
        assert_eq!(store.list_members(b, FOLDER_FILES).unwrap(), vec![file]);
        assert_eq!(store.parent_of(file).unwrap(), Some((b, FOLDER_FILES)));
    }

    #[test]
    fn move_into_own_subtree_is_rejected() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let a = store.create_child(root, FOLDER_FOLDERS, FOLDER).unwrap();
        let inner = store.create_child(a, FOLDER_FOLDERS, FOLDER).unwrap();
        assert!(matches!(
            store.move_child(a, inner, FOLDER_FOLDERS),
            Err(StorageError::CyclicMove { .. })
        ));
    }

    #[test]
    fn keys_are_not_reused() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let a = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.delete_child(root, FOLDER_FILES, a).unwrap();
        let b = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.commit_transaction().unwrap();
        assert!(b > a);
    }

    #[test]
    fn snapshot_restores_graph() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let file = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.set_property(file, FILE_SIZE, Value::Integer(12)).unwrap();
        store.commit_transaction().unwrap();

        let snapshot = store.snapshot();
        let restored = InMemoryStore::from_snapshot(store.schemas(), snapshot).unwrap();
        assert_eq!(restored.root(), Some(root));
        assert_eq!(restored.get_property(file, FILE_SIZE).unwrap(), Value::Integer(12));

        restored.start_transaction().unwrap();
        let next = restored.create_child(root, FOLDER_FILES, FILE).unwrap();
        assert!(next > file);
    }

    #[test]
    fn other_threads_read_committed_graph_during_bracket() {
        let (store, root) = seeded();
        let store = Arc::new(store);
        store.start_transaction().unwrap();
        store
            .set_property(root, FOLDER_NAME, Value::text("staged"))
            .unwrap();
        let file = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        assert_eq!(store.get_property(root, FOLDER_NAME).unwrap(), Value::text("staged"));

        let reader = Arc::clone(&store);
        let seen = std::thread::spawn(move || {
            (
                reader.get_property(root, FOLDER_NAME).unwrap(),
                reader.contains(file),
                reader.list_members(root, FOLDER_FILES).unwrap(),
            )
        })
        .join()
        .unwrap();
        assert_eq!(seen, (Value::text(""), false, Vec::new()));

        store.commit_transaction().unwrap();
        let reader = Arc::clone(&store);
        let seen = std::thread::spawn(move || reader.get_property(root, FOLDER_NAME).unwrap())
            .join()
            .unwrap();
        assert_eq!(seen, Value::text("staged"));
    }

    #[test]
    fn snapshot_with_orphan_is_rejected() {
        let (store, root) = seeded();
        store.start_transaction().unwrap();
        let file = store.create_child(root, FOLDER_FILES, FILE).unwrap();
        store.commit_transaction().unwrap();

        let mut snapshot = store.snapshot();
        for object in &mut snapshot.objects {
            if object.key == root {
                object.lists.clear();
            }
        }
        let result = InMemoryStore::from_snapshot(store.schemas(), snapshot);
        assert!(matches!(result, Err(StorageError::InvalidSnapshot(msg)) if msg.contains(&file.to_string())));
    }
}
