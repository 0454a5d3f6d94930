//! Per-id records.
//!
//! The id record store keeps one [`IdRecord`] per distinct [`Id`] the world
//! has observed. A record answers the questions every access has to settle
//! before touching memory: does this id carry data, which component entity
//! supplies the type, is the payload dense or sparse, and which tables
//! contain the id (and where in their layout).
//!
//! Records are created lazily and idempotently. For relationship pairs the
//! data type is resolved by one centralized rule: the relation supplies the
//! type unless it is a zero-size tag and the target carries a type, in which
//! case the target supplies it. A pair whose sides are both typed follows the
//! relation. Storage kind and the exclusive flag are inherited from the
//! winning side's plain record.
//!
//! Tables register themselves here on creation. A pair additionally registers
//! under its relation-wildcard id, so "every table with (R, *)" is one map
//! lookup with the length of the pair run cached alongside.

use std::collections::HashMap;

use strata_component::{Entity, Id, TypeInfo, TypeRegistry};

use crate::entity_index::EntityIndex;
use crate::error::StorageError;
use crate::sparse::SparseColumn;
use crate::table::Table;
use crate::tables::TableHandle;

/// How an id's payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Values live in a dense table column.
    Dense,
    /// Values live in the record's own sparse column.
    Sparse,
}

/// Where an id sits inside one table's layout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableRecord {
    /// Position in the table's sorted id list; for a relation-wildcard
    /// record, the start of the pair run.
    pub(crate) type_index: u32,
    /// Index of the dense column holding the id's values, if any.
    pub(crate) column: Option<u32>,
    /// Ids covered: 1 for a concrete id, the run length for a wildcard.
    pub(crate) count: u32,
}

enum IdStorage {
    Dense,
    Sparse(SparseColumn),
}

/// Everything the world knows about one id.
pub struct IdRecord {
    id: Id,
    type_info: Option<TypeInfo>,
    /// The component entity whose registration supplied `type_info`.
    type_source: Option<Entity>,
    storage: IdStorage,
    exclusive: bool,
    tables: HashMap<TableHandle, TableRecord>,
}

impl IdRecord {
    /// The id this record describes.
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns `true` if the id encodes a relationship pair.
    #[must_use]
    pub fn is_pair(&self) -> bool {
        self.id.is_pair()
    }

    /// How this id's payload is stored.
    #[must_use]
    pub fn storage_kind(&self) -> StorageKind {
        match self.storage {
            IdStorage::Dense => StorageKind::Dense,
            IdStorage::Sparse(_) => StorageKind::Sparse,
        }
    }

    /// Returns `true` if the payload lives in sparse storage.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        self.storage_kind() == StorageKind::Sparse
    }

    /// Returns `true` if the id is a relation marked exclusive, or a pair
    /// whose relation is.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The data type carried by this id. `None` means the id is a tag.
    #[must_use]
    pub fn type_info(&self) -> Option<&TypeInfo> {
        self.type_info.as_ref()
    }

    /// The component entity that supplied [`IdRecord::type_info`].
    #[must_use]
    pub fn type_source(&self) -> Option<Entity> {
        self.type_source
    }

    /// Number of tables currently containing this id.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub(crate) fn table_record(&self, table: TableHandle) -> Option<&TableRecord> {
        self.tables.get(&table)
    }

    pub(crate) fn table_handles(&self) -> impl Iterator<Item = TableHandle> + '_ {
        self.tables.keys().copied()
    }

    /// The type to give a dense column for this id, if it gets one.
    pub(crate) fn dense_info(&self) -> Option<TypeInfo> {
        match self.storage {
            IdStorage::Dense => self.type_info,
            IdStorage::Sparse(_) => None,
        }
    }

    pub(crate) fn sparse(&self) -> Option<&SparseColumn> {
        match &self.storage {
            IdStorage::Dense => None,
            IdStorage::Sparse(column) => Some(column),
        }
    }

    pub(crate) fn sparse_mut(&mut self) -> Option<&mut SparseColumn> {
        match &mut self.storage {
            IdStorage::Dense => None,
            IdStorage::Sparse(column) => Some(column),
        }
    }

    pub(crate) fn insert_table(&mut self, table: TableHandle, record: TableRecord) {
        self.tables.insert(table, record);
    }

    pub(crate) fn remove_table(&mut self, table: TableHandle) {
        self.tables.remove(&table);
    }

    /// Returns `true` while any table or sparse value still references the id.
    pub(crate) fn in_use(&self) -> bool {
        !self.tables.is_empty() || self.sparse().is_some_and(|column| column.len() > 0)
    }

    /// Returns `true` for plain records carrying storage configuration.
    ///
    /// Sparse routing and exclusivity are set on the component or relation
    /// entity's own record; pairs only inherit them. A configured record must
    /// outlive its uses, or the setting would silently reset once the last
    /// table is purged.
    fn is_configured(&self) -> bool {
        !self.id.is_pair() && (self.exclusive || self.is_sparse())
    }
}

impl std::fmt::Debug for IdRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdRecord")
            .field("id", &self.id)
            .field("kind", &self.storage_kind())
            .field("type", &self.type_info.as_ref().map(TypeInfo::name))
            .field("exclusive", &self.exclusive)
            .field("tables", &self.tables.len())
            .finish()
    }
}

/// What resolution decided about an id before its record exists.
struct Resolution {
    type_info: Option<TypeInfo>,
    type_source: Option<Entity>,
    sparse: bool,
    exclusive: bool,
}

/// The store of all id records.
pub(crate) struct IdRecordStore {
    records: HashMap<Id, IdRecord>,
    /// Rows per sparse page, shared by every sparse column created here.
    sparse_page_rows: usize,
}

impl IdRecordStore {
    pub(crate) fn new(sparse_page_rows: usize) -> Self {
        Self {
            records: HashMap::new(),
            sparse_page_rows,
        }
    }

    pub(crate) fn get(&self, id: Id) -> Option<&IdRecord> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Id) -> Option<&mut IdRecord> {
        self.records.get_mut(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// The record for `id`, created on first reference.
    ///
    /// Creation resolves the type and storage kind once; both are fixed for
    /// the record's lifetime. Sparse records allocate their column eagerly.
    pub(crate) fn get_or_create(
        &mut self,
        id: Id,
        registry: &TypeRegistry,
        entities: &EntityIndex,
    ) -> &mut IdRecord {
        let resolved = self.resolve(id, registry, entities);
        let page_rows = self.sparse_page_rows;
        self.records
            .entry(id)
            .or_insert_with(|| IdRecord::with_resolution(id, resolved, page_rows))
    }

    /// The data type and supplying component entity for `id`, without
    /// creating a record.
    ///
    /// Uses the record's cached resolution when one exists.
    pub(crate) fn type_of(
        &self,
        id: Id,
        registry: &TypeRegistry,
        entities: &EntityIndex,
    ) -> (Option<TypeInfo>, Option<Entity>) {
        match self.records.get(&id) {
            Some(record) => (record.type_info().copied(), record.type_source()),
            None => {
                let resolved = self.resolve(id, registry, entities);
                (resolved.type_info, resolved.type_source)
            }
        }
    }

    /// Route a registered component's payload to sparse storage.
    ///
    /// Must happen before the component id is used anywhere; the storage kind
    /// of an id in use is fixed. Pair records that resolved through the
    /// component earlier are retired so their next use picks up the routing.
    pub(crate) fn set_sparse(
        &mut self,
        component: Entity,
        registry: &TypeRegistry,
    ) -> Result<(), StorageError> {
        let id = Id::entity(component);
        self.ensure_unused(component)?;
        let Some(info) = data_type(registry, id) else {
            return Err(StorageError::UntypedId(id));
        };
        self.retire_pair_resolutions(component);
        let record = IdRecord {
            id,
            type_info: Some(info),
            type_source: Some(component),
            storage: IdStorage::Sparse(SparseColumn::new(info, self.sparse_page_rows)),
            exclusive: self.records.get(&id).is_some_and(IdRecord::is_exclusive),
            tables: HashMap::new(),
        };
        self.records.insert(id, record);
        Ok(())
    }

    /// Mark a relation exclusive: at most one target per entity.
    ///
    /// Must happen before the relation id is used anywhere. Pair records
    /// that resolved through the relation earlier are retired so their next
    /// use picks up the flag.
    pub(crate) fn set_exclusive(
        &mut self,
        relation: Entity,
        registry: &TypeRegistry,
        entities: &EntityIndex,
    ) -> Result<(), StorageError> {
        let id = Id::entity(relation);
        self.ensure_unused(relation)?;
        self.retire_pair_resolutions(relation);
        let record = self.get_or_create(id, registry, entities);
        record.exclusive = true;
        Ok(())
    }

    /// Record `table`'s layout in every id it contains.
    ///
    /// Pairs also register under their relation-wildcard id with the run
    /// length, so relation-level scans skip straight to the right tables.
    pub(crate) fn register_table(
        &mut self,
        table: &Table,
        registry: &TypeRegistry,
        entities: &EntityIndex,
    ) {
        let handle = table.handle();
        let ids = table.ids();
        for (pos, &id) in ids.iter().enumerate() {
            let record = self.get_or_create(id, registry, entities);
            record.insert_table(
                handle,
                TableRecord {
                    type_index: pos as u32,
                    column: table.column_of(id).map(|column| column as u32),
                    count: 1,
                },
            );
        }
        let mut run = ids.partition_point(|id| !id.is_pair());
        while run < ids.len() {
            let relation = ids[run].relation_index();
            let mut end = run + 1;
            while end < ids.len() && ids[end].relation_index() == relation {
                end += 1;
            }
            let record = self.get_or_create(ids[run].with_wildcard_target(), registry, entities);
            record.insert_table(
                handle,
                TableRecord {
                    type_index: run as u32,
                    column: None,
                    count: (end - run) as u32,
                },
            );
            run = end;
        }
    }

    /// Drop `table` from every cache entry that references it.
    ///
    /// Records left with no tables and no sparse values are retired, except
    /// plain records configured with [`IdRecordStore::set_sparse`] or
    /// [`IdRecordStore::set_exclusive`]; those live as long as their entity.
    pub(crate) fn unregister_table(&mut self, table: &Table) {
        let handle = table.handle();
        for &id in table.ids() {
            self.evict(id, handle);
            if id.is_pair() {
                self.evict(id.with_wildcard_target(), handle);
            }
        }
    }

    /// Returns `true` if `entity` is referenced as a component, tag,
    /// relation, or target by any record still in use.
    pub(crate) fn entity_in_use_as_id(&self, entity: Entity) -> bool {
        self.records.values().any(|record| {
            if !record.in_use() {
                return false;
            }
            let id = record.id;
            if id.is_pair() {
                id.relation_index() == entity.index() || id.target_index() == entity.index()
            } else {
                id == Id::entity(entity)
            }
        })
    }

    /// Drop every dataless record that references a despawned entity.
    ///
    /// This is where an entity's own configuration record goes away, along
    /// with any cached pair resolutions naming it. Records holding data are
    /// untouched; the despawn guard has already rejected entities with those.
    pub(crate) fn release_entity_records(&mut self, entity: Entity) {
        self.records.retain(|&id, record| {
            if record.in_use() {
                return true;
            }
            let references = if id.is_pair() {
                id.relation_index() == entity.index() || id.target_index() == entity.index()
            } else {
                id == Id::entity(entity)
            };
            !references
        });
    }

    fn evict(&mut self, id: Id, handle: TableHandle) {
        if let Some(record) = self.records.get_mut(&id) {
            record.remove_table(handle);
            if !record.in_use() && !record.is_configured() {
                self.records.remove(&id);
            }
        }
    }

    /// Retire dataless pair records that name `entity` on either side.
    ///
    /// A pair inherits sparse routing and exclusivity when its record is
    /// created; a record cached before a flag was set would keep serving the
    /// old resolution. Records holding data are untouched, and the
    /// configuration setters reject those through [`Self::ensure_unused`]
    /// before sweeping.
    fn retire_pair_resolutions(&mut self, entity: Entity) {
        self.records.retain(|&id, record| {
            if !id.is_pair() || record.in_use() {
                return true;
            }
            id.relation_index() != entity.index() && id.target_index() != entity.index()
        });
    }

    fn ensure_unused(&self, entity: Entity) -> Result<(), StorageError> {
        if self.entity_in_use_as_id(entity) {
            return Err(StorageError::IdInUse(entity));
        }
        Ok(())
    }

    /// The one place pair type precedence lives.
    ///
    /// Relation wins unless it is a zero-size tag and the target carries a
    /// type; when both sides carry a type, the relation's is used. Storage
    /// kind follows the side that supplied the type; exclusivity always
    /// follows the relation.
    fn resolve(&self, id: Id, registry: &TypeRegistry, entities: &EntityIndex) -> Resolution {
        if !id.is_pair() {
            let info = data_type(registry, id);
            return Resolution {
                type_info: info,
                type_source: info.and_then(|_| id.as_entity()),
                sparse: false,
                exclusive: false,
            };
        }

        let relation = entities.current(id.relation_index());
        let target = entities.current(id.target_index());
        let relation_info = relation.and_then(|e| data_type(registry, Id::entity(e)));
        let target_info = target.and_then(|e| data_type(registry, Id::entity(e)));

        let (type_info, type_source) = match (relation_info, target_info) {
            (Some(info), _) => (Some(info), relation),
            (None, Some(info)) => (Some(info), target),
            (None, None) => (None, None),
        };
        // Wildcard ids never hold values themselves; their records exist only
        // as table caches.
        let sparse = !id.is_wildcard()
            && type_info.is_some()
            && type_source
                .and_then(|e| self.records.get(&Id::entity(e)))
                .is_some_and(IdRecord::is_sparse);
        let exclusive = relation
            .and_then(|e| self.records.get(&Id::entity(e)))
            .is_some_and(IdRecord::is_exclusive);
        Resolution {
            type_info,
            type_source,
            sparse,
            exclusive,
        }
    }
}

impl IdRecord {
    fn with_resolution(id: Id, resolved: Resolution, sparse_page_rows: usize) -> Self {
        let storage = match (resolved.sparse, resolved.type_info) {
            (true, Some(info)) => IdStorage::Sparse(SparseColumn::new(info, sparse_page_rows)),
            _ => IdStorage::Dense,
        };
        Self {
            id,
            type_info: resolved.type_info,
            type_source: resolved.type_source,
            storage,
            exclusive: resolved.exclusive,
            tables: HashMap::new(),
        }
    }
}

/// The registered data type behind a plain id, with zero-size registrations
/// treated as tags.
fn data_type(registry: &TypeRegistry, id: Id) -> Option<TypeInfo> {
    registry
        .lookup(id)
        .copied()
        .filter(|info| !info.is_zero_sized())
}

#[cfg(test)]
mod tests {
    use strata_component::Component;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Mass(f64);

    impl Component for Mass {
        fn type_name() -> &'static str {
            "Mass"
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Distance(u32);

    impl Component for Distance {
        fn type_name() -> &'static str {
            "Distance"
        }
    }

    struct Fixture {
        store: IdRecordStore,
        registry: TypeRegistry,
        entities: EntityIndex,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: IdRecordStore::new(64),
                registry: TypeRegistry::new(),
                entities: EntityIndex::with_capacity(8),
            }
        }

        fn typed<T: Component>(&mut self) -> Entity {
            let e = self.entities.spawn();
            self.registry
                .register(Id::entity(e), TypeInfo::of::<T>())
                .unwrap();
            e
        }

        fn tag(&mut self) -> Entity {
            self.entities.spawn()
        }

        fn record(&mut self, id: Id) -> &mut IdRecord {
            self.store.get_or_create(id, &self.registry, &self.entities)
        }
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let id = Id::entity(mass);

        let (kind, info) = {
            let record = fx.record(id);
            (record.storage_kind(), record.type_info().copied())
        };
        let record = fx.record(id);
        assert_eq!(record.storage_kind(), kind);
        assert_eq!(record.type_info().map(TypeInfo::name), info.map(|i| i.name()));
        assert_eq!(fx.store.len(), 1);
    }

    #[test]
    fn test_plain_id_resolution() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let tag = fx.tag();

        let record = fx.record(Id::entity(mass));
        assert_eq!(record.type_info().map(TypeInfo::name), Some("Mass"));
        assert_eq!(record.type_source(), Some(mass));
        assert_eq!(record.storage_kind(), StorageKind::Dense);

        let record = fx.record(Id::entity(tag));
        assert!(record.type_info().is_none());
        assert!(record.type_source().is_none());
    }

    #[test]
    fn test_zero_size_registration_acts_as_tag() {
        #[derive(Debug, Default, Clone)]
        struct Marker;

        impl Component for Marker {
            fn type_name() -> &'static str {
                "Marker"
            }
        }

        let mut fx = Fixture::new();
        let marker = fx.typed::<Marker>();
        let record = fx.record(Id::entity(marker));
        assert!(record.type_info().is_none());
    }

    #[test]
    fn test_pair_type_relation_wins() {
        let mut fx = Fixture::new();
        let relation = fx.typed::<Mass>();
        let target = fx.typed::<Distance>();

        let record = fx.record(Id::pair(relation, target));
        assert_eq!(record.type_info().map(TypeInfo::name), Some("Mass"));
        assert_eq!(record.type_source(), Some(relation));
    }

    #[test]
    fn test_pair_type_target_fallback() {
        let mut fx = Fixture::new();
        let relation = fx.tag();
        let target = fx.typed::<Distance>();

        let record = fx.record(Id::pair(relation, target));
        assert_eq!(record.type_info().map(TypeInfo::name), Some("Distance"));
        assert_eq!(record.type_source(), Some(target));
    }

    #[test]
    fn test_pair_of_two_tags_is_a_tag() {
        let mut fx = Fixture::new();
        let relation = fx.tag();
        let target = fx.tag();

        let record = fx.record(Id::pair(relation, target));
        assert!(record.type_info().is_none());
        assert_eq!(record.storage_kind(), StorageKind::Dense);
    }

    #[test]
    fn test_set_sparse_requires_a_data_type() {
        let mut fx = Fixture::new();
        let tag = fx.tag();
        let err = fx.store.set_sparse(tag, &fx.registry);
        assert!(matches!(err, Err(StorageError::UntypedId(_))));
    }

    #[test]
    fn test_set_sparse_allocates_column_and_pairs_inherit() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let target = fx.tag();
        fx.store.set_sparse(mass, &fx.registry).unwrap();

        let record = fx.record(Id::entity(mass));
        assert_eq!(record.storage_kind(), StorageKind::Sparse);
        assert!(record.sparse().is_some());

        let pair = fx.record(Id::pair(mass, target));
        assert!(pair.is_sparse());
        assert!(pair.sparse().is_some());
    }

    #[test]
    fn test_set_sparse_rejected_once_in_use() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        fx.record(Id::entity(mass))
            .insert_table(
                TableHandle::new(1, 0),
                TableRecord {
                    type_index: 0,
                    column: Some(0),
                    count: 1,
                },
            );

        let err = fx.store.set_sparse(mass, &fx.registry);
        assert!(matches!(err, Err(StorageError::IdInUse(e)) if e == mass));
    }

    #[test]
    fn test_set_exclusive_flag_flows_to_pairs() {
        let mut fx = Fixture::new();
        let child_of = fx.tag();
        let parent = fx.tag();
        fx.store
            .set_exclusive(child_of, &fx.registry, &fx.entities)
            .unwrap();

        assert!(fx.record(Id::entity(child_of)).is_exclusive());
        assert!(fx.record(Id::pair(child_of, parent)).is_exclusive());
        assert!(!fx.record(Id::pair(parent, child_of)).is_exclusive());
    }

    #[test]
    fn test_set_sparse_reaches_previously_resolved_pairs() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let target = fx.tag();
        let pair = Id::pair(mass, target);
        assert!(!fx.record(pair).is_sparse());

        fx.store.set_sparse(mass, &fx.registry).unwrap();
        let record = fx.record(pair);
        assert!(record.is_sparse());
        assert!(record.sparse().is_some());
    }

    #[test]
    fn test_set_exclusive_reaches_previously_resolved_pairs() {
        let mut fx = Fixture::new();
        let child_of = fx.tag();
        let parent = fx.tag();
        let pair = Id::pair(child_of, parent);
        assert!(!fx.record(pair).is_exclusive());

        fx.store
            .set_exclusive(child_of, &fx.registry, &fx.entities)
            .unwrap();
        assert!(fx.record(pair).is_exclusive());
    }

    #[test]
    fn test_unregister_retires_unused_records() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let likes = fx.tag();
        let bob = fx.tag();
        let ids: Box<[Id]> = vec![Id::entity(mass), Id::pair(likes, bob)]
            .into_boxed_slice();
        let table = Table::new(
            TableHandle::new(1, 0),
            ids,
            vec![Some(0), None].into_boxed_slice(),
            vec![crate::column::Column::new(
                Id::entity(mass),
                TypeInfo::of::<Mass>(),
            )],
        );
        fx.store.register_table(&table, &fx.registry, &fx.entities);

        let pair = Id::pair(likes, bob);
        assert_eq!(fx.record(Id::entity(mass)).table_count(), 1);
        assert_eq!(fx.record(pair).table_count(), 1);
        let wildcard = pair.with_wildcard_target();
        assert_eq!(fx.record(wildcard).table_count(), 1);

        fx.store.unregister_table(&table);
        assert!(fx.store.get(Id::entity(mass)).is_none());
        assert!(fx.store.get(pair).is_none());
        assert!(fx.store.get(wildcard).is_none());

        // A fresh reference recreates the record with the same resolution.
        let record = fx.record(Id::entity(mass));
        assert_eq!(record.type_info().map(TypeInfo::name), Some("Mass"));
        assert_eq!(record.storage_kind(), StorageKind::Dense);
    }

    #[test]
    fn test_configured_records_survive_table_eviction() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let likes = fx.tag();
        let bob = fx.tag();
        fx.store.set_sparse(mass, &fx.registry).unwrap();
        fx.store
            .set_exclusive(likes, &fx.registry, &fx.entities)
            .unwrap();

        // The sparse component has no dense column; everything else is a tag.
        let ids: Box<[Id]> =
            vec![Id::entity(mass), Id::entity(likes), Id::pair(likes, bob)].into_boxed_slice();
        let table = Table::new(
            TableHandle::new(1, 0),
            ids,
            vec![None, None, None].into_boxed_slice(),
            Vec::new(),
        );
        fx.store.register_table(&table, &fx.registry, &fx.entities);
        fx.store.unregister_table(&table);

        // Derived pair records retire; configured plain records do not.
        assert!(fx.store.get(Id::pair(likes, bob)).is_none());
        assert!(fx.store.get(Id::pair(likes, bob).with_wildcard_target()).is_none());
        let mass_record = fx.store.get(Id::entity(mass)).unwrap();
        assert!(mass_record.is_sparse());
        assert_eq!(mass_record.table_count(), 0);
        assert!(fx.store.get(Id::entity(likes)).unwrap().is_exclusive());
    }

    #[test]
    fn test_release_entity_records_drops_dataless_references() {
        let mut fx = Fixture::new();
        let child_of = fx.tag();
        let parent = fx.tag();
        fx.store
            .set_exclusive(child_of, &fx.registry, &fx.entities)
            .unwrap();
        fx.record(Id::pair(child_of, parent));

        // Dropping the target sweeps the cached pair but not the relation's
        // configuration record.
        fx.store.release_entity_records(parent);
        assert!(fx.store.get(Id::pair(child_of, parent)).is_none());
        assert!(fx.store.get(Id::entity(child_of)).is_some());

        fx.store.release_entity_records(child_of);
        assert!(fx.store.get(Id::entity(child_of)).is_none());
        assert_eq!(fx.store.len(), 0);
    }
}
