//! The world: one storage instance and its public surface.
//!
//! A [`World`] owns the four stores — type registry, id records, tables,
//! entity index — and routes every operation through them. Reads take
//! `&World` and hand out references scoped to that borrow; structural
//! changes (spawn, despawn, add/remove ids) take `&mut World`, so the borrow
//! checker enforces the single-writer discipline the storage layout assumes:
//! pointers and references obtained from an access are valid until the next
//! structural mutation, and no longer.
//!
//! Structural changes follow reserve-then-commit: all allocation happens
//! before the first destructive step, so an allocation failure leaves the
//! world exactly as it was.

use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;

use tracing::{debug, trace};

use strata_component::{Component, Entity, Id, TypeInfo, TypeKey, TypeRegistry};

use crate::entity_index::EntityIndex;
use crate::error::StorageError;
use crate::id_record::{IdRecord, IdRecordStore};
use crate::table::{Table, transfer_row};
use crate::tables::{TableHandle, Tables};

/// Construction-time settings for a [`World`].
#[derive(Debug, Clone)]
pub struct WorldConfig {
    initial_entity_capacity: usize,
    sparse_page_rows: usize,
}

impl WorldConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_entity_capacity: 256,
            sparse_page_rows: 64,
        }
    }

    /// Entity slots to preallocate.
    #[must_use]
    pub fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }

    /// Rows per sparse storage page.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is not a power of two.
    #[must_use]
    pub fn with_sparse_page_rows(mut self, rows: usize) -> Self {
        assert!(
            rows.is_power_of_two(),
            "sparse page size must be a power of two"
        );
        self.sparse_page_rows = rows;
        self
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Entity-component storage: entities, their component values, and the
/// relationship metadata connecting them.
pub struct World {
    registry: TypeRegistry,
    records: IdRecordStore,
    tables: Tables,
    entities: EntityIndex,
    /// Rust type → the component entity registered for it.
    components_by_key: HashMap<TypeKey, Entity>,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            registry: TypeRegistry::new(),
            records: IdRecordStore::new(config.sparse_page_rows),
            tables: Tables::new(),
            entities: EntityIndex::with_capacity(config.initial_entity_capacity),
            components_by_key: HashMap::new(),
        }
    }

    // ---- registration ----------------------------------------------------

    /// Register `T` as a component type, returning its component entity.
    ///
    /// Idempotent: repeated calls return the same entity. The drop hook is
    /// installed only when `T` needs one; values of `T` are moved, never
    /// copied (see [`World::register_cloneable`]).
    pub fn register_component<T: Component>(&mut self) -> Result<Entity, StorageError> {
        self.register_with_info::<T>(TypeInfo::of::<T>())
    }

    /// Register `T` with a copy hook backed by `Clone`, enabling
    /// [`World::set_raw`] for it.
    pub fn register_cloneable<T: Component + Clone>(&mut self) -> Result<Entity, StorageError> {
        self.register_with_info::<T>(TypeInfo::of_cloneable::<T>())
    }

    /// Attach `info` to an existing entity, making it usable as a typed id.
    ///
    /// This is the untyped registration path for types without a `Component`
    /// implementation. Re-registration with an identical layout is a no-op;
    /// a different layout fails with a type conflict.
    pub fn register_type(&mut self, entity: Entity, info: TypeInfo) -> Result<(), StorageError> {
        if !self.entities.is_alive(entity) {
            return Err(StorageError::DeadEntity(entity));
        }
        self.registry.register(Id::entity(entity), info)?;
        debug!(component = info.name(), entity = %entity, "type registered");
        Ok(())
    }

    /// The component entity registered for `T`, if any.
    #[must_use]
    pub fn component_entity<T: Component>(&self) -> Option<Entity> {
        self.components_by_key.get(&T::type_key()).copied()
    }

    /// Route a registered component's payload to sparse storage.
    ///
    /// Must be called before the component id is used anywhere; the storage
    /// kind of an id in use is fixed. The component must carry data.
    pub fn set_sparse(&mut self, component: Entity) -> Result<(), StorageError> {
        if !self.entities.is_alive(component) {
            return Err(StorageError::DeadEntity(component));
        }
        self.records.set_sparse(component, &self.registry)
    }

    /// Mark a relation exclusive: adding a pair with it replaces any existing
    /// pair with the same relation on the same entity.
    ///
    /// Must be called before the relation id is used anywhere.
    pub fn set_exclusive(&mut self, relation: Entity) -> Result<(), StorageError> {
        if !self.entities.is_alive(relation) {
            return Err(StorageError::DeadEntity(relation));
        }
        self.records
            .set_exclusive(relation, &self.registry, &self.entities)
    }

    fn register_with_info<T: Component>(&mut self, info: TypeInfo) -> Result<Entity, StorageError> {
        if let Some(&entity) = self.components_by_key.get(&T::type_key()) {
            // Re-registration goes through the registry's layout check.
            self.registry.register(Id::entity(entity), info)?;
            return Ok(entity);
        }
        let entity = self.spawn()?;
        self.registry.register(Id::entity(entity), info)?;
        self.components_by_key.insert(T::type_key(), entity);
        debug!(component = T::type_name(), entity = %entity, "component registered");
        Ok(entity)
    }

    // ---- entity lifecycle ------------------------------------------------

    /// Create a live entity with no ids, placed in the root table.
    pub fn spawn(&mut self) -> Result<Entity, StorageError> {
        let entity = self.entities.spawn();
        let root = self.tables.root();
        let table = &mut self.tables[root];
        if let Err(err) = table.reserve_row() {
            // Take the fresh id back so a failed spawn leaves no trace.
            let _ = self.entities.despawn(entity);
            return Err(err);
        }
        let row = table.push_row_default(entity);
        self.entities.set_location(entity, root, row);
        trace!(entity = %entity, "entity spawned");
        Ok(entity)
    }

    /// Destroy `entity`, dropping its table row and every sparse value it
    /// holds, and bump its generation so stale handles go dead.
    ///
    /// An entity that is itself in use as an id cannot be destroyed: a
    /// registered type is permanent, and a tag, relation, or target stays
    /// pinned while any table layout mentions it. Emptied tables keep their
    /// ids pinned until [`World::purge_empty_tables`] runs.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), StorageError> {
        if !self.entities.is_alive(entity) {
            return Err(StorageError::DeadEntity(entity));
        }
        if self.registry.lookup(Id::entity(entity)).is_some()
            || self.records.entity_in_use_as_id(entity)
        {
            return Err(StorageError::IdInUse(entity));
        }

        if let Some((handle, row)) = self.entities.locate(entity) {
            let ids: Vec<Id> = self.tables[handle].ids().to_vec();
            for id in ids {
                if let Some(record) = self.records.get_mut(id)
                    && let Some(sparse) = record.sparse_mut()
                {
                    sparse.remove(entity);
                }
            }
            let relocated = self.tables[handle].remove_row(row);
            if let Some(moved) = relocated {
                self.entities.set_location(moved, handle, row);
            }
        }
        self.records.release_entity_records(entity);
        self.entities.despawn(entity)?;
        trace!(entity = %entity, "entity despawned");
        Ok(())
    }

    /// Returns `true` if `entity` is live under its current generation.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    // ---- structural operations -------------------------------------------

    /// Add `id` to `entity`'s id set, default-constructing its value if the
    /// id carries data. Adding an id the entity already has is a no-op that
    /// keeps the existing value.
    ///
    /// For a pair with an exclusive relation, any existing pair with the
    /// same relation is replaced in the same transition.
    pub fn add_id(&mut self, entity: Entity, id: Id) -> Result<(), StorageError> {
        debug_assert!(!id.is_wildcard(), "wildcards match ids, they cannot be added");
        debug_assert!(
            if id.is_pair() {
                self.entities.current(id.relation_index()).is_some()
                    && self.entities.current(id.target_index()).is_some()
            } else {
                id.as_entity().is_some_and(|e| self.entities.is_alive(e))
            },
            "id references dead entities"
        );
        let Some((src, src_row)) = self.entities.locate(entity) else {
            return Err(StorageError::DeadEntity(entity));
        };
        if self.tables[src].has_id(id) {
            return Ok(());
        }
        let src_ids: Vec<Id> = self.tables[src].ids().to_vec();

        let (is_sparse, exclusive_pair) = {
            let record = self
                .records
                .get_or_create(id, &self.registry, &self.entities);
            (record.is_sparse(), record.is_exclusive() && id.is_pair())
        };

        let mut dst_ids: Vec<Id> = Vec::with_capacity(src_ids.len() + 1);
        if exclusive_pair {
            dst_ids.extend(src_ids.iter().copied().filter(|existing| {
                !(existing.is_pair() && existing.relation_index() == id.relation_index())
            }));
        } else {
            dst_ids.extend_from_slice(&src_ids);
        }
        let at = dst_ids.partition_point(|&existing| existing < id);
        dst_ids.insert(at, id);
        let dst = self
            .tables
            .find_or_create(&dst_ids, &mut self.records, &self.registry, &self.entities);

        // The sparse value goes in first: it is the last fallible step before
        // the commit, and it can be taken back out if the move fails.
        if is_sparse
            && let Some(sparse) = self.records.get_mut(id).and_then(IdRecord::sparse_mut)
        {
            sparse.ensure(entity)?;
        }
        if let Err(err) = self.move_entity(entity, src, src_row, dst) {
            if is_sparse
                && let Some(sparse) = self.records.get_mut(id).and_then(IdRecord::sparse_mut)
            {
                sparse.remove(entity);
            }
            return Err(err);
        }

        if exclusive_pair {
            for old in src_ids {
                if old.is_pair()
                    && old.relation_index() == id.relation_index()
                    && let Some(record) = self.records.get_mut(old)
                    && let Some(sparse) = record.sparse_mut()
                {
                    sparse.remove(entity);
                }
            }
        }
        Ok(())
    }

    /// Remove every id of `entity` matching `id`, dropping the values.
    ///
    /// A concrete id removes itself; a wildcard removes all matching ids
    /// (for example `(R, *)` strips every target of `R`). Removing an absent
    /// id is a no-op.
    pub fn remove_id(&mut self, entity: Entity, id: Id) -> Result<(), StorageError> {
        let Some((src, src_row)) = self.entities.locate(entity) else {
            return Err(StorageError::DeadEntity(entity));
        };
        let src_ids: Vec<Id> = self.tables[src].ids().to_vec();
        let removed: Vec<Id> = src_ids
            .iter()
            .copied()
            .filter(|existing| existing.matches(id))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }
        let dst_ids: Vec<Id> = src_ids
            .iter()
            .copied()
            .filter(|existing| !existing.matches(id))
            .collect();
        let dst = self
            .tables
            .find_or_create(&dst_ids, &mut self.records, &self.registry, &self.entities);
        self.move_entity(entity, src, src_row, dst)?;

        for gone in removed {
            if let Some(record) = self.records.get_mut(gone)
                && let Some(sparse) = record.sparse_mut()
            {
                sparse.remove(entity);
            }
        }
        Ok(())
    }

    /// Add the pair `(relation, target)` to `entity`.
    pub fn add_pair(
        &mut self,
        entity: Entity,
        relation: Entity,
        target: Entity,
    ) -> Result<(), StorageError> {
        self.add_id(entity, Id::pair(relation, target))
    }

    /// Remove the pair `(relation, target)` from `entity`.
    pub fn remove_pair(
        &mut self,
        entity: Entity,
        relation: Entity,
        target: Entity,
    ) -> Result<(), StorageError> {
        self.remove_id(entity, Id::pair(relation, target))
    }

    /// Write `value` as `entity`'s `T`, registering and adding as needed.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), StorageError> {
        let component = self.register_component::<T>()?;
        let id = Id::entity(component);
        self.add_id(entity, id)?;
        if size_of::<T>() == 0 {
            return Ok(());
        }
        let Some(ptr) = self.lookup_ptr(entity, id) else {
            // The add above placed the id; only a dead entity gets here.
            return Err(StorageError::DeadEntity(entity));
        };
        // SAFETY: the id was registered for exactly `T`, the slot holds an
        // initialized value, and `&mut self` keeps other access out.
        unsafe { *ptr.cast::<T>().as_mut() = value };
        Ok(())
    }

    /// Copy the value at `src` over `entity`'s value for `id`, adding the id
    /// first if absent.
    ///
    /// The id's type must be copyable: registered with a copy hook, or
    /// trivially copyable (no drop hook).
    ///
    /// # Safety
    ///
    /// `src` must point to a valid value of `id`'s registered data type.
    pub unsafe fn set_raw(
        &mut self,
        entity: Entity,
        id: Id,
        src: *const u8,
    ) -> Result<(), StorageError> {
        let Some(info) = self.type_info_of(id) else {
            return Err(StorageError::UntypedId(id));
        };
        if !info.is_copyable() {
            return Err(StorageError::NotCopyable(info.name()));
        }
        self.add_id(entity, id)?;
        let Some(ptr) = self.lookup_ptr(entity, id) else {
            return Err(StorageError::DeadEntity(entity));
        };
        // SAFETY: the slot holds an initialized value of the id's type; it is
        // dropped and rebuilt from `src` per the caller's contract.
        unsafe {
            info.drop_in_place(ptr.as_ptr());
            info.copy_to(ptr.as_ptr(), src);
        }
        Ok(())
    }

    /// Destroy empty tables, evicting them from every id record cache.
    ///
    /// The root table survives. Returns the number of tables destroyed;
    /// their handles go stale.
    pub fn purge_empty_tables(&mut self) -> usize {
        let root = self.tables.root();
        let doomed: Vec<TableHandle> = self
            .tables
            .iter()
            .filter(|table| table.is_empty() && table.handle() != root)
            .map(Table::handle)
            .collect();
        for &handle in &doomed {
            if let Some(table) = self.tables.remove(handle) {
                self.records.unregister_table(&table);
            }
        }
        doomed.len()
    }

    // ---- access ----------------------------------------------------------

    /// Shared reference to `entity`'s `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let component = self.component_entity::<T>()?;
        let ptr = self.lookup_ptr(entity, Id::entity(component))?;
        // SAFETY: the id was registered for exactly `T`; the returned borrow
        // is tied to `&self`, which blocks structural changes.
        Some(unsafe { ptr.cast::<T>().as_ref() })
    }

    /// Mutable reference to `entity`'s `T`.
    ///
    /// Never adds the component; use [`World::set`] for that.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let component = self.component_entity::<T>()?;
        let ptr = self.lookup_ptr(entity, Id::entity(component))?;
        // SAFETY: as in `get`, with `&mut self` guaranteeing exclusivity.
        Some(unsafe { ptr.cast::<T>().as_mut() })
    }

    /// Read-only pointer to `entity`'s value for `id`.
    ///
    /// `None` for dead entities, absent ids, and tags. A wildcard id
    /// resolves to the first matching id on the entity. The pointer is valid
    /// until the next structural mutation of the world.
    #[must_use]
    pub fn get_raw(&self, entity: Entity, id: Id) -> Option<NonNull<u8>> {
        self.lookup_ptr(entity, id)
    }

    /// Mutable pointer to `entity`'s value for `id`.
    ///
    /// Same resolution as [`World::get_raw`]; an id the entity does not have
    /// yields `None` — materializing it is a structural operation
    /// ([`World::add_id`]).
    #[must_use]
    pub fn get_mut_raw(&mut self, entity: Entity, id: Id) -> Option<NonNull<u8>> {
        self.lookup_ptr(entity, id)
    }

    /// Returns `true` if `entity` has an id matching `id` (wildcard-aware).
    #[must_use]
    pub fn has_id(&self, entity: Entity, id: Id) -> bool {
        let Some(table) = self.entity_table(entity) else {
            return false;
        };
        if id.is_wildcard() {
            table.ids().iter().any(|existing| existing.matches(id))
        } else {
            table.has_id(id)
        }
    }

    /// Returns `true` if `entity` has a `T` value.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.component_entity::<T>()
            .is_some_and(|component| self.has_id(entity, Id::entity(component)))
    }

    /// Number of pairs on `entity` whose relation is `relation`.
    ///
    /// The wildcard relation counts every pair. Dead entities have none.
    #[must_use]
    pub fn relationship_count(&self, entity: Entity, relation: Entity) -> usize {
        self.entity_table(entity)
            .map_or(0, |table| table.pair_count(relation))
    }

    /// The targets of `relation` on `entity`, in table id order.
    pub fn relationship_targets(
        &self,
        entity: Entity,
        relation: Entity,
    ) -> impl Iterator<Item = Entity> + '_ {
        let ids: &[Id] = self
            .entity_table(entity)
            .map(|table| &table.ids()[table.pair_run(relation)])
            .unwrap_or(&[]);
        ids.iter()
            .filter_map(move |id| self.entities.current(id.target_index()))
    }

    // ---- id records and tables -------------------------------------------

    /// The record for `id`, if the world has observed the id.
    #[must_use]
    pub fn id_record(&self, id: Id) -> Option<&IdRecord> {
        self.records.get(id)
    }

    /// The record for `id`, created on first reference.
    pub fn id_record_ensure(&mut self, id: Id) -> &IdRecord {
        self.records
            .get_or_create(id, &self.registry, &self.entities)
    }

    /// The data type carried by `id`, resolved through the pair rules.
    #[must_use]
    pub fn type_info_of(&self, id: Id) -> Option<TypeInfo> {
        self.records.type_of(id, &self.registry, &self.entities).0
    }

    /// The component entity that supplies `id`'s data type.
    #[must_use]
    pub fn type_id_of(&self, id: Id) -> Option<Entity> {
        self.records.type_of(id, &self.registry, &self.entities).1
    }

    /// Index of the dense column for `id` in `table`'s layout.
    ///
    /// Served from the id record's per-table cache when populated, otherwise
    /// by binary search of the table's id list. `None` means absent or
    /// columnless, not an error.
    #[must_use]
    pub fn column_index(&self, table: TableHandle, id: Id) -> Option<usize> {
        if let Some(record) = self.records.get(id)
            && let Some(cached) = record.table_record(table)
        {
            return cached.column.map(|column| column as usize);
        }
        self.tables.get(table)?.column_of(id)
    }

    /// The table behind `handle`; `None` once the handle is stale.
    #[must_use]
    pub fn table(&self, handle: TableHandle) -> Option<&Table> {
        self.tables.get(handle)
    }

    /// The table holding `entity`'s row.
    #[must_use]
    pub fn entity_table(&self, entity: Entity) -> Option<&Table> {
        let (handle, _) = self.entities.locate(entity)?;
        self.tables.get(handle)
    }

    /// `entity`'s current placement.
    #[must_use]
    pub fn locate(&self, entity: Entity) -> Option<(TableHandle, u32)> {
        self.entities.locate(entity)
    }

    /// Handles of tables currently containing an id matching `id`, in no
    /// particular order.
    #[must_use]
    pub fn tables_with(&self, id: Id) -> Vec<TableHandle> {
        match self.records.get(id) {
            Some(record) => record.table_handles().collect(),
            None if id.is_wildcard() => self
                .tables
                .iter()
                .filter(|table| table.ids().iter().any(|existing| existing.matches(id)))
                .map(Table::handle)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of live tables, the root included.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    // ---- internals -------------------------------------------------------

    /// Resolve `(entity, id)` to the value address, storage-kind aware.
    fn lookup_ptr(&self, entity: Entity, id: Id) -> Option<NonNull<u8>> {
        let (handle, row) = self.entities.locate(entity)?;
        let table = self.tables.get(handle)?;
        let id = if id.is_wildcard() {
            table.ids().iter().copied().find(|x| x.matches(id))?
        } else {
            id
        };
        let record = self.records.get(id)?;
        if let Some(sparse) = record.sparse() {
            return sparse.get(entity);
        }
        let cached = record.table_record(handle)?;
        let column = cached.column? as usize;
        NonNull::new(table.value_ptr(column, row))
    }

    /// Migrate `entity` from its row in `src` to `dst`.
    ///
    /// Reserve-then-commit: growth happens before the first destructive
    /// step, so on failure the entity is untouched in `src`.
    fn move_entity(
        &mut self,
        entity: Entity,
        src: TableHandle,
        src_row: u32,
        dst: TableHandle,
    ) -> Result<(), StorageError> {
        if src == dst {
            return Ok(());
        }
        self.tables[dst].reserve_row()?;
        let (src_table, dst_table) = self.tables.pair_mut(src, dst);
        let (dst_row, relocated) = transfer_row(src_table, src_row, dst_table, entity);
        if let Some(moved) = relocated {
            self.entities.set_location(moved, src, src_row);
        }
        self.entities.set_location(entity, dst, dst_row);
        trace!(entity = %entity, from = %src, to = %dst, "entity migrated");
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.alive_count())
            .field("tables", &self.tables.len())
            .field("id_records", &self.records.len())
            .finish()
    }
}
