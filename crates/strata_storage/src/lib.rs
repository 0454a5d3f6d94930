//! # strata_storage
//!
//! The storage core of strata: archetype tables, sparse columns, id records,
//! and the [`World`] that ties them together.
//!
//! Entities with the same set of ids share a table, one column per
//! data-carrying id, values packed contiguously. Ids routed to sparse storage
//! keep their table membership but park their values in per-id paged columns
//! with stable addresses. Per-id records cache where an id lives so access is
//! a couple of map and array lookups, never a scan.
//!
//! This crate provides:
//!
//! - [`World`] — the storage instance: spawn/despawn, add/remove ids,
//!   typed and raw value access, relationship queries.
//! - [`WorldConfig`] — construction-time tuning.
//! - [`Table`] / [`TableHandle`] — archetype tables and the generation-checked
//!   handles naming them.
//! - [`IdRecord`] / [`StorageKind`] — per-id metadata: resolved type, storage
//!   kind, exclusivity, table cache.
//! - [`StorageError`] — everything that can go wrong.

pub mod error;
pub mod id_record;
pub mod table;
pub mod tables;
pub mod world;

mod column;
mod entity_index;
mod sparse;

pub use error::StorageError;
pub use id_record::{IdRecord, StorageKind};
pub use table::Table;
pub use tables::TableHandle;
pub use world::{World, WorldConfig};
