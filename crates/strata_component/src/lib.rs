//! # strata_component
//!
//! The identity layer of the strata storage core — what entities, component
//! ids, and component types *are*, independent of how their data is stored.
//!
//! This crate provides:
//!
//! - [`Entity`] — generational `u64` entity identifiers.
//! - [`Id`] — component/tag ids and encoded relationship pairs.
//! - [`TypeInfo`] — per-type layout and lifecycle hooks.
//! - [`TypeRegistry`] — id-keyed registration with conflict detection.
//! - [`Component`] / [`TypeKey`] — the typed front door for Rust types.

pub mod component;
pub mod entity;
pub mod id;
pub mod registry;
pub mod type_info;

pub use component::{Component, TypeKey};
pub use entity::Entity;
pub use id::Id;
pub use registry::{RegistryError, TypeRegistry};
pub use type_info::TypeInfo;
