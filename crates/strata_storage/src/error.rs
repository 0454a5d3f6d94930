//! Storage-layer error types.

use strata_component::{Entity, Id, RegistryError};

/// Errors that can occur during structural storage operations.
///
/// Plain absence is never an error: accessors return `None` for missing ids
/// and dead entities. These variants cover the cases where a mutation cannot
/// proceed, with prior state left intact.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Growing a column or row buffer failed; the operation was rolled back.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// The size of the failed request.
        bytes: usize,
    },

    /// A structural operation named an entity whose generation is stale or
    /// that was never created.
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    /// An entity still referenced as a component, tag, or relationship side
    /// by live storage cannot be despawned or reconfigured.
    #[error("entity {0} is still in use as an id")]
    IdInUse(Entity),

    /// The id carries no component data, so there is no value to write.
    #[error("id {0} has no component data")]
    UntypedId(Id),

    /// The id's type cannot be duplicated through the type-erased API.
    #[error("type {0} cannot be copied: no copy hook registered")]
    NotCopyable(&'static str),

    /// Forwarded type-registration failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
