//! Error kinds surfaced by the storage core.
//!
//! `EmptyCell` indicates an internal invariant violation (a cell was read
//! before ever being written) and should be treated as fatal by callers —
//! it is included here rather than panicking directly so the core never
//! aborts on behalf of its host.

use thiserror::Error;

use crate::ecs::component::Component;
use crate::ecs::entity::Entity;
use crate::ecs::storage::{Row, TableId};

/// A fallible storage-core operation's error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity was never allocated, or has been destroyed.
    #[error("entity {0:?} is not valid")]
    InvalidEntity(Entity),

    /// The entity does not carry the given component.
    #[error("entity {0:?} has no component {1:?}")]
    MissingComponent(Entity, Component),

    /// The entity already carries the given component.
    #[error("entity {0:?} already has component {1:?}")]
    DuplicateComponent(Entity, Component),

    /// A table cell was read before it was ever written.
    #[error("table {0:?} row {1:?} column {2} was read before it was written")]
    EmptyCell(TableId, Row, usize),

    /// `Signature::with` was called with a component already present.
    #[error("signature already contains component {0:?}")]
    DuplicateSignatureComponent(Component),

    /// `Signature::without` was called with a component not present.
    #[error("signature does not contain component {0:?}")]
    MissingSignatureComponent(Component),

    /// A step was entered while another step was already in progress.
    #[error("a step is already in progress")]
    ConcurrentStep,
}

/// The result type for fallible storage-core operations.
pub type Result<T> = std::result::Result<T, Error>;
