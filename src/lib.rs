//! Storage core for an archetype-based Entity-Component-System runtime.
//!
//! This crate provides the transactional storage layer of an ECS: an entity
//! index, a column-store table per archetype, a table graph keyed by
//! signature, a linear-scan query matcher, and a step transaction that defers
//! structural mutation so concurrent readers see a consistent snapshot.
//!
//! Components are untyped: callers identify a component type by a stable
//! [`ecs::component::Component`] id and supply opaque values. A typed,
//! code-generated layer on top of this crate is expected but out of scope
//! here — see the module docs under [`ecs::engine`] for the transaction
//! model that such a layer would drive.

pub mod ecs;

pub use ecs::component::{Component, Value};
pub use ecs::engine::{Engine, StepScope};
pub use ecs::entity::Entity;
pub use ecs::error::{Error, Result};
pub use ecs::query::{Query, select_entities};
pub use ecs::signature::Signature;
