//! # Amaranth Scene
//!
//! The live object model the Amaranth prefab engine serializes.
//!
//! ## Core Types
//!
//! - [`Guid`] — stable 128-bit identifier used in place of live pointers
//!   in serialized documents
//! - [`ObjectId`] — scene-local generational handle to a live object
//! - [`Scene`] — arena owning actors, components, and owned sub-objects,
//!   with actor-tree and scene-attachment operations
//! - [`ClassRegistry`] / [`ClassInfo`] — class descriptors: kind, default
//!   property schema, constructor-created default sub-objects
//! - [`AssetStore`] — path-interned assets; prefab assets carry document
//!   bytes
//! - [`PropertyBag`] / [`PropertyValue`] — dynamic per-object state,
//!   including the reference-typed values the prefab codec intercepts

mod asset;
mod class;
mod guid;
mod object;
mod property;
mod scene;

pub use asset::{Asset, AssetId, AssetPayload, AssetStore};
pub use class::{ClassId, ClassInfo, ClassKind, ClassRegistry, DefaultSubObjectSpec};
pub use guid::Guid;
pub use object::{ActorData, ComponentData, ObjectId, ObjectKind, SceneObject};
pub use property::{PropertyBag, PropertyValue};
pub use scene::Scene;
