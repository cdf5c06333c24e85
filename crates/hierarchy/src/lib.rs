//! Runtime type hierarchy read by the typeclass dispatch engine.
//!
//! Rust has no runtime inheritance, so the relationships dispatch depends on
//! are declared explicitly:
//!
//! - [`TypeKey`] identifies a type (`TypeId` plus a display name).
//! - [`TypeDecl`] declares lexical bases, structural members, and whether a
//!   type is abstract or a parameterized alias.
//! - [`Hierarchy::register_virtual`] makes a type a virtual subtype of an
//!   abstract type after the fact and advances the global generation.
//! - [`HierarchySnapshot::linearize`] yields the method resolution order (C3)
//!   including virtual bases.
//!
//! [`Hierarchy::global`] is the process-wide instance. Independent instances
//! can be created for isolated use.

mod error;
mod info;
mod key;
pub mod mro;
mod runtime;

pub use error::HierarchyError;
pub use info::{Bases, TypeDecl, TypeInfo, TypeKind};
pub use key::{TypeKey, short_name};
pub use runtime::{Hierarchy, HierarchySnapshot};
