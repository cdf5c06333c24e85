//! Typeclass-style dispatch on runtime types.
//!
//! A [`Typeclass`] is a named operation whose implementation is picked by the
//! runtime type of its first argument. Implementations are registered per
//! exact type, per structural [`Protocol`], or per [`Delegate`] marker, and
//! resolution falls back to ancestors in the [`Hierarchy`] before applying the
//! default.
//!
//! ```
//! use std::any::Any;
//!
//! use tyclass::{Hierarchy, Protocol, TypeDecl, Typeclass};
//!
//! let hierarchy = std::sync::Arc::new(Hierarchy::new());
//! hierarchy.declare(TypeDecl::of::<String>().member("len")).unwrap();
//!
//! let length = Typeclass::<(), usize>::builder("length")
//!     .hierarchy(hierarchy)
//!     .build()
//!     .unwrap();
//! length.instance_of::<Vec<i32>>().unwrap().register(|_: &dyn Any, ()| 1);
//! length
//!     .instance_protocol(Protocol::requiring("Sized", ["len"]))
//!     .unwrap()
//!     .register(|_: &dyn Any, ()| 0);
//!
//! assert_eq!(length.call(&vec![1, 2, 3], ()), Ok(1));
//! assert_eq!(length.call(&String::from("ab"), ()), Ok(0));
//! assert!(length.call(&42i32, ()).is_err());
//! ```
//!
//! The hierarchy is an explicit dependency. Virtual subtype registration
//! there advances a process-wide generation, and every typeclass cache checks
//! it before serving a result that read the hierarchy.

mod cache;
mod delegate;
mod error;
mod instance;
#[cfg(test)]
mod invariants;
mod protocol;
mod registry;
mod resolve;
mod signature;
mod typeclass;

pub use cache::CacheConfig;
pub use delegate::{Delegate, DelegateKey};
pub use error::{DefinitionError, DispatchError, Error, RegistrationError};
pub use instance::{InstanceArgs, InstanceDef};
pub use protocol::Protocol;
pub use registry::{Implementation, RegistrationRecord, Selector, SelectorKind};
pub use resolve::MatchKind;
pub use signature::{AssociatedType, Signature};
pub use typeclass::{Typeclass, TypeclassBuilder, TypeclassDescription};
pub use tyclass_hierarchy::{Hierarchy, HierarchyError, TypeDecl, TypeInfo, TypeKey};
