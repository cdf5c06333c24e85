//! Definition-time metadata.
//!
//! A [`Signature`] is recorded once, when a typeclass is built, and never
//! changes afterwards. It carries enough structure for an external static
//! checker to compare instance callbacks against the declared operation.

use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;
use tyclass_hierarchy::TypeKey;

use crate::error::DefinitionError;

/// Marker types already bound to a typeclass, with the owning typeclass name.
static BOUND: LazyLock<Mutex<FxHashMap<TypeKey, Arc<str>>>> = LazyLock::new(Default::default);

/// Optional marker type naming the typeclass at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AssociatedType {
	key: TypeKey,
}

impl AssociatedType {
	pub fn of<M: ?Sized + 'static>() -> Self {
		Self {
			key: TypeKey::of::<M>(),
		}
	}

	pub fn key(&self) -> TypeKey {
		self.key
	}

	pub fn name(&self) -> String {
		self.key.short_name()
	}

	/// Claims the marker for `typeclass`. A marker may back one typeclass per process.
	pub(crate) fn bind(&self, typeclass: &Arc<str>) -> Result<(), DefinitionError> {
		let mut bound = BOUND.lock();
		if let Some(existing) = bound.get(&self.key) {
			return Err(DefinitionError::AssociatedTypeReused {
				associated: self.name(),
				existing: Arc::clone(existing),
			});
		}
		bound.insert(self.key, Arc::clone(typeclass));
		debug!(associated = %self.key, typeclass = %typeclass, "associated type bound");
		Ok(())
	}
}

/// Declared shape of a typeclass operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
	pub name: Arc<str>,
	/// Name of the polymorphic parameter; always the first one.
	pub instance_param: &'static str,
	/// Tuple type of the trailing arguments.
	pub extra_args: TypeKey,
	pub returns: TypeKey,
	pub associated: Option<AssociatedType>,
}

impl Signature {
	pub(crate) fn of<A: 'static, R: 'static>(name: Arc<str>, associated: Option<AssociatedType>) -> Self {
		Self {
			name,
			instance_param: "instance",
			extra_args: TypeKey::of::<A>(),
			returns: TypeKey::of::<R>(),
			associated,
		}
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.associated {
			Some(associated) => write!(f, "<typeclass \"{}\": \"{}\">", self.name, associated.name()),
			None => write!(f, "<typeclass \"{}\">", self.name),
		}
	}
}
