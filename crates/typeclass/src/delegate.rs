//! Alternate dispatch keys.
//!
//! A delegate is a marker type that stands in for a family of values the type
//! system cannot name directly, such as "a `Vec<String>` that is non-empty".
//! The marker is the registration key; the implementation still receives the
//! original value.

use std::any::Any;
use std::fmt;

use tyclass_hierarchy::TypeKey;

/// Marker type with a value-level membership check.
pub trait Delegate: 'static {
	/// Concrete type of the values this delegate can accept.
	type Target: Any;

	/// Returns true if `value` belongs to this delegate.
	fn matches(value: &Self::Target) -> bool;
}

/// Type-erased delegate registration key.
#[derive(Clone, Copy)]
pub struct DelegateKey {
	key: TypeKey,
	target: TypeKey,
	check: fn(&dyn Any) -> bool,
}

impl DelegateKey {
	pub fn of<D: Delegate>() -> Self {
		Self {
			key: TypeKey::of::<D>(),
			target: TypeKey::of::<D::Target>(),
			check: check::<D>,
		}
	}

	/// Key of the marker type.
	pub fn key(&self) -> TypeKey {
		self.key
	}

	/// Key of the values the marker inspects.
	pub fn target(&self) -> TypeKey {
		self.target
	}

	pub fn matches(&self, value: &dyn Any) -> bool {
		(self.check)(value)
	}
}

fn check<D: Delegate>(value: &dyn Any) -> bool {
	value.downcast_ref::<D::Target>().is_some_and(D::matches)
}

impl fmt::Debug for DelegateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DelegateKey")
			.field("key", &self.key)
			.field("target", &self.target)
			.finish()
	}
}
