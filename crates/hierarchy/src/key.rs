//! Stable runtime type identifiers.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// Identifier for a runtime type.
///
/// Equality and hashing only look at the [`TypeId`]; the name is carried for
/// diagnostics. Two values of the same concrete type always produce equal keys.
#[derive(Clone, Copy)]
pub struct TypeKey {
	id: TypeId,
	name: &'static str,
}

impl TypeKey {
	/// Returns the key for `T`.
	///
	/// `T` may be unsized, so abstract types can be spelled as `dyn Trait`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	/// Returns the key for the concrete type behind `value`.
	pub fn of_val<T: Any>(_value: &T) -> Self {
		Self::of::<T>()
	}

	/// Builds a key from a raw [`TypeId`] and a display name.
	pub fn from_raw(id: TypeId, name: &'static str) -> Self {
		Self { id, name }
	}

	pub fn id(&self) -> TypeId {
		self.id
	}

	/// Fully qualified type name as reported by the compiler.
	pub fn type_name(&self) -> &'static str {
		self.name
	}

	/// Type name with module paths stripped.
	pub fn short_name(&self) -> String {
		short_name(self.name)
	}
}

impl PartialEq for TypeKey {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TypeKey({})", self.short_name())
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.short_name())
	}
}

impl Serialize for TypeKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.short_name())
	}
}

/// Strips module paths from every path segment of a compiler type name.
///
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub fn short_name(full: &str) -> String {
	let mut out = String::with_capacity(full.len());
	let mut segment_start = 0;
	let mut chars = full.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			':' if chars.peek() == Some(&':') => {
				chars.next();
				out.truncate(segment_start);
			}
			'<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' | '*' => {
				out.push(c);
				segment_start = out.len();
			}
			_ => out.push(c),
		}
	}
	out
}
