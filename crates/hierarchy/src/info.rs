//! Type descriptors and declaration builders.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::TypeKey;

/// Ordered lexical bases of a type.
pub type Bases = SmallVec<[TypeKey; 2]>;

/// What a declared type is at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
	/// A type with values of its own.
	Concrete,
	/// An interface-like type that other types may be registered under virtually.
	Abstract,
	/// A parameterized generic type expression. It names a family of types and
	/// cannot discriminate values at runtime.
	Alias {
		origin: TypeKey,
		args: Vec<TypeKey>,
	},
}

/// Descriptor of one runtime type, as seen by the dispatch engine.
#[derive(Debug, Clone)]
pub struct TypeInfo {
	pub key: TypeKey,
	pub name: Arc<str>,
	pub kind: TypeKind,
	/// Lexical bases in declaration order.
	pub bases: Bases,
	/// Structural members (methods or fields) offered by the type.
	pub members: Arc<[Arc<str>]>,
}

impl TypeInfo {
	/// Descriptor used for types that were never declared.
	pub fn implicit(key: TypeKey) -> Self {
		Self {
			key,
			name: Arc::from(key.short_name()),
			kind: TypeKind::Concrete,
			bases: Bases::new(),
			members: Arc::from(Vec::new()),
		}
	}

	pub fn is_abstract(&self) -> bool {
		matches!(self.kind, TypeKind::Abstract)
	}

	pub fn is_alias(&self) -> bool {
		matches!(self.kind, TypeKind::Alias { .. })
	}

	/// Returns true if the type offers a member called `name`.
	pub fn has_member(&self, name: &str) -> bool {
		self.members.iter().any(|m| &**m == name)
	}
}

/// Builder for a type declaration, published with [`crate::Hierarchy::declare`].
#[derive(Debug, Clone)]
pub struct TypeDecl {
	key: TypeKey,
	name: Option<Arc<str>>,
	kind: TypeKind,
	bases: Bases,
	members: Vec<Arc<str>>,
}

impl TypeDecl {
	/// Starts a concrete declaration for `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self::for_key(TypeKey::of::<T>())
	}

	pub fn for_key(key: TypeKey) -> Self {
		Self {
			key,
			name: None,
			kind: TypeKind::Concrete,
			bases: Bases::new(),
			members: Vec::new(),
		}
	}

	/// Overrides the display name (defaults to the short compiler name).
	pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn abstract_type(mut self) -> Self {
		self.kind = TypeKind::Abstract;
		self
	}

	/// Marks the declared key as a parameterized alias of `origin`.
	pub fn alias_of(mut self, origin: TypeKey, args: impl IntoIterator<Item = TypeKey>) -> Self {
		self.kind = TypeKind::Alias {
			origin,
			args: args.into_iter().collect(),
		};
		self
	}

	/// Appends a lexical base.
	pub fn extends<B: ?Sized + 'static>(self) -> Self {
		self.extends_key(TypeKey::of::<B>())
	}

	pub fn extends_key(mut self, base: TypeKey) -> Self {
		if !self.bases.contains(&base) {
			self.bases.push(base);
		}
		self
	}

	pub fn member(mut self, name: impl Into<Arc<str>>) -> Self {
		self.members.push(name.into());
		self
	}

	pub fn members<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Arc<str>>,
	{
		self.members.extend(names.into_iter().map(Into::into));
		self
	}

	pub fn key(&self) -> TypeKey {
		self.key
	}

	pub(crate) fn bases(&self) -> &[TypeKey] {
		&self.bases
	}

	pub(crate) fn into_info(self) -> TypeInfo {
		let name = self
			.name
			.unwrap_or_else(|| Arc::from(self.key.short_name()));
		TypeInfo {
			key: self.key,
			name,
			kind: self.kind,
			bases: self.bases,
			members: Arc::from(self.members),
		}
	}
}
