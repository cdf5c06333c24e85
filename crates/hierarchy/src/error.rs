//! Hierarchy mutation errors.

use crate::TypeKey;

/// Failures raised while declaring types or registering virtual subtypes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
	#[error("type {key} is already declared")]
	DuplicateDeclaration { key: TypeKey },

	#[error("type {key} cannot extend itself")]
	SelfBase { key: TypeKey },

	#[error("type {key} cannot extend {base}: parameterized aliases are not runtime types")]
	AliasBase { key: TypeKey, base: TypeKey },

	#[error("cannot create a consistent method resolution order for {key} (bases {remaining:?})")]
	InconsistentMro { key: TypeKey, remaining: Vec<TypeKey> },

	#[error("{base} is not abstract; only abstract types accept virtual subtypes")]
	NotAbstract { base: TypeKey },

	#[error("refusing to create an inheritance cycle between {sub} and {base}")]
	InheritanceCycle { sub: TypeKey, base: TypeKey },
}
