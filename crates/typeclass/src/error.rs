//! Registration, definition, and dispatch errors.

use std::sync::Arc;

use tyclass_hierarchy::HierarchyError;

/// Malformed `instance` calls. Raised when the registration is requested,
/// before any implementation is supplied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
	#[error("exactly one of exact type, protocol, or delegate must be passed to instance (got: {})", describe(.supplied))]
	InvalidArgumentCombination { supplied: Vec<&'static str> },

	#[error("{type_name} cannot be used as a runtime type discriminator: {reason}")]
	InvalidTypeArgument { type_name: String, reason: &'static str },

	#[error("{type_name} is registered both as an exact type and as a delegate in typeclass \"{typeclass}\"")]
	AmbiguousDelegate { typeclass: Arc<str>, type_name: String },
}

fn describe(supplied: &[&'static str]) -> String {
	if supplied.is_empty() {
		"none".to_string()
	} else {
		supplied.join(", ")
	}
}

/// Failures raised while defining a typeclass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
	#[error("associated type {associated} is already bound to typeclass \"{existing}\"")]
	AssociatedTypeReused { associated: String, existing: Arc<str> },
}

/// Failures raised by invoking a typeclass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
	#[error("Missing matched typeclass instance for type: {type_name}")]
	UnmatchedType { typeclass: Arc<str>, type_name: String },
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Registration(#[from] RegistrationError),

	#[error(transparent)]
	Definition(#[from] DefinitionError),

	#[error(transparent)]
	Dispatch(#[from] DispatchError),

	#[error(transparent)]
	Hierarchy(#[from] HierarchyError),
}
