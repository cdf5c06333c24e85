//! Instance registration arguments.
//!
//! Registration is two-phase. [`Typeclass::instance`] validates the selector
//! and hands back an [`InstanceDef`]; [`InstanceDef::register`] stores the
//! implementation and returns it unchanged, so the callback stays usable on
//! its own.

use std::any::Any;
use std::sync::Arc;

use tyclass_hierarchy::{HierarchySnapshot, TypeKey};

use crate::Typeclass;
use crate::delegate::{Delegate, DelegateKey};
use crate::error::RegistrationError;
use crate::protocol::Protocol;
use crate::registry::{RegistrySnapshot, Selector};

const ALIAS_REASON: &str = "parameterized generic types cannot be checked at runtime";

/// Selector arguments for [`Typeclass::instance`]. Exactly one must be set.
#[derive(Debug, Clone, Default)]
pub struct InstanceArgs {
	exact: Option<TypeKey>,
	protocol: Option<Protocol>,
	delegate: Option<DelegateKey>,
}

impl InstanceArgs {
	pub fn new() -> Self {
		Self::default()
	}

	/// Dispatch on the exact runtime type `key`.
	pub fn exact(mut self, key: TypeKey) -> Self {
		self.exact = Some(key);
		self
	}

	pub fn exact_of<T: ?Sized + 'static>(self) -> Self {
		self.exact(TypeKey::of::<T>())
	}

	/// Dispatch on a structural check.
	pub fn protocol(mut self, protocol: Protocol) -> Self {
		self.protocol = Some(protocol);
		self
	}

	/// Dispatch through the delegate marker `D`.
	pub fn delegate<D: Delegate>(mut self) -> Self {
		self.delegate = Some(DelegateKey::of::<D>());
		self
	}

	fn supplied(&self) -> Vec<&'static str> {
		let mut supplied = Vec::new();
		if self.exact.is_some() {
			supplied.push("exact");
		}
		if self.protocol.is_some() {
			supplied.push("protocol");
		}
		if self.delegate.is_some() {
			supplied.push("delegate");
		}
		supplied
	}

	/// Validates the arguments against the current registries and hierarchy.
	pub(crate) fn into_selector<A, R>(
		self,
		typeclass: &Arc<str>,
		registries: &RegistrySnapshot<A, R>,
		hierarchy: &HierarchySnapshot,
	) -> Result<Selector, RegistrationError> {
		let supplied = self.supplied();
		let selector = match (self.exact, self.protocol, self.delegate) {
			(Some(key), None, None) => Selector::Exact(key),
			(None, Some(protocol), None) => Selector::Protocol(protocol),
			(None, None, Some(delegate)) => Selector::Delegate(delegate),
			_ => return Err(RegistrationError::InvalidArgumentCombination { supplied }),
		};

		match &selector {
			Selector::Exact(key) => {
				reject_alias(*key, hierarchy)?;
				if registries.delegates.contains(*key) {
					return Err(ambiguous(typeclass, *key, hierarchy));
				}
			}
			Selector::Delegate(delegate) => {
				reject_alias(delegate.key(), hierarchy)?;
				if registries.exact.contains(delegate.key()) {
					return Err(ambiguous(typeclass, delegate.key(), hierarchy));
				}
			}
			Selector::Protocol(_) => {}
		}
		Ok(selector)
	}
}

fn reject_alias(key: TypeKey, hierarchy: &HierarchySnapshot) -> Result<(), RegistrationError> {
	match hierarchy.get(key) {
		Some(info) if info.is_alias() => Err(RegistrationError::InvalidTypeArgument {
			type_name: info.name.to_string(),
			reason: ALIAS_REASON,
		}),
		_ => Ok(()),
	}
}

fn ambiguous(typeclass: &Arc<str>, key: TypeKey, hierarchy: &HierarchySnapshot) -> RegistrationError {
	RegistrationError::AmbiguousDelegate {
		typeclass: Arc::clone(typeclass),
		type_name: hierarchy.info(key).name.to_string(),
	}
}

/// A validated registration waiting for its implementation.
#[must_use = "an instance is only stored once `register` is called"]
pub struct InstanceDef<'a, A, R> {
	typeclass: &'a Typeclass<A, R>,
	selector: Selector,
}

impl<'a, A: 'static, R: 'static> InstanceDef<'a, A, R> {
	pub(crate) fn new(typeclass: &'a Typeclass<A, R>, selector: Selector) -> Self {
		Self { typeclass, selector }
	}

	pub fn selector(&self) -> &Selector {
		&self.selector
	}

	/// Stores `implementation` and returns it unchanged.
	///
	/// The registry keeps its own clone, so `F` must be `Clone`. Closures that
	/// own state which cannot be cloned, such as a `Mutex` or a channel
	/// receiver, should capture it behind an `Arc`.
	pub fn register<F>(self, implementation: F) -> F
	where
		F: Fn(&dyn Any, A) -> R + Clone + Send + Sync + 'static,
	{
		self.typeclass
			.store(&self.selector, Arc::new(implementation.clone()));
		implementation
	}
}

impl<A: 'static, R: 'static> std::fmt::Debug for InstanceDef<'_, A, R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstanceDef")
			.field("typeclass", &self.typeclass.name())
			.field("selector", &self.selector)
			.finish()
	}
}
