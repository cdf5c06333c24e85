//! Instance resolution.
//!
//! # Purpose
//!
//! Picks the implementation a typeclass invokes for one runtime value. The
//! engine is a pure function of a registry snapshot and a hierarchy snapshot;
//! it owns no state and never mutates either input.
//!
//! # Mental model
//!
//! Resolution is a strict priority list, first hit wins:
//!
//! 0. Delegates, checked against the value itself (never cached).
//! 1. Exact registry lookup of the concrete type.
//! 2. Protocols in registration order, evaluated against the type descriptor.
//! 3. The linearized ancestors of the type (lexical and virtual bases), looked
//!    up in the exact registry.
//!
//! A miss on every step yields [`MatchKind::Unmatched`] and the caller applies
//! the typeclass default.
//!
//! # Key types
//!
//! | Type | Meaning |
//! |---|---|
//! | [`MatchKind`] | Which step fired, exposed through `Typeclass::resolve` |
//! | `Resolved` | Match kind plus the implementation to invoke; what the cache stores |
//! | `ResolutionEngine` | Borrowed view over both snapshots |
//!
//! # Invariants
//!
//! * An exact entry for `T` always beats a protocol `T` satisfies.
//! * Steps 1 to 3 depend only on the type, never on the value.
//! * Every outcome except an exact or delegate hit reads the hierarchy
//!   (descriptors or linearization) and is tagged as depending on it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;
use tyclass_hierarchy::{HierarchySnapshot, TypeKey};

use crate::registry::{Implementation, RegistrySnapshot};


/// Which resolution step selected the implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "via", rename_all = "snake_case")]
pub enum MatchKind {
	/// A delegate marker accepted the value.
	Delegate(TypeKey),
	/// The concrete type has its own instance.
	Exact(TypeKey),
	/// The named protocol accepted the type.
	Protocol(Arc<str>),
	/// An ancestor in the linearization has an instance.
	Inherited(TypeKey),
	/// Nothing matched; the default applies.
	Unmatched,
}

impl MatchKind {
	pub fn is_match(&self) -> bool {
		!matches!(self, Self::Unmatched)
	}
}

impl fmt::Display for MatchKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Delegate(key) => write!(f, "delegate {key}"),
			Self::Exact(key) => write!(f, "exact {key}"),
			Self::Protocol(name) => write!(f, "protocol {name}"),
			Self::Inherited(key) => write!(f, "inherited from {key}"),
			Self::Unmatched => f.write_str("unmatched"),
		}
	}
}

/// Outcome of one resolution.
pub(crate) struct Resolved<A, R> {
	pub(crate) kind: MatchKind,
	pub(crate) implementation: Option<Implementation<A, R>>,
	/// True if the outcome reads the hierarchy. Only exact and delegate hits are
	/// independent of it.
	pub(crate) depends_on_hierarchy: bool,
}

impl<A, R> Clone for Resolved<A, R> {
	fn clone(&self) -> Self {
		Self {
			kind: self.kind.clone(),
			implementation: self.implementation.clone(),
			depends_on_hierarchy: self.depends_on_hierarchy,
		}
	}
}

impl<A, R> fmt::Debug for Resolved<A, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resolved")
			.field("kind", &self.kind)
			.field("depends_on_hierarchy", &self.depends_on_hierarchy)
			.finish_non_exhaustive()
	}
}

impl<A, R> Resolved<A, R> {
	fn hit(kind: MatchKind, implementation: &Implementation<A, R>, depends_on_hierarchy: bool) -> Self {
		Self {
			kind,
			implementation: Some(Arc::clone(implementation)),
			depends_on_hierarchy,
		}
	}

	fn unmatched() -> Self {
		Self {
			kind: MatchKind::Unmatched,
			implementation: None,
			depends_on_hierarchy: true,
		}
	}
}

/// Read-only resolution over one registry snapshot and one hierarchy snapshot.
pub(crate) struct ResolutionEngine<'a, A, R> {
	registries: &'a RegistrySnapshot<A, R>,
	hierarchy: &'a HierarchySnapshot,
}

impl<'a, A, R> ResolutionEngine<'a, A, R> {
	pub(crate) fn new(registries: &'a RegistrySnapshot<A, R>, hierarchy: &'a HierarchySnapshot) -> Self {
		Self { registries, hierarchy }
	}

	/// Step 0. Runs on every call.
	pub(crate) fn delegate(registries: &RegistrySnapshot<A, R>, value: &dyn Any) -> Option<Resolved<A, R>> {
		if registries.delegates.is_empty() {
			return None;
		}
		let entry = registries.delegates.find(value)?;
		trace!(delegate = %entry.delegate.key(), "resolved via delegate");
		Some(Resolved::hit(
			MatchKind::Delegate(entry.delegate.key()),
			&entry.implementation,
			false,
		))
	}

	/// Steps 1 to 3 for the concrete type `key`.
	pub(crate) fn resolve(&self, key: TypeKey) -> Resolved<A, R> {
		if let Some((registered, entry)) = self.registries.exact.get_key_value(key) {
			trace!(ty = %registered, "resolved via exact instance");
			return Resolved::hit(MatchKind::Exact(registered), &entry.implementation, false);
		}

		if !self.registries.protocols.is_empty() {
			let info = self.hierarchy.info(key);
			for entry in self.registries.protocols.iter() {
				if entry.protocol.accepts(&info) {
					trace!(ty = %key, protocol = entry.protocol.name(), "resolved via protocol");
					return Resolved::hit(MatchKind::Protocol(entry.protocol.name_arc()), &entry.implementation, true);
				}
			}
		}

		if !self.registries.exact.is_empty() {
			for ancestor in self.hierarchy.linearize(key).into_iter().skip(1) {
				if let Some(entry) = self.registries.exact.get(ancestor) {
					trace!(ty = %key, ancestor = %ancestor, "resolved via ancestor");
					return Resolved::hit(MatchKind::Inherited(ancestor), &entry.implementation, true);
				}
			}
		}

		trace!(ty = %key, "no instance matched");
		Resolved::unmatched()
	}
}
