//! Immutable hierarchy views.
//!
//! # Role
//!
//! Pure read-side queries over one published state of the hierarchy. Nothing in
//! this module mutates; writers build a new [`HierarchySnapshot`] and publish it.

use std::any::TypeId;
use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::info::{Bases, TypeInfo};
use crate::mro::{self, MroConflict};
use crate::TypeKey;

/// One published state of the hierarchy.
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
	pub(crate) types: Arc<FxHashMap<TypeKey, Arc<TypeInfo>>>,
	/// Virtual bases per subtype, in registration order.
	pub(crate) virtual_bases: Arc<FxHashMap<TypeKey, Bases>>,
}

impl HierarchySnapshot {
	/// Returns the declared descriptor for `key`, if any.
	pub fn get(&self, key: TypeKey) -> Option<&Arc<TypeInfo>> {
		self.types.get(&key)
	}

	/// Returns the descriptor for `key`, synthesizing one for undeclared types.
	pub fn info(&self, key: TypeKey) -> Arc<TypeInfo> {
		match self.types.get(&key) {
			Some(info) => Arc::clone(info),
			None => Arc::new(TypeInfo::implicit(key)),
		}
	}

	/// Declared name for a raw type id.
	pub fn name_of(&self, id: TypeId) -> Option<Arc<str>> {
		self.types
			.get(&TypeKey::from_raw(id, ""))
			.map(|info| Arc::clone(&info.name))
	}

	pub fn is_declared(&self, key: TypeKey) -> bool {
		self.types.contains_key(&key)
	}

	pub fn lexical_bases(&self, key: TypeKey) -> &[TypeKey] {
		self.types
			.get(&key)
			.map(|info| &info.bases[..])
			.unwrap_or_default()
	}

	pub fn virtual_bases(&self, key: TypeKey) -> &[TypeKey] {
		self.virtual_bases
			.get(&key)
			.map(|bases| &bases[..])
			.unwrap_or_default()
	}

	/// Lexical bases followed by virtual bases.
	pub fn effective_bases(&self, key: TypeKey) -> Bases {
		let mut bases: Bases = self.lexical_bases(key).iter().copied().collect();
		for &base in self.virtual_bases(key) {
			if !bases.contains(&base) {
				bases.push(base);
			}
		}
		bases
	}

	/// Number of virtual relationships recorded in this snapshot.
	pub fn virtual_count(&self) -> usize {
		self.virtual_bases.values().map(|b| b.len()).sum()
	}

	/// Reflexive, transitive subtype check over lexical and virtual bases.
	pub fn is_subtype(&self, sub: TypeKey, sup: TypeKey) -> bool {
		if sub == sup {
			return true;
		}
		let mut seen = FxHashSet::default();
		let mut stack = vec![sub];
		while let Some(key) = stack.pop() {
			if !seen.insert(key) {
				continue;
			}
			for base in self.effective_bases(key) {
				if base == sup {
					return true;
				}
				stack.push(base);
			}
		}
		false
	}

	/// C3 linearization over lexical bases only.
	pub fn lexical_mro(&self, key: TypeKey) -> Result<Vec<TypeKey>, MroConflict> {
		mro::linearize(key, |k| self.lexical_bases(k).to_vec())
	}

	/// Method resolution order including virtual bases.
	///
	/// Virtual bases are merged as if they were declared after the lexical
	/// bases. When that has no C3 solution the lexical order is kept and the
	/// remaining ancestors follow in breadth-first order.
	pub fn linearize(&self, key: TypeKey) -> Vec<TypeKey> {
		match mro::linearize(key, |k| self.effective_bases(k)) {
			Ok(order) => order,
			Err(conflict) => {
				debug!(
					key = %key,
					at = %conflict.at,
					remaining = ?conflict.remaining,
					"virtual bases conflict with C3 order, using breadth-first fallback"
				);
				self.fallback_order(key)
			}
		}
	}

	fn fallback_order(&self, key: TypeKey) -> Vec<TypeKey> {
		let mut order = self.lexical_mro(key).unwrap_or_else(|_| vec![key]);
		let mut seen: FxHashSet<TypeKey> = order.iter().copied().collect();
		let mut queue: VecDeque<TypeKey> = order.iter().copied().collect();
		while let Some(next) = queue.pop_front() {
			for base in self.effective_bases(next) {
				if seen.insert(base) {
					order.push(base);
					queue.push_back(base);
				}
			}
		}
		order
	}
}
