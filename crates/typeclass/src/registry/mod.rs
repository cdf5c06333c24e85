//! Per-typeclass instance registries.
//!
//! # Role
//!
//! Stores implementations by exact type, by protocol, and by delegate marker.
//! The three registries are published together as one immutable
//! [`RegistrySnapshot`], so a reader never sees a half-applied registration.
//!
//! # Invariants
//!
//! * Registries only grow; there is no unregister operation.
//! * Re-registering an exact type or delegate replaces the previous implementation
//!   in place (last registration wins).
//! * Protocol entries keep insertion order; it decides which overlapping protocol wins.
//! * Concurrent registrations must not be lost (see `invariants::test_concurrent_registration`).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use tyclass_hierarchy::TypeKey;

use crate::delegate::DelegateKey;
use crate::protocol::Protocol;


/// Type-erased implementation: receives the dispatched value and the extra arguments.
pub type Implementation<A, R> = Arc<dyn Fn(&dyn Any, A) -> R + Send + Sync>;

type KeyMap<V> = IndexMap<TypeKey, V, FxBuildHasher>;

/// Which registry a registration targets.
#[derive(Debug, Clone)]
pub enum Selector {
	Exact(TypeKey),
	Protocol(Protocol),
	Delegate(DelegateKey),
}

impl Selector {
	pub fn kind(&self) -> SelectorKind {
		match self {
			Self::Exact(_) => SelectorKind::Exact,
			Self::Protocol(_) => SelectorKind::Protocol,
			Self::Delegate(_) => SelectorKind::Delegate,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
	Exact,
	Protocol,
	Delegate,
}

impl SelectorKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Exact => "exact",
			Self::Protocol => "protocol",
			Self::Delegate => "delegate",
		}
	}
}

/// One registration, as exposed to external tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRecord {
	/// Position in registration order. Replacements keep the slot of the entry
	/// they replaced but take a fresh ordinal.
	pub ordinal: u32,
	pub selector: SelectorKind,
	/// Registered type key; `None` for protocols.
	pub key: Option<TypeKey>,
	/// Type name for exact and delegate entries, protocol name otherwise.
	pub name: String,
}

pub(crate) struct ExactEntry<A, R> {
	pub(crate) implementation: Implementation<A, R>,
	pub(crate) ordinal: u32,
}

pub(crate) struct ProtocolEntry<A, R> {
	pub(crate) protocol: Protocol,
	pub(crate) implementation: Implementation<A, R>,
	pub(crate) ordinal: u32,
}

pub(crate) struct DelegateEntry<A, R> {
	pub(crate) delegate: DelegateKey,
	pub(crate) implementation: Implementation<A, R>,
	pub(crate) ordinal: u32,
}

// Manual impls: derive would demand `A: Clone, R: Clone`.
macro_rules! impl_entry_clone {
	($ty:ident { $($field:ident),* }) => {
		impl<A, R> Clone for $ty<A, R> {
			fn clone(&self) -> Self {
				Self {
					$($field: self.$field.clone(),)*
				}
			}
		}
	};
}

impl_entry_clone!(ExactEntry { implementation, ordinal });
impl_entry_clone!(ProtocolEntry { protocol, implementation, ordinal });
impl_entry_clone!(DelegateEntry { delegate, implementation, ordinal });

/// Exact-type registry: type key to implementation.
pub(crate) struct ExactRegistry<A, R> {
	entries: Arc<KeyMap<ExactEntry<A, R>>>,
}

impl<A, R> ExactRegistry<A, R> {
	pub(crate) fn get(&self, key: TypeKey) -> Option<&ExactEntry<A, R>> {
		self.entries.get(&key)
	}

	/// Like `get`, but also returns the key as registered, which carries the
	/// type name even when `key` came from an erased value.
	pub(crate) fn get_key_value(&self, key: TypeKey) -> Option<(TypeKey, &ExactEntry<A, R>)> {
		self.entries.get_key_value(&key).map(|(k, e)| (*k, e))
	}

	pub(crate) fn contains(&self, key: TypeKey) -> bool {
		self.entries.contains_key(&key)
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn with(&self, key: TypeKey, entry: ExactEntry<A, R>) -> (Self, bool) {
		let mut entries = (*self.entries).clone();
		let replaced = entries.insert(key, entry).is_some();
		(
			Self {
				entries: Arc::new(entries),
			},
			replaced,
		)
	}

	fn iter(&self) -> impl Iterator<Item = (&TypeKey, &ExactEntry<A, R>)> {
		self.entries.iter()
	}
}

/// Protocol registry: ordered `(protocol, implementation)` pairs.
pub(crate) struct ProtocolRegistry<A, R> {
	entries: Arc<[ProtocolEntry<A, R>]>,
}

impl<A, R> ProtocolRegistry<A, R> {
	pub(crate) fn iter(&self) -> impl Iterator<Item = &ProtocolEntry<A, R>> {
		self.entries.iter()
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn with(&self, entry: ProtocolEntry<A, R>) -> Self {
		let mut entries = self.entries.to_vec();
		entries.push(entry);
		Self {
			entries: Arc::from(entries),
		}
	}
}

/// Delegate registry: marker key to value check and implementation.
pub(crate) struct DelegateRegistry<A, R> {
	entries: Arc<KeyMap<DelegateEntry<A, R>>>,
}

impl<A, R> DelegateRegistry<A, R> {
	pub(crate) fn contains(&self, key: TypeKey) -> bool {
		self.entries.contains_key(&key)
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	/// First delegate, in registration order, whose check accepts `value`.
	pub(crate) fn find(&self, value: &dyn Any) -> Option<&DelegateEntry<A, R>> {
		self.entries.values().find(|e| e.delegate.matches(value))
	}

	fn with(&self, entry: DelegateEntry<A, R>) -> (Self, bool) {
		let mut entries = (*self.entries).clone();
		let replaced = entries.insert(entry.delegate.key(), entry).is_some();
		(
			Self {
				entries: Arc::new(entries),
			},
			replaced,
		)
	}
}

macro_rules! impl_registry_defaults {
	($($ty:ident),*) => {
		$(
			impl<A, R> Clone for $ty<A, R> {
				fn clone(&self) -> Self {
					Self {
						entries: Arc::clone(&self.entries),
					}
				}
			}
		)*
	};
}

impl_registry_defaults!(ExactRegistry, ProtocolRegistry, DelegateRegistry);

impl<A, R> Default for ExactRegistry<A, R> {
	fn default() -> Self {
		Self {
			entries: Arc::new(KeyMap::default()),
		}
	}
}

impl<A, R> Default for ProtocolRegistry<A, R> {
	fn default() -> Self {
		Self {
			entries: Arc::from(Vec::new()),
		}
	}
}

impl<A, R> Default for DelegateRegistry<A, R> {
	fn default() -> Self {
		Self {
			entries: Arc::new(KeyMap::default()),
		}
	}
}

/// The three registries of one typeclass, published as a unit.
pub(crate) struct RegistrySnapshot<A, R> {
	pub(crate) exact: ExactRegistry<A, R>,
	pub(crate) protocols: ProtocolRegistry<A, R>,
	pub(crate) delegates: DelegateRegistry<A, R>,
	next_ordinal: u32,
}

impl<A, R> Default for RegistrySnapshot<A, R> {
	fn default() -> Self {
		Self {
			exact: ExactRegistry::default(),
			protocols: ProtocolRegistry::default(),
			delegates: DelegateRegistry::default(),
			next_ordinal: 0,
		}
	}
}

impl<A, R> RegistrySnapshot<A, R> {
	/// Registrations in ordinal order.
	pub(crate) fn records(&self) -> Vec<RegistrationRecord> {
		let exact = self.exact.iter().map(|(key, e)| RegistrationRecord {
			ordinal: e.ordinal,
			selector: SelectorKind::Exact,
			key: Some(*key),
			name: key.short_name(),
		});
		let protocols = self.protocols.iter().map(|e| RegistrationRecord {
			ordinal: e.ordinal,
			selector: SelectorKind::Protocol,
			key: None,
			name: e.protocol.name().to_string(),
		});
		let delegates = self.delegates.entries.values().map(|e| RegistrationRecord {
			ordinal: e.ordinal,
			selector: SelectorKind::Delegate,
			key: Some(e.delegate.key()),
			name: e.delegate.key().short_name(),
		});

		let mut records: Vec<_> = exact.chain(protocols).chain(delegates).collect();
		records.sort_by_key(|r| r.ordinal);
		records
	}

	fn with(&self, selector: &Selector, implementation: Implementation<A, R>) -> (Self, bool) {
		let ordinal = self.next_ordinal;
		let mut next = Self {
			exact: self.exact.clone(),
			protocols: self.protocols.clone(),
			delegates: self.delegates.clone(),
			next_ordinal: ordinal + 1,
		};
		let replaced = match selector {
			Selector::Exact(key) => {
				let (exact, replaced) = self.exact.with(
					*key,
					ExactEntry {
						implementation,
						ordinal,
					},
				);
				next.exact = exact;
				replaced
			}
			Selector::Protocol(protocol) => {
				next.protocols = self.protocols.with(ProtocolEntry {
					protocol: protocol.clone(),
					implementation,
					ordinal,
				});
				false
			}
			Selector::Delegate(delegate) => {
				let (delegates, replaced) = self.delegates.with(DelegateEntry {
					delegate: *delegate,
					implementation,
					ordinal,
				});
				next.delegates = delegates;
				replaced
			}
		};
		(next, replaced)
	}
}

/// Atomically published registries.
pub(crate) struct Registries<A, R> {
	snap: ArcSwap<RegistrySnapshot<A, R>>,
}

impl<A, R> Default for Registries<A, R> {
	fn default() -> Self {
		Self {
			snap: ArcSwap::from_pointee(RegistrySnapshot::default()),
		}
	}
}

impl<A, R> Registries<A, R> {
	/// Cheap read guard for the hot path.
	#[inline]
	pub(crate) fn load(&self) -> Guard<Arc<RegistrySnapshot<A, R>>> {
		self.snap.load()
	}

	pub(crate) fn snapshot(&self) -> Arc<RegistrySnapshot<A, R>> {
		self.snap.load_full()
	}

	/// Inserts one implementation. Returns true if it replaced an earlier one.
	pub(crate) fn insert(&self, selector: &Selector, implementation: Implementation<A, R>) -> bool {
		loop {
			let old = self.snap.load_full();
			let (next, replaced) = old.with(selector, Arc::clone(&implementation));
			let next = Arc::new(next);
			let prev = self.snap.compare_and_swap(&old, next);
			if Arc::ptr_eq(&prev, &old) {
				return replaced;
			}
			// CAS failed, retry with updated snapshot
		}
	}
}

impl<A, R> fmt::Debug for Registries<A, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let snap = self.snap.load();
		f.debug_struct("Registries")
			.field("exact", &snap.exact.len())
			.field("protocols", &snap.protocols.len())
			.field("delegates", &snap.delegates.len())
			.finish()
	}
}
