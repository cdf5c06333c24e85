//! Runtime type hierarchy with atomic publication.
//!
//! # Purpose
//!
//! Hold the type relationships the dispatch engine reads: declared lexical
//! bases, abstract types, and virtual subtypes registered after the fact.
//!
//! # Mental model
//!
//! * Readers pin an `Arc<HierarchySnapshot>` and query that immutable view.
//! * Writers build a replacement snapshot and publish it with CAS.
//! * Every published change that can alter a resolution result bumps the
//!   generation counter. Caches compare the counter against the value they
//!   saw when they were filled.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`crate::Hierarchy`] | Process-wide hierarchy service | Must publish before bumping the generation | [`crate::Hierarchy::declare`], [`crate::Hierarchy::register_virtual`] |
//! | [`crate::HierarchySnapshot`] | Immutable published state | Never mutated after publish | `Hierarchy::publish` |
//! | [`crate::TypeInfo`] | Descriptor of one type | Declared once per key | [`crate::TypeDecl`] |
//!
//! # Invariants
//!
//! * Concurrent writers must be linearizable (see `invariants::test_no_lost_virtual_registrations`).
//! * A reader that observes generation `g` reads a snapshot at least as new as `g`
//!   (see `invariants::test_generation_implies_snapshot`).
//! * The generation never decreases and only moves when the published state changes
//!   (see `invariants::test_redundant_registration_keeps_generation`).
//!
//! # Concurrency & ordering
//!
//! * Readers are wait-free (`ArcSwap` load + immutable data reads).
//! * Writers are lock-free via CAS retry loop.
//! * The generation counter is the only global mutable state the dispatch engine
//!   depends on. It is inherent: virtual subtyping is process-wide by nature.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::HierarchyError;
use crate::info::{TypeDecl, TypeInfo};
use crate::mro;
use crate::{TypeKey, short_name};

mod snapshot;

pub use snapshot::HierarchySnapshot;


static GLOBAL: LazyLock<Arc<Hierarchy>> = LazyLock::new(|| Arc::new(Hierarchy::new()));

/// Runtime type hierarchy service.
pub struct Hierarchy {
	snap: ArcSwap<HierarchySnapshot>,
	generation: AtomicU64,
	/// Compiler names of types seen through typed entry points, by raw id.
	observed: ArcSwap<FxHashMap<TypeId, &'static str>>,
}

impl Default for Hierarchy {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Hierarchy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let snap = self.snap.load();
		f.debug_struct("Hierarchy")
			.field("types", &snap.types.len())
			.field("virtual", &snap.virtual_count())
			.field("generation", &self.generation())
			.field("observed", &self.observed.load().len())
			.finish()
	}
}

impl Hierarchy {
	/// Creates an empty, independent hierarchy.
	pub fn new() -> Self {
		Self {
			snap: ArcSwap::from_pointee(HierarchySnapshot::default()),
			generation: AtomicU64::new(0),
			observed: ArcSwap::from_pointee(FxHashMap::default()),
		}
	}

	/// Returns the process-wide hierarchy.
	pub fn global() -> Arc<Hierarchy> {
		Arc::clone(&GLOBAL)
	}

	/// Current generation. Load this before reading a snapshot.
	#[inline]
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Pins the current published state.
	#[inline]
	pub fn snapshot(&self) -> Arc<HierarchySnapshot> {
		self.snap.load_full()
	}

	pub fn info(&self, key: TypeKey) -> Arc<TypeInfo> {
		self.snap.load().info(key)
	}

	/// Display name for a raw type id: the declared name, else the short name
	/// of an observed type.
	pub fn name_of(&self, id: TypeId) -> Option<Arc<str>> {
		if let Some(name) = self.snap.load().name_of(id) {
			return Some(name);
		}
		self.observed.load().get(&id).map(|name| Arc::from(short_name(name)))
	}

	/// Recovers a named key for a raw type id.
	///
	/// Declared types win over observed ones. Returns `None` for a type that was
	/// neither declared nor observed.
	pub fn key_of(&self, id: TypeId) -> Option<TypeKey> {
		if let Some(info) = self.snap.load().get(TypeKey::from_raw(id, "")) {
			return Some(info.key);
		}
		self.observed
			.load()
			.get(&id)
			.map(|&name| TypeKey::from_raw(id, name))
	}

	/// Remembers the compiler name of `key` for later lookups by raw id.
	///
	/// Observing never changes resolution, so the generation stays put.
	pub fn observe(&self, key: TypeKey) {
		if self.observed.load().contains_key(&key.id()) {
			return;
		}
		self.observed.rcu(|old| {
			let mut names = (**old).clone();
			names.entry(key.id()).or_insert(key.type_name());
			names
		});
	}

	pub fn is_subtype(&self, sub: TypeKey, sup: TypeKey) -> bool {
		self.snap.load().is_subtype(sub, sup)
	}

	pub fn linearize(&self, key: TypeKey) -> Vec<TypeKey> {
		self.snap.load().linearize(key)
	}

	/// Declares a type with its lexical bases and members.
	///
	/// Declaring can change how values of an already-dispatched type resolve,
	/// so a successful declaration advances the generation.
	pub fn declare(&self, decl: TypeDecl) -> Result<Arc<TypeInfo>, HierarchyError> {
		let key = decl.key();
		let info = Arc::new(decl.into_info());

		self.publish(|old| {
			if old.is_declared(key) {
				return Err(HierarchyError::DuplicateDeclaration { key });
			}
			for &base in &info.bases {
				if base == key {
					return Err(HierarchyError::SelfBase { key });
				}
				if old.get(base).is_some_and(|b| b.is_alias()) {
					return Err(HierarchyError::AliasBase { key, base });
				}
				if old.is_subtype(base, key) {
					return Err(HierarchyError::InheritanceCycle { sub: key, base });
				}
			}
			mro::linearize(key, |k| {
				if k == key {
					info.bases.to_vec()
				} else {
					old.lexical_bases(k).to_vec()
				}
			})
			.map_err(|conflict| HierarchyError::InconsistentMro {
				key,
				remaining: conflict.remaining,
			})?;

			let mut types = (*old.types).clone();
			types.insert(key, Arc::clone(&info));
			Ok(HierarchySnapshot {
				types: Arc::new(types),
				virtual_bases: Arc::clone(&old.virtual_bases),
			})
		})?;

		let generation = self.advance();
		debug!(key = %key, name = %info.name, bases = ?info.bases, generation, "type declared");
		Ok(info)
	}

	/// Registers `sub` as a virtual subtype of the abstract type `base`.
	///
	/// Returns `Ok(false)` when `sub` already is a subtype of `base`; nothing is
	/// published and the generation stays put in that case.
	pub fn register_virtual(&self, sub: TypeKey, base: TypeKey) -> Result<bool, HierarchyError> {
		let mut changed = false;
		self.publish(|old| {
			if !old.get(base).is_some_and(|b| b.is_abstract()) {
				return Err(HierarchyError::NotAbstract { base });
			}
			if old.is_subtype(sub, base) {
				changed = false;
				return Ok(None);
			}
			if old.is_subtype(base, sub) {
				return Err(HierarchyError::InheritanceCycle { sub, base });
			}

			let mut virtual_bases = (*old.virtual_bases).clone();
			virtual_bases.entry(sub).or_default().push(base);
			changed = true;
			Ok(Some(HierarchySnapshot {
				types: Arc::clone(&old.types),
				virtual_bases: Arc::new(virtual_bases),
			}))
		})?;

		if changed {
			let generation = self.advance();
			debug!(sub = %sub, base = %base, generation, "virtual subtype registered");
		}
		Ok(changed)
	}

	/// Typed form of [`Hierarchy::register_virtual`].
	pub fn register_virtual_of<Sub, Base>(&self) -> Result<bool, HierarchyError>
	where
		Sub: ?Sized + 'static,
		Base: ?Sized + 'static,
	{
		self.register_virtual(TypeKey::of::<Sub>(), TypeKey::of::<Base>())
	}

	/// Builds a replacement snapshot from the latest one and publishes it with CAS.
	///
	/// `build` may run more than once if another writer wins the race. Returning
	/// `Ok(None)` leaves the current snapshot in place.
	pub(crate) fn publish<F, S>(&self, mut build: F) -> Result<(), HierarchyError>
	where
		F: FnMut(&HierarchySnapshot) -> Result<S, HierarchyError>,
		S: Into<Option<HierarchySnapshot>>,
	{
		loop {
			let old = self.snap.load_full();
			let Some(next) = build(&*old)?.into() else {
				return Ok(());
			};

			let next = Arc::new(next);
			let prev = self.snap.compare_and_swap(&old, next);
			if Arc::ptr_eq(&prev, &old) {
				return Ok(());
			}
			// CAS failed, retry with updated snapshot
		}
	}

	fn advance(&self) -> u64 {
		self.generation.fetch_add(1, Ordering::AcqRel) + 1
	}
}
