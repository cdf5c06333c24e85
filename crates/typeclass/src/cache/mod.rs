//! Per-typeclass dispatch cache.
//!
//! # Purpose
//!
//! Memoizes type-only resolution results (steps 1 to 3) per concrete type, so
//! repeat calls skip the registry scan and the linearization.
//!
//! # Mental model
//!
//! The cache is one immutable `CacheState` published through `ArcSwap`:
//!
//! * `epoch` is local. Every clear moves it forward.
//! * `token` is the hierarchy generation the entries were computed against.
//!   It stays `None` until the first entry that read the hierarchy is stored.
//! * `entries` maps type keys to resolution outcomes.
//!
//! A caller looks up with the generation it loaded *before* touching any
//! snapshot. On a miss it gets the epoch it observed, resolves, then offers the
//! result back with that epoch. The insert is dropped if the cache was cleared
//! in between, so a result computed against an old registry or hierarchy can
//! never land in a fresh cache.
//!
//! # Invariants
//!
//! * A token older than the caller's generation clears the cache before lookup.
//! * A clear always bumps the epoch, and inserts carrying an older epoch are dropped.
//! * An entry that read the hierarchy is only stored under a token equal to
//!   the generation it was resolved against.
//! * Exact hits never set the token; they stay valid across generations.
//!
//! # Concurrency & ordering
//!
//! Lookups are a single `ArcSwap` load. Clears and inserts are CAS loops; two
//! threads resolving the same type may both insert, and the later write wins.
//! The results are identical, so the race is benign.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tyclass_hierarchy::TypeKey;

use crate::resolve::Resolved;


/// Cache behaviour of one typeclass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
	/// When false every call runs the full resolution.
	pub enabled: bool,
	/// Upper bound on cached types. Once reached, new results are not stored.
	pub capacity: Option<usize>,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			capacity: None,
		}
	}
}

impl CacheConfig {
	pub fn disabled() -> Self {
		Self {
			enabled: false,
			capacity: None,
		}
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			enabled: true,
			capacity: Some(capacity),
		}
	}
}

/// Why the cache was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClearReason {
	Registration,
	Generation,
	Manual,
}

impl ClearReason {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Registration => "registration",
			Self::Generation => "generation",
			Self::Manual => "manual",
		}
	}
}

pub(crate) struct CacheState<A, R> {
	epoch: u64,
	token: Option<u64>,
	entries: FxHashMap<TypeKey, Resolved<A, R>>,
}

impl<A, R> CacheState<A, R> {
	fn empty(epoch: u64, token: Option<u64>) -> Self {
		Self {
			epoch,
			token,
			entries: FxHashMap::default(),
		}
	}
}

/// Result of a cache lookup.
pub(crate) enum Lookup<A, R> {
	Hit(Resolved<A, R>),
	/// Resolve and offer the result back with this epoch.
	Miss { epoch: u64 },
}

pub(crate) struct DispatchCache<A, R> {
	config: CacheConfig,
	state: ArcSwap<CacheState<A, R>>,
}

impl<A, R> DispatchCache<A, R> {
	pub(crate) fn new(config: CacheConfig) -> Self {
		Self {
			config,
			state: ArcSwap::from_pointee(CacheState::empty(0, None)),
		}
	}

	pub(crate) fn config(&self) -> CacheConfig {
		self.config
	}

	/// Looks up `key` against hierarchy generation `generation`.
	pub(crate) fn lookup(&self, generation: u64, key: TypeKey) -> Lookup<A, R> {
		if !self.config.enabled {
			return Lookup::Miss { epoch: 0 };
		}

		let state = self.state.load();
		if state.token.is_some_and(|token| token < generation) {
			drop(state);
			let epoch = self.invalidate(generation);
			return Lookup::Miss { epoch };
		}

		match state.entries.get(&key) {
			Some(hit) => Lookup::Hit(hit.clone()),
			None => Lookup::Miss { epoch: state.epoch },
		}
	}

	/// Stores `resolved` unless the cache moved on since `epoch` was observed.
	///
	/// Returns true if the entry was stored.
	pub(crate) fn insert(&self, epoch: u64, generation: u64, key: TypeKey, resolved: &Resolved<A, R>) -> bool {
		if !self.config.enabled {
			return false;
		}

		loop {
			let old = self.state.load_full();
			if old.epoch != epoch {
				return false;
			}
			let token = match (old.token, resolved.depends_on_hierarchy) {
				(Some(token), true) if token != generation => return false,
				(None, true) => Some(generation),
				(token, _) => token,
			};
			if !old.entries.contains_key(&key)
				&& self
					.config
					.capacity
					.is_some_and(|capacity| old.entries.len() >= capacity)
			{
				return false;
			}

			let mut entries = old.entries.clone();
			entries.insert(key, resolved.clone());
			let next = Arc::new(CacheState {
				epoch: old.epoch,
				token,
				entries,
			});
			let prev = self.state.compare_and_swap(&old, next);
			if Arc::ptr_eq(&prev, &old) {
				return true;
			}
			// CAS failed, retry with updated state
		}
	}

	/// Drops every entry and moves the epoch forward.
	pub(crate) fn clear(&self, reason: ClearReason) {
		self.state.rcu(|old| CacheState::empty(old.epoch + 1, old.token));
		debug!(reason = reason.as_str(), "dispatch cache cleared");
	}

	/// Clears entries computed before `generation` and adopts it as the token.
	///
	/// Returns the epoch callers must carry into [`DispatchCache::insert`].
	fn invalidate(&self, generation: u64) -> u64 {
		loop {
			let old = self.state.load_full();
			// Another caller already adopted this generation or a newer one.
			if old.token.is_some_and(|token| token >= generation) {
				return old.epoch;
			}

			let next = Arc::new(CacheState::empty(old.epoch + 1, Some(generation)));
			let epoch = next.epoch;
			let prev = self.state.compare_and_swap(&old, next);
			if Arc::ptr_eq(&prev, &old) {
				debug!(
					reason = ClearReason::Generation.as_str(),
					stale = ?old.token,
					generation,
					dropped = old.entries.len(),
					"dispatch cache cleared"
				);
				return epoch;
			}
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.state.load().entries.len()
	}

	pub(crate) fn contains(&self, key: TypeKey) -> bool {
		self.state.load().entries.contains_key(&key)
	}

	#[cfg(test)]
	pub(crate) fn token(&self) -> Option<u64> {
		self.state.load().token
	}

	#[cfg(test)]
	pub(crate) fn epoch(&self) -> u64 {
		self.state.load().epoch
	}
}

impl<A, R> fmt::Debug for DispatchCache<A, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.load();
		f.debug_struct("DispatchCache")
			.field("config", &self.config)
			.field("epoch", &state.epoch)
			.field("token", &state.token)
			.field("entries", &state.entries.len())
			.finish()
	}
}
