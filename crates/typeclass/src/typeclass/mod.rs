//! Typeclass facade.
//!
//! # Purpose
//!
//! [`Typeclass`] is the only object application code talks to. It owns the
//! three instance registries, the dispatch cache, and the default behaviour,
//! and reads the type hierarchy it was built against.
//!
//! # Mental model
//!
//! ```text
//! call(value) ── delegates ──► hit? invoke
//!                   │
//!                   ▼
//!           generation = hierarchy.generation()
//!                   │
//!            cache.lookup ──► hit? invoke
//!                   │ miss(epoch)
//!                   ▼
//!   registries.load + hierarchy.snapshot ──► ResolutionEngine::resolve
//!                   │
//!            cache.insert(epoch, generation) ──► invoke or default
//! ```
//!
//! # Concurrency & ordering
//!
//! * Registration publishes the registries first and clears the cache second.
//!   A resolver that observed the cache before the clear carries the old epoch,
//!   so its result is rejected on insert.
//! * The generation is loaded before the hierarchy snapshot. The hierarchy
//!   publishes before bumping, so the snapshot is at least as new as the
//!   generation the result is tagged with.
//! * Delegate checks read the value and run before the cache on every call.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tyclass_hierarchy::{Hierarchy, TypeKey};

use crate::cache::{CacheConfig, ClearReason, DispatchCache, Lookup};
use crate::delegate::Delegate;
use crate::error::{DefinitionError, DispatchError, RegistrationError};
use crate::instance::{InstanceArgs, InstanceDef};
use crate::protocol::Protocol;
use crate::registry::{Implementation, RegistrationRecord, Registries, Selector};
use crate::resolve::{MatchKind, ResolutionEngine, Resolved};
use crate::signature::{AssociatedType, Signature};


/// Name reported for erased values whose type was never declared or observed.
const ERASED: &str = "<erased>";

/// A named operation whose implementation is chosen by the runtime type of
/// its first argument.
///
/// `A` is the tuple of trailing arguments and `R` the return type.
pub struct Typeclass<A = (), R = ()> {
	signature: Signature,
	hierarchy: Arc<Hierarchy>,
	registries: Registries<A, R>,
	cache: DispatchCache<A, R>,
	fallback: Option<Implementation<A, R>>,
}

/// Definition-time metadata plus every registration, for external tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeclassDescription {
	pub signature: Signature,
	pub registrations: Vec<RegistrationRecord>,
}

impl<A: 'static, R: 'static> Typeclass<A, R> {
	/// Defines a typeclass against the global hierarchy with default settings.
	pub fn define(name: impl Into<Arc<str>>) -> Self {
		TypeclassBuilder::new(name.into()).finish()
	}

	pub fn builder(name: impl Into<Arc<str>>) -> TypeclassBuilder<A, R> {
		TypeclassBuilder::new(name.into())
	}

	pub fn name(&self) -> &str {
		&self.signature.name
	}

	pub fn signature(&self) -> &Signature {
		&self.signature
	}

	pub fn hierarchy(&self) -> &Arc<Hierarchy> {
		&self.hierarchy
	}

	pub fn cache_config(&self) -> CacheConfig {
		self.cache.config()
	}

	/// Validates `args` and returns a pending registration.
	///
	/// Fails before any implementation is supplied, so malformed registrations
	/// surface where they are written.
	pub fn instance(&self, args: InstanceArgs) -> Result<InstanceDef<'_, A, R>, RegistrationError> {
		let registries = self.registries.snapshot();
		let hierarchy = self.hierarchy.snapshot();
		let selector = args.into_selector(&self.signature.name, &*registries, &hierarchy)?;
		Ok(InstanceDef::new(self, selector))
	}

	pub fn instance_of<T: ?Sized + 'static>(&self) -> Result<InstanceDef<'_, A, R>, RegistrationError> {
		self.instance(InstanceArgs::new().exact_of::<T>())
	}

	pub fn instance_protocol(&self, protocol: Protocol) -> Result<InstanceDef<'_, A, R>, RegistrationError> {
		self.instance(InstanceArgs::new().protocol(protocol))
	}

	pub fn instance_delegate<D: Delegate>(&self) -> Result<InstanceDef<'_, A, R>, RegistrationError> {
		self.instance(InstanceArgs::new().delegate::<D>())
	}

	pub(crate) fn store(&self, selector: &Selector, implementation: Implementation<A, R>) {
		if let Selector::Exact(key) = selector {
			self.hierarchy.observe(*key);
		}
		let replaced = self.registries.insert(selector, implementation);
		self.cache.clear(ClearReason::Registration);

		let kind = selector.kind().as_str();
		match selector {
			Selector::Exact(key) => debug!(typeclass = %self.signature.name, kind, ty = %key, replaced, "instance registered"),
			Selector::Protocol(protocol) => {
				debug!(typeclass = %self.signature.name, kind, protocol = protocol.name(), "instance registered")
			}
			Selector::Delegate(delegate) => {
				debug!(typeclass = %self.signature.name, kind, ty = %delegate.key(), replaced, "instance registered")
			}
		}
	}

	/// Invokes the implementation selected for `value`.
	pub fn call<T: Any>(&self, value: &T, args: A) -> Result<R, DispatchError> {
		self.invoke(value, self.typed_key::<T>(), args)
	}

	/// Type-erased form of [`Typeclass::call`]. Dispatches on the concrete type
	/// behind the reference, not on `dyn Any`.
	///
	/// Errors name the type if it was declared, registered as an exact instance,
	/// or passed to a typed entry point on the same hierarchy before. Otherwise
	/// the name is `<erased>`.
	pub fn call_dyn(&self, value: &dyn Any, args: A) -> Result<R, DispatchError> {
		self.invoke(value, self.erased_key(value), args)
	}

	/// Returns true if an instance (not the default) would handle `value`.
	///
	/// Populates the cache exactly like [`Typeclass::call`].
	pub fn supports<T: Any>(&self, value: &T) -> bool {
		self.resolve_value(value, self.typed_key::<T>()).implementation.is_some()
	}

	pub fn supports_dyn(&self, value: &dyn Any) -> bool {
		self.resolve_value(value, self.erased_key(value)).implementation.is_some()
	}

	/// Reports which resolution step handles `value`.
	pub fn resolve<T: Any>(&self, value: &T) -> MatchKind {
		self.resolve_value(value, self.typed_key::<T>()).kind
	}

	pub fn resolve_dyn(&self, value: &dyn Any) -> MatchKind {
		self.resolve_value(value, self.erased_key(value)).kind
	}

	/// Registrations in the order they were made.
	pub fn registrations(&self) -> Vec<RegistrationRecord> {
		self.registries.load().records()
	}

	pub fn describe(&self) -> TypeclassDescription {
		TypeclassDescription {
			signature: self.signature.clone(),
			registrations: self.registrations(),
		}
	}

	/// Number of cached resolution results.
	pub fn cache_len(&self) -> usize {
		self.cache.len()
	}

	pub fn is_cached<T: ?Sized + 'static>(&self) -> bool {
		self.cache.contains(TypeKey::of::<T>())
	}

	pub fn clear_cache(&self) {
		self.cache.clear(ClearReason::Manual);
	}

	fn invoke(&self, value: &dyn Any, key: TypeKey, args: A) -> Result<R, DispatchError> {
		let resolved = self.resolve_value(value, key);
		match (resolved.implementation, &self.fallback) {
			(Some(implementation), _) => Ok(implementation(value, args)),
			(None, Some(fallback)) => Ok(fallback(value, args)),
			(None, None) => Err(DispatchError::UnmatchedType {
				typeclass: Arc::clone(&self.signature.name),
				type_name: self
					.hierarchy
					.name_of(key.id())
					.map_or_else(|| key.short_name(), |name| name.to_string()),
			}),
		}
	}

	fn typed_key<T: Any>(&self) -> TypeKey {
		let key = TypeKey::of::<T>();
		self.hierarchy.observe(key);
		key
	}

	fn erased_key(&self, value: &dyn Any) -> TypeKey {
		let id = value.type_id();
		self.hierarchy
			.key_of(id)
			.unwrap_or_else(|| TypeKey::from_raw(id, ERASED))
	}

	fn resolve_value(&self, value: &dyn Any, key: TypeKey) -> Resolved<A, R> {
		if let Some(hit) = ResolutionEngine::delegate(&**self.registries.load(), value) {
			return hit;
		}

		let generation = self.hierarchy.generation();
		match self.cache.lookup(generation, key) {
			Lookup::Hit(hit) => hit,
			Lookup::Miss { epoch } => {
				let registries = self.registries.load();
				let hierarchy = self.hierarchy.snapshot();
				let resolved = ResolutionEngine::new(&**registries, &hierarchy).resolve(key);
				self.cache.insert(epoch, generation, key, &resolved);
				resolved
			}
		}
	}

	#[cfg(test)]
	pub(crate) fn cache(&self) -> &DispatchCache<A, R> {
		&self.cache
	}

	#[cfg(test)]
	pub(crate) fn registries_snapshot(&self) -> Arc<crate::registry::RegistrySnapshot<A, R>> {
		self.registries.snapshot()
	}
}

impl<A, R> fmt::Display for Typeclass<A, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.signature, f)
	}
}

impl<A, R> fmt::Debug for Typeclass<A, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Typeclass")
			.field("signature", &self.signature)
			.field("registries", &self.registries)
			.field("cache", &self.cache)
			.field("custom_default", &self.fallback.is_some())
			.finish()
	}
}

/// Builder for [`Typeclass`].
pub struct TypeclassBuilder<A, R> {
	name: Arc<str>,
	associated: Option<AssociatedType>,
	fallback: Option<Implementation<A, R>>,
	cache: CacheConfig,
	hierarchy: Option<Arc<Hierarchy>>,
	_marker: PhantomData<fn(A) -> R>,
}

impl<A: 'static, R: 'static> TypeclassBuilder<A, R> {
	fn new(name: Arc<str>) -> Self {
		Self {
			name,
			associated: None,
			fallback: None,
			cache: CacheConfig::default(),
			hierarchy: None,
			_marker: PhantomData,
		}
	}

	/// Attaches a marker type. Each marker may back one typeclass per process.
	pub fn associated<M: ?Sized + 'static>(mut self) -> Self {
		self.associated = Some(AssociatedType::of::<M>());
		self
	}

	/// Behaviour for values no instance matches. Without one, such calls fail
	/// with [`DispatchError::UnmatchedType`].
	pub fn default_impl<F>(mut self, fallback: F) -> Self
	where
		F: Fn(&dyn Any, A) -> R + Send + Sync + 'static,
	{
		self.fallback = Some(Arc::new(fallback));
		self
	}

	pub fn cache(mut self, config: CacheConfig) -> Self {
		self.cache = config;
		self
	}

	/// Resolves against `hierarchy` instead of [`Hierarchy::global`].
	pub fn hierarchy(mut self, hierarchy: Arc<Hierarchy>) -> Self {
		self.hierarchy = Some(hierarchy);
		self
	}

	pub fn build(self) -> Result<Typeclass<A, R>, DefinitionError> {
		if let Some(associated) = &self.associated {
			associated.bind(&self.name)?;
		}
		Ok(self.finish())
	}

	fn finish(self) -> Typeclass<A, R> {
		let signature = Signature::of::<A, R>(self.name, self.associated);
		debug!(typeclass = %signature.name, cache = ?self.cache, "typeclass defined");
		Typeclass {
			signature,
			hierarchy: self.hierarchy.unwrap_or_else(Hierarchy::global),
			registries: Registries::default(),
			cache: DispatchCache::new(self.cache),
			fallback: self.fallback,
		}
	}
}

impl<A, R> fmt::Debug for TypeclassBuilder<A, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeclassBuilder")
			.field("name", &self.name)
			.field("associated", &self.associated)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}
