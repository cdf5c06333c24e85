use std::any::Any;
use std::sync::Arc;

use tyclass_hierarchy::{Hierarchy, TypeDecl, TypeKey};

use crate::cache::Lookup;
use crate::resolve::ResolutionEngine;
use crate::{DispatchError, InstanceArgs, MatchKind, Protocol, RegistrationError, Typeclass};

trait Base {}
struct Derived;
struct Unrelated;
struct Bag;
struct Item<const I: usize>;

struct Never;

impl crate::Delegate for Never {
	type Target = ();

	fn matches(_: &()) -> bool {
		false
	}
}

fn hierarchy() -> Arc<Hierarchy> {
	let h = Arc::new(Hierarchy::new());
	h.declare(TypeDecl::of::<dyn Base>().abstract_type()).unwrap();
	h.declare(TypeDecl::of::<Derived>().extends::<dyn Base>()).unwrap();
	h.declare(TypeDecl::of::<Bag>().member("len")).unwrap();
	h
}

fn typeclass(h: &Arc<Hierarchy>) -> Typeclass<(), &'static str> {
	Typeclass::builder("probe")
		.hierarchy(Arc::clone(h))
		.build()
		.unwrap()
}

fn returning(tag: &'static str) -> impl Fn(&dyn Any, ()) -> &'static str + Clone + Send + Sync + 'static {
	move |_: &dyn Any, ()| tag
}

/// Invariant: An exact instance MUST win over a protocol the type also satisfies.
pub(crate) fn inv_exact_beats_protocol() {
	let tc = typeclass(&hierarchy());
	tc.instance_protocol(Protocol::requiring("Sized", ["len"]))
		.unwrap()
		.register(returning("protocol"));
	tc.instance_of::<Bag>().unwrap().register(returning("exact"));

	for _ in 0..2 {
		assert_eq!(tc.call(&Bag, ()), Ok("exact"));
	}
}

#[cfg_attr(test, test)]
pub(crate) fn test_exact_beats_protocol() {
	inv_exact_beats_protocol()
}

/// Invariant: Overlapping protocols MUST be tried in registration order.
pub(crate) fn inv_protocols_tried_in_registration_order() {
	let tc = typeclass(&hierarchy());
	tc.instance_protocol(Protocol::requiring("A", ["len"]))
		.unwrap()
		.register(returning("a"));
	tc.instance_protocol(Protocol::requiring("B", ["len"]))
		.unwrap()
		.register(returning("b"));

	assert_eq!(tc.call(&Bag, ()), Ok("a"));
	assert_eq!(tc.resolve(&Bag), MatchKind::Protocol(Arc::from("A")));
}

#[cfg_attr(test, test)]
pub(crate) fn test_protocols_tried_in_registration_order() {
	inv_protocols_tried_in_registration_order()
}

/// Invariant: A type without its own instance MUST use its nearest ancestor's.
pub(crate) fn inv_inherited_instance_applies() {
	let tc = typeclass(&hierarchy());
	tc.instance_of::<dyn Base>().unwrap().register(returning("base"));

	assert_eq!(tc.call(&Derived, ()), Ok("base"));
}

#[cfg_attr(test, test)]
pub(crate) fn test_inherited_instance_applies() {
	inv_inherited_instance_applies()
}

/// Invariant: A cached miss MUST NOT survive a new virtual subtype relationship.
///
/// The first call caches "unmatched" for `Unrelated`; registering it under
/// `Base` advances the generation, which clears the cache on the next call.
pub(crate) fn inv_virtual_registration_invalidates_cache() {
	let h = hierarchy();
	let tc = typeclass(&h);
	tc.instance_of::<dyn Base>().unwrap().register(returning("base"));

	assert!(matches!(
		tc.call(&Unrelated, ()),
		Err(DispatchError::UnmatchedType { .. })
	));
	assert!(tc.is_cached::<Unrelated>());

	h.register_virtual_of::<Unrelated, dyn Base>().unwrap();
	assert_eq!(tc.call(&Unrelated, ()), Ok("base"));
	assert!(tc.supports(&Unrelated));
}

#[cfg_attr(test, test)]
pub(crate) fn test_virtual_registration_invalidates_cache() {
	inv_virtual_registration_invalidates_cache()
}

/// Invariant: Malformed selector combinations MUST fail and register nothing.
pub(crate) fn inv_invalid_combination_registers_nothing() {
	let tc = typeclass(&hierarchy());
	let combos = [
		InstanceArgs::new(),
		InstanceArgs::new().exact_of::<Derived>().protocol(Protocol::new("Any", |_| true)),
		InstanceArgs::new()
			.exact_of::<Unrelated>()
			.delegate::<Never>()
			.protocol(Protocol::new("Any", |_| true)),
	];
	for args in combos {
		assert!(matches!(
			tc.instance(args),
			Err(RegistrationError::InvalidArgumentCombination { .. })
		));
	}
	assert!(tc.registrations().is_empty());
	assert_eq!(tc.resolve(&Derived), MatchKind::Unmatched);
}

#[cfg_attr(test, test)]
pub(crate) fn test_invalid_combination_registers_nothing() {
	inv_invalid_combination_registers_nothing()
}

/// Invariant: Re-registering an exact type MUST leave only the last implementation.
pub(crate) fn inv_reregistration_keeps_last() {
	let tc = typeclass(&hierarchy());
	tc.instance_of::<Derived>().unwrap().register(returning("first"));
	assert_eq!(tc.call(&Derived, ()), Ok("first"));

	tc.instance_of::<Derived>().unwrap().register(returning("second"));
	assert_eq!(tc.call(&Derived, ()), Ok("second"));
	assert_eq!(tc.registrations().len(), 1);
}

#[cfg_attr(test, test)]
pub(crate) fn test_reregistration_keeps_last() {
	inv_reregistration_keeps_last()
}

/// Invariant: `supports(v)` MUST be true exactly when `call(v)` does not fail
/// with `UnmatchedType`.
pub(crate) fn inv_supports_agrees_with_call() {
	let tc = typeclass(&hierarchy());
	tc.instance_of::<dyn Base>().unwrap().register(returning("base"));
	tc.instance_protocol(Protocol::requiring("Sized", ["len"]))
		.unwrap()
		.register(returning("sized"));

	let values: [&dyn Any; 5] = [&Derived, &Unrelated, &Bag, &0u8, &"text"];
	for value in values {
		// Twice: once resolving, once from the cache.
		for _ in 0..2 {
			let supported = tc.supports_dyn(value);
			let called = tc.call_dyn(value, ());
			assert_eq!(supported, called.is_ok(), "{:?}", tc.resolve_dyn(value));
		}
	}
}

#[cfg_attr(test, test)]
pub(crate) fn test_supports_agrees_with_call() {
	inv_supports_agrees_with_call()
}

/// Invariant: A resolution that started before a registration MUST NOT be cached.
///
/// The resolver observed the old epoch; the registration clears the cache and
/// moves the epoch, so the late insert is dropped.
pub(crate) fn inv_stale_resolution_not_cached() {
	let h = hierarchy();
	let tc = typeclass(&h);
	let key = TypeKey::of::<Derived>();

	let Lookup::Miss { epoch } = tc.cache().lookup(h.generation(), key) else {
		panic!("empty cache reported a hit");
	};
	let stale = {
		let registries = tc.registries_snapshot();
		let snapshot = h.snapshot();
		ResolutionEngine::new(&*registries, &snapshot).resolve(key)
	};
	assert_eq!(stale.kind, MatchKind::Unmatched);

	tc.instance_of::<Derived>().unwrap().register(returning("derived"));
	assert!(!tc.cache().insert(epoch, h.generation(), key, &stale));
	assert_eq!(tc.call(&Derived, ()), Ok("derived"));
}

#[cfg_attr(test, test)]
pub(crate) fn test_stale_resolution_not_cached() {
	inv_stale_resolution_not_cached()
}

/// Invariant: Concurrent registrations MUST NOT be lost.
pub(crate) fn inv_concurrent_registration() {
	let tc = typeclass(&hierarchy());

	std::thread::scope(|s| {
		s.spawn(|| tc.instance_of::<Item<0>>().unwrap().register(returning("0")));
		s.spawn(|| tc.instance_of::<Item<1>>().unwrap().register(returning("1")));
		s.spawn(|| tc.instance_of::<Item<2>>().unwrap().register(returning("2")));
		s.spawn(|| tc.instance_of::<Item<3>>().unwrap().register(returning("3")));
		s.spawn(|| {
			for _ in 0..64 {
				let _ = tc.call(&Item::<0>, ());
			}
		});
	});

	assert_eq!(tc.registrations().len(), 4);
	assert_eq!(tc.call(&Item::<0>, ()), Ok("0"));
	assert_eq!(tc.call(&Item::<1>, ()), Ok("1"));
	assert_eq!(tc.call(&Item::<2>, ()), Ok("2"));
	assert_eq!(tc.call(&Item::<3>, ()), Ok("3"));
}

#[cfg_attr(test, test)]
pub(crate) fn test_concurrent_registration() {
	inv_concurrent_registration()
}
